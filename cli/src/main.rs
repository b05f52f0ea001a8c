use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use clap::Parser;
use log::{info, warn, LevelFilter};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use jxe2jar_core::image::RomImage;
use jxe2jar_core::translate_class;

const ROM_CLASSES_ENTRY: &str = "rom.classes";

/// Converts a JXE image into a standard jar of `.class` files.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the input .jxe file.
    input: PathBuf,

    /// Path the translated .jar is written to.
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let input_file = File::open(&args.input)?;
    let mut archive = ZipArchive::new(input_file)?;
    let mut rom_bytes = Vec::new();
    archive
        .by_name(ROM_CLASSES_ENTRY)?
        .read_to_end(&mut rom_bytes)?;

    let image = RomImage::parse(&rom_bytes)?;
    info!("parsed {} class(es) from {}", image.classes.len(), ROM_CLASSES_ENTRY);

    let output_file = File::create(&args.output)?;
    let mut writer = ZipWriter::new(output_file);
    let options = FileOptions::default();

    let mut written = 0usize;
    let mut skipped = 0usize;
    for class in &image.classes {
        match translate_class(class) {
            Ok(bytes) => {
                let entry_name = format!("{}.class", class.class_name);
                writer.start_file(entry_name, options)?;
                writer.write_all(&bytes)?;
                written += 1;
            }
            Err(e) => {
                warn!("skipping class {}: {}", class.class_name, e);
                skipped += 1;
            }
        }
    }
    writer.finish()?;

    info!("wrote {written} class(es), skipped {skipped}");

    Ok(())
}
