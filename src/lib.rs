//! Translates J9 ROM classes packaged in a JXE image into standard
//! `.class` files.
//!
//! [`image::RomImage::parse`] reads the JXE binary layout,
//! [`classfile::emit_class`] rebuilds a standard constant pool
//! ([`pool::TargetPool`]) and bytecode stream ([`bytecode::transform`])
//! for each class it found.

pub mod bytecode;
pub mod classfile;
pub mod error;
pub mod image;
pub mod pool;
pub mod reader;

use error::translate::TranslateError;
use image::RomClass;

/// Translates a single already-parsed rom class into a `.class` file's
/// bytes. Call [`image::RomImage::parse`] first to get a `RomClass` out
/// of a JXE image.
pub fn translate_class(class: &RomClass) -> Result<Vec<u8>, TranslateError> {
    classfile::emit_class(class)
}
