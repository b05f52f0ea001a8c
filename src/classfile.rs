use crate::bytecode;
use crate::error::translate::TranslateError;
use crate::image::RomClass;
use crate::pool::TargetPool;
use crate::reader::ClassWriter;

const MAGIC: u32 = 0xCAFE_BABE;

struct FieldOut {
    access_flags: u16,
    name_index: u16,
    descriptor_index: u16,
}

struct MethodOut {
    access_flags: u16,
    name_index: u16,
    descriptor_index: u16,
    max_stack: u16,
    max_locals: u16,
    bytecode: Vec<u8>,
    exceptions: Vec<(u16, u16, u16, u16)>,
}

/// Emits a complete `.class` file for one JXE rom class.
///
/// Field and method attribute lists are always empty except for a
/// single `Code` attribute per method, since J9's rom format carries no
/// richer attribute data to translate, native methods included (they
/// get a zero-length `Code` attribute rather than none at all, matching
/// how the corpus this was distilled from always attaches one).
pub fn emit_class(class: &RomClass) -> Result<Vec<u8>, TranslateError> {
    let mut pool = TargetPool::from_source(&class.constant_pool);

    let this_class = pool.append_utf8_class(&class.class_name);
    let super_class = pool.append_utf8_class(&class.superclass_name);
    let interface_ids: Vec<u16> = class
        .interfaces
        .iter()
        .map(|name| pool.append_utf8_class(name))
        .collect();

    let field_outs: Vec<FieldOut> = class
        .fields
        .iter()
        .map(|field| FieldOut {
            access_flags: (field.access_flags & 0xFFFF) as u16,
            name_index: pool.append_utf8(&field.name),
            descriptor_index: pool.append_utf8(&field.signature),
        })
        .collect();

    let code_attr_name_index = pool.append_utf8("Code");

    let mut method_outs = Vec::with_capacity(class.methods.len());
    for method in &class.methods {
        let translated = bytecode::transform(method.bytecode(), &mut pool)?;
        let exceptions = method
            .catch_exceptions()
            .iter()
            .map(|c| {
                let catch_type = if c.catch_type > 0 {
                    (c.catch_type + 1) as u16
                } else {
                    0
                };
                (c.start as u16, c.end as u16, c.handler as u16, catch_type)
            })
            .collect();
        method_outs.push(MethodOut {
            access_flags: (method.modifier & 0xFFFF) as u16,
            name_index: pool.append_utf8(&method.name),
            descriptor_index: pool.append_utf8(&method.signature),
            max_stack: method.max_stack,
            max_locals: method.temp_count,
            bytecode: translated,
            exceptions,
        });
    }

    // The Code attribute's fixed overhead: narrow (pre-JDK-1.0.2 class
    // files, major.minor < 45.3) packs max_stack/max_locals/code_length
    // into 1/1/2 bytes; everything since uses 2/2/4.
    let narrow = (class.major_version, class.minor_version) < (45, 3);

    let mut writer = ClassWriter::new();
    writer.write_u32(MAGIC);
    writer.write_u16(class.minor_version);
    writer.write_u16(class.major_version);

    // The pool is written only now, after every field/method append and
    // every bytecode-driven retag above has already landed in it.
    pool.write(&mut writer);

    writer.write_u16((class.access_flags & 0xFFFF) as u16);
    writer.write_u16(this_class);
    writer.write_u16(super_class);

    writer.write_u16(interface_ids.len() as u16);
    for id in &interface_ids {
        writer.write_u16(*id);
    }

    writer.write_u16(field_outs.len() as u16);
    for field in &field_outs {
        writer.write_u16(field.access_flags);
        writer.write_u16(field.name_index);
        writer.write_u16(field.descriptor_index);
        writer.write_u16(0); // attributes_count
    }

    writer.write_u16(method_outs.len() as u16);
    for method in &method_outs {
        writer.write_u16(method.access_flags);
        writer.write_u16(method.name_index);
        writer.write_u16(method.descriptor_index);
        writer.write_u16(1); // attributes_count: just Code

        writer.write_u16(code_attr_name_index);
        let fixed_overhead: u32 = if narrow { 8 } else { 12 };
        let attribute_length =
            method.bytecode.len() as u32 + method.exceptions.len() as u32 * 8 + fixed_overhead;
        writer.write_u32(attribute_length);

        if narrow {
            writer.write_u8(method.max_stack as u8);
            writer.write_u8(method.max_locals as u8);
            writer.write_u16(method.bytecode.len() as u16);
        } else {
            writer.write_u16(method.max_stack);
            writer.write_u16(method.max_locals);
            writer.write_u32(method.bytecode.len() as u32);
        }
        writer.write_raw_bytes(&method.bytecode);

        writer.write_u16(method.exceptions.len() as u16);
        for (start, end, handler, catch_type) in &method.exceptions {
            writer.write_u16(*start);
            writer.write_u16(*end);
            writer.write_u16(*handler);
            writer.write_u16(*catch_type);
        }
        writer.write_u16(0); // Code's own attributes_count
    }

    writer.write_u16(0); // class-level attributes_count

    Ok(writer.finish())
}
