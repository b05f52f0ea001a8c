use jxe2jar_core::image::RomImage;
use jxe2jar_core::translate_class;

fn le32(v: u32) -> [u8; 4] {
    v.to_le_bytes()
}

fn push_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u16).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn rel(from: usize, to: usize) -> i32 {
    to as i64 as i32 - from as i32
}

/// Builds a single-class JXE image with one int constant and one method
/// whose bytecode is `return0` (0xAC) followed by 3 bytes of word-align
/// padding, exercising the full parse -> pool rebuild -> bytecode
/// transform -> emit pipeline end to end.
fn build_image_with_one_method() -> Vec<u8> {
    // Class body, built incrementally; relative-pointer slots are
    // backfilled once their targets are known.
    let mut body = Vec::new();
    body.extend_from_slice(&le32(0)); // rom_size
    body.extend_from_slice(&le32(0)); // single_scalar_static_count

    let class_name_slot = body.len();
    body.extend_from_slice(&[0; 4]);
    let superclass_slot = body.len();
    body.extend_from_slice(&[0; 4]);

    body.extend_from_slice(&le32(0x0021)); // access_flags (public, super)
    body.extend_from_slice(&le32(0)); // interface_count
    body.extend_from_slice(&le32(0)); // interfaces_ptr
    body.extend_from_slice(&le32(1)); // method_count
    let methods_ptr_slot = body.len();
    body.extend_from_slice(&[0; 4]);
    body.extend_from_slice(&le32(0)); // field_count
    body.extend_from_slice(&le32(0)); // fields_ptr
    body.extend_from_slice(&le32(0)); // object_static_count
    body.extend_from_slice(&le32(0)); // double_scalar_static_count
    body.extend_from_slice(&le32(0)); // ram_constant_pool_count
    body.extend_from_slice(&le32(1)); // rom_constant_pool_count
    body.extend_from_slice(&le32(0)); // crc
    body.extend_from_slice(&le32(0)); // instance_size
    body.extend_from_slice(&le32(0)); // instance_shape
    body.extend_from_slice(&le32(0)); // cp_shape_description_ptr
    body.extend_from_slice(&le32(0)); // outer_class_name
    body.extend_from_slice(&le32(0)); // member_access_flags
    body.extend_from_slice(&le32(0)); // inner_class_count
    body.extend_from_slice(&le32(0)); // inner_classes_ptr
    body.extend_from_slice(&52u16.to_le_bytes()); // major
    body.extend_from_slice(&0u16.to_le_bytes()); // minor
    body.extend_from_slice(&le32(0)); // optional_flags
    body.extend_from_slice(&le32(0)); // optional_info_ptr

    // Constant pool starts immediately after the fixed header: one Int
    // entry, value 0xDEADBEEF.
    body.extend_from_slice(&le32(0xDEAD_BEEF)); // value
    body.extend_from_slice(&le32(0)); // value_type == INT

    // Method blob: modifier=0 (bytecoded, no extra tables), max_stack=1,
    // bytecode_size_low=1 (*4 = 4 bytes), arg_count=0, temp_count=1,
    // bytecode = [return0, 0, 0, 0].
    let methods_pos = body.len();
    let mut method = Vec::new();
    let name_slot = method.len();
    method.extend_from_slice(&[0; 4]);
    let sig_slot = method.len();
    method.extend_from_slice(&[0; 4]);
    method.extend_from_slice(&le32(0)); // modifier
    method.extend_from_slice(&1u16.to_le_bytes()); // max_stack
    method.extend_from_slice(&1u16.to_le_bytes()); // bytecode_size_low
    method.push(0); // bytecode_size_high
    method.push(0); // arg_count
    method.extend_from_slice(&1u16.to_le_bytes()); // temp_count
    method.extend_from_slice(&[0xAC, 0x00, 0x00, 0x00]); // bytecode

    let name_pos_base = methods_pos + name_slot;
    let sig_pos_base = methods_pos + sig_slot;

    body.extend_from_slice(&method);

    // Trailing string area: class name, superclass name, method name,
    // method signature.
    let class_name_pos = body.len();
    let mut strings = Vec::new();
    push_string(&mut strings, "P/Q");
    let superclass_pos = class_name_pos + strings.len();
    push_string(&mut strings, "java/lang/Object");
    let method_name_pos = class_name_pos + strings.len();
    push_string(&mut strings, "run");
    let method_sig_pos = class_name_pos + strings.len();
    push_string(&mut strings, "()V");
    body.extend_from_slice(&strings);

    body[class_name_slot..class_name_slot + 4]
        .copy_from_slice(&rel(class_name_slot, class_name_pos).to_le_bytes());
    body[superclass_slot..superclass_slot + 4]
        .copy_from_slice(&rel(superclass_slot, superclass_pos).to_le_bytes());
    body[methods_ptr_slot..methods_ptr_slot + 4]
        .copy_from_slice(&rel(methods_ptr_slot, methods_pos).to_le_bytes());

    let name_field_pos = name_pos_base;
    body[name_field_pos..name_field_pos + 4]
        .copy_from_slice(&rel(name_field_pos, method_name_pos).to_le_bytes());
    let sig_field_pos = sig_pos_base;
    body[sig_field_pos..sig_field_pos + 4]
        .copy_from_slice(&rel(sig_field_pos, method_sig_pos).to_le_bytes());

    // Outer image.
    let mut image = Vec::new();
    image.extend_from_slice(&le32(0x1234_5678));
    image.extend_from_slice(&le32(0));
    image.extend_from_slice(&le32(0));
    image.extend_from_slice(&le32(1)); // class_count
    image.extend_from_slice(&le32(0)); // jxe_ptr
    let toc_ptr_slot = image.len();
    image.extend_from_slice(&[0; 4]);
    image.extend_from_slice(&le32(0)); // first_class_ptr
    image.extend_from_slice(&le32(0)); // aot_ptr
    image.extend_from_slice(&[0u8; 16]); // symbol_file_id

    let toc_pos = image.len();
    image[toc_ptr_slot..toc_ptr_slot + 4]
        .copy_from_slice(&rel(toc_ptr_slot, toc_pos).to_le_bytes());

    let name_ref_slot = image.len();
    image.extend_from_slice(&[0; 4]);
    let class_ptr_slot = image.len();
    image.extend_from_slice(&[0; 4]);

    let toc_name_pos = image.len();
    let mut toc_name = Vec::new();
    push_string(&mut toc_name, "P/Q");
    image.extend_from_slice(&toc_name);
    image[name_ref_slot..name_ref_slot + 4]
        .copy_from_slice(&rel(name_ref_slot, toc_name_pos).to_le_bytes());

    let class_body_pos = image.len();
    image.extend_from_slice(&body);
    image[class_ptr_slot..class_ptr_slot + 4]
        .copy_from_slice(&rel(class_ptr_slot, class_body_pos).to_le_bytes());

    image
}

#[test]
fn parses_and_translates_a_class_with_one_method_and_one_constant() {
    let bytes = build_image_with_one_method();
    let rom_image = RomImage::parse(&bytes).expect("image should parse");
    assert_eq!(rom_image.classes.len(), 1);

    let class = &rom_image.classes[0];
    assert_eq!(class.class_name, "P/Q");
    assert_eq!(class.methods.len(), 1);
    assert_eq!(class.methods[0].name, "run");
    assert_eq!(class.constant_pool.len(), 1);

    let class_file = translate_class(class).expect("translation should succeed");
    assert_eq!(&class_file[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);

    // The return0 instruction must have become a standard `return`
    // (0xB1) somewhere in the emitted bytes.
    assert!(class_file.windows(1).any(|w| w == [0xB1]));
}
