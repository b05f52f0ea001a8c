use crate::error::read::ReadError;
use crate::reader::ByteReader;

/// One entry of a method's catch table: `J9CatchException` in the original
/// J9 naming. start/end/handler are bytecode offsets, `catch_type` is a
/// source constant-pool index (0 means "catch everything").
#[derive(Clone, Debug)]
pub struct CatchException {
    pub start: u32,
    pub end: u32,
    pub handler: u32,
    pub catch_type: u32,
}

impl CatchException {
    fn parse(reader: &mut ByteReader) -> Result<CatchException, ReadError> {
        Ok(CatchException {
            start: reader.read_u32()?,
            end: reader.read_u32()?,
            handler: reader.read_u32()?,
            catch_type: reader.read_u32()?,
        })
    }
}

/// One entry of a method's throw table: just the thrown class's name.
#[derive(Clone, Debug)]
pub struct ThrowException {
    pub class_name: String,
}

impl ThrowException {
    fn parse(reader: &mut ByteReader) -> Result<ThrowException, ReadError> {
        Ok(ThrowException {
            class_name: reader.read_string_ref()?,
        })
    }
}

/// A field's body: name, descriptor, and raw modifier word. The optional
/// trailing words the modifier bits gate carry no information this
/// translator emits (attribute recovery is out of scope), so they're
/// read only to keep the cursor synchronized and discarded.
#[derive(Clone, Debug)]
pub struct RomField {
    pub name: String,
    pub signature: String,
    pub access_flags: u32,
}

impl RomField {
    fn parse(reader: &mut ByteReader) -> Result<RomField, ReadError> {
        let name = reader.read_string_ref()?;
        let signature = reader.read_string_ref()?;
        let access_flags = reader.read_u32()?;
        if access_flags & 0x400000 != 0 {
            reader.read_u32()?;
            if access_flags & 0x40000 != 0 {
                reader.read_u32()?;
            }
        }
        if access_flags & 0x40000000 != 0 {
            reader.read_u32()?;
        }
        Ok(RomField {
            name,
            signature,
            access_flags,
        })
    }
}

/// The two shapes a method record can take: native methods carry no
/// bytecode (their body lives outside the JVM and is opaque to us), while
/// ordinary methods carry bytecode plus the catch/throw tables.
#[derive(Clone, Debug)]
pub enum MethodBody {
    Native,
    Bytecoded {
        bytecode: Vec<u8>,
        catch_exceptions: Vec<CatchException>,
        throw_exceptions: Vec<ThrowException>,
    },
}

#[derive(Clone, Debug)]
pub struct RomMethod {
    pub name: String,
    pub signature: String,
    pub modifier: u32,
    pub max_stack: u16,
    pub arg_count: u8,
    pub temp_count: u16,
    pub body: MethodBody,
}

impl RomMethod {
    pub fn is_native(&self) -> bool {
        self.modifier & 0x100 != 0
    }

    pub fn bytecode(&self) -> &[u8] {
        match &self.body {
            MethodBody::Native => &[],
            MethodBody::Bytecoded { bytecode, .. } => bytecode,
        }
    }

    pub fn catch_exceptions(&self) -> &[CatchException] {
        match &self.body {
            MethodBody::Native => &[],
            MethodBody::Bytecoded {
                catch_exceptions, ..
            } => catch_exceptions,
        }
    }

    fn parse(reader: &mut ByteReader) -> Result<RomMethod, ReadError> {
        let name = reader.read_string_ref()?;
        let signature = reader.read_string_ref()?;
        let modifier = reader.read_u32()?;
        let use_bytecode_size_high = modifier & 0x0000_8000 != 0;
        let has_bytecode_extra = modifier & 0x0002_0000 != 0;
        let add_four = modifier & 0x0001_0000 != 0;
        let max_stack = reader.read_u16()?;

        if modifier & 0x100 != 0 {
            let _native_arg_count = reader.read_u8()?;
            let temp_count = reader.read_u8()? as u16;
            let _pad1 = reader.read_u8()?;
            let _secondary_arg_count = reader.read_u8()?;
            let _pad2 = reader.read_u8()?;
            let _pad3 = reader.read_u8()?;
            let arg_count = reader.read_u8()?;
            let _return_type = reader.read_u8()?;
            for _ in 0..arg_count {
                reader.read_u8()?;
            }
            let aligned = (reader.pos() + 3) & !3;
            reader.seek(aligned)?;
            if modifier & 0x0200_0000 != 0 {
                reader.read_u32()?;
            }
            if modifier & 0x0002_0000 != 0 {
                let a = reader.read_u16()? as usize;
                let b = reader.read_u16()? as usize;
                reader.read_bytes(a * 16 + 4 * b)?;
            }
            Ok(RomMethod {
                name,
                signature,
                modifier,
                max_stack,
                arg_count,
                temp_count,
                body: MethodBody::Native,
            })
        } else {
            let bytecode_size_low = reader.read_u16()? as u32;
            let bytecode_size_high = reader.read_u8()? as u32;
            let arg_count = reader.read_u8()?;
            let temp_count = reader.read_u16()?;
            let mut bytecode_size = bytecode_size_low;
            if use_bytecode_size_high {
                bytecode_size += bytecode_size_high << 16;
            }
            bytecode_size *= 4;
            if add_four {
                bytecode_size += 4;
            }
            let bytecode = reader.read_bytes(bytecode_size as usize)?.to_vec();
            let aligned = (reader.pos() + 3) & !3;
            reader.seek(aligned)?;

            let (catch_exceptions, throw_exceptions) = if has_bytecode_extra {
                let catch_count = reader.read_u16()?;
                let throw_count = reader.read_u16()?;
                let mut catches = Vec::with_capacity(catch_count as usize);
                for _ in 0..catch_count {
                    catches.push(CatchException::parse(reader)?);
                }
                let mut throws = Vec::with_capacity(throw_count as usize);
                for _ in 0..throw_count {
                    throws.push(ThrowException::parse(reader)?);
                }
                (catches, throws)
            } else {
                (Vec::new(), Vec::new())
            };

            Ok(RomMethod {
                name,
                signature,
                modifier,
                max_stack,
                arg_count,
                temp_count,
                body: MethodBody::Bytecoded {
                    bytecode,
                    catch_exceptions,
                    throw_exceptions,
                },
            })
        }
    }
}

/// A source constant-pool entry, one of five shapes: Int, String,
/// Class, Long, or Ref. `Long` also covers the "failed Ref" sentinel
/// case (see [`SourceConstant::parse`]): the original format has no
/// separate encoding for it, it falls out of a Ref lookup that ran off
/// the end of the pool and happens to leave behind exactly the 8 bytes
/// a 64-bit constant needs.
#[derive(Clone, Debug)]
pub enum SourceConstant {
    Int { raw: [u8; 4] },
    String { value: String },
    Class { value: String },
    Long { raw: [u8; 8] },
    Ref {
        class: String,
        name: String,
        descriptor: String,
    },
}

impl SourceConstant {
    /// `pool_base` is the position immediately following the class
    /// header, i.e. the start of entry index 0. Ref entries resolve
    /// their class pointer relative to it (`pool_base + 8*value`).
    fn parse(reader: &mut ByteReader, pool_base: i64) -> Result<SourceConstant, ReadError> {
        let entry_start = reader.pos() as i64;
        let value = reader.read_u32()?;
        let value_type = reader.read_u32()?;

        match value_type {
            1 | 2 => {
                let offset = value as i32 as i64;
                let ptr = entry_start + offset;
                let text = reader.with_cursor(ptr, |r| r.read_length_prefixed_string())?;
                if value_type == 1 {
                    Ok(SourceConstant::String { value: text })
                } else {
                    Ok(SourceConstant::Class { value: text })
                }
            }
            0 => Ok(SourceConstant::Int {
                raw: value.to_le_bytes(),
            }),
            _ => {
                let class_ptr = pool_base + 8 * value as i64;
                let parsed_ref = reader.with_cursor(class_ptr, |r| r.read_string_ref()).and_then(
                    |class| {
                        let nat_ptr = value_type as i64 + entry_start + 4;
                        reader.with_cursor(nat_ptr, |r| {
                            let name = r.read_string_ref()?;
                            let descriptor = r.read_string_ref()?;
                            Ok((class.clone(), name, descriptor))
                        })
                    },
                );
                match parsed_ref {
                    Ok((class, name, descriptor)) => Ok(SourceConstant::Ref {
                        class,
                        name,
                        descriptor,
                    }),
                    Err(_) => {
                        let mut raw = [0u8; 8];
                        raw[0..4].copy_from_slice(&value.to_le_bytes());
                        raw[4..8].copy_from_slice(&value_type.to_le_bytes());
                        Ok(SourceConstant::Long { raw })
                    }
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct RomClass {
    pub minor_version: u16,
    pub major_version: u16,
    pub class_name: String,
    pub superclass_name: String,
    pub access_flags: u32,
    pub interfaces: Vec<String>,
    pub methods: Vec<RomMethod>,
    pub fields: Vec<RomField>,
    pub constant_pool: Vec<SourceConstant>,
}

impl RomClass {
    /// Reads one table-of-contents record and the class body it points
    /// to. `reader` must be positioned at the start of the TOC record.
    fn parse(reader: &mut ByteReader) -> Result<RomClass, ReadError> {
        let _toc_name = reader.read_string_ref()?;
        let class_ptr = reader.read_relative_pointer()?;

        reader.with_cursor(class_ptr, |reader| {
            let _rom_size = reader.read_u32()?;
            let _single_scalar_static_count = reader.read_u32()?;
            let class_name = reader.read_string_ref()?;
            let superclass_name = reader.read_string_ref()?;
            let access_flags = reader.read_u32()?;

            let interface_count = reader.read_u32()?;
            let interfaces_ptr = reader.read_relative_pointer()?;
            let interfaces = reader.with_cursor(interfaces_ptr, |reader| {
                let mut interfaces = Vec::with_capacity(interface_count as usize);
                for _ in 0..interface_count {
                    interfaces.push(reader.read_string_ref()?);
                }
                Ok(interfaces)
            })?;

            let method_count = reader.read_u32()?;
            let methods_ptr = reader.read_relative_pointer()?;
            let methods = reader.with_cursor(methods_ptr, |reader| {
                let mut methods = Vec::with_capacity(method_count as usize);
                for _ in 0..method_count {
                    methods.push(RomMethod::parse(reader)?);
                }
                Ok(methods)
            })?;

            let field_count = reader.read_u32()?;
            let fields_ptr = reader.read_relative_pointer()?;
            let fields = reader.with_cursor(fields_ptr, |reader| {
                let mut fields = Vec::with_capacity(field_count as usize);
                for _ in 0..field_count {
                    fields.push(RomField::parse(reader)?);
                }
                Ok(fields)
            })?;

            let _object_static_count = reader.read_u32()?;
            let _double_scalar_static_count = reader.read_u32()?;
            let _ram_constant_pool_count = reader.read_u32()?;
            let rom_constant_pool_count = reader.read_u32()?;
            let _crc = reader.read_u32()?;
            let _instance_size = reader.read_u32()?;
            let _instance_shape = reader.read_u32()?;
            let _cp_shape_description_ptr = reader.read_relative_pointer()?;
            let _outer_class_name = reader.read_relative_pointer()?;
            let _member_access_flags = reader.read_u32()?;
            let _inner_class_count = reader.read_u32()?;
            let _inner_classes_ptr = reader.read_relative_pointer()?;
            let major_version = reader.read_u16()?;
            let minor_version = reader.read_u16()?;
            let _optional_flags = reader.read_u32()?;
            let _optional_info_ptr = reader.read_relative_pointer()?;

            let pool_base = reader.pos() as i64;
            let mut constant_pool = Vec::with_capacity(rom_constant_pool_count as usize);
            for _ in 0..rom_constant_pool_count {
                match SourceConstant::parse(reader, pool_base) {
                    Ok(constant) => constant_pool.push(constant),
                    // A few trailing entries are empirically ill-formed;
                    // drop just that entry and keep reading the rest.
                    Err(_) => {}
                }
            }

            Ok(RomClass {
                minor_version,
                major_version,
                class_name,
                superclass_name,
                access_flags,
                interfaces,
                methods,
                fields,
                constant_pool,
            })
        })
    }
}

/// The JXE image: a fixed 48-byte header followed by the table of
/// contents the header's `toc_ptr` points to.
#[derive(Clone, Debug)]
pub struct RomImage {
    pub signature: u32,
    pub flags_and_version: u32,
    pub rom_size: u32,
    pub symbol_file_id: [u8; 16],
    pub classes: Vec<RomClass>,
}

impl RomImage {
    pub fn parse(bytes: &[u8]) -> Result<RomImage, ReadError> {
        let mut reader = ByteReader::new(bytes);
        let signature = reader.read_u32()?;
        let flags_and_version = reader.read_u32()?;
        let rom_size = reader.read_u32()?;
        let class_count = reader.read_u32()?;
        let _jxe_ptr = reader.read_relative_pointer()?;
        let toc_ptr = reader.read_relative_pointer()?;
        let _first_class_ptr = reader.read_relative_pointer()?;
        let _aot_ptr = reader.read_relative_pointer()?;
        let mut symbol_file_id = [0u8; 16];
        symbol_file_id.copy_from_slice(reader.read_bytes(16)?);

        let classes = reader.with_cursor(toc_ptr, |reader| {
            let mut classes = Vec::with_capacity(class_count as usize);
            for _ in 0..class_count {
                classes.push(RomClass::parse(reader)?);
            }
            Ok(classes)
        })?;

        Ok(RomImage {
            signature,
            flags_and_version,
            rom_size,
            symbol_file_id,
            classes,
        })
    }
}
