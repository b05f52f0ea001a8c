use std::collections::{HashMap, VecDeque};

use byteorder::{ByteOrder, BE};

use crate::image::SourceConstant;
use crate::reader::ClassWriter;

/// Standard `.class` constant-pool tags this translator ever emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TargetTag {
    Utf8 = 1,
    Integer = 3,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    FieldRef = 9,
    MethodRef = 10,
    InterfaceMethodRef = 11,
    NameAndType = 12,
}

impl TargetTag {
    /// Size in bytes of the payload that follows the tag byte, for the
    /// placeholder tags the rebuilder appends before it knows their
    /// contents. Utf8/Integer/Long/Double are always appended fully
    /// formed and never go through this path.
    fn placeholder_len(self) -> usize {
        match self {
            TargetTag::Class | TargetTag::String => 2,
            TargetTag::FieldRef
            | TargetTag::MethodRef
            | TargetTag::InterfaceMethodRef
            | TargetTag::NameAndType => 4,
            TargetTag::Utf8 | TargetTag::Integer | TargetTag::Long | TargetTag::Double => 0,
        }
    }
}

/// What a given source constant-pool index turned into: the 0-based
/// index of its primary target entry, and the tag it was built with.
/// [`Transform`] is the thing the bytecode transformer consults (and
/// sometimes rewrites, via [`TargetPool::retag`]) to translate operands.
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub new_index: u16,
    pub tag: TargetTag,
}

enum Slot {
    /// The dead slot following a Long/Double entry, occupying an index
    /// but carrying no bytes.
    Sentinel,
    Entry { tag: TargetTag, payload: Vec<u8> },
}

/// Work still owed after a pass-1 append: a new entry needs to be
/// created and its 1-based index backfilled into an earlier entry's
/// payload at a known byte offset.
enum Pending {
    Utf8 {
        referrer: u16,
        offset: usize,
        text: String,
    },
    Class {
        referrer: u16,
        offset: usize,
        name: String,
    },
    NameAndType {
        referrer: u16,
        offset: usize,
        name: String,
        descriptor: String,
    },
}

/// The rebuilt constant pool, grown breadth-first from the source pool
/// (see [`TargetPool::from_source`]) and later consulted by the
/// bytecode transformer through [`TargetPool::transform_of`].
pub struct TargetPool {
    entries: Vec<Slot>,
    transform: HashMap<u16, Transform>,
}

impl TargetPool {
    fn new() -> TargetPool {
        TargetPool {
            entries: Vec::new(),
            transform: HashMap::new(),
        }
    }

    fn push_entry(&mut self, tag: TargetTag, payload: Vec<u8>) -> u16 {
        let index = self.entries.len() as u16;
        self.entries.push(Slot::Entry { tag, payload });
        index
    }

    fn push_sentinel(&mut self) {
        self.entries.push(Slot::Sentinel);
    }

    fn backfill(&mut self, index: u16, offset: usize, value: u16) {
        if let Slot::Entry { payload, .. } = &mut self.entries[index as usize] {
            BE::write_u16(&mut payload[offset..offset + 2], value);
        }
    }

    fn push_placeholder(&mut self, tag: TargetTag) -> u16 {
        self.push_entry(tag, vec![0u8; tag.placeholder_len()])
    }

    /// Appends a plain Utf8 entry, returning its 1-based index, used for
    /// field/method names and descriptors, which reference Utf8 directly
    /// rather than through a Class wrapper.
    pub fn append_utf8(&mut self, s: &str) -> u16 {
        let index = self.push_entry(TargetTag::Utf8, encode_utf8(s));
        index + 1
    }

    /// Appends a Utf8 entry holding `name`, then a Class entry
    /// referencing it, returning the Class entry's 1-based index: the
    /// form the emitter wants for this-class/super-class/interface
    /// slots, which need no later backfill.
    pub fn append_utf8_class(&mut self, name: &str) -> u16 {
        let utf8_index = self.push_entry(TargetTag::Utf8, encode_utf8(name));
        let mut payload = vec![0u8; 2];
        BE::write_u16(&mut payload, utf8_index + 1);
        let class_index = self.push_entry(TargetTag::Class, payload);
        class_index + 1
    }

    pub fn retag(&mut self, index: u16, tag: TargetTag) {
        if let Slot::Entry { tag: slot_tag, .. } = &mut self.entries[index as usize] {
            *slot_tag = tag;
        }
    }

    pub fn transform_of(&self, source_index: u16) -> Option<Transform> {
        self.transform.get(&source_index).copied()
    }

    /// Rebuilds a target pool from a source constant pool using a
    /// two-pass scheme: pass one appends a placeholder entry per
    /// source constant and records its [`Transform`]; pass two drains a
    /// worklist of dependent entries (Utf8 names, Class/NameAndType
    /// entries a Ref needs), which can itself grow new worklist items
    /// as it drains (a Class item schedules its own Utf8, and a
    /// NameAndType item schedules two).
    pub fn from_source(source: &[SourceConstant]) -> TargetPool {
        let mut pool = TargetPool::new();
        let mut work: VecDeque<Pending> = VecDeque::new();

        for (source_index, constant) in source.iter().enumerate() {
            let source_index = source_index as u16;
            match constant {
                SourceConstant::Int { raw } => {
                    let index = pool.push_entry(TargetTag::Integer, raw.to_vec());
                    pool.transform.insert(
                        source_index,
                        Transform {
                            new_index: index,
                            tag: TargetTag::Integer,
                        },
                    );
                }
                SourceConstant::Long { raw } => {
                    let mut reversed = *raw;
                    reversed.reverse();
                    let index = pool.push_entry(TargetTag::Double, reversed.to_vec());
                    pool.push_sentinel();
                    pool.transform.insert(
                        source_index,
                        Transform {
                            new_index: index,
                            tag: TargetTag::Double,
                        },
                    );
                }
                SourceConstant::String { value } => {
                    let index = pool.push_placeholder(TargetTag::String);
                    work.push_back(Pending::Utf8 {
                        referrer: index,
                        offset: 0,
                        text: value.clone(),
                    });
                    pool.transform.insert(
                        source_index,
                        Transform {
                            new_index: index,
                            tag: TargetTag::String,
                        },
                    );
                }
                SourceConstant::Class { value } => {
                    let index = pool.push_placeholder(TargetTag::Class);
                    work.push_back(Pending::Utf8 {
                        referrer: index,
                        offset: 0,
                        text: value.clone(),
                    });
                    pool.transform.insert(
                        source_index,
                        Transform {
                            new_index: index,
                            tag: TargetTag::Class,
                        },
                    );
                }
                SourceConstant::Ref {
                    class,
                    name,
                    descriptor,
                } => {
                    let is_method = descriptor.contains('(');
                    let tag = if is_method {
                        TargetTag::MethodRef
                    } else {
                        TargetTag::FieldRef
                    };
                    let index = pool.push_placeholder(tag);
                    work.push_back(Pending::Class {
                        referrer: index,
                        offset: 0,
                        name: class.clone(),
                    });
                    work.push_back(Pending::NameAndType {
                        referrer: index,
                        offset: 2,
                        name: name.clone(),
                        descriptor: descriptor.clone(),
                    });
                    pool.transform.insert(
                        source_index,
                        Transform {
                            new_index: index,
                            tag,
                        },
                    );
                }
            }
        }

        while let Some(item) = work.pop_front() {
            match item {
                Pending::Utf8 {
                    referrer,
                    offset,
                    text,
                } => {
                    let index = pool.push_entry(TargetTag::Utf8, encode_utf8(&text));
                    pool.backfill(referrer, offset, index + 1);
                }
                Pending::Class {
                    referrer,
                    offset,
                    name,
                } => {
                    let index = pool.push_placeholder(TargetTag::Class);
                    work.push_back(Pending::Utf8 {
                        referrer: index,
                        offset: 0,
                        text: name,
                    });
                    pool.backfill(referrer, offset, index + 1);
                }
                Pending::NameAndType {
                    referrer,
                    offset,
                    name,
                    descriptor,
                } => {
                    let index = pool.push_placeholder(TargetTag::NameAndType);
                    work.push_back(Pending::Utf8 {
                        referrer: index,
                        offset: 0,
                        text: name,
                    });
                    work.push_back(Pending::Utf8 {
                        referrer: index,
                        offset: 2,
                        text: descriptor,
                    });
                    pool.backfill(referrer, offset, index + 1);
                }
            }
        }

        pool
    }

    /// Writes `constant_pool_count` (`len + 1`, per the class-file
    /// format's 1-based, gap-for-wide-entries convention) followed by
    /// each non-sentinel entry's tag and payload.
    pub fn write(&self, writer: &mut ClassWriter) {
        writer.write_u16(self.entries.len() as u16 + 1);
        for entry in &self.entries {
            if let Slot::Entry { tag, payload } = entry {
                writer.write_u8(*tag as u8);
                writer.write_raw_bytes(payload);
            }
        }
    }
}

fn encode_utf8(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(2 + bytes.len());
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn class_constant_produces_two_entries_and_transform() {
        let source = vec![SourceConstant::Class {
            value: "P/Q".to_string(),
        }];
        let pool = TargetPool::from_source(&source);
        let t = pool.transform_of(0).unwrap();
        assert_eq!(t.tag as u8, TargetTag::Class as u8);
        assert_eq!(pool.entries.len(), 2);
        match &pool.entries[t.new_index as usize] {
            Slot::Entry { tag, payload } => {
                assert_eq!(*tag as u8, TargetTag::Class as u8);
                assert_eq!(BE::read_u16(payload), 2); // 1-based Utf8 index
            }
            Slot::Sentinel => panic!("expected entry"),
        }
        match &pool.entries[0] {
            Slot::Entry { tag, payload } => {
                assert_eq!(*tag as u8, TargetTag::Utf8 as u8);
                assert_eq!(&payload[2..], b"P/Q");
            }
            Slot::Sentinel => panic!("expected entry"),
        }
    }

    #[test]
    fn ref_constant_shares_utf8_structure_for_method_and_field() {
        let source = vec![
            SourceConstant::Ref {
                class: "P/Q".to_string(),
                name: "m".to_string(),
                descriptor: "()V".to_string(),
            },
            SourceConstant::Ref {
                class: "P/Q".to_string(),
                name: "f".to_string(),
                descriptor: "I".to_string(),
            },
        ];
        let pool = TargetPool::from_source(&source);
        assert_eq!(pool.transform_of(0).unwrap().tag as u8, TargetTag::MethodRef as u8);
        assert_eq!(pool.transform_of(1).unwrap().tag as u8, TargetTag::FieldRef as u8);
    }

    #[test]
    fn long_constant_reverses_bytes_and_leaves_sentinel() {
        let raw = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let source = vec![SourceConstant::Long { raw }];
        let pool = TargetPool::from_source(&source);
        let t = pool.transform_of(0).unwrap();
        assert_eq!(t.tag as u8, TargetTag::Double as u8);
        assert_eq!(t.new_index, 0);
        match &pool.entries[0] {
            Slot::Entry { payload, .. } => {
                assert_eq!(payload, &vec![0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
            }
            Slot::Sentinel => panic!("expected entry"),
        }
        assert!(matches!(pool.entries[1], Slot::Sentinel));
    }

    #[test]
    fn write_counts_sentinel_slots_but_skips_their_bytes() {
        let raw = [0u8; 8];
        let source = vec![SourceConstant::Long { raw }];
        let pool = TargetPool::from_source(&source);
        let mut writer = ClassWriter::new();
        pool.write(&mut writer);
        let bytes = writer.finish();
        // count = 2 entries + 1 = 3
        assert_eq!(BE::read_u16(&bytes[0..2]), 3);
        // one tag byte (Double) + 8 payload bytes, nothing for the sentinel
        assert_eq!(bytes.len(), 2 + 1 + 8);
    }

    #[test]
    fn retag_changes_emitted_tag_byte() {
        let source = vec![SourceConstant::Ref {
            class: "P/Q".to_string(),
            name: "m".to_string(),
            descriptor: "()V".to_string(),
        }];
        let mut pool = TargetPool::from_source(&source);
        let t = pool.transform_of(0).unwrap();
        pool.retag(t.new_index, TargetTag::InterfaceMethodRef);
        let mut writer = ClassWriter::new();
        pool.write(&mut writer);
        let bytes = writer.finish();
        assert_eq!(bytes[2], TargetTag::InterfaceMethodRef as u8);
    }
}
