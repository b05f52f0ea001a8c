use byteorder::{ByteOrder, BE, LE};

use crate::error::read::{ReadCause, ReadError};

/// [Byte-stream reader](crate::reader) over a borrowed, little-endian
/// JXE image buffer.
///
/// Random-access cursor: every typed read advances `pos` by the size of
/// the value read. Relative pointers and string refs are resolved through
/// [`ByteReader::with_cursor`], which saves/restores `pos` across the
/// callback so sibling tables can each start from the position they left
/// off at.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> ByteReader<'a> {
        ByteReader { bytes, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn seek(&mut self, pos: usize) -> Result<(), ReadError> {
        if pos > self.bytes.len() {
            return Err(ReadError::new(
                ReadCause::OutOfRange {
                    pos,
                    len: self.bytes.len(),
                },
                "seek target past end of buffer",
            ));
        }
        self.pos = pos;
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        if self.pos + n > self.bytes.len() {
            return Err(ReadError::new(
                ReadCause::OutOfRange {
                    pos: self.pos + n,
                    len: self.bytes.len(),
                },
                "read past end of buffer",
            ));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, ReadError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        Ok(LE::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16, ReadError> {
        Ok(LE::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        Ok(LE::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        Ok(LE::read_i32(self.take(4)?))
    }

    /// Reads a u16 length prefix then that many UTF-8 bytes.
    pub fn read_length_prefixed_string(&mut self) -> Result<String, ReadError> {
        let length = self.read_u16()? as usize;
        let bytes = self.take(length)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ReadError::new(ReadCause::Utf8, "string bytes were not valid utf-8"))
    }

    /// Reads a signed 32-bit offset and resolves it relative to the
    /// position the offset itself was read from (self-relative pointer).
    pub fn read_relative_pointer(&mut self) -> Result<i64, ReadError> {
        let base = self.pos as i64;
        let offset = self.read_i32()? as i64;
        Ok(base + offset)
    }

    /// Reads a relative pointer, follows it under a scoped cursor, and
    /// reads a length-prefixed string from the target position.
    pub fn read_string_ref(&mut self) -> Result<String, ReadError> {
        let ptr = self.read_relative_pointer()?;
        self.with_cursor(ptr, |r| r.read_length_prefixed_string())
    }

    /// Saves the current position, seeks to `target`, runs `f`, then
    /// restores the saved position regardless of whether `f` succeeded.
    /// The restore happens via the `ScopedCursor` guard's `Drop`, so an
    /// early `?` inside `f` still leaves the reader where it was.
    pub fn with_cursor<T>(
        &mut self,
        target: i64,
        f: impl FnOnce(&mut ByteReader<'a>) -> Result<T, ReadError>,
    ) -> Result<T, ReadError> {
        if target < 0 || target as usize > self.bytes.len() {
            return Err(ReadError::new(
                ReadCause::ScopedCursorOutOfRange {
                    target,
                    len: self.bytes.len(),
                },
                "scoped cursor target out of bounds",
            ));
        }
        let _guard = ScopedCursor::enter(self, target as usize);
        f(self)
    }
}

/// RAII guard restoring the reader's cursor position on drop. Nested
/// scoped cursors form a stack: each guard remembers only the position
/// its own `enter` observed, so unwinding through several nested scopes
/// restores each one in turn.
struct ScopedCursor<'a, 'b> {
    reader: &'b mut ByteReader<'a>,
    saved_pos: usize,
}

impl<'a, 'b> ScopedCursor<'a, 'b> {
    fn enter(reader: &'b mut ByteReader<'a>, target: usize) -> ScopedCursor<'a, 'b> {
        let saved_pos = reader.pos;
        reader.pos = target;
        ScopedCursor { reader, saved_pos }
    }
}

impl Drop for ScopedCursor<'_, '_> {
    fn drop(&mut self) {
        self.reader.pos = self.saved_pos;
    }
}

/// [Class-file writer](crate::classfile): big-endian, buffered to memory.
pub struct ClassWriter {
    buf: Vec<u8>,
}

impl ClassWriter {
    pub fn new() -> ClassWriter {
        ClassWriter { buf: Vec::new() }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut tmp = [0u8; 2];
        BE::write_u16(&mut tmp, value);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn write_i16(&mut self, value: i16) {
        let mut tmp = [0u8; 2];
        BE::write_i16(&mut tmp, value);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut tmp = [0u8; 4];
        BE::write_u32(&mut tmp, value);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut tmp = [0u8; 4];
        BE::write_i32(&mut tmp, value);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn write_raw_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for ClassWriter {
    fn default() -> Self {
        ClassWriter::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn relative_pointer_resolves_against_read_position() {
        // offset +4 read starting at position 0 should resolve to 4
        let bytes = [0x04, 0x00, 0x00, 0x00];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_relative_pointer().unwrap(), 4);
    }

    #[test]
    fn scoped_cursor_restores_position_on_success_and_failure() {
        let bytes = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut reader = ByteReader::new(&bytes);
        reader.seek(2).unwrap();
        let ok = reader.with_cursor(6, |r| r.read_u8());
        assert_eq!(ok.unwrap(), 7);
        assert_eq!(reader.pos(), 2);

        let err = reader.with_cursor(6, |r| {
            r.read_u8()?;
            r.read_bytes(100)
        });
        assert!(err.is_err());
        assert_eq!(reader.pos(), 2);
    }

    #[test]
    fn nested_scoped_cursors_restore_in_order() {
        let bytes = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut reader = ByteReader::new(&bytes);
        reader.seek(1).unwrap();
        reader
            .with_cursor(4, |r| {
                assert_eq!(r.pos(), 4);
                r.with_cursor(7, |r2| {
                    assert_eq!(r2.pos(), 7);
                    Ok(())
                })
            })
            .unwrap();
        assert_eq!(reader.pos(), 1);
    }

    #[test]
    fn length_prefixed_string_reads_utf8() {
        let mut bytes = vec![0x00, 0x03];
        bytes.extend_from_slice(b"abc");
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_length_prefixed_string().unwrap(), "abc");
    }

    #[test]
    fn writer_is_big_endian() {
        let mut w = ClassWriter::new();
        w.write_u16(0xCAFE);
        w.write_u32(0xBABE_0001);
        assert_eq!(w.finish(), vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x01]);
    }
}
