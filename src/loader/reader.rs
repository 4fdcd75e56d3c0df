//! Little-endian cursor over an in-memory byte buffer.

use byteorder::{ByteOrder, LE};

/// A read-only cursor over a borrowed byte slice.
///
/// Reads advance the cursor; the buffer itself is never mutated through a
/// `Reader` (decryption mutates the owned archive buffer directly, before a
/// `Reader` is built over it).
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Wrap a byte slice, cursor starting at offset 0.
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    /// Wrap a byte slice, cursor starting at the given offset.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Reader { data, pos }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor to an absolute offset.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Advance the cursor by `n` bytes without reading.
    pub fn skip(&mut self, n: usize) {
        self.pos += n;
    }

    /// Total length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the cursor has reached the end of the buffer.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Bytes remaining after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Read a single byte and advance.
    pub fn read_u8(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    /// Read a little-endian `u16` and advance.
    pub fn read_u16(&mut self) -> Option<u16> {
        let bytes = self.data.get(self.pos..self.pos + 2)?;
        self.pos += 2;
        Some(LE::read_u16(bytes))
    }

    /// Read a little-endian `u32` and advance.
    pub fn read_u32(&mut self) -> Option<u32> {
        let bytes = self.data.get(self.pos..self.pos + 4)?;
        self.pos += 4;
        Some(LE::read_u32(bytes))
    }

    /// Read a little-endian `f64` and advance.
    pub fn read_f64(&mut self) -> Option<f64> {
        let bytes = self.data.get(self.pos..self.pos + 8)?;
        self.pos += 8;
        Some(LE::read_f64(bytes))
    }

    /// Read `n` raw bytes and advance, without copying.
    pub fn read_bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let bytes = self.data.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(bytes)
    }

    /// Peek a little-endian `u32` at an absolute offset without moving the
    /// cursor. Used by the version probe, which backtracks a lot.
    pub fn peek_u32_at(&self, pos: usize) -> Option<u32> {
        let bytes = self.data.get(pos..pos + 4)?;
        Some(LE::read_u32(bytes))
    }

    /// Borrow the full underlying buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_le_primitives_and_advances() {
        let buf = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_u16(), Some(1));
        assert_eq!(r.read_u32(), Some(2));
        assert_eq!(r.position(), 6);
        assert!(r.is_empty());
    }

    #[test]
    fn out_of_range_reads_return_none() {
        let buf = [0u8; 2];
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_u32(), None);
    }

    #[test]
    fn peek_does_not_move_cursor() {
        let buf = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE];
        let r = Reader::new(&buf);
        assert_eq!(r.peek_u32_at(1), Some(u32::from_le_bytes([0xBB, 0xCC, 0xDD, 0xEE])));
        assert_eq!(r.position(), 0);
    }
}
