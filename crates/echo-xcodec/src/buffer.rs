// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Byte cursor primitives: little-endian scalars, LEB128 varints, raw runs.

use crate::error::{CodecError, Result};

/// Growable writer for little-endian scalars and varints.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

macro_rules! write_le {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Write a little-endian `", stringify!($ty), "`.")]
            pub fn $name(&mut self, value: $ty) {
                self.buf.extend_from_slice(&value.to_le_bytes());
            }
        )*
    };
}

impl Writer {
    /// Create a new writer with a pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Wrap an existing buffer, appending after its current contents.
    #[must_use]
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a signed byte.
    pub fn write_i8(&mut self, value: i8) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a bool as `0`/`1`.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    write_le! {
        write_u16: u16,
        write_i16: i16,
        write_u32: u32,
        write_i32: i32,
        write_u64: u64,
        write_i64: i64,
        write_f32: f32,
        write_f64: f64,
    }

    /// Write an unsigned LEB128 varint (at most 5 bytes).
    pub fn write_varuint32(&mut self, value: u32) {
        self.write_varuint64(u64::from(value));
    }

    /// Write an unsigned LEB128 varint (at most 10 bytes).
    pub fn write_varuint64(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    /// Write a zigzag-encoded signed varint.
    pub fn write_varint32(&mut self, value: i32) {
        self.write_varuint32(((value << 1) ^ (value >> 31)) as u32);
    }

    /// Write a zigzag-encoded signed varint.
    pub fn write_varint64(&mut self, value: i64) {
        self.write_varuint64(((value << 1) ^ (value >> 63)) as u64);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a varuint length prefix followed by the bytes.
    pub fn write_len_prefixed(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| CodecError::LengthTooLarge(bytes.len() as u64))?;
        self.write_varuint32(len);
        self.write_bytes(bytes);
        Ok(())
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// View the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Drop the contents, keeping the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Consume the writer and return the buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    /// Move the buffer out, leaving an empty writer behind.
    pub(crate) fn take_vec(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

/// Bounds-checked cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

macro_rules! read_le {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Read a little-endian `", stringify!($ty), "`.")]
            pub fn $name(&mut self) -> Result<$ty> {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(self.take(std::mem::size_of::<$ty>())?);
                Ok(<$ty>::from_le_bytes(raw))
            }
        )*
    };
}

impl<'a> Reader<'a> {
    /// Create a reader over the provided byte slice.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(CodecError::Truncated {
                needed: len,
                remaining,
            });
        }
        let end = self.offset + len;
        let out = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a signed byte.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes([self.read_u8()?]))
    }

    /// Read a bool; any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_le! {
        read_u16: u16,
        read_i16: i16,
        read_u32: u32,
        read_i32: i32,
        read_u64: u64,
        read_i64: i64,
        read_f32: f32,
        read_f64: f64,
    }

    /// Read an unsigned LEB128 varint of at most 5 bytes.
    pub fn read_varuint32(&mut self) -> Result<u32> {
        let mut result = 0u32;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            if shift == 28 && byte > 0x0f {
                return Err(CodecError::VarintOverflow);
            }
            result |= u32::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(CodecError::VarintOverflow)
    }

    /// Read an unsigned LEB128 varint of at most 10 bytes.
    pub fn read_varuint64(&mut self) -> Result<u64> {
        let mut result = 0u64;
        for shift in (0..70).step_by(7) {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 0x01 {
                return Err(CodecError::VarintOverflow);
            }
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(CodecError::VarintOverflow)
    }

    /// Read a zigzag-encoded signed varint.
    pub fn read_varint32(&mut self) -> Result<i32> {
        let raw = self.read_varuint32()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    /// Read a zigzag-encoded signed varint.
    pub fn read_varint64(&mut self) -> Result<i64> {
        let raw = self.read_varuint64()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    /// Read exactly `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Read a varuint length prefix followed by that many bytes.
    pub fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varuint32()? as usize;
        self.take(len)
    }

    /// Read a length that must not exceed the remaining input.
    ///
    /// Used for element counts so a corrupt prefix cannot force a huge
    /// allocation before the truncation is noticed.
    pub fn read_bounded_len(&mut self) -> Result<usize> {
        let len = self.read_varuint32()?;
        if len as usize > self.remaining() {
            return Err(CodecError::LengthTooLarge(u64::from(len)));
        }
        Ok(len as usize)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8> {
        self.bytes
            .get(self.offset)
            .copied()
            .ok_or(CodecError::Truncated {
                needed: 1,
                remaining: 0,
            })
    }

    /// Move the cursor back by `n` bytes (un-read).
    pub fn rewind(&mut self, n: usize) -> Result<()> {
        self.offset = self
            .offset
            .checked_sub(n)
            .ok_or(CodecError::MalformedFrame("rewind before start of input"))?;
        Ok(())
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Borrow an already consumed span of the input.
    pub fn slice(&self, start: usize, end: usize) -> &'a [u8] {
        let end = end.min(self.offset);
        self.bytes.get(start.min(end)..end).unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scalars_are_little_endian() {
        let mut w = Writer::default();
        w.write_u16(0x0102);
        w.write_i32(-2);
        w.write_f64(1.5);
        let bytes = w.into_vec();
        assert_eq!(&bytes[..2], &[0x02, 0x01]);
        assert_eq!(&bytes[2..6], &[0xfe, 0xff, 0xff, 0xff]);

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_u16().unwrap(), 0x0102);
        assert_eq!(r.read_i32().unwrap(), -2);
        assert!((r.read_f64().unwrap() - 1.5).abs() < f64::EPSILON);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn varuint_boundaries() {
        let cases: [(u32, &[u8]); 4] = [
            (0, &[0x00]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (u32::MAX, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
        ];
        for (value, expected) in cases {
            let mut w = Writer::default();
            w.write_varuint32(value);
            assert_eq!(w.as_slice(), expected, "value {value}");
            assert_eq!(Reader::new(expected).read_varuint32().unwrap(), value);
        }
    }

    #[test]
    fn varuint32_rejects_sixth_byte() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert_eq!(
            Reader::new(&bytes).read_varuint32(),
            Err(CodecError::VarintOverflow)
        );
    }

    #[test]
    fn reads_past_end_are_truncated() {
        let mut r = Reader::new(&[1, 2]);
        assert_eq!(
            r.read_u32(),
            Err(CodecError::Truncated {
                needed: 4,
                remaining: 2
            })
        );
        // a failed read consumes nothing
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn peek_and_rewind() {
        let mut r = Reader::new(&[9, 8, 7]);
        assert_eq!(r.peek_u8().unwrap(), 9);
        assert_eq!(r.read_u8().unwrap(), 9);
        assert_eq!(r.read_u8().unwrap(), 8);
        r.rewind(1).unwrap();
        assert_eq!(r.read_u8().unwrap(), 8);
        assert_eq!(r.slice(0, 2), &[9, 8]);
        assert!(r.rewind(5).is_err());
    }

    #[test]
    fn bounded_len_rejects_oversized_counts() {
        let mut w = Writer::default();
        w.write_varuint32(1_000_000);
        w.write_u8(0);
        let bytes = w.into_vec();
        assert!(matches!(
            Reader::new(&bytes).read_bounded_len(),
            Err(CodecError::LengthTooLarge(1_000_000))
        ));
    }

    proptest! {
        #[test]
        fn varints_round_trip(a in any::<u64>(), b in any::<i64>(), c in any::<i32>()) {
            let mut w = Writer::default();
            w.write_varuint64(a);
            w.write_varint64(b);
            w.write_varint32(c);
            let bytes = w.into_vec();
            let mut r = Reader::new(&bytes);
            prop_assert_eq!(r.read_varuint64().unwrap(), a);
            prop_assert_eq!(r.read_varint64().unwrap(), b);
            prop_assert_eq!(r.read_varint32().unwrap(), c);
            prop_assert_eq!(r.remaining(), 0);
        }
    }
}
