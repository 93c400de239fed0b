// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! String payloads.
//!
//! A payload is a varuint64 header `(byte_len << 2) | tag` followed by the
//! bytes. Latin-1 is used when every character fits in one byte; otherwise a
//! sample of the leading characters decides between UTF-8 (mostly ASCII) and
//! UTF-16LE.

use std::rc::Rc;

use crate::buffer::{Reader, Writer};
use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, Result};
use crate::resolver::RefSlot;
use crate::serializer::{Serializer, TypeKind};
use crate::types::type_id;

/// Characters inspected when choosing between UTF-8 and UTF-16.
pub const SAMPLE_CHARS: usize = 64;

/// Payload encoding of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StringEncoding {
    /// UTF-8 bytes.
    Utf8 = 0,
    /// One byte per character, code points up to 255.
    Latin1 = 1,
    /// UTF-16 code units, little-endian.
    Utf16 = 2,
}

/// Encoding a writer picks for `s`.
pub fn choose_encoding(s: &str) -> StringEncoding {
    if s.chars().all(|c| u32::from(c) <= 0xff) {
        return StringEncoding::Latin1;
    }
    let mut sampled = 0usize;
    let mut ascii = 0usize;
    for c in s.chars().take(SAMPLE_CHARS) {
        sampled += 1;
        if c.is_ascii() {
            ascii += 1;
        }
    }
    if ascii * 2 >= sampled {
        StringEncoding::Utf8
    } else {
        StringEncoding::Utf16
    }
}

/// Write a string payload.
pub fn write_str(w: &mut Writer, s: &str) -> Result<()> {
    let encoding = choose_encoding(s);
    let bytes: Vec<u8> = match encoding {
        StringEncoding::Latin1 => s.chars().map(|c| u32::from(c) as u8).collect(),
        StringEncoding::Utf8 => {
            write_header(w, s.len(), encoding)?;
            w.write_bytes(s.as_bytes());
            return Ok(());
        }
        StringEncoding::Utf16 => s.encode_utf16().flat_map(u16::to_le_bytes).collect(),
    };
    write_header(w, bytes.len(), encoding)?;
    w.write_bytes(&bytes);
    Ok(())
}

fn write_header(w: &mut Writer, len: usize, encoding: StringEncoding) -> Result<()> {
    let len = u64::try_from(len).map_err(|_| CodecError::LengthTooLarge(u64::MAX))?;
    if len > u64::MAX >> 2 {
        return Err(CodecError::LengthTooLarge(len));
    }
    w.write_varuint64((len << 2) | encoding as u64);
    Ok(())
}

/// Read a string payload.
pub fn read_string(r: &mut Reader<'_>) -> Result<String> {
    let header = r.read_varuint64()?;
    let len = usize::try_from(header >> 2).map_err(|_| CodecError::LengthTooLarge(header >> 2))?;
    let tag = header & 0b11;
    let bytes = r.read_bytes(len)?;
    match tag {
        0 => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidString("invalid utf-8")),
        1 => Ok(bytes.iter().copied().map(char::from).collect()),
        2 => {
            if len % 2 != 0 {
                return Err(CodecError::InvalidString("odd utf-16 byte length"));
            }
            let units = bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .collect::<std::result::Result<String, _>>()
                .map_err(|_| CodecError::InvalidString("unpaired utf-16 surrogate"))
        }
        _ => Err(CodecError::InvalidString("unknown encoding tag")),
    }
}

impl Serializer for String {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::STRING)
    }

    fn default_value() -> Self {
        Self::new()
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        write_str(ctx.writer(), self)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        read_string(ctx.reader())
    }
}

/// Shared immutable text. Equal strings decoded in one frame may come back as
/// one allocation.
impl Serializer for Rc<str> {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::STRING)
    }

    fn is_canonicalizable_type() -> bool {
        true
    }

    fn default_value() -> Self {
        Rc::from("")
    }

    fn to_ref_slot(&self) -> Option<RefSlot> {
        Some(RefSlot::new(Self::clone(self)))
    }

    fn from_ref_slot(slot: &RefSlot) -> Option<Self> {
        slot.downcast_ref::<Self>().cloned()
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        write_str(ctx.writer(), self)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(Rc::from(read_string(ctx.reader())?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn payload(s: &str) -> Vec<u8> {
        let mut w = Writer::default();
        write_str(&mut w, s).unwrap();
        w.into_vec()
    }

    // ── 1. Encoding choice ────────────────────────────────────────────

    #[test]
    fn latin1_needs_every_char_to_fit() {
        assert_eq!(choose_encoding(""), StringEncoding::Latin1);
        assert_eq!(choose_encoding("café"), StringEncoding::Latin1);
        // the sample alone would fit, the tail does not
        let mixed = format!("{}€", "a".repeat(100));
        assert_eq!(choose_encoding(&mixed), StringEncoding::Utf8);
        assert_eq!(choose_encoding("日本語のテキスト"), StringEncoding::Utf16);
        assert_eq!(choose_encoding("ab日本"), StringEncoding::Utf8);
    }

    #[test]
    fn header_packs_length_and_tag() {
        assert_eq!(payload("hi"), vec![(2 << 2) | 1, b'h', b'i']);
        assert_eq!(payload("é"), vec![(1 << 2) | 1, 0xe9]);
        let utf16 = payload("日本");
        assert_eq!(utf16[0], (4 << 2) | 2);
        assert_eq!(utf16.len(), 5);
    }

    // ── 2. Rejection ──────────────────────────────────────────────────

    #[test]
    fn corrupt_payloads_are_rejected() {
        let bad_utf8 = [(2 << 2), 0xc3, 0x28];
        assert!(matches!(
            read_string(&mut Reader::new(&bad_utf8)),
            Err(CodecError::InvalidString(_))
        ));
        let odd_utf16 = [(3 << 2) | 2, 0, 0, 0];
        assert!(matches!(
            read_string(&mut Reader::new(&odd_utf16)),
            Err(CodecError::InvalidString(_))
        ));
        let lone_surrogate = [(2 << 2) | 2, 0x00, 0xd8];
        assert!(matches!(
            read_string(&mut Reader::new(&lone_surrogate)),
            Err(CodecError::InvalidString(_))
        ));
        let bad_tag = [3u8];
        assert!(read_string(&mut Reader::new(&bad_tag)).is_err());
        let short = [(9 << 2), b'a'];
        assert!(matches!(
            read_string(&mut Reader::new(&short)),
            Err(CodecError::Truncated { .. })
        ));
    }

    proptest! {
        #[test]
        fn any_string_round_trips(s in any::<String>()) {
            let bytes = payload(&s);
            let mut r = Reader::new(&bytes);
            prop_assert_eq!(read_string(&mut r).unwrap(), s);
            prop_assert_eq!(r.remaining(), 0);
        }
    }
}
