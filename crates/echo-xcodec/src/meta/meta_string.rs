// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compact bit-packed encoding for short identifiers.
//!
//! Namespaces, type names and field names are mostly lowercase ASCII, so they
//! pack into 5 or 6 bits per character instead of 8. The first bit of the
//! encoded buffer is a flag telling the decoder to drop a trailing group that
//! only exists as zero padding.

use crate::error::{CodecError, Result};

/// Identifiers longer than this are rejected.
pub const MAX_META_STRING_LEN: usize = 32_766;

/// Escape marker used by [`Encoding::AllToLowerSpecial`] before an uppercase letter.
const UPPER_ESCAPE: char = '|';

/// Bit-packing strategy for a [`MetaString`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Encoding {
    /// Raw UTF-8 bytes.
    Utf8 = 0,
    /// 5 bits per char: `a-z . _ $ |`.
    LowerSpecial = 1,
    /// 6 bits per char: `a-z A-Z 0-9` plus two special characters.
    LowerUpperDigitSpecial = 2,
    /// Lower-case the leading capital, then pack as [`Encoding::LowerSpecial`].
    FirstToLowerSpecial = 3,
    /// Escape every capital as `|` + lowercase, then pack as [`Encoding::LowerSpecial`].
    AllToLowerSpecial = 4,
}

impl Encoding {
    /// Wire tag.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Parse a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Self::Utf8,
            1 => Self::LowerSpecial,
            2 => Self::LowerUpperDigitSpecial,
            3 => Self::FirstToLowerSpecial,
            4 => Self::AllToLowerSpecial,
            other => return Err(CodecError::InvalidMetaStringEncoding(other)),
        })
    }

    const fn bits_per_char(self) -> usize {
        match self {
            Self::Utf8 => 8,
            Self::LowerUpperDigitSpecial => 6,
            Self::LowerSpecial | Self::FirstToLowerSpecial | Self::AllToLowerSpecial => 5,
        }
    }
}

/// An identifier together with its encoded form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaString {
    original: String,
    encoding: Encoding,
    special_char1: char,
    special_char2: char,
    bytes: Vec<u8>,
}

impl MetaString {
    /// Source string.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Encoding chosen for this string.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Special characters the string was encoded with.
    pub fn special_chars(&self) -> (char, char) {
        (self.special_char1, self.special_char2)
    }

    /// Whether the decoder must drop the final packed group.
    pub fn strip_last_char(&self) -> bool {
        self.encoding != Encoding::Utf8 && self.bytes.first().is_some_and(|b| b & 0x80 != 0)
    }
}

/// Encoder parameterised by the two special characters of the 6-bit alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaStringEncoder {
    special_char1: char,
    special_char2: char,
}

/// Encoder for namespaces (`com.example_pkg`).
pub const NAMESPACE_ENCODER: MetaStringEncoder = MetaStringEncoder::new('.', '_');
/// Encoder for type names (`Outer$Inner`).
pub const TYPE_NAME_ENCODER: MetaStringEncoder = MetaStringEncoder::new('$', '_');
/// Encoder for field names.
pub const FIELD_NAME_ENCODER: MetaStringEncoder = MetaStringEncoder::new('$', '_');

/// Decoder for namespaces.
pub const NAMESPACE_DECODER: MetaStringDecoder = MetaStringDecoder::new('.', '_');
/// Decoder for type names.
pub const TYPE_NAME_DECODER: MetaStringDecoder = MetaStringDecoder::new('$', '_');
/// Decoder for field names.
pub const FIELD_NAME_DECODER: MetaStringDecoder = MetaStringDecoder::new('$', '_');

#[derive(Debug, Default)]
struct Stats {
    fits_lower_special: bool,
    fits_luds: bool,
    digits: usize,
    uppers: usize,
    // every non-letter is also in the 5-bit alphabet
    others_lower_special: bool,
}

impl MetaStringEncoder {
    /// Create an encoder with the given 6-bit alphabet specials.
    pub const fn new(special_char1: char, special_char2: char) -> Self {
        Self {
            special_char1,
            special_char2,
        }
    }

    /// Encode `input` with the automatically selected encoding.
    pub fn encode(&self, input: &str) -> Result<MetaString> {
        self.encode_with_encodings(input, &[])
    }

    /// Encode `input`, choosing automatically among `allowed` (all when empty).
    pub fn encode_with_encodings(&self, input: &str, allowed: &[Encoding]) -> Result<MetaString> {
        check_len(input)?;
        if input.is_empty() {
            return Ok(self.utf8(input));
        }
        let encoding = self.compute_encoding(input, allowed);
        self.encode_with(input, encoding)
    }

    /// Encode `input` with an explicit encoding.
    ///
    /// Fails with [`CodecError::InvalidMetaStringChar`] when a character is
    /// outside the encoding's alphabet.
    pub fn encode_with(&self, input: &str, encoding: Encoding) -> Result<MetaString> {
        check_len(input)?;
        if input.is_empty() || encoding == Encoding::Utf8 {
            return Ok(self.utf8(input));
        }
        let codes = match encoding {
            Encoding::Utf8 => Vec::new(),
            Encoding::LowerSpecial => input
                .chars()
                .map(|c| lower_special_code(c, encoding))
                .collect::<Result<Vec<_>>>()?,
            Encoding::LowerUpperDigitSpecial => input
                .chars()
                .map(|c| self.luds_code(c))
                .collect::<Result<Vec<_>>>()?,
            Encoding::FirstToLowerSpecial => {
                let mut chars = input.chars();
                let mut codes = Vec::with_capacity(input.len());
                if let Some(first) = chars.next() {
                    if !first.is_ascii_uppercase() {
                        return Err(CodecError::InvalidMetaStringChar { ch: first, encoding });
                    }
                    codes.push(lower_special_code(first.to_ascii_lowercase(), encoding)?);
                }
                for c in chars {
                    codes.push(lower_special_code(c, encoding)?);
                }
                codes
            }
            Encoding::AllToLowerSpecial => {
                let mut codes = Vec::with_capacity(input.len() * 2);
                for c in input.chars() {
                    if c == UPPER_ESCAPE {
                        return Err(CodecError::InvalidMetaStringChar { ch: c, encoding });
                    }
                    if c.is_ascii_uppercase() {
                        codes.push(lower_special_code(UPPER_ESCAPE, encoding)?);
                        codes.push(lower_special_code(c.to_ascii_lowercase(), encoding)?);
                    } else {
                        codes.push(lower_special_code(c, encoding)?);
                    }
                }
                codes
            }
        };
        Ok(MetaString {
            original: input.to_owned(),
            encoding,
            special_char1: self.special_char1,
            special_char2: self.special_char2,
            bytes: pack(&codes, encoding.bits_per_char()),
        })
    }

    /// Pick the cheapest encoding able to represent `input`.
    pub fn compute_encoding(&self, input: &str, allowed: &[Encoding]) -> Encoding {
        let ok = |e: Encoding| allowed.is_empty() || allowed.contains(&e);
        if input.is_empty() || input.chars().any(|c| u32::from(c) > 0xff) {
            return Encoding::Utf8;
        }
        let stats = self.stats(input);
        if stats.fits_lower_special && ok(Encoding::LowerSpecial) {
            return Encoding::LowerSpecial;
        }
        if stats.fits_luds {
            if stats.digits > 0 && ok(Encoding::LowerUpperDigitSpecial) {
                return Encoding::LowerUpperDigitSpecial;
            }
            if stats.digits == 0 && stats.others_lower_special {
                let first_upper = input.chars().next().is_some_and(|c| c.is_ascii_uppercase());
                if stats.uppers == 1 && first_upper && ok(Encoding::FirstToLowerSpecial) {
                    return Encoding::FirstToLowerSpecial;
                }
                let len = input.len();
                if (len + stats.uppers) * 5 < len * 6 && ok(Encoding::AllToLowerSpecial) {
                    return Encoding::AllToLowerSpecial;
                }
            }
            if ok(Encoding::LowerUpperDigitSpecial) {
                return Encoding::LowerUpperDigitSpecial;
            }
        }
        Encoding::Utf8
    }

    fn stats(&self, input: &str) -> Stats {
        let mut stats = Stats {
            fits_lower_special: true,
            fits_luds: true,
            others_lower_special: true,
            ..Stats::default()
        };
        for c in input.chars() {
            let letter = c.is_ascii_alphabetic();
            let digit = c.is_ascii_digit();
            let special = c == self.special_char1 || c == self.special_char2;
            if !(letter || digit || special) {
                stats.fits_luds = false;
            }
            let in_lower_special = lower_special_value(c).is_some();
            if !in_lower_special {
                stats.fits_lower_special = false;
                if !letter {
                    stats.others_lower_special = false;
                }
            }
            if c == UPPER_ESCAPE {
                // the escape marker cannot double as a literal once capitals are escaped
                stats.others_lower_special = false;
            }
            if digit {
                stats.digits += 1;
            }
            if c.is_ascii_uppercase() {
                stats.uppers += 1;
            }
        }
        stats
    }

    fn luds_code(&self, c: char) -> Result<u8> {
        let code = match c {
            'a'..='z' => c as u8 - b'a',
            'A'..='Z' => c as u8 - b'A' + 26,
            '0'..='9' => c as u8 - b'0' + 52,
            _ if c == self.special_char1 => 62,
            _ if c == self.special_char2 => 63,
            _ => {
                return Err(CodecError::InvalidMetaStringChar {
                    ch: c,
                    encoding: Encoding::LowerUpperDigitSpecial,
                })
            }
        };
        Ok(code)
    }

    fn utf8(&self, input: &str) -> MetaString {
        MetaString {
            original: input.to_owned(),
            encoding: Encoding::Utf8,
            special_char1: self.special_char1,
            special_char2: self.special_char2,
            bytes: input.as_bytes().to_vec(),
        }
    }
}

/// Decoder matching a [`MetaStringEncoder`] with the same specials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaStringDecoder {
    special_char1: char,
    special_char2: char,
}

impl MetaStringDecoder {
    /// Create a decoder with the given 6-bit alphabet specials.
    pub const fn new(special_char1: char, special_char2: char) -> Self {
        Self {
            special_char1,
            special_char2,
        }
    }

    /// Decode `bytes` produced with `encoding`.
    pub fn decode(&self, bytes: &[u8], encoding: Encoding) -> Result<MetaString> {
        let original = match encoding {
            Encoding::Utf8 => std::str::from_utf8(bytes)
                .map_err(|_| CodecError::InvalidString("meta string is not utf-8"))?
                .to_owned(),
            Encoding::LowerSpecial => unpack(bytes, 5, lower_special_char)?,
            Encoding::LowerUpperDigitSpecial => unpack(bytes, 6, |v| self.luds_char(v))?,
            Encoding::FirstToLowerSpecial => {
                let lowered = unpack(bytes, 5, lower_special_char)?;
                let mut chars = lowered.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_ascii_uppercase().to_string() + chars.as_str()
                })
            }
            Encoding::AllToLowerSpecial => {
                let escaped = unpack(bytes, 5, lower_special_char)?;
                let mut out = String::with_capacity(escaped.len());
                let mut chars = escaped.chars();
                while let Some(c) = chars.next() {
                    if c == UPPER_ESCAPE {
                        let next = chars
                            .next()
                            .ok_or(CodecError::InvalidString("dangling uppercase escape"))?;
                        out.push(next.to_ascii_uppercase());
                    } else {
                        out.push(c);
                    }
                }
                out
            }
        };
        Ok(MetaString {
            original,
            encoding,
            special_char1: self.special_char1,
            special_char2: self.special_char2,
            bytes: bytes.to_vec(),
        })
    }

    fn luds_char(&self, value: u8) -> Result<char> {
        Ok(match value {
            0..=25 => char::from(b'a' + value),
            26..=51 => char::from(b'A' + value - 26),
            52..=61 => char::from(b'0' + value - 52),
            62 => self.special_char1,
            63 => self.special_char2,
            _ => return Err(CodecError::InvalidData("meta string code out of range")),
        })
    }
}

fn check_len(input: &str) -> Result<()> {
    if input.len() > MAX_META_STRING_LEN {
        return Err(CodecError::MetaStringTooLong(input.len()));
    }
    Ok(())
}

fn lower_special_value(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a'),
        '.' => Some(26),
        '_' => Some(27),
        '$' => Some(28),
        '|' => Some(29),
        _ => None,
    }
}

fn lower_special_code(c: char, encoding: Encoding) -> Result<u8> {
    lower_special_value(c).ok_or(CodecError::InvalidMetaStringChar { ch: c, encoding })
}

fn lower_special_char(value: u8) -> Result<char> {
    Ok(match value {
        0..=25 => char::from(b'a' + value),
        26 => '.',
        27 => '_',
        28 => '$',
        29 => '|',
        _ => return Err(CodecError::InvalidData("meta string code out of range")),
    })
}

/// Pack `codes` MSB-first starting at bit 1; bit 0 is the strip flag.
fn pack(codes: &[u8], bits: usize) -> Vec<u8> {
    let total_bits = codes.len() * bits + 1;
    let byte_len = total_bits.div_ceil(8);
    let mut bytes = vec![0u8; byte_len];
    let mut bit = 1usize;
    for &code in codes {
        for i in (0..bits).rev() {
            if (code >> i) & 1 == 1 {
                bytes[bit / 8] |= 1 << (7 - bit % 8);
            }
            bit += 1;
        }
    }
    if byte_len * 8 >= total_bits + bits {
        bytes[0] |= 0x80;
    }
    bytes
}

fn unpack(bytes: &[u8], bits: usize, to_char: impl Fn(u8) -> Result<char>) -> Result<String> {
    let Some(&first) = bytes.first() else {
        return Ok(String::new());
    };
    let strip = first & 0x80 != 0;
    let total_bits = bytes.len() * 8;
    let mut out = String::with_capacity(total_bits / bits);
    let mut bit = 1usize;
    while bit + bits <= total_bits && !(strip && bit + 2 * bits > total_bits) {
        let mut value = 0u8;
        for _ in 0..bits {
            let set = (bytes[bit / 8] >> (7 - bit % 8)) & 1;
            value = (value << 1) | set;
            bit += 1;
        }
        out.push(to_char(value)?);
    }
    Ok(out)
}
