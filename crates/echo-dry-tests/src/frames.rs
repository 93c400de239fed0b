// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hand-built frames for decoder tests.

use echo_xcodec::buffer::Writer;
use echo_xcodec::types::{frame, RefFlag};

/// Builder for raw frame bytes, for feeding the decoder inputs no encoder
/// would produce.
///
/// # Example
///
/// ```
/// use echo_dry_tests::FrameBuilder;
///
/// let bytes = FrameBuilder::xlang().varuint(3).u8(0x0c).build();
/// assert_eq!(bytes, vec![0x02, 3, 0x0c]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    writer: Writer,
}

impl FrameBuilder {
    /// Start a cross-language frame.
    pub fn xlang() -> Self {
        Self::with_header(frame::XLANG)
    }

    /// Start a frame with an arbitrary header byte.
    pub fn with_header(header: u8) -> Self {
        let mut writer = Writer::default();
        writer.write_u8(header);
        Self { writer }
    }

    /// Append a raw byte.
    pub fn u8(mut self, value: u8) -> Self {
        self.writer.write_u8(value);
        self
    }

    /// Append a ref flag.
    pub fn flag(mut self, flag: RefFlag) -> Self {
        self.writer.write_i8(flag as i8);
        self
    }

    /// Append an unsigned LEB128 varint.
    pub fn varuint(mut self, value: u32) -> Self {
        self.writer.write_varuint32(value);
        self
    }

    /// Append a little-endian i32.
    pub fn i32(mut self, value: i32) -> Self {
        self.writer.write_i32(value);
        self
    }

    /// Append raw bytes.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.writer.write_bytes(bytes);
        self
    }

    /// Finish.
    pub fn build(self) -> Vec<u8> {
        self.writer.into_vec()
    }
}
