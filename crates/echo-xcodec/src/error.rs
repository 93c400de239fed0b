// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error type shared by every layer of the codec.
//!
//! All failures are fatal for the current call: the engine never exposes a
//! half-built value as success and never retries internally.

use thiserror::Error;

use crate::meta::Encoding;

/// Result alias used throughout the crate.
pub type Result<T, E = CodecError> = std::result::Result<T, E>;

/// Errors produced while encoding or decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The frame header disagrees with this engine's mode.
    #[error("malformed frame: peer xlang={found}, local xlang={expected}")]
    FrameModeMismatch {
        /// Cross-language flag configured locally.
        expected: bool,
        /// Cross-language flag found in the header byte.
        found: bool,
    },
    /// The frame header has reserved bits set or the frame is empty.
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),
    /// Attempted to read beyond the end of the input.
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes requested by the read.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },
    /// Bytes were left over after the top-level value was decoded.
    #[error("{remaining} trailing bytes after frame")]
    TrailingBytes {
        /// Unconsumed byte count.
        remaining: usize,
    },
    /// A variable-length integer ran past its maximum width.
    #[error("varint overflow")]
    VarintOverflow,
    /// A length prefix cannot be represented or exceeds the input.
    #[error("length too large: {0}")]
    LengthTooLarge(u64),
    /// The ref flag byte is not one of the four protocol values.
    #[error("invalid ref flag: {0}")]
    InvalidRefFlag(i8),
    /// A back-reference named an id never introduced in this frame.
    #[error("unknown ref id: {0}")]
    UnknownRefId(u32),
    /// A back-reference named an ancestor that has not bound a value yet.
    #[error("ref id {0} is pending and has no bound value")]
    PendingRefUnbound(u32),
    /// A back-reference resolved to a value of a different runtime type.
    #[error("ref id {id} does not hold a `{expected}`")]
    RefTypeMismatch {
        /// Referenced slot.
        id: u32,
        /// Type the caller asked for.
        expected: &'static str,
    },
    /// A null flag was found where the call site declared no nullability.
    #[error("unexpected null for non-nullable `{0}`")]
    UnexpectedNull(&'static str),
    /// The pending-reference stack was unbalanced.
    #[error("reference stack corrupted: {0}")]
    RefStackCorrupted(&'static str),
    /// A compatible-mode metadata index was out of sequence.
    #[error("invalid type meta index {index}, next expected {next}")]
    InvalidMetaIndex {
        /// Index read from the stream.
        index: u32,
        /// Next unused index in the read cache.
        next: u32,
    },
    /// A MetaString back-reference was out of range.
    #[error("invalid meta string index {index}, cache holds {len}")]
    InvalidMetaStringIndex {
        /// Index read from the stream.
        index: u32,
        /// Number of cached strings.
        len: u32,
    },
    /// A TypeMeta body failed its integrity check or was structurally invalid.
    #[error("corrupt type meta: {0}")]
    CorruptTypeMeta(&'static str),
    /// A character cannot be represented by the requested MetaString encoding.
    #[error("character {ch:?} is not representable in {encoding:?}")]
    InvalidMetaStringChar {
        /// Offending character.
        ch: char,
        /// Encoding requested by the caller.
        encoding: Encoding,
    },
    /// A MetaString exceeded the maximum identifier length.
    #[error("meta string too long: {0} bytes")]
    MetaStringTooLong(usize),
    /// Unknown MetaString encoding tag.
    #[error("invalid meta string encoding tag {0}")]
    InvalidMetaStringEncoding(u8),
    /// Encoded string payload could not be decoded.
    #[error("invalid string payload: {0}")]
    InvalidString(&'static str),
    /// The wire type id does not match the type the caller asked for.
    #[error("type mismatch: expected wire type {expected}, found {found}")]
    TypeMismatch {
        /// Wire id the local serializer expects.
        expected: u32,
        /// Wire id read from the stream.
        found: u32,
    },
    /// A value of the wrong runtime type reached a serializer.
    #[error("value is not a `{0}`")]
    ValueTypeMismatch(&'static str),
    /// The type was never registered with the resolver.
    #[error("type `{0}` is not registered")]
    UnregisteredType(&'static str),
    /// No registration matches a wire type id.
    #[error("no type registered for wire id {0}")]
    UnknownTypeId(u32),
    /// No registration matches a namespace/name pair.
    #[error("no type registered as {namespace}.{name}")]
    UnknownTypeName {
        /// Namespace read from the stream.
        namespace: String,
        /// Type name read from the stream.
        name: String,
    },
    /// A registration collides with an existing id, name or Rust type.
    #[error("duplicate registration: {0}")]
    DuplicateRegistration(String),
    /// Nesting went deeper than the configured bound.
    #[error("max nesting depth {max} exceeded")]
    DepthExceeded {
        /// Configured bound.
        max: u32,
    },
    /// Schema-consistent struct hash did not match the local layout.
    #[error("struct version mismatch for `{type_name}`: local {expected:#x}, remote {found:#x}")]
    StructVersionMismatch {
        /// Rust type being decoded.
        type_name: &'static str,
        /// Local struct hash.
        expected: i32,
        /// Hash read from the stream.
        found: i32,
    },
    /// An enum ordinal outside the declared variants.
    #[error("invalid ordinal {ordinal} for enum `{type_name}`")]
    InvalidEnumOrdinal {
        /// Enum being decoded.
        type_name: &'static str,
        /// Ordinal read from the stream.
        ordinal: u32,
    },
    /// A union case index outside the declared cases.
    #[error("invalid case {index} for union `{type_name}`")]
    InvalidUnionCase {
        /// Union being decoded.
        type_name: &'static str,
        /// Case index read from the stream.
        index: u32,
    },
    /// A wire type that cannot be skipped without a local schema.
    #[error("cannot skip value of wire type {0}")]
    UnsupportedSkip(u32),
    /// Decoded data was structurally valid but semantically out of range.
    #[error("invalid data: {0}")]
    InvalidData(&'static str),
    /// Invalid engine configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}
