// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire-level constants: type ids, ref flags, header bits.

use crate::error::{CodecError, Result};

/// Numeric wire type ids shared by every peer.
///
/// Ids below [`type_id::BOUND`] are internal kinds. User types registered by
/// number travel as `(user_id << 8) | kind`.
pub mod type_id {
    /// Dynamically typed slot; the concrete type follows as type info.
    pub const UNKNOWN: u32 = 0;
    /// `bool`.
    pub const BOOL: u32 = 1;
    /// `i8`.
    pub const INT8: u32 = 2;
    /// `i16`.
    pub const INT16: u32 = 3;
    /// `i32`, fixed width.
    pub const INT32: u32 = 4;
    /// `i32`, zigzag varint.
    pub const VARINT32: u32 = 5;
    /// `i64`, fixed width.
    pub const INT64: u32 = 6;
    /// `i64`, zigzag varint.
    pub const VARINT64: u32 = 7;
    /// `u8`.
    pub const UINT8: u32 = 9;
    /// `u16`.
    pub const UINT16: u32 = 10;
    /// `u32`.
    pub const UINT32: u32 = 11;
    /// `u64`.
    pub const UINT64: u32 = 13;
    /// IEEE half precision.
    pub const FLOAT16: u32 = 17;
    /// `f32`.
    pub const FLOAT32: u32 = 19;
    /// `f64`.
    pub const FLOAT64: u32 = 20;
    /// Text.
    pub const STRING: u32 = 21;
    /// Ordered sequence.
    pub const LIST: u32 = 22;
    /// Unordered unique elements.
    pub const SET: u32 = 23;
    /// Key/value pairs.
    pub const MAP: u32 = 24;
    /// Enum registered by id.
    pub const ENUM: u32 = 25;
    /// Enum registered by name.
    pub const NAMED_ENUM: u32 = 26;
    /// Struct registered by id, schema-consistent.
    pub const STRUCT: u32 = 27;
    /// Struct registered by id, compatible mode.
    pub const COMPATIBLE_STRUCT: u32 = 28;
    /// Struct registered by name, schema-consistent.
    pub const NAMED_STRUCT: u32 = 29;
    /// Struct registered by name, compatible mode.
    pub const NAMED_COMPATIBLE_STRUCT: u32 = 30;
    /// Custom serializer registered by id.
    pub const EXT: u32 = 31;
    /// Custom serializer registered by name.
    pub const NAMED_EXT: u32 = 32;
    /// Union with a generated codec, registered by id.
    pub const UNION: u32 = 33;
    /// Union whose cases carry their declared payload type.
    pub const TYPED_UNION: u32 = 34;
    /// Union registered by name.
    pub const NAMED_UNION: u32 = 35;
    /// Explicit "no value".
    pub const NONE: u32 = 36;
    /// Signed duration.
    pub const DURATION: u32 = 37;
    /// Point in time, microseconds since the epoch.
    pub const TIMESTAMP: u32 = 38;
    /// Calendar date, days since the epoch.
    pub const DATE: u32 = 39;
    /// Opaque bytes.
    pub const BINARY: u32 = 41;
    /// Packed `bool` array.
    pub const BOOL_ARRAY: u32 = 43;
    /// Packed `i8` array.
    pub const INT8_ARRAY: u32 = 44;
    /// Packed `i16` array.
    pub const INT16_ARRAY: u32 = 45;
    /// Packed `i32` array.
    pub const INT32_ARRAY: u32 = 46;
    /// Packed `i64` array.
    pub const INT64_ARRAY: u32 = 47;
    /// Packed `f32` array.
    pub const FLOAT32_ARRAY: u32 = 55;
    /// Packed `f64` array.
    pub const FLOAT64_ARRAY: u32 = 56;
    /// First id not used by internal kinds.
    pub const BOUND: u32 = 64;

    /// Internal kind of a (possibly user) wire id.
    pub const fn kind(id: u32) -> u32 {
        id & 0xff
    }

    /// Full wire id for a user type registered by number.
    pub const fn user(user_id: u32, kind: u32) -> u32 {
        (user_id << 8) | kind
    }

    /// Struct kinds.
    pub const fn is_struct(kind: u32) -> bool {
        matches!(
            kind,
            STRUCT | COMPATIBLE_STRUCT | NAMED_STRUCT | NAMED_COMPATIBLE_STRUCT
        )
    }

    /// Struct kinds whose type info carries a TypeMeta.
    pub const fn is_compatible_struct(kind: u32) -> bool {
        matches!(kind, COMPATIBLE_STRUCT | NAMED_COMPATIBLE_STRUCT)
    }

    /// Kinds identified on the wire by namespace and name.
    pub const fn is_named(kind: u32) -> bool {
        matches!(
            kind,
            NAMED_ENUM | NAMED_STRUCT | NAMED_COMPATIBLE_STRUCT | NAMED_EXT | NAMED_UNION
        )
    }

    /// Kinds that only exist as user registrations.
    pub const fn is_user_kind(kind: u32) -> bool {
        matches!(kind, ENUM..=NAMED_UNION)
    }

    /// Number of nested generic parameters a container kind carries.
    pub const fn generic_arity(kind: u32) -> usize {
        match kind {
            LIST | SET => 1,
            MAP => 2,
            _ => 0,
        }
    }
}

/// Per-value flag preceding a value written with [`RefMode::NullOnly`] or
/// [`RefMode::Tracking`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum RefFlag {
    /// Absent value; nothing follows.
    Null = -3,
    /// Back-reference; a varuint ref id follows.
    Ref = -2,
    /// Present value without identity; the payload follows.
    NotNullValue = -1,
    /// Fresh identity; the payload follows and takes the next ref id.
    RefValue = 0,
}

impl RefFlag {
    /// Parse a flag byte.
    pub fn from_i8(raw: i8) -> Result<Self> {
        Ok(match raw {
            -3 => Self::Null,
            -2 => Self::Ref,
            -1 => Self::NotNullValue,
            0 => Self::RefValue,
            other => return Err(CodecError::InvalidRefFlag(other)),
        })
    }
}

/// Flag policy of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefMode {
    /// No flag; the value is always present and carries no identity.
    None,
    /// A null/not-null flag without identity tracking.
    NullOnly,
    /// Full identity tracking.
    Tracking,
}

impl RefMode {
    /// Ref mode for a slot given its nullability and tracking.
    pub const fn for_slot(nullable: bool, tracking: bool) -> Self {
        if tracking {
            Self::Tracking
        } else if nullable {
            Self::NullOnly
        } else {
            Self::None
        }
    }
}

/// Bits of the collection and map element headers.
pub mod collection {
    /// Elements go through full identity tracking.
    pub const TRACKING_REF: u8 = 0b0001;
    /// At least one element is null.
    pub const HAS_NULL: u8 = 0b0010;
    /// The element type is statically known to both peers.
    pub const DECL_ELEMENT_TYPE: u8 = 0b0100;
    /// Every element has the same concrete type.
    pub const SAME_TYPE: u8 = 0b1000;
}

/// Bits of the frame header byte.
pub mod frame {
    /// The top-level value is null; nothing follows.
    pub const IS_NULL: u8 = 0b0001;
    /// The writer used the cross-language format.
    pub const XLANG: u8 = 0b0010;
    /// Bits a reader accepts.
    pub const KNOWN: u8 = IS_NULL | XLANG;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ref_flags_parse_and_reject() {
        for flag in [
            RefFlag::Null,
            RefFlag::Ref,
            RefFlag::NotNullValue,
            RefFlag::RefValue,
        ] {
            assert_eq!(RefFlag::from_i8(flag as i8).unwrap(), flag);
        }
        assert_eq!(RefFlag::from_i8(1), Err(CodecError::InvalidRefFlag(1)));
        assert_eq!(RefFlag::from_i8(-4), Err(CodecError::InvalidRefFlag(-4)));
    }

    #[test]
    fn user_ids_keep_their_kind() {
        let id = type_id::user(7, type_id::COMPATIBLE_STRUCT);
        assert_eq!(type_id::kind(id), type_id::COMPATIBLE_STRUCT);
        assert!(type_id::is_compatible_struct(type_id::kind(id)));
        assert!(!type_id::is_named(type_id::kind(id)));
        assert!(type_id::is_user_kind(type_id::NAMED_UNION));
        assert!(!type_id::is_user_kind(type_id::MAP));
    }
}
