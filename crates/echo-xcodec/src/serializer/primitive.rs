// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scalar codecs: fixed-width little-endian integers and floats, plus the
//! zigzag varint newtypes.

use half::f16;

use crate::context::{ReadContext, WriteContext};
use crate::error::Result;
use crate::serializer::{Serializer, TypeKind};
use crate::types::type_id;

/// An `i32` written as a zigzag varint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarInt32(pub i32);

/// An `i64` written as a zigzag varint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarInt64(pub i64);

macro_rules! fixed_width {
    ($($ty:ty => $id:expr, $write:ident, $read:ident;)*) => {
        $(
            impl Serializer for $ty {
                fn type_kind() -> TypeKind {
                    TypeKind::Builtin($id)
                }

                fn default_value() -> Self {
                    <$ty>::default()
                }

                fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
                    ctx.writer().$write(*self);
                    Ok(())
                }

                fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
                    ctx.reader().$read()
                }
            }
        )*
    };
}

fixed_width! {
    bool => type_id::BOOL, write_bool, read_bool;
    i8 => type_id::INT8, write_i8, read_i8;
    i16 => type_id::INT16, write_i16, read_i16;
    i32 => type_id::INT32, write_i32, read_i32;
    i64 => type_id::INT64, write_i64, read_i64;
    u8 => type_id::UINT8, write_u8, read_u8;
    u16 => type_id::UINT16, write_u16, read_u16;
    u32 => type_id::UINT32, write_u32, read_u32;
    u64 => type_id::UINT64, write_u64, read_u64;
    f32 => type_id::FLOAT32, write_f32, read_f32;
    f64 => type_id::FLOAT64, write_f64, read_f64;
}

impl Serializer for f16 {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::FLOAT16)
    }

    fn default_value() -> Self {
        Self::ZERO
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.writer().write_u16(self.to_bits());
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(Self::from_bits(ctx.reader().read_u16()?))
    }
}

impl Serializer for VarInt32 {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::VARINT32)
    }

    fn default_value() -> Self {
        Self(0)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.writer().write_varint32(self.0);
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(Self(ctx.reader().read_varint32()?))
    }
}

impl Serializer for VarInt64 {
    fn type_kind() -> TypeKind {
        TypeKind::Builtin(type_id::VARINT64)
    }

    fn default_value() -> Self {
        Self(0)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.writer().write_varint64(self.0);
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(Self(ctx.reader().read_varint64()?))
    }
}
