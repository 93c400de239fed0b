// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tagged unions: a varuint case index, then the case payload written with a
//! null flag and its own type info.
//!
//! Each union type maps `(index, payload)` to a variant with plain match
//! arms; the payload's declared type is checked against its type info.

use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, Result};
use crate::serializer::Serializer;
use crate::types::RefMode;

/// Case mapping of a union type.
pub trait UnionSerializer: Serializer {
    /// Index of the active case.
    fn case_index(&self) -> u32;

    /// Write the active case's payload, normally via [`write_union_payload`].
    fn write_case(&self, ctx: &mut WriteContext<'_>) -> Result<()>;

    /// Build the case at `index`, reading its payload via
    /// [`read_union_payload`]; unknown indices yield
    /// [`CodecError::InvalidUnionCase`] (see [`invalid_case`]).
    fn read_case(ctx: &mut ReadContext<'_>, index: u32) -> Result<Self>;
}

/// Write a case payload.
pub fn write_union_payload<T: Serializer>(ctx: &mut WriteContext<'_>, payload: &T) -> Result<()> {
    payload.write(ctx, RefMode::NullOnly, true)
}

/// Read a case payload of declared type `T`.
pub fn read_union_payload<T: Serializer>(ctx: &mut ReadContext<'_>) -> Result<T> {
    T::read(ctx, RefMode::NullOnly, true)
}

/// Error for a case index `U` does not define.
pub fn invalid_case<U: UnionSerializer>(index: u32) -> CodecError {
    CodecError::InvalidUnionCase {
        type_name: std::any::type_name::<U>(),
        index,
    }
}

/// Write the case index and payload of `value`.
pub fn write_union<U: UnionSerializer>(value: &U, ctx: &mut WriteContext<'_>) -> Result<()> {
    ctx.writer().write_varuint32(value.case_index());
    value.write_case(ctx)
}

/// Read a union written by [`write_union`].
pub fn read_union<U: UnionSerializer>(ctx: &mut ReadContext<'_>) -> Result<U> {
    let index = ctx.reader().read_varuint32()?;
    U::read_case(ctx, index)
}

/// Implement [`Serializer`](crate::Serializer) for a type that implements
/// [`UnionSerializer`](crate::UnionSerializer) and `Default`.
#[macro_export]
macro_rules! impl_union_serializer {
    ($ty:ty) => {
        impl $crate::Serializer for $ty {
            fn type_kind() -> $crate::TypeKind {
                $crate::TypeKind::Union
            }

            fn default_value() -> Self {
                <Self as ::core::default::Default>::default()
            }

            fn write_data(&self, ctx: &mut $crate::WriteContext<'_>) -> $crate::Result<()> {
                $crate::serializer::union::write_union(self, ctx)
            }

            fn read_data(ctx: &mut $crate::ReadContext<'_>) -> $crate::Result<Self> {
                $crate::serializer::union::read_union(ctx)
            }
        }
    };
}
