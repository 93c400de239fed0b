// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fieldless enums, written as a varuint ordinal.

use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, Result};
use crate::serializer::Serializer;

/// Ordinal mapping of a fieldless enum. Implement it (usually alongside
/// [`impl_enum_serializer!`](crate::impl_enum_serializer)) and register the
/// type with the engine.
pub trait EnumSerializer: Serializer {
    /// Position of this variant in declaration order.
    fn ordinal(&self) -> u32;

    /// Variant at `ordinal`, if any.
    fn from_ordinal(ordinal: u32) -> Option<Self>;
}

/// Write the ordinal of `value`.
pub fn write_enum<T: EnumSerializer>(value: &T, ctx: &mut WriteContext<'_>) -> Result<()> {
    ctx.writer().write_varuint32(value.ordinal());
    Ok(())
}

/// Read an ordinal and map it back to a variant.
pub fn read_enum<T: EnumSerializer>(ctx: &mut ReadContext<'_>) -> Result<T> {
    let ordinal = ctx.reader().read_varuint32()?;
    T::from_ordinal(ordinal).ok_or(CodecError::InvalidEnumOrdinal {
        type_name: std::any::type_name::<T>(),
        ordinal,
    })
}

/// Implement [`Serializer`](crate::Serializer) for a type that implements
/// [`EnumSerializer`](crate::EnumSerializer) and `Default`.
#[macro_export]
macro_rules! impl_enum_serializer {
    ($ty:ty) => {
        impl $crate::Serializer for $ty {
            fn type_kind() -> $crate::TypeKind {
                $crate::TypeKind::Enum
            }

            fn default_value() -> Self {
                <Self as ::core::default::Default>::default()
            }

            fn write_data(&self, ctx: &mut $crate::WriteContext<'_>) -> $crate::Result<()> {
                $crate::serializer::enum_::write_enum(self, ctx)
            }

            fn read_data(ctx: &mut $crate::ReadContext<'_>) -> $crate::Result<Self> {
                $crate::serializer::enum_::read_enum(ctx)
            }
        }
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::Engine;

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        #[default]
        Idle,
        Running,
        Done,
    }

    impl EnumSerializer for Phase {
        fn ordinal(&self) -> u32 {
            *self as u32
        }

        fn from_ordinal(ordinal: u32) -> Option<Self> {
            [Self::Idle, Self::Running, Self::Done].get(ordinal as usize).copied()
        }
    }

    crate::impl_enum_serializer!(Phase);

    #[test]
    fn enums_travel_as_ordinals() {
        let mut engine = Engine::default();
        engine.register::<Phase>(5).unwrap();
        let bytes = engine.serialize(&Phase::Done).unwrap();
        assert_eq!(bytes, vec![0x02, 2]);
        assert_eq!(engine.deserialize::<Phase>(&bytes).unwrap(), Phase::Done);

        let list = engine.serialize(&vec![Phase::Running, Phase::Idle]).unwrap();
        assert_eq!(
            engine.deserialize::<Vec<Phase>>(&list).unwrap(),
            vec![Phase::Running, Phase::Idle]
        );
    }

    #[test]
    fn unknown_ordinal_is_rejected() {
        let mut engine = Engine::default();
        engine.register::<Phase>(5).unwrap();
        assert_eq!(
            engine.deserialize::<Phase>(&[0x02, 9]).unwrap_err(),
            CodecError::InvalidEnumOrdinal {
                type_name: std::any::type_name::<Phase>(),
                ordinal: 9,
            }
        );
    }
}
