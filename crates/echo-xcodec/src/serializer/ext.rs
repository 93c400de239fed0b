// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Extension types: values of foreign types encoded by a serializer the host
//! registers at runtime (`EXT` / `NAMED_EXT`).

use crate::context::{ReadContext, WriteContext};
use crate::error::Result;
use crate::serializer::{Serializer, TypeKind};

/// Custom payload codec for `T`.
pub trait ExtSerializer<T>: Send + Sync + 'static {
    /// Encode the payload of `value`.
    fn write(&self, value: &T, ctx: &mut WriteContext<'_>) -> Result<()>;

    /// Decode a payload written by [`ExtSerializer::write`].
    fn read(&self, ctx: &mut ReadContext<'_>) -> Result<T>;
}

/// Carrier routing `T` through its registered [`ExtSerializer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ext<T>(pub T);

impl<T: Default + 'static> Serializer for Ext<T> {
    fn type_kind() -> TypeKind {
        TypeKind::Ext
    }

    fn default_value() -> Self {
        Self(T::default())
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        let info = ctx.resolver().info_for::<Self>()?;
        info.ext_serializer::<T>()?.write(&self.0, ctx)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let info = ctx.resolver().info_for::<Self>()?;
        info.ext_serializer::<T>()?.read(ctx).map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{CodecError, Engine};

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    struct Rgb(u8, u8, u8);

    struct PackedRgb;

    impl ExtSerializer<Rgb> for PackedRgb {
        fn write(&self, value: &Rgb, ctx: &mut WriteContext<'_>) -> Result<()> {
            let packed = (u32::from(value.0) << 16) | (u32::from(value.1) << 8) | u32::from(value.2);
            ctx.writer().write_varuint32(packed);
            Ok(())
        }

        fn read(&self, ctx: &mut ReadContext<'_>) -> Result<Rgb> {
            let packed = ctx.reader().read_varuint32()?;
            Ok(Rgb((packed >> 16) as u8, (packed >> 8) as u8, packed as u8))
        }
    }

    #[test]
    fn registered_ext_round_trips() {
        let mut engine = Engine::default();
        engine.register_ext::<Rgb, _>(3, PackedRgb).unwrap();
        let value = Ext(Rgb(0x12, 0x34, 0x56));
        let bytes = engine.serialize(&value).unwrap();
        assert_eq!(engine.deserialize::<Ext<Rgb>>(&bytes).unwrap(), value);
        let boxed = engine.serialize(&vec![value, Ext(Rgb::default())]).unwrap();
        assert_eq!(
            engine.deserialize::<Vec<Ext<Rgb>>>(&boxed).unwrap(),
            vec![value, Ext(Rgb::default())]
        );
    }

    #[test]
    fn unregistered_ext_is_an_error() {
        let mut engine = Engine::default();
        assert!(matches!(
            engine.serialize(&Ext(Rgb::default())),
            Err(CodecError::UnregisteredType(_))
        ));
        let mut engine = Engine::default();
        engine.register_ext::<Rgb, _>(3, PackedRgb).unwrap();
        assert!(matches!(
            engine.register_ext::<Rgb, _>(4, PackedRgb),
            Err(CodecError::DuplicateRegistration(_))
        ));
    }
}
