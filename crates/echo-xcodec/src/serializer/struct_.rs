// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! User structs.
//!
//! Schema-consistent mode writes the fields in declaration order, optionally
//! preceded by an i32 layout hash. Compatible mode relies on the TypeMeta
//! carried by the type info: the reader walks the remote field list, reads
//! the fields it knows under a matching shape and skips everything else.

use crate::context::{ReadContext, ReadTypeInfo, WriteContext};
use crate::error::{CodecError, Result};
use crate::meta::{FieldInfo, FieldType, TypeMeta};
use crate::serializer::skip::skip_field;
use crate::serializer::{slot_ref_mode, Serializer};
use crate::types::RefMode;

/// Field-level codec of a struct; see
/// [`impl_struct_serializer!`](crate::impl_struct_serializer).
pub trait StructSerializer: Serializer {
    /// Write every field in declaration order.
    fn write_fields(&self, ctx: &mut WriteContext<'_>) -> Result<()>;

    /// Read every field in declaration order.
    fn read_fields(ctx: &mut ReadContext<'_>) -> Result<Self>;

    /// Read fields described by a remote schema.
    fn read_compatible(ctx: &mut ReadContext<'_>, remote: &TypeMeta) -> Result<Self>;
}

/// Payload of a struct value.
pub fn write_struct_data<T: StructSerializer>(value: &T, ctx: &mut WriteContext<'_>) -> Result<()> {
    if ctx.config().check_struct_version() {
        let resolver = ctx.resolver();
        let version = resolver.struct_version(resolver.info_for::<T>()?, ctx.config())?;
        ctx.writer().write_i32(version);
    }
    value.write_fields(ctx)
}

/// Read a struct payload. `info` is the type info read for this value, if
/// any; compatible mode needs the schema it carries.
pub fn read_struct_data<T: StructSerializer>(
    ctx: &mut ReadContext<'_>,
    info: Option<&ReadTypeInfo>,
) -> Result<T> {
    if ctx.config().compatible() {
        let remote = info
            .and_then(ReadTypeInfo::type_meta)
            .cloned()
            .ok_or(CodecError::InvalidData("compatible struct without type meta"))?;
        return T::read_compatible(ctx, &remote);
    }
    if ctx.config().check_struct_version() {
        let resolver = ctx.resolver();
        let expected = resolver.struct_version(resolver.info_for::<T>()?, ctx.config())?;
        let found = ctx.reader().read_i32()?;
        if found != expected {
            return Err(CodecError::StructVersionMismatch {
                type_name: std::any::type_name::<T>(),
                expected,
                found,
            });
        }
    }
    T::read_fields(ctx)
}

/// Write one field with the slot protocol of its type.
pub fn write_field<T: Serializer>(ctx: &mut WriteContext<'_>, value: &T) -> Result<()> {
    let config = ctx.config();
    value.write(ctx, slot_ref_mode::<T>(config), T::requires_type_info(config))
}

/// Read one field written by [`write_field`].
pub fn read_field<T: Serializer>(ctx: &mut ReadContext<'_>) -> Result<T> {
    let config = ctx.config();
    T::read(ctx, slot_ref_mode::<T>(config), T::requires_type_info(config))
}

fn same_shape(local: &FieldType, remote: &FieldType) -> bool {
    local.type_id == remote.type_id
        && local.tracking == remote.tracking
        && local.generics.len() == remote.generics.len()
        && local
            .generics
            .iter()
            .zip(&remote.generics)
            .all(|(l, r)| same_shape(l, r))
}

/// Read a remote field into `slot` when its shape matches `T`. Returns
/// `false` (nothing consumed) when it does not.
pub fn read_matching_field<T: Serializer>(
    ctx: &mut ReadContext<'_>,
    field: &FieldInfo,
    slot: &mut T,
) -> Result<bool> {
    let local = T::field_type(ctx.resolver(), ctx.config())?;
    let remote = field.field_type();
    if !same_shape(&local, remote) {
        return Ok(false);
    }
    let mode = RefMode::for_slot(remote.nullable, remote.tracking);
    *slot = T::read(ctx, mode, remote.carries_type_info(true))?;
    Ok(true)
}

/// Walk the fields of `remote`, offering each to `read_local`; fields it
/// declines are skipped.
pub fn read_compatible_fields<F>(ctx: &mut ReadContext<'_>, remote: &TypeMeta, mut read_local: F) -> Result<()>
where
    F: FnMut(&mut ReadContext<'_>, &FieldInfo) -> Result<bool>,
{
    for field in remote.fields() {
        if !read_local(ctx, field)? {
            skip_field(ctx, field.field_type())?;
        }
    }
    Ok(())
}

/// Implement [`Serializer`](crate::Serializer) and
/// [`StructSerializer`](crate::StructSerializer) for a struct with the
/// listed fields, in declaration order. The struct must implement
/// `Default` and every listed field type must implement `Serializer`.
///
/// ```
/// use echo_xcodec::{impl_struct_serializer, Engine};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl_struct_serializer!(Point { x: i32, y: i32 });
///
/// let mut engine = Engine::default();
/// engine.register::<Point>(1).unwrap();
/// let bytes = engine.serialize(&Point { x: 1, y: -2 }).unwrap();
/// assert_eq!(engine.deserialize::<Point>(&bytes).unwrap(), Point { x: 1, y: -2 });
/// ```
#[macro_export]
macro_rules! impl_struct_serializer {
    ($ty:ty { $($field:ident : $fty:ty),+ $(,)? }) => {
        impl $crate::Serializer for $ty {
            fn type_kind() -> $crate::TypeKind {
                $crate::TypeKind::Struct
            }

            fn default_value() -> Self {
                <Self as ::core::default::Default>::default()
            }

            fn struct_fields(
                resolver: &$crate::TypeResolver,
                config: &$crate::Config,
            ) -> $crate::Result<::std::vec::Vec<$crate::FieldInfo>> {
                Ok(::std::vec![$(
                    $crate::FieldInfo::new(
                        stringify!($field),
                        <$fty as $crate::Serializer>::field_type(resolver, config)?,
                    ),
                )+])
            }

            fn write_data(&self, ctx: &mut $crate::WriteContext<'_>) -> $crate::Result<()> {
                $crate::write_struct_data(self, ctx)
            }

            fn read_data(ctx: &mut $crate::ReadContext<'_>) -> $crate::Result<Self> {
                $crate::read_struct_data(ctx, None)
            }

            fn read_data_with(
                ctx: &mut $crate::ReadContext<'_>,
                info: &$crate::ReadTypeInfo,
            ) -> $crate::Result<Self> {
                $crate::read_struct_data(ctx, Some(info))
            }
        }

        impl $crate::StructSerializer for $ty {
            fn write_fields(&self, ctx: &mut $crate::WriteContext<'_>) -> $crate::Result<()> {
                $($crate::write_field::<$fty>(ctx, &self.$field)?;)+
                Ok(())
            }

            fn read_fields(ctx: &mut $crate::ReadContext<'_>) -> $crate::Result<Self> {
                Ok(Self {
                    $($field: $crate::read_field::<$fty>(ctx)?,)+
                })
            }

            fn read_compatible(
                ctx: &mut $crate::ReadContext<'_>,
                remote: &$crate::TypeMeta,
            ) -> $crate::Result<Self> {
                let mut out = <Self as ::core::default::Default>::default();
                $crate::read_compatible_fields(ctx, remote, |ctx, field| match field.name() {
                    $(stringify!($field) => $crate::read_matching_field::<$fty>(ctx, field, &mut out.$field),)+
                    _ => Ok(false),
                })?;
                Ok(out)
            }
        }
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{Config, Engine};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Item {
        sku: String,
        qty: u32,
        note: Option<String>,
    }

    impl_struct_serializer!(Item { sku: String, qty: u32, note: Option<String> });

    // a later revision: `qty` changed type, `price` was added, `note` dropped
    #[derive(Debug, Default, Clone, PartialEq)]
    struct ItemV2 {
        sku: String,
        qty: i64,
        price: f64,
    }

    impl_struct_serializer!(ItemV2 { sku: String, qty: i64, price: f64 });

    fn item() -> Item {
        Item {
            sku: "A-1".into(),
            qty: 3,
            note: Some("fragile".into()),
        }
    }

    // ── 1. Schema-consistent ──────────────────────────────────────────

    #[test]
    fn fields_are_written_in_order() {
        let mut engine = Engine::default();
        engine.register::<Item>(1).unwrap();
        let bytes = engine.serialize(&item()).unwrap();
        assert_eq!(&bytes[..5], &[0x02, (3 << 2) | 1, b'A', b'-', b'1']);
        assert_eq!(&bytes[5..9], &[3, 0, 0, 0]);
        assert_eq!(bytes[9], 0xff);
        assert_eq!(engine.deserialize::<Item>(&bytes).unwrap(), item());
    }

    #[test]
    fn version_hash_detects_layout_drift() {
        let config = Config::builder().check_struct_version(true).build().unwrap();
        let mut writer = Engine::new(config.clone());
        writer.register::<Item>(1).unwrap();
        let bytes = writer.serialize(&item()).unwrap();

        let mut same = Engine::new(config.clone());
        same.register::<Item>(1).unwrap();
        assert_eq!(same.deserialize::<Item>(&bytes).unwrap(), item());

        let mut drifted = Engine::new(config);
        drifted.register::<ItemV2>(1).unwrap();
        assert!(matches!(
            drifted.deserialize::<ItemV2>(&bytes),
            Err(CodecError::StructVersionMismatch { .. })
        ));
    }

    // ── 2. Compatible ─────────────────────────────────────────────────

    #[test]
    fn compatible_reader_keeps_matching_fields_and_skips_the_rest() {
        let config = Config::builder().compatible(true).build().unwrap();
        let mut writer = Engine::new(config.clone());
        writer.register::<Item>(1).unwrap();
        let bytes = writer.serialize(&item()).unwrap();

        let mut reader = Engine::new(config);
        reader.register::<ItemV2>(1).unwrap();
        let back = reader.deserialize::<ItemV2>(&bytes).unwrap();
        assert_eq!(
            back,
            ItemV2 {
                sku: "A-1".into(),
                qty: 0,
                price: 0.0,
            }
        );
    }

    #[test]
    fn compatible_schema_is_written_once_per_frame() {
        let config = Config::builder().compatible(true).build().unwrap();
        let mut engine = Engine::new(config);
        engine.register::<Item>(1).unwrap();
        let one = engine.serialize(&vec![item()]).unwrap();
        let three = engine.serialize(&vec![item(), item(), item()]).unwrap();
        let per_item = one.len() - 4;
        assert!(three.len() < one.len() + 2 * per_item);
        assert_eq!(engine.write_state().type_meta_count(), 1);
        assert_eq!(
            engine.deserialize::<Vec<Item>>(&three).unwrap(),
            vec![item(), item(), item()]
        );
    }

    #[test]
    fn unregistered_struct_is_an_error() {
        let mut engine = Engine::default();
        assert!(matches!(
            engine.serialize(&item()),
            Err(CodecError::UnregisteredType(_))
        ));
    }
}
