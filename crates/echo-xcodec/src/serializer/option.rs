// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `Option<T>`: the nullable wrapper. `None` travels as a `Null` flag; the
//! payload of `Some` is exactly the inner type's.

use crate::config::Config;
use crate::context::{ReadContext, ReadTypeInfo, WriteContext};
use crate::error::{CodecError, Result};
use crate::meta::{FieldInfo, FieldType};
use crate::resolver::{RefSlot, TypeResolver};
use crate::serializer::{Serializer, TypeKind};

impl<T: Serializer> Serializer for Option<T> {
    fn type_kind() -> TypeKind {
        T::type_kind()
    }

    fn registry_key() -> std::any::TypeId {
        T::registry_key()
    }

    fn is_nullable_type() -> bool {
        true
    }

    fn is_reference_trackable_type() -> bool {
        T::is_reference_trackable_type()
    }

    fn is_canonicalizable_type() -> bool {
        T::is_canonicalizable_type()
    }

    fn default_value() -> Self {
        None
    }

    fn is_none(&self) -> bool {
        self.as_ref().is_none_or(T::is_none)
    }

    fn ref_identity(&self) -> Option<usize> {
        self.as_ref().and_then(T::ref_identity)
    }

    fn to_ref_slot(&self) -> Option<RefSlot> {
        self.as_ref().and_then(T::to_ref_slot)
    }

    fn from_ref_slot(slot: &RefSlot) -> Option<Self> {
        T::from_ref_slot(slot).map(Some)
    }

    fn runtime_type(&self) -> std::any::TypeId {
        self.as_ref().map_or_else(T::registry_key, T::runtime_type)
    }

    fn requires_type_info(config: &Config) -> bool {
        T::requires_type_info(config)
    }

    fn field_type(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
        let mut ft = T::field_type(resolver, config)?;
        ft.nullable = true;
        Ok(ft)
    }

    fn struct_fields(resolver: &TypeResolver, config: &Config) -> Result<Vec<FieldInfo>> {
        T::struct_fields(resolver, config)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        match self {
            Some(value) => value.write_data(ctx),
            None => Err(CodecError::UnexpectedNull(std::any::type_name::<T>())),
        }
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        T::read_data(ctx).map(Some)
    }

    fn read_data_with(ctx: &mut ReadContext<'_>, info: &ReadTypeInfo) -> Result<Self> {
        T::read_data_with(ctx, info).map(Some)
    }

    fn read_payload(
        ctx: &mut ReadContext<'_>,
        info: Option<&ReadTypeInfo>,
        ref_id: Option<u32>,
    ) -> Result<Self> {
        T::read_payload(ctx, info, ref_id).map(Some)
    }

    fn write_type_info(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        match self {
            Some(value) => value.write_type_info(ctx),
            None => Err(CodecError::UnexpectedNull(std::any::type_name::<T>())),
        }
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<ReadTypeInfo> {
        T::read_type_info(ctx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use crate::Engine;

    #[test]
    fn top_level_none_is_the_null_frame() {
        let mut engine = Engine::default();
        let bytes = engine.serialize(&None::<String>).unwrap();
        assert_eq!(bytes, vec![0x03]);
        assert_eq!(engine.deserialize::<Option<String>>(&bytes).unwrap(), None);

        let bytes = engine.serialize(&Some(String::from("x"))).unwrap();
        assert_eq!(
            engine.deserialize::<Option<String>>(&bytes).unwrap().as_deref(),
            Some("x")
        );
    }

    #[test]
    fn nested_options_in_a_list_keep_their_holes() {
        let mut engine = Engine::default();
        let values = vec![Some(1i64), None, Some(3)];
        let bytes = engine.serialize(&values).unwrap();
        assert_eq!(engine.deserialize::<Vec<Option<i64>>>(&bytes).unwrap(), values);
    }
}
