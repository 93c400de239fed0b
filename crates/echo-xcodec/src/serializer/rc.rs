// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared pointers and interior mutability.
//!
//! `Rc<T>` and `Arc<T>` are the identity-bearing types: with tracking on, a
//! second occurrence of the same allocation is written as a back-reference.
//! `RefCell<T>` is transparent except that `Rc<RefCell<T>>` binds its shell
//! to the pending ref slot before decoding the contents, so a child can point
//! back at an ancestor that is still being built.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::config::Config;
use crate::context::{ReadContext, ReadTypeInfo, WriteContext};
use crate::error::{CodecError, Result};
use crate::meta::{FieldInfo, FieldType};
use crate::resolver::{RefSlot, TypeResolver};
use crate::serializer::{Serializer, TypeKind};

impl<T: Serializer> Serializer for Rc<T> {
    fn type_kind() -> TypeKind {
        T::type_kind()
    }

    fn registry_key() -> std::any::TypeId {
        T::registry_key()
    }

    fn is_reference_trackable_type() -> bool {
        true
    }

    fn default_value() -> Self {
        Self::new(T::default_value())
    }

    fn is_none(&self) -> bool {
        (**self).is_none()
    }

    fn ref_identity(&self) -> Option<usize> {
        Some(Self::as_ptr(self).cast::<()>() as usize)
    }

    fn to_ref_slot(&self) -> Option<RefSlot> {
        Some(RefSlot::shared(Self::clone(self)))
    }

    fn from_ref_slot(slot: &RefSlot) -> Option<Self> {
        slot.downcast_ref::<Self>()
            .cloned()
            .or_else(|| Rc::clone(slot.as_shared()?).downcast::<T>().ok())
    }

    fn runtime_type(&self) -> std::any::TypeId {
        (**self).runtime_type()
    }

    fn requires_type_info(config: &Config) -> bool {
        T::requires_type_info(config)
    }

    fn field_type(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
        let mut ft = T::field_type(resolver, config)?;
        ft.tracking = config.track_ref();
        Ok(ft)
    }

    fn struct_fields(resolver: &TypeResolver, config: &Config) -> Result<Vec<FieldInfo>> {
        T::struct_fields(resolver, config)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        (**self).write_data(ctx)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        T::read_data(ctx).map(Self::new)
    }

    fn read_data_with(ctx: &mut ReadContext<'_>, info: &ReadTypeInfo) -> Result<Self> {
        T::read_data_with(ctx, info).map(Self::new)
    }

    fn read_payload(
        ctx: &mut ReadContext<'_>,
        info: Option<&ReadTypeInfo>,
        ref_id: Option<u32>,
    ) -> Result<Self> {
        T::read_shared(ctx, info, ref_id)
    }

    fn write_type_info(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        (**self).write_type_info(ctx)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<ReadTypeInfo> {
        T::read_type_info(ctx)
    }
}

impl<T: Serializer> Serializer for Arc<T> {
    fn type_kind() -> TypeKind {
        T::type_kind()
    }

    fn registry_key() -> std::any::TypeId {
        T::registry_key()
    }

    fn is_reference_trackable_type() -> bool {
        true
    }

    fn default_value() -> Self {
        Self::new(T::default_value())
    }

    fn is_none(&self) -> bool {
        (**self).is_none()
    }

    fn ref_identity(&self) -> Option<usize> {
        Some(Self::as_ptr(self).cast::<()>() as usize)
    }

    fn to_ref_slot(&self) -> Option<RefSlot> {
        Some(RefSlot::new(Self::clone(self)))
    }

    fn from_ref_slot(slot: &RefSlot) -> Option<Self> {
        slot.downcast_ref::<Self>().cloned()
    }

    fn runtime_type(&self) -> std::any::TypeId {
        (**self).runtime_type()
    }

    fn requires_type_info(config: &Config) -> bool {
        T::requires_type_info(config)
    }

    fn field_type(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
        let mut ft = T::field_type(resolver, config)?;
        ft.tracking = config.track_ref();
        Ok(ft)
    }

    fn struct_fields(resolver: &TypeResolver, config: &Config) -> Result<Vec<FieldInfo>> {
        T::struct_fields(resolver, config)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        (**self).write_data(ctx)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        T::read_data(ctx).map(Self::new)
    }

    fn read_data_with(ctx: &mut ReadContext<'_>, info: &ReadTypeInfo) -> Result<Self> {
        T::read_data_with(ctx, info).map(Self::new)
    }

    fn read_payload(
        ctx: &mut ReadContext<'_>,
        info: Option<&ReadTypeInfo>,
        _ref_id: Option<u32>,
    ) -> Result<Self> {
        T::read_payload(ctx, info, None).map(Self::new)
    }

    fn write_type_info(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        (**self).write_type_info(ctx)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<ReadTypeInfo> {
        T::read_type_info(ctx)
    }
}

fn borrowed<T>(cell: &RefCell<T>) -> Result<std::cell::Ref<'_, T>> {
    cell.try_borrow()
        .map_err(|_| CodecError::InvalidData("value is mutably borrowed during serialization"))
}

impl<T: Serializer> Serializer for RefCell<T> {
    fn type_kind() -> TypeKind {
        T::type_kind()
    }

    fn registry_key() -> std::any::TypeId {
        T::registry_key()
    }

    fn is_nullable_type() -> bool {
        T::is_nullable_type()
    }

    fn default_value() -> Self {
        Self::new(T::default_value())
    }

    fn is_none(&self) -> bool {
        self.try_borrow().is_ok_and(|value| value.is_none())
    }

    fn runtime_type(&self) -> std::any::TypeId {
        self.try_borrow()
            .map_or_else(|_| T::registry_key(), |value| value.runtime_type())
    }

    fn requires_type_info(config: &Config) -> bool {
        T::requires_type_info(config)
    }

    fn field_type(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
        T::field_type(resolver, config)
    }

    fn struct_fields(resolver: &TypeResolver, config: &Config) -> Result<Vec<FieldInfo>> {
        T::struct_fields(resolver, config)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        borrowed(self)?.write_data(ctx)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        T::read_data(ctx).map(Self::new)
    }

    fn read_data_with(ctx: &mut ReadContext<'_>, info: &ReadTypeInfo) -> Result<Self> {
        T::read_data_with(ctx, info).map(Self::new)
    }

    fn read_payload(
        ctx: &mut ReadContext<'_>,
        info: Option<&ReadTypeInfo>,
        ref_id: Option<u32>,
    ) -> Result<Self> {
        T::read_payload(ctx, info, ref_id).map(Self::new)
    }

    fn read_shared(
        ctx: &mut ReadContext<'_>,
        info: Option<&ReadTypeInfo>,
        ref_id: Option<u32>,
    ) -> Result<Rc<Self>> {
        let shell = Rc::new(Self::new(T::default_value()));
        if let Some(id) = ref_id {
            ctx.refs().bind(id, RefSlot::shared(Rc::clone(&shell)))?;
        }
        let value = T::read_payload(ctx, info, None)?;
        *shell
            .try_borrow_mut()
            .map_err(|_| CodecError::InvalidData("shared cell borrowed while decoding"))? = value;
        Ok(shell)
    }

    fn write_type_info(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        borrowed(self)?.write_type_info(ctx)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<ReadTypeInfo> {
        T::read_type_info(ctx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{Config, Engine};

    fn tracking_engine() -> Engine {
        Engine::new(Config::builder().track_ref(true).build().unwrap())
    }

    #[test]
    fn repeated_rc_is_written_once() {
        let shared = Rc::new(String::from("shared payload"));
        let values = vec![Rc::clone(&shared), Rc::clone(&shared), Rc::new(String::from("other"))];
        let mut engine = tracking_engine();
        let bytes = engine.serialize(&values).unwrap();
        let occurrences = bytes.windows(7).filter(|w| *w == b"shared ").count();
        assert_eq!(occurrences, 1);

        let back = engine.deserialize::<Vec<Rc<String>>>(&bytes).unwrap();
        assert!(Rc::ptr_eq(&back[0], &back[1]));
        assert!(!Rc::ptr_eq(&back[0], &back[2]));
        assert_eq!(*back[2], "other");
    }

    #[test]
    fn without_tracking_copies_are_independent() {
        let shared = Rc::new(7u32);
        let values = vec![Rc::clone(&shared), shared];
        let mut engine = Engine::default();
        let bytes = engine.serialize(&values).unwrap();
        let back = engine.deserialize::<Vec<Rc<u32>>>(&bytes).unwrap();
        assert_eq!(*back[0], 7);
        assert!(!Rc::ptr_eq(&back[0], &back[1]));
    }

    #[test]
    fn arc_tracks_identity_too() {
        let shared = Arc::new(-5i64);
        let values = vec![Arc::clone(&shared), shared];
        let mut engine = tracking_engine();
        let bytes = engine.serialize(&values).unwrap();
        let back = engine.deserialize::<Vec<Arc<i64>>>(&bytes).unwrap();
        assert!(Arc::ptr_eq(&back[0], &back[1]));
    }

    #[test]
    fn mutably_borrowed_cell_cannot_be_written() {
        let cell = Rc::new(RefCell::new(1u8));
        let _guard = cell.borrow_mut();
        let mut engine = Engine::default();
        assert!(matches!(
            engine.serialize(&cell),
            Err(CodecError::InvalidData(_))
        ));
    }
}
