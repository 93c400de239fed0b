// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dynamically typed slots.
//!
//! A [`DynValue`] carries any registered or built-in type; its concrete type
//! is looked up in the resolver on write and travels as type info. A `()`
//! payload is the dynamic null.

use std::any::Any;
use std::rc::Rc;

use crate::context::{ReadContext, ReadTypeInfo, WriteContext};
use crate::error::{CodecError, Result};
use crate::resolver::{RefSlot, TypeInfo};
use crate::serializer::{Serializer, TypeKind};

/// A value whose type is only known at runtime.
pub type DynValue = Rc<dyn Any>;

/// The dynamic null.
pub fn dyn_null() -> DynValue {
    Rc::new(())
}

fn info_of<'a>(value: &DynValue, ctx: &WriteContext<'a>) -> Result<&'a std::sync::Arc<TypeInfo>> {
    ctx.resolver()
        .info_for_type_id((**value).type_id())
        .ok_or(CodecError::UnregisteredType("dynamic value of an unregistered type"))
}

impl Serializer for DynValue {
    fn type_kind() -> TypeKind {
        TypeKind::Dynamic
    }

    fn is_nullable_type() -> bool {
        true
    }

    fn is_reference_trackable_type() -> bool {
        true
    }

    fn default_value() -> Self {
        dyn_null()
    }

    fn is_none(&self) -> bool {
        (**self).is::<()>()
    }

    fn ref_identity(&self) -> Option<usize> {
        Some(Rc::as_ptr(self).cast::<()>() as usize)
    }

    fn to_ref_slot(&self) -> Option<RefSlot> {
        Some(RefSlot::dynamic(Rc::clone(self)))
    }

    fn from_ref_slot(slot: &RefSlot) -> Option<Self> {
        slot.as_shared().cloned()
    }

    fn runtime_type(&self) -> std::any::TypeId {
        (**self).type_id()
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        info_of(self, ctx)?.write_any(&**self, ctx)
    }

    fn read_data(_ctx: &mut ReadContext<'_>) -> Result<Self> {
        Err(CodecError::InvalidData("dynamic value without type info"))
    }

    fn read_data_with(ctx: &mut ReadContext<'_>, info: &ReadTypeInfo) -> Result<Self> {
        info.local()?.read_any(ctx, info)
    }

    fn write_type_info(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        let info = info_of(self, ctx)?;
        ctx.write_type_info(info)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<ReadTypeInfo> {
        ctx.read_type_info()
    }
}
