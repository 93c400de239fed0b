// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The serializer contract and the reference-flag protocol layered on it.
//!
//! Every codec implements [`Serializer::write_data`] / [`Serializer::read_data`]
//! for its payload and declares its capabilities (nullability, identity,
//! canonicalization, wire kind). The provided [`Serializer::write`] and
//! [`Serializer::read`] wrap the payload with the ref flag, identity
//! bookkeeping, optional type info and the nesting-depth guard.

use std::rc::Rc;

use crate::config::Config;
use crate::context::{ReadContext, ReadTypeInfo, WriteContext};
use crate::error::{CodecError, Result};
use crate::meta::FieldType;
use crate::resolver::{RefSlot, TypeResolver};
use crate::types::{type_id, RefFlag, RefMode};

pub mod any;
pub mod array;
pub mod binary;
pub mod collection;
pub mod datetime;
pub mod enum_;
pub mod ext;
pub mod list;
pub mod map;
pub mod option;
pub mod primitive;
pub mod rc;
pub mod set;
pub mod skip;
pub mod string;
pub mod struct_;
pub mod union;

/// Static classification of a serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A built-in type with a fixed wire id.
    Builtin(u32),
    /// A user struct; needs registration.
    Struct,
    /// A user enum; needs registration.
    Enum,
    /// A user union; needs registration.
    Union,
    /// A type handled by a registered [`ext::ExtSerializer`].
    Ext,
    /// A dynamically typed slot; the concrete type travels as type info.
    Dynamic,
}

/// Codec contract for a type.
pub trait Serializer: Sized + 'static {
    /// Wire classification.
    fn type_kind() -> TypeKind;

    /// Key under which the resolver knows this type. Wrappers such as
    /// `Option<T>` and `Rc<T>` report their inner type's key.
    fn registry_key() -> std::any::TypeId {
        std::any::TypeId::of::<Self>()
    }

    /// The type has an in-band "absent" value.
    fn is_nullable_type() -> bool {
        false
    }

    /// Values have an identity that tracking can share.
    fn is_reference_trackable_type() -> bool {
        false
    }

    /// Byte-identical values may be merged into one instance on read.
    fn is_canonicalizable_type() -> bool {
        false
    }

    /// Value substituted when a `Null` flag is decoded.
    fn default_value() -> Self;

    /// True for the absent value of a nullable type.
    fn is_none(&self) -> bool {
        false
    }

    /// Stable address used as the tracking key.
    fn ref_identity(&self) -> Option<usize> {
        None
    }

    /// Slot form kept by the read side for back-references and the
    /// canonical cache.
    fn to_ref_slot(&self) -> Option<RefSlot> {
        None
    }

    /// Rebuild a value from a slot bound earlier in the frame.
    fn from_ref_slot(_slot: &RefSlot) -> Option<Self> {
        None
    }

    /// Concrete runtime type, used to decide whether collection elements
    /// share one type.
    fn runtime_type(&self) -> std::any::TypeId {
        Self::registry_key()
    }

    /// Whether type info must precede the payload at a declared call site.
    fn requires_type_info(config: &Config) -> bool {
        match Self::type_kind() {
            TypeKind::Dynamic => true,
            TypeKind::Struct => config.compatible(),
            _ => false,
        }
    }

    /// Wire type of a field of this type.
    fn field_type(resolver: &TypeResolver, config: &Config) -> Result<FieldType> {
        let id = match Self::type_kind() {
            TypeKind::Builtin(id) => id,
            TypeKind::Dynamic => type_id::UNKNOWN,
            _ => type_id::kind(resolver.info_for::<Self>()?.wire_id()),
        };
        Ok(FieldType {
            type_id: id,
            nullable: Self::is_nullable_type(),
            tracking: config.track_ref() && Self::is_reference_trackable_type(),
            generics: Vec::new(),
        })
    }

    /// Field list of a struct schema; empty for everything else.
    fn struct_fields(_resolver: &TypeResolver, _config: &Config) -> Result<Vec<crate::meta::FieldInfo>> {
        Ok(Vec::new())
    }

    /// Encode the payload; presence and type are already established.
    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()>;

    /// Decode the payload.
    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self>;

    /// Decode the payload when type info was read (compatible structs use
    /// the remote schema carried by `info`).
    fn read_data_with(ctx: &mut ReadContext<'_>, _info: &ReadTypeInfo) -> Result<Self> {
        Self::read_data(ctx)
    }

    /// Decode the payload of a value that owns ref slot `ref_id`.
    fn read_payload(
        ctx: &mut ReadContext<'_>,
        info: Option<&ReadTypeInfo>,
        _ref_id: Option<u32>,
    ) -> Result<Self> {
        match info {
            Some(info) => Self::read_data_with(ctx, info),
            None => Self::read_data(ctx),
        }
    }

    /// Decode the payload straight into a shared pointer. Interior-mutable
    /// types bind the pointer to `ref_id` before decoding their contents so
    /// cycles can close.
    fn read_shared(
        ctx: &mut ReadContext<'_>,
        info: Option<&ReadTypeInfo>,
        _ref_id: Option<u32>,
    ) -> Result<Rc<Self>> {
        Ok(Rc::new(Self::read_payload(ctx, info, None)?))
    }

    /// Emit this value's type info.
    fn write_type_info(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_static_type_info::<Self>()
    }

    /// Read and check type info for this type.
    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<ReadTypeInfo> {
        ctx.read_static_type_info::<Self>()
    }

    /// Full protocol write: ref flag, identity, type info, payload.
    fn write(&self, ctx: &mut WriteContext<'_>, ref_mode: RefMode, write_type_info: bool) -> Result<()> {
        write_value(self, ctx, ref_mode, write_type_info)
    }

    /// Full protocol read, mirroring [`Serializer::write`].
    fn read(ctx: &mut ReadContext<'_>, ref_mode: RefMode, read_type_info: bool) -> Result<Self> {
        let source = if read_type_info {
            InfoSource::Inline
        } else {
            InfoSource::Absent
        };
        read_value(ctx, ref_mode, source)
    }
}

/// Where a reader finds the type info of a value.
#[derive(Debug, Clone, Copy)]
pub enum InfoSource<'i> {
    /// No type info on the wire.
    Absent,
    /// Type info precedes the payload.
    Inline,
    /// Type info was read once for a run of values.
    Known(&'i ReadTypeInfo),
}

/// Protocol write used by [`Serializer::write`].
pub fn write_value<T: Serializer>(
    value: &T,
    ctx: &mut WriteContext<'_>,
    ref_mode: RefMode,
    write_type_info: bool,
) -> Result<()> {
    match ref_mode {
        RefMode::None => {
            if value.is_none() {
                return Err(CodecError::UnexpectedNull(std::any::type_name::<T>()));
            }
        }
        RefMode::NullOnly => {
            if value.is_none() {
                ctx.writer().write_i8(RefFlag::Null as i8);
                return Ok(());
            }
            ctx.writer().write_i8(RefFlag::NotNullValue as i8);
        }
        RefMode::Tracking => {
            if value.is_none() {
                ctx.writer().write_i8(RefFlag::Null as i8);
                return Ok(());
            }
            match value.ref_identity() {
                Some(identity) => {
                    if ctx.write_ref_or_value(identity)? {
                        return Ok(());
                    }
                }
                None => ctx.writer().write_i8(RefFlag::NotNullValue as i8),
            }
        }
    }
    ctx.enter()?;
    if write_type_info {
        value.write_type_info(ctx)?;
    }
    value.write_data(ctx)?;
    ctx.leave();
    Ok(())
}

/// Protocol read used by [`Serializer::read`] and the container codecs.
pub fn read_value<T: Serializer>(
    ctx: &mut ReadContext<'_>,
    ref_mode: RefMode,
    source: InfoSource<'_>,
) -> Result<T> {
    if ref_mode == RefMode::None {
        return read_body(ctx, source, None);
    }
    let raw = ctx.reader().read_i8()?;
    match RefFlag::from_i8(raw)? {
        RefFlag::Null => Ok(T::default_value()),
        RefFlag::NotNullValue => read_body(ctx, source, None),
        RefFlag::Ref if ref_mode == RefMode::Tracking => {
            let id = ctx.reader().read_varuint32()?;
            let slot = ctx.refs().get(id)?;
            T::from_ref_slot(slot).ok_or(CodecError::RefTypeMismatch {
                id,
                expected: std::any::type_name::<T>(),
            })
        }
        RefFlag::RefValue if ref_mode == RefMode::Tracking => {
            let id = ctx.refs().begin()?;
            let value: T = read_body(ctx, source, Some(id))?;
            let slot = value.to_ref_slot();
            ctx.refs().finish(id, slot)?;
            Ok(value)
        }
        RefFlag::Ref | RefFlag::RefValue => Err(CodecError::InvalidRefFlag(raw)),
    }
}

fn read_body<T: Serializer>(
    ctx: &mut ReadContext<'_>,
    source: InfoSource<'_>,
    ref_id: Option<u32>,
) -> Result<T> {
    ctx.enter()?;
    let value = match source {
        InfoSource::Absent => T::read_payload(ctx, None, ref_id)?,
        InfoSource::Inline => {
            let info = T::read_type_info(ctx)?;
            T::read_payload(ctx, Some(&info), ref_id)?
        }
        InfoSource::Known(info) => T::read_payload(ctx, Some(info), ref_id)?,
    };
    ctx.leave();
    Ok(value)
}

/// Ref mode of a declared slot of type `T` under `config`.
pub fn slot_ref_mode<T: Serializer>(config: &Config) -> RefMode {
    RefMode::for_slot(
        T::is_nullable_type(),
        config.track_ref() && T::is_reference_trackable_type(),
    )
}

/// Ref mode and type-info presence of a top-level value.
pub(crate) fn top_level_mode<T: Serializer>(config: &Config) -> (RefMode, bool) {
    let mode = if config.track_ref() && T::is_reference_trackable_type() {
        RefMode::Tracking
    } else {
        RefMode::None
    };
    (mode, T::requires_type_info(config))
}

pub use any::DynValue;
pub use enum_::EnumSerializer;
pub use ext::{Ext, ExtSerializer};
pub use list::Stack;
pub use primitive::{VarInt32, VarInt64};
pub use struct_::{
    read_compatible_fields, read_field, read_matching_field, read_struct_data, write_field,
    write_struct_data, StructSerializer,
};
pub use union::{read_union_payload, write_union_payload, UnionSerializer};
