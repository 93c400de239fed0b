// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Registry mapping Rust types to wire identities and erased codecs.
//!
//! Registration happens before any frame is processed; afterwards the
//! resolver is immutable and may be shared across threads behind an `Arc`.
//! Each entry carries a small harness of monomorphized function pointers so
//! dynamically typed slots can dispatch to the concrete codec without
//! reflection.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::Config;
use crate::context::{ReadContext, ReadTypeInfo, WriteContext};
use crate::error::{CodecError, Result};
use crate::meta::{
    struct_hash, FieldInfo, MetaString, TypeIdentity, TypeMeta, NAMESPACE_ENCODER,
    TYPE_NAME_ENCODER,
};
use crate::serializer::ext::{Ext, ExtSerializer};
use crate::serializer::{DynValue, Serializer, TypeKind};
use crate::types::type_id;

/// Largest user id that still fits next to the kind byte.
pub const MAX_USER_ID: u32 = u32::MAX >> 8;

struct Harness {
    write_data: fn(&dyn Any, &mut WriteContext<'_>) -> Result<()>,
    read_data: fn(&mut ReadContext<'_>, &ReadTypeInfo) -> Result<DynValue>,
    fields: fn(&TypeResolver, &Config) -> Result<Vec<FieldInfo>>,
}

fn write_erased<T: Serializer>(value: &dyn Any, ctx: &mut WriteContext<'_>) -> Result<()> {
    value
        .downcast_ref::<T>()
        .ok_or(CodecError::ValueTypeMismatch(std::any::type_name::<T>()))?
        .write_data(ctx)
}

fn read_erased<T: Serializer>(ctx: &mut ReadContext<'_>, info: &ReadTypeInfo) -> Result<DynValue> {
    Ok(Rc::new(T::read_data_with(ctx, info)?))
}

/// Everything the engine knows about one registered or built-in type.
pub struct TypeInfo {
    rust_type: TypeId,
    rust_name: &'static str,
    wire_id: u32,
    names: Option<(MetaString, MetaString)>,
    harness: Harness,
    ext: Option<Box<dyn Any + Send + Sync>>,
    type_meta: OnceLock<Arc<[u8]>>,
    version: OnceLock<i32>,
}

impl std::fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeInfo")
            .field("rust_name", &self.rust_name)
            .field("wire_id", &self.wire_id)
            .field("names", &self.names.as_ref().map(|(n, t)| (n.as_str(), t.as_str())))
            .finish_non_exhaustive()
    }
}

impl TypeInfo {
    fn new<T: Serializer>(wire_id: u32, names: Option<(MetaString, MetaString)>) -> Self {
        Self {
            rust_type: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
            wire_id,
            names,
            harness: Harness {
                write_data: write_erased::<T>,
                read_data: read_erased::<T>,
                fields: T::struct_fields,
            },
            ext: None,
            type_meta: OnceLock::new(),
            version: OnceLock::new(),
        }
    }

    /// Rust type this entry describes.
    pub fn rust_type(&self) -> TypeId {
        self.rust_type
    }

    /// Rust type name, for diagnostics.
    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    /// Wire id: full id for numeric registrations, the kind for named ones.
    pub fn wire_id(&self) -> u32 {
        self.wire_id
    }

    /// Namespace and type name of a named registration.
    pub fn names(&self) -> Option<(&MetaString, &MetaString)> {
        self.names.as_ref().map(|(ns, name)| (ns, name))
    }

    /// Encode a value of this type through the erased harness.
    pub fn write_any(&self, value: &dyn Any, ctx: &mut WriteContext<'_>) -> Result<()> {
        (self.harness.write_data)(value, ctx)
    }

    /// Decode a value of this type through the erased harness.
    pub fn read_any(&self, ctx: &mut ReadContext<'_>, info: &ReadTypeInfo) -> Result<DynValue> {
        (self.harness.read_data)(ctx, info)
    }

    /// The custom serializer of an ext registration.
    pub fn ext_serializer<T: 'static>(&self) -> Result<&dyn ExtSerializer<T>> {
        self.ext
            .as_ref()
            .and_then(|ext| ext.downcast_ref::<Box<dyn ExtSerializer<T>>>())
            .map(AsRef::as_ref)
            .ok_or(CodecError::UnregisteredType(self.rust_name))
    }
}

/// Type registry of an engine.
#[derive(Debug, Clone)]
pub struct TypeResolver {
    compatible: bool,
    by_rust: FxHashMap<TypeId, Arc<TypeInfo>>,
    by_id: FxHashMap<u32, Arc<TypeInfo>>,
    by_name: FxHashMap<(String, String), Arc<TypeInfo>>,
}

impl TypeResolver {
    /// A resolver knowing only the built-in types.
    pub fn new(config: &Config) -> Self {
        let mut resolver = Self {
            compatible: config.compatible(),
            by_rust: FxHashMap::default(),
            by_id: FxHashMap::default(),
            by_name: FxHashMap::default(),
        };
        resolver.add_builtin::<bool>(type_id::BOOL);
        resolver.add_builtin::<i8>(type_id::INT8);
        resolver.add_builtin::<i16>(type_id::INT16);
        resolver.add_builtin::<i32>(type_id::INT32);
        resolver.add_builtin::<i64>(type_id::INT64);
        resolver.add_builtin::<crate::serializer::VarInt32>(type_id::VARINT32);
        resolver.add_builtin::<crate::serializer::VarInt64>(type_id::VARINT64);
        resolver.add_builtin::<u8>(type_id::UINT8);
        resolver.add_builtin::<u16>(type_id::UINT16);
        resolver.add_builtin::<u32>(type_id::UINT32);
        resolver.add_builtin::<u64>(type_id::UINT64);
        resolver.add_builtin::<half::f16>(type_id::FLOAT16);
        resolver.add_builtin::<f32>(type_id::FLOAT32);
        resolver.add_builtin::<f64>(type_id::FLOAT64);
        resolver.add_builtin::<String>(type_id::STRING);
        resolver.add_builtin::<Vec<DynValue>>(type_id::LIST);
        resolver.add_builtin::<HashMap<String, DynValue>>(type_id::MAP);
        resolver.add_builtin::<chrono::TimeDelta>(type_id::DURATION);
        resolver.add_builtin::<chrono::NaiveDateTime>(type_id::TIMESTAMP);
        resolver.add_builtin::<chrono::NaiveDate>(type_id::DATE);
        resolver.add_builtin::<Bytes>(type_id::BINARY);
        resolver.add_builtin::<Box<[bool]>>(type_id::BOOL_ARRAY);
        resolver.add_builtin::<Box<[i8]>>(type_id::INT8_ARRAY);
        resolver.add_builtin::<Box<[i16]>>(type_id::INT16_ARRAY);
        resolver.add_builtin::<Box<[i32]>>(type_id::INT32_ARRAY);
        resolver.add_builtin::<Box<[i64]>>(type_id::INT64_ARRAY);
        resolver.add_builtin::<Box<[f32]>>(type_id::FLOAT32_ARRAY);
        resolver.add_builtin::<Box<[f64]>>(type_id::FLOAT64_ARRAY);
        // writable from dynamic slots; reads of these ids materialize the
        // entries above
        resolver.add_write_only::<Rc<str>>(type_id::STRING);
        resolver.add_write_only::<BTreeMap<String, DynValue>>(type_id::MAP);
        resolver
    }

    fn add_builtin<T: Serializer>(&mut self, wire_id: u32) {
        let info = Arc::new(TypeInfo::new::<T>(wire_id, None));
        self.by_rust.insert(TypeId::of::<T>(), Arc::clone(&info));
        self.by_id.insert(wire_id, info);
    }

    fn add_write_only<T: Serializer>(&mut self, wire_id: u32) {
        let info = Arc::new(TypeInfo::new::<T>(wire_id, None));
        self.by_rust.insert(TypeId::of::<T>(), info);
    }

    fn user_kind<T: Serializer>(&self, named: bool) -> Result<u32> {
        let kind = match (T::type_kind(), named, self.compatible) {
            (TypeKind::Struct, false, false) => type_id::STRUCT,
            (TypeKind::Struct, false, true) => type_id::COMPATIBLE_STRUCT,
            (TypeKind::Struct, true, false) => type_id::NAMED_STRUCT,
            (TypeKind::Struct, true, true) => type_id::NAMED_COMPATIBLE_STRUCT,
            (TypeKind::Enum, false, _) => type_id::ENUM,
            (TypeKind::Enum, true, _) => type_id::NAMED_ENUM,
            (TypeKind::Union, false, _) => type_id::UNION,
            (TypeKind::Union, true, _) => type_id::NAMED_UNION,
            (TypeKind::Ext, _, _) => {
                return Err(CodecError::InvalidConfig(
                    "ext types are registered with their serializer",
                ))
            }
            (TypeKind::Builtin(_) | TypeKind::Dynamic, _, _) => {
                return Err(CodecError::InvalidConfig("built-in types cannot be registered"))
            }
        };
        Ok(kind)
    }

    /// Register `T` under a numeric user id.
    pub fn register<T: Serializer>(&mut self, user_id: u32) -> Result<()> {
        let kind = self.user_kind::<T>(false)?;
        let info = TypeInfo::new::<T>(user_wire_id(user_id, kind)?, None);
        self.insert(info)
    }

    /// Register `T` under a namespace and type name.
    pub fn register_by_name<T: Serializer>(&mut self, namespace: &str, name: &str) -> Result<()> {
        let kind = self.user_kind::<T>(true)?;
        let info = TypeInfo::new::<T>(kind, Some(encode_names(namespace, name)?));
        self.insert(info)
    }

    /// Register a custom serializer for `T` under a numeric user id; values
    /// travel wrapped in [`Ext`].
    pub fn register_ext<T, S>(&mut self, user_id: u32, serializer: S) -> Result<()>
    where
        T: Default + 'static,
        S: ExtSerializer<T>,
    {
        let mut info = TypeInfo::new::<Ext<T>>(user_wire_id(user_id, type_id::EXT)?, None);
        let boxed: Box<dyn ExtSerializer<T>> = Box::new(serializer);
        info.ext = Some(Box::new(boxed));
        self.insert(info)
    }

    /// Register a custom serializer for `T` under a namespace and type name.
    pub fn register_ext_by_name<T, S>(&mut self, namespace: &str, name: &str, serializer: S) -> Result<()>
    where
        T: Default + 'static,
        S: ExtSerializer<T>,
    {
        let mut info = TypeInfo::new::<Ext<T>>(type_id::NAMED_EXT, Some(encode_names(namespace, name)?));
        let boxed: Box<dyn ExtSerializer<T>> = Box::new(serializer);
        info.ext = Some(Box::new(boxed));
        self.insert(info)
    }

    fn insert(&mut self, info: TypeInfo) -> Result<()> {
        if self.by_rust.contains_key(&info.rust_type) {
            return Err(CodecError::DuplicateRegistration(info.rust_name.to_owned()));
        }
        let name_key = info
            .names
            .as_ref()
            .map(|(ns, name)| (ns.as_str().to_owned(), name.as_str().to_owned()));
        match &name_key {
            Some(key) if self.by_name.contains_key(key) => {
                return Err(CodecError::DuplicateRegistration(format!("{}.{}", key.0, key.1)));
            }
            None if self.by_id.contains_key(&info.wire_id) => {
                return Err(CodecError::DuplicateRegistration(format!(
                    "wire id {}",
                    info.wire_id
                )));
            }
            _ => {}
        }
        debug!(rust = info.rust_name, wire_id = info.wire_id, named = name_key.is_some(), "registered type");
        let info = Arc::new(info);
        self.by_rust.insert(info.rust_type, Arc::clone(&info));
        match name_key {
            Some(key) => {
                self.by_name.insert(key, info);
            }
            None => {
                self.by_id.insert(info.wire_id, info);
            }
        }
        Ok(())
    }

    /// Entry for `T` (or the type it wraps).
    pub fn info_for<T: Serializer>(&self) -> Result<&Arc<TypeInfo>> {
        self.by_rust
            .get(&T::registry_key())
            .ok_or(CodecError::UnregisteredType(std::any::type_name::<T>()))
    }

    /// Entry for a Rust type id.
    pub fn info_for_type_id(&self, ty: TypeId) -> Option<&Arc<TypeInfo>> {
        self.by_rust.get(&ty)
    }

    /// Entry for a full wire id.
    pub fn info_by_id(&self, wire_id: u32) -> Option<&Arc<TypeInfo>> {
        self.by_id.get(&wire_id)
    }

    /// Entry for a namespace and type name.
    pub fn info_by_name(&self, namespace: &str, name: &str) -> Option<&Arc<TypeInfo>> {
        self.by_name.get(&(namespace.to_owned(), name.to_owned()))
    }

    pub(crate) fn info_for_identity(&self, identity: &TypeIdentity) -> Option<&Arc<TypeInfo>> {
        match identity {
            TypeIdentity::Id(id) => self.info_by_id(*id),
            TypeIdentity::Named {
                namespace,
                type_name,
            } => self.info_by_name(namespace.as_str(), type_name.as_str()),
        }
    }

    /// Local schema of a struct entry.
    pub fn type_meta(&self, info: &TypeInfo, config: &Config) -> Result<TypeMeta> {
        let identity = match &info.names {
            Some((namespace, type_name)) => TypeIdentity::Named {
                namespace: namespace.clone(),
                type_name: type_name.clone(),
            },
            None => TypeIdentity::Id(info.wire_id),
        };
        Ok(TypeMeta::new(identity, (info.harness.fields)(self, config)?))
    }

    /// Encoded schema of a struct entry, built once.
    pub fn type_meta_bytes(&self, info: &TypeInfo, config: &Config) -> Result<Arc<[u8]>> {
        if let Some(bytes) = info.type_meta.get() {
            return Ok(Arc::clone(bytes));
        }
        let bytes: Arc<[u8]> = self.type_meta(info, config)?.to_bytes()?.into();
        Ok(Arc::clone(info.type_meta.get_or_init(|| bytes)))
    }

    /// Layout hash of a struct entry, built once.
    pub fn struct_version(&self, info: &TypeInfo, config: &Config) -> Result<i32> {
        if let Some(version) = info.version.get() {
            return Ok(*version);
        }
        let version = struct_hash(&(info.harness.fields)(self, config)?);
        Ok(*info.version.get_or_init(|| version))
    }
}

fn user_wire_id(user_id: u32, kind: u32) -> Result<u32> {
    if user_id > MAX_USER_ID {
        return Err(CodecError::InvalidConfig("user id does not fit in 24 bits"));
    }
    Ok(type_id::user(user_id, kind))
}

fn encode_names(namespace: &str, name: &str) -> Result<(MetaString, MetaString)> {
    if name.is_empty() {
        return Err(CodecError::InvalidConfig("type name must not be empty"));
    }
    Ok((NAMESPACE_ENCODER.encode(namespace)?, TYPE_NAME_ENCODER.encode(name)?))
}
