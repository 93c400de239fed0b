// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Write and read sessions.
//!
//! A session state struct is owned by the engine and reset at the top of
//! every call; the context borrows it together with the immutable config and
//! resolver for the duration of one frame.

use std::rc::Rc;
use std::sync::Arc;

use crate::buffer::{Reader, Writer};
use crate::config::Config;
use crate::error::{CodecError, Result};
use crate::meta::{TypeMeta, NAMESPACE_DECODER, TYPE_NAME_DECODER};
use crate::resolver::{
    CanonicalCache, MetaReader, MetaStringReader, MetaStringWriter, MetaWriter, RefReader,
    RefSlot, RefWriter, TypeInfo, TypeResolver,
};
use crate::serializer::{DynValue, Serializer, TypeKind};
use crate::types::type_id;

/// Mutable state of a serialize call.
#[derive(Debug, Default)]
pub struct WriteState {
    writer: Writer,
    refs: RefWriter,
    metas: MetaWriter,
    meta_strings: MetaStringWriter,
}

impl WriteState {
    /// Clear every per-frame table, keeping allocations.
    pub fn reset(&mut self) {
        self.writer.clear();
        self.refs.reset();
        self.metas.reset();
        self.meta_strings.reset();
    }

    pub(crate) fn swap_buffer(&mut self, buf: Vec<u8>) -> Vec<u8> {
        let previous = self.writer.take_vec();
        self.writer = Writer::from_vec(buf);
        previous
    }

    /// Identities assigned in the last frame.
    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    /// Schemas written in the last frame.
    pub fn type_meta_count(&self) -> usize {
        self.metas.len()
    }
}

/// Mutable state of a deserialize call.
#[derive(Debug, Default)]
pub struct ReadState {
    refs: RefReader,
    metas: MetaReader,
    meta_strings: MetaStringReader,
    canonical: CanonicalCache,
}

impl ReadState {
    /// Clear every per-frame table, keeping allocations.
    pub fn reset(&mut self) {
        self.refs.reset();
        self.metas.reset();
        self.meta_strings.reset();
        self.canonical.reset();
    }

    /// Schemas decoded in the last frame.
    pub fn type_meta_count(&self) -> usize {
        self.metas.len()
    }

    /// Canonical cache hits in the last frame.
    pub fn canonical_hits(&self) -> u64 {
        self.canonical.hits()
    }
}

/// Session handle passed to every `write_*` routine.
#[derive(Debug)]
pub struct WriteContext<'a> {
    config: &'a Config,
    resolver: &'a TypeResolver,
    state: &'a mut WriteState,
    depth: u32,
}

impl<'a> WriteContext<'a> {
    pub(crate) fn new(config: &'a Config, resolver: &'a TypeResolver, state: &'a mut WriteState) -> Self {
        Self {
            config,
            resolver,
            state,
            depth: 0,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// Type registrations.
    pub fn resolver(&self) -> &'a TypeResolver {
        self.resolver
    }

    /// Output cursor.
    pub fn writer(&mut self) -> &mut Writer {
        &mut self.state.writer
    }

    pub(crate) fn write_ref_or_value(&mut self, identity: usize) -> Result<bool> {
        let state = &mut *self.state;
        state.refs.write_ref_or_value(&mut state.writer, identity)
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        if self.depth >= self.config.max_depth() {
            return Err(CodecError::DepthExceeded {
                max: self.config.max_depth(),
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Emit type info for a registered type: wire id, then either the
    /// schema marker (compatible structs) or the name strings (named kinds).
    pub fn write_type_info(&mut self, info: &TypeInfo) -> Result<()> {
        let kind = type_id::kind(info.wire_id());
        self.state.writer.write_varuint32(info.wire_id());
        if type_id::is_compatible_struct(kind) {
            let encoded = self.resolver.type_meta_bytes(info, self.config)?;
            let state = &mut *self.state;
            state.metas.write(&mut state.writer, info.rust_type(), &encoded)?;
        } else if type_id::is_named(kind) {
            let (namespace, type_name) = info
                .names()
                .ok_or(CodecError::UnregisteredType(info.rust_name()))?;
            let state = &mut *self.state;
            state.meta_strings.write(&mut state.writer, namespace)?;
            state.meta_strings.write(&mut state.writer, type_name)?;
        }
        Ok(())
    }

    /// Emit the type info `T` is registered or built in with.
    pub fn write_static_type_info<T: Serializer>(&mut self) -> Result<()> {
        match T::type_kind() {
            TypeKind::Builtin(id) => {
                self.state.writer.write_varuint32(id);
                Ok(())
            }
            TypeKind::Dynamic => Err(CodecError::ValueTypeMismatch(std::any::type_name::<T>())),
            TypeKind::Struct | TypeKind::Enum | TypeKind::Union | TypeKind::Ext => {
                let info = self.resolver.info_for::<T>()?;
                self.write_type_info(info)
            }
        }
    }
}

/// Type info as read from the stream.
#[derive(Debug, Clone)]
pub struct ReadTypeInfo {
    wire_id: u32,
    local: Option<Arc<TypeInfo>>,
    meta: Option<Rc<TypeMeta>>,
    names: Option<(String, String)>,
}

impl ReadTypeInfo {
    /// Wire id as written (named kinds carry only the kind).
    pub fn wire_id(&self) -> u32 {
        self.wire_id
    }

    /// Internal kind.
    pub fn kind(&self) -> u32 {
        type_id::kind(self.wire_id)
    }

    /// Local registration matching the wire identity.
    pub fn local(&self) -> Result<&Arc<TypeInfo>> {
        if let Some(local) = &self.local {
            return Ok(local);
        }
        if let Some((namespace, name)) = &self.names {
            return Err(CodecError::UnknownTypeName {
                namespace: namespace.clone(),
                name: name.clone(),
            });
        }
        Err(CodecError::UnknownTypeId(self.wire_id))
    }

    /// Remote schema carried by a compatible struct.
    pub fn type_meta(&self) -> Option<&Rc<TypeMeta>> {
        self.meta.as_ref()
    }

    /// Type info implied by a declared built-in field type.
    pub(crate) fn declared(resolver: &TypeResolver, wire_id: u32) -> Self {
        Self {
            wire_id,
            local: resolver.info_by_id(wire_id).cloned(),
            meta: None,
            names: None,
        }
    }
}

/// Session handle passed to every `read_*` routine.
#[derive(Debug)]
pub struct ReadContext<'a> {
    config: &'a Config,
    resolver: &'a TypeResolver,
    reader: Reader<'a>,
    state: &'a mut ReadState,
    depth: u32,
}

impl<'a> ReadContext<'a> {
    pub(crate) fn new(
        config: &'a Config,
        resolver: &'a TypeResolver,
        reader: Reader<'a>,
        state: &'a mut ReadState,
    ) -> Self {
        Self {
            config,
            resolver,
            reader,
            state,
            depth: 0,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// Type registrations.
    pub fn resolver(&self) -> &'a TypeResolver {
        self.resolver
    }

    /// Input cursor.
    pub fn reader(&mut self) -> &mut Reader<'a> {
        &mut self.reader
    }

    pub(crate) fn refs(&mut self) -> &mut RefReader {
        &mut self.state.refs
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        if self.depth >= self.config.max_depth() {
            return Err(CodecError::DepthExceeded {
                max: self.config.max_depth(),
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Return the cached instance for the bytes in `start..end` or cache
    /// `value` under them.
    pub(crate) fn canonicalize<T: Serializer>(&mut self, value: T, start: usize) -> T {
        let bytes = self.reader.slice(start, self.reader.position());
        let ty = std::any::TypeId::of::<T>();
        if let Some(cached) = self
            .state
            .canonical
            .lookup(ty, bytes)
            .and_then(T::from_ref_slot)
        {
            return cached;
        }
        if let Some(slot) = value.to_ref_slot() {
            let limit = self.config.canonical_cache_limit();
            self.state.canonical.insert(ty, bytes, slot, limit);
        }
        value
    }

    /// Read type info and resolve it against local registrations. Unknown
    /// types are not an error here so that skipping can still consume them.
    pub fn read_type_info(&mut self) -> Result<ReadTypeInfo> {
        let wire_id = self.reader.read_varuint32()?;
        let kind = type_id::kind(wire_id);
        if type_id::is_compatible_struct(kind) {
            let meta = self.state.metas.read(&mut self.reader)?;
            let local = self.resolver.info_for_identity(meta.identity()).cloned();
            return Ok(ReadTypeInfo {
                wire_id,
                local,
                meta: Some(meta),
                names: None,
            });
        }
        if type_id::is_named(kind) {
            let namespace = self.state.meta_strings.read(&mut self.reader, NAMESPACE_DECODER)?;
            let name = self.state.meta_strings.read(&mut self.reader, TYPE_NAME_DECODER)?;
            let local = self
                .resolver
                .info_by_name(namespace.as_str(), name.as_str())
                .filter(|info| type_id::kind(info.wire_id()) == kind)
                .cloned();
            return Ok(ReadTypeInfo {
                wire_id,
                local,
                meta: None,
                names: Some((namespace.as_str().to_owned(), name.as_str().to_owned())),
            });
        }
        Ok(ReadTypeInfo {
            wire_id,
            local: self.resolver.info_by_id(wire_id).cloned(),
            meta: None,
            names: None,
        })
    }

    /// Read type info and check it names `T`.
    pub fn read_static_type_info<T: Serializer>(&mut self) -> Result<ReadTypeInfo> {
        let info = self.read_type_info()?;
        match T::type_kind() {
            TypeKind::Builtin(id) => {
                if info.wire_id != id {
                    return Err(CodecError::TypeMismatch {
                        expected: id,
                        found: info.wire_id,
                    });
                }
            }
            TypeKind::Dynamic => {}
            TypeKind::Struct | TypeKind::Enum | TypeKind::Union | TypeKind::Ext => {
                let expected = self.resolver.info_for::<T>()?;
                let matches = info
                    .local
                    .as_ref()
                    .is_some_and(|local| Arc::ptr_eq(local, expected));
                if !matches {
                    return Err(CodecError::TypeMismatch {
                        expected: expected.wire_id(),
                        found: info.wire_id,
                    });
                }
            }
        }
        Ok(info)
    }

    /// Close the slot of a skipped value: the decoded value when one was
    /// kept, otherwise a placeholder.
    pub(crate) fn bind_skipped(&mut self, id: u32, kept: Option<DynValue>) -> Result<()> {
        let slot = kept.map_or_else(|| RefSlot::new(()), RefSlot::dynamic);
        self.state.refs.finish(id, Some(slot))
    }
}
