// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The serialization engine: registrations plus per-call session state.
//!
//! A frame is one header byte followed by the top-level value:
//!
//! ```text
//! header : bit 0 top-level value is null, bit 1 cross-language format
//! value  : [ref flag] [type info] payload
//! ```
//!
//! Registrations and config sit behind an `Arc` so clones (and
//! [`ThreadLocalEngine`](crate::ThreadLocalEngine)) share them; the session
//! state is per engine and reset at the start of every call.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::buffer::Reader;
use crate::config::Config;
use crate::context::{ReadContext, ReadState, WriteContext, WriteState};
use crate::error::{CodecError, Result};
use crate::resolver::TypeResolver;
use crate::serializer::ext::ExtSerializer;
use crate::serializer::{top_level_mode, Serializer};
use crate::types::frame;

#[derive(Debug, Clone)]
pub(crate) struct Shared {
    pub(crate) config: Config,
    pub(crate) resolver: TypeResolver,
}

impl Shared {
    pub(crate) fn new(config: Config) -> Self {
        let resolver = TypeResolver::new(&config);
        Self { config, resolver }
    }
}

/// Serializes and deserializes frames.
///
/// Not `Sync`: the session state is mutated by every call. Share one
/// configuration across threads with [`ThreadLocalEngine`](crate::ThreadLocalEngine)
/// or clone the engine per thread.
#[derive(Debug)]
pub struct Engine {
    shared: Arc<Shared>,
    write_state: WriteState,
    read_state: ReadState,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Clone for Engine {
    fn clone(&self) -> Self {
        Self::from_shared(Arc::clone(&self.shared))
    }
}

impl Engine {
    /// Engine with `config` and only the built-in types.
    pub fn new(config: Config) -> Self {
        Self::from_shared(Arc::new(Shared::new(config)))
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            write_state: WriteState::default(),
            read_state: ReadState::default(),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Type registrations.
    pub fn resolver(&self) -> &TypeResolver {
        &self.shared.resolver
    }

    /// Register a struct, enum or union under a numeric id.
    ///
    /// # Errors
    /// [`CodecError::DuplicateRegistration`] if `T` or the id is taken;
    /// [`CodecError::InvalidConfig`] for ids above
    /// [`MAX_USER_ID`](crate::resolver::MAX_USER_ID) or non-user types.
    pub fn register<T: Serializer>(&mut self, user_id: u32) -> Result<()> {
        Arc::make_mut(&mut self.shared).resolver.register::<T>(user_id)
    }

    /// Register a struct, enum or union under a namespace and name.
    ///
    /// # Errors
    /// As [`Engine::register`]; the name must be non-empty and encodable.
    pub fn register_by_name<T: Serializer>(&mut self, namespace: &str, name: &str) -> Result<()> {
        Arc::make_mut(&mut self.shared)
            .resolver
            .register_by_name::<T>(namespace, name)
    }

    /// Register a custom codec for `T`, used through [`Ext<T>`](crate::Ext).
    ///
    /// # Errors
    /// As [`Engine::register`].
    pub fn register_ext<T, S>(&mut self, user_id: u32, serializer: S) -> Result<()>
    where
        T: Default + 'static,
        S: ExtSerializer<T>,
    {
        Arc::make_mut(&mut self.shared)
            .resolver
            .register_ext::<T, S>(user_id, serializer)
    }

    /// Register a custom codec for `T` under a namespace and name.
    ///
    /// # Errors
    /// As [`Engine::register_by_name`].
    pub fn register_ext_by_name<T, S>(&mut self, namespace: &str, name: &str, serializer: S) -> Result<()>
    where
        T: Default + 'static,
        S: ExtSerializer<T>,
    {
        Arc::make_mut(&mut self.shared)
            .resolver
            .register_ext_by_name::<T, S>(namespace, name, serializer)
    }

    /// Encode `value` as a new frame.
    ///
    /// # Errors
    /// Any [`CodecError`] raised while writing; nothing is returned on error.
    pub fn serialize<T: Serializer>(&mut self, value: &T) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.serialize_into(value, &mut out)?;
        Ok(out)
    }

    /// Append a frame for `value` to `out`. On error `out` is left as it was.
    ///
    /// # Errors
    /// As [`Engine::serialize`].
    pub fn serialize_into<T: Serializer>(&mut self, value: &T, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        self.write_state.reset();
        let spare = self.write_state.swap_buffer(std::mem::take(out));
        let result = self.write_frame(value);
        *out = self.write_state.swap_buffer(spare);
        match result {
            Ok(()) => {
                debug!(
                    bytes = out.len() - start,
                    refs = self.write_state.ref_count(),
                    metas = self.write_state.type_meta_count(),
                    "frame written"
                );
                Ok(())
            }
            Err(err) => {
                out.truncate(start);
                Err(err)
            }
        }
    }

    fn write_frame<T: Serializer>(&mut self, value: &T) -> Result<()> {
        let Shared { config, resolver } = &*self.shared;
        let mut ctx = WriteContext::new(config, resolver, &mut self.write_state);
        let header = if config.xlang() { frame::XLANG } else { 0 };
        if value.is_none() {
            ctx.writer().write_u8(header | frame::IS_NULL);
            return Ok(());
        }
        ctx.writer().write_u8(header);
        let (ref_mode, type_info) = top_level_mode::<T>(config);
        value.write(&mut ctx, ref_mode, type_info)
    }

    /// Decode one frame that must span all of `bytes`.
    ///
    /// # Errors
    /// [`CodecError::MalformedFrame`] / [`CodecError::FrameModeMismatch`] for a
    /// bad header, [`CodecError::TrailingBytes`] if input is left over, and
    /// any error raised by the value's codec.
    pub fn deserialize<T: Serializer>(&mut self, bytes: &[u8]) -> Result<T> {
        self.read_state.reset();
        let result = self.read_frame(bytes);
        match &result {
            Ok(_) => debug!(
                bytes = bytes.len(),
                metas = self.read_state.type_meta_count(),
                canonical_hits = self.read_state.canonical_hits(),
                "frame read"
            ),
            Err(err) => warn!(%err, bytes = bytes.len(), "frame rejected"),
        }
        result
    }

    fn read_frame<T: Serializer>(&mut self, bytes: &[u8]) -> Result<T> {
        let Shared { config, resolver } = &*self.shared;
        let mut ctx = ReadContext::new(config, resolver, Reader::new(bytes), &mut self.read_state);
        let header = ctx
            .reader()
            .read_u8()
            .map_err(|_| CodecError::MalformedFrame("empty input"))?;
        if header & !frame::KNOWN != 0 {
            return Err(CodecError::MalformedFrame("reserved header bits set"));
        }
        let found = header & frame::XLANG != 0;
        if found != config.xlang() {
            return Err(CodecError::FrameModeMismatch {
                expected: config.xlang(),
                found,
            });
        }
        let value = if header & frame::IS_NULL != 0 {
            if !T::is_nullable_type() {
                return Err(CodecError::UnexpectedNull(std::any::type_name::<T>()));
            }
            T::default_value()
        } else {
            let (ref_mode, type_info) = top_level_mode::<T>(config);
            T::read(&mut ctx, ref_mode, type_info)?
        };
        let remaining = ctx.reader().remaining();
        if remaining != 0 {
            return Err(CodecError::TrailingBytes { remaining });
        }
        Ok(value)
    }

    /// Session state of the last serialize call.
    pub fn write_state(&self) -> &WriteState {
        &self.write_state
    }

    /// Session state of the last deserialize call.
    pub fn read_state(&self) -> &ReadState {
        &self.read_state
    }
}
