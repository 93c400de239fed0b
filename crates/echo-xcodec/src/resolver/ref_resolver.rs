// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-frame identity bookkeeping for the `Null / Ref / NotNullValue /
//! RefValue` protocol.
//!
//! Ids are implicit: the n-th `RefValue` written in a frame is id `n` on both
//! sides, so the write side only needs an address map and the read side a
//! slot table indexed by id.

use std::any::{Any, TypeId};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::buffer::Writer;
use crate::error::{CodecError, Result};
use crate::types::RefFlag;

/// A decoded value held by the read side for later back-references.
///
/// `shared` keeps an `Rc<dyn Any>` view of reference-counted values so a
/// slot bound through a typed `Rc<T>` can be handed out to a dynamic slot and
/// vice versa.
pub struct RefSlot {
    value: Box<dyn Any>,
    shared: Option<Rc<dyn Any>>,
}

impl std::fmt::Debug for RefSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefSlot")
            .field("shared", &self.shared.is_some())
            .finish_non_exhaustive()
    }
}

impl RefSlot {
    /// Hold a plain value.
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            value: Box::new(value),
            shared: None,
        }
    }

    /// Hold a typed shared pointer.
    pub fn shared<T: Any>(rc: Rc<T>) -> Self {
        let erased: Rc<dyn Any> = rc.clone();
        Self {
            value: Box::new(rc),
            shared: Some(erased),
        }
    }

    /// Hold a dynamically typed shared pointer.
    pub fn dynamic(rc: Rc<dyn Any>) -> Self {
        Self {
            value: Box::new(Rc::clone(&rc)),
            shared: Some(rc),
        }
    }

    /// Borrow the held value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Erased view of a shared pointer, if this slot holds one.
    pub fn as_shared(&self) -> Option<&Rc<dyn Any>> {
        self.shared.as_ref()
    }
}

/// Write side: object address -> ref id, in first-seen order.
#[derive(Debug, Default)]
pub struct RefWriter {
    ids: FxHashMap<usize, u32>,
}

impl RefWriter {
    /// Emit `Ref` + id when `identity` was already written, otherwise emit
    /// `RefValue` and assign the next id. Returns `true` for a back-reference.
    pub fn write_ref_or_value(&mut self, w: &mut Writer, identity: usize) -> Result<bool> {
        if let Some(&id) = self.ids.get(&identity) {
            w.write_i8(RefFlag::Ref as i8);
            w.write_varuint32(id);
            return Ok(true);
        }
        let id = u32::try_from(self.ids.len())
            .map_err(|_| CodecError::LengthTooLarge(self.ids.len() as u64))?;
        self.ids.insert(identity, id);
        w.write_i8(RefFlag::RefValue as i8);
        Ok(false)
    }

    /// Number of identities written in this frame.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if no identity has been written.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forget every identity.
    pub fn reset(&mut self) {
        self.ids.clear();
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    id: u32,
    bound: bool,
}

/// Read side: slot table plus the stack of values still under construction.
#[derive(Debug, Default)]
pub struct RefReader {
    slots: Vec<Option<RefSlot>>,
    pending: Vec<Pending>,
}

impl RefReader {
    /// Reserve the next slot for a `RefValue` and mark it pending.
    pub fn begin(&mut self) -> Result<u32> {
        let id = u32::try_from(self.slots.len())
            .map_err(|_| CodecError::LengthTooLarge(self.slots.len() as u64))?;
        self.slots.push(None);
        self.pending.push(Pending { id, bound: false });
        Ok(id)
    }

    /// Bind a slot before its value is complete (cycle support).
    pub fn bind(&mut self, id: u32, slot: RefSlot) -> Result<()> {
        let entry = self
            .slots
            .get_mut(id as usize)
            .ok_or(CodecError::UnknownRefId(id))?;
        *entry = Some(slot);
        if let Some(p) = self.pending.iter_mut().rev().find(|p| p.id == id) {
            p.bound = true;
        }
        Ok(())
    }

    /// Pop the pending entry for `id`, binding `slot` unless the value
    /// already bound itself while decoding.
    pub fn finish(&mut self, id: u32, slot: Option<RefSlot>) -> Result<()> {
        let top = self
            .pending
            .pop()
            .ok_or(CodecError::RefStackCorrupted("finish without begin"))?;
        if top.id != id {
            return Err(CodecError::RefStackCorrupted("finish out of order"));
        }
        if !top.bound {
            if let Some(slot) = slot {
                let entry = self
                    .slots
                    .get_mut(id as usize)
                    .ok_or(CodecError::UnknownRefId(id))?;
                *entry = Some(slot);
            }
        }
        Ok(())
    }

    /// Resolve a back-reference.
    pub fn get(&self, id: u32) -> Result<&RefSlot> {
        match self.slots.get(id as usize) {
            Some(Some(slot)) => Ok(slot),
            Some(None) if self.pending.iter().any(|p| p.id == id) => {
                Err(CodecError::PendingRefUnbound(id))
            }
            _ => Err(CodecError::UnknownRefId(id)),
        }
    }

    /// Depth of the pending stack.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop every slot and pending entry.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.pending.clear();
    }
}

/// Key of a canonical entry: decoded Rust type, 128-bit content hash, length.
type CanonicalKey = (TypeId, u128, usize);

/// Merges byte-identical immutable values decoded within one frame.
#[derive(Debug, Default)]
pub struct CanonicalCache {
    entries: FxHashMap<CanonicalKey, (Box<[u8]>, RefSlot)>,
    hits: u64,
}

impl CanonicalCache {
    /// Return the cached slot for `bytes`, if an exact match exists.
    pub fn lookup(&mut self, ty: TypeId, bytes: &[u8]) -> Option<&RefSlot> {
        let key = (ty, content_hash(bytes), bytes.len());
        match self.entries.get(&key) {
            Some((cached, slot)) if **cached == *bytes => {
                self.hits += 1;
                trace!(len = bytes.len(), "canonical hit");
                Some(slot)
            }
            _ => None,
        }
    }

    /// Remember `slot` under `bytes` unless the cache is at `limit`.
    pub fn insert(&mut self, ty: TypeId, bytes: &[u8], slot: RefSlot, limit: Option<usize>) {
        if limit.is_some_and(|limit| self.entries.len() >= limit) {
            return;
        }
        let key = (ty, content_hash(bytes), bytes.len());
        self.entries.entry(key).or_insert_with(|| (bytes.into(), slot));
    }

    /// Entries currently cached.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hits since the last reset.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Drop every entry.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.hits = 0;
    }
}

fn content_hash(bytes: &[u8]) -> u128 {
    let digest = blake3::hash(bytes);
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&digest.as_bytes()[..16]);
    u128::from_le_bytes(raw)
}
