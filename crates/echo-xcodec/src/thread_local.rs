// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! An engine handle that can be shared across threads.
//!
//! The registrations are immutable once the handle is built; every thread
//! that uses it lazily gets a private [`Engine`] over the same `Arc`.
//! A thread's cached engines are released when the last handle clone is
//! dropped on that thread, or on that thread's next use of any handle.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;

use crate::engine::{Engine, Shared};
use crate::error::Result;
use crate::serializer::Serializer;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static ENGINES: RefCell<FxHashMap<u64, Cached>> = RefCell::new(FxHashMap::default());
}

struct Cached {
    owner: Weak<Handle>,
    engine: Engine,
}

#[derive(Debug)]
struct Handle {
    id: u64,
    shared: Arc<Shared>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        // other threads evict theirs on next use or at exit
        let _ = ENGINES.try_with(|engines| {
            if let Ok(mut engines) = engines.try_borrow_mut() {
                engines.remove(&self.id);
            }
        });
    }
}

/// `Send + Sync` front end over per-thread engines.
///
/// ```
/// use echo_xcodec::{Engine, ThreadLocalEngine};
///
/// let codec = ThreadLocalEngine::new(Engine::default());
/// let worker = codec.clone();
/// std::thread::spawn(move || {
///     let bytes = worker.serialize(&vec![1i32, 2]).unwrap();
///     assert_eq!(worker.deserialize::<Vec<i32>>(&bytes).unwrap(), vec![1, 2]);
/// })
/// .join()
/// .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ThreadLocalEngine {
    handle: Arc<Handle>,
}

impl ThreadLocalEngine {
    /// Freeze the config and registrations of `engine`.
    pub fn new(engine: Engine) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            handle: Arc::new(Handle {
                id,
                shared: Arc::clone(engine.shared()),
            }),
        }
    }

    /// Run `f` with this thread's engine. The engine is checked out for the
    /// duration of `f`; a nested call from inside `f` works on a temporary
    /// engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        let id = self.handle.id;
        let cached = ENGINES
            .try_with(|engines| engines.try_borrow_mut().ok().and_then(|mut map| map.remove(&id)))
            .ok()
            .flatten();
        let mut engine = cached.map_or_else(
            || Engine::from_shared(Arc::clone(&self.handle.shared)),
            |cached| cached.engine,
        );
        let out = f(&mut engine);
        let owner = Arc::downgrade(&self.handle);
        let _ = ENGINES.try_with(|engines| {
            if let Ok(mut map) = engines.try_borrow_mut() {
                // handles dropped on other threads leave their engines here
                map.retain(|_, cached| cached.owner.strong_count() > 0);
                map.insert(id, Cached { owner, engine });
            }
        });
        out
    }

    /// [`Engine::serialize`] on this thread's engine.
    ///
    /// # Errors
    /// As [`Engine::serialize`].
    pub fn serialize<T: Serializer>(&self, value: &T) -> Result<Vec<u8>> {
        self.with(|engine| engine.serialize(value))
    }

    /// [`Engine::serialize_into`] on this thread's engine.
    ///
    /// # Errors
    /// As [`Engine::serialize_into`].
    pub fn serialize_into<T: Serializer>(&self, value: &T, out: &mut Vec<u8>) -> Result<()> {
        self.with(|engine| engine.serialize_into(value, out))
    }

    /// [`Engine::deserialize`] on this thread's engine.
    ///
    /// # Errors
    /// As [`Engine::deserialize`].
    pub fn deserialize<T: Serializer>(&self, bytes: &[u8]) -> Result<T> {
        self.with(|engine| engine.deserialize(bytes))
    }
}

#[cfg(test)]
fn cached_engines() -> usize {
    ENGINES.with(|engines| engines.borrow().len())
}
