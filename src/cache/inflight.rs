//! Per-key load serialization for cache clients.
//!
//! Each key with a load in progress owns a slot holding the load lock and a
//! generation counter. Deleting a key bumps the generation of its slot, so a
//! load that started before the delete can tell that its result is stale and
//! must not be stored.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
struct LoadSlot {
    lock: Arc<Mutex<()>>,
    generation: AtomicU64,
}

/// Map of keys currently being loaded.
///
/// A caller holding the [`InflightGuard`] for a key is the only one running
/// that key's loader; other callers wait on the same lock and then re-check
/// the cache.
#[derive(Default)]
pub struct InflightLoads {
    slots: DashMap<String, Arc<LoadSlot>>,
}

impl InflightLoads {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> InflightGuard<'_> {
        let slot = self.slots.entry(key.to_string()).or_default().clone();
        let guard = Arc::clone(&slot.lock).lock_owned().await;
        let generation = slot.generation.load(Ordering::Acquire);
        InflightGuard {
            loads: self,
            key: key.to_string(),
            slot,
            generation,
            guard: Some(guard),
        }
    }

    /// Mark any load of `key` that is in progress as stale.
    pub fn invalidate(&self, key: &str) {
        if let Some(slot) = self.slots.get(key) {
            slot.generation.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Number of keys with a load in progress or waiters queued.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

pub struct InflightGuard<'a> {
    loads: &'a InflightLoads,
    key: String,
    slot: Arc<LoadSlot>,
    generation: u64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InflightGuard<'_> {
    /// False once the key was invalidated after this guard was acquired.
    pub fn is_current(&self) -> bool {
        self.slot.generation.load(Ordering::Acquire) == self.generation
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map and this guard still reference the slot: nobody is
        // waiting, so the entry can go.
        self.loads.slots.remove_if(&self.key, |_, slot| {
            Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) <= 2
        });
    }
}
