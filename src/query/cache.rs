use crate::event::VisitEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared, TTL-bounded snapshot of the full visit log.
///
/// Stats requests aggregate over the snapshot instead of re-reading the
/// store each time; ingestion invalidates it. Every invalidation bumps a
/// generation so a load that started before it cannot store stale events.
#[derive(Clone)]
pub struct SnapshotCache {
    entry: Arc<Mutex<Slot>>,
    ttl: Duration,
}

#[derive(Default)]
struct Slot {
    snapshot: Option<Snapshot>,
    generation: u64,
}

struct Snapshot {
    events: Arc<Vec<VisitEvent>>,
    loaded_at: Instant,
}

impl SnapshotCache {
    /// A TTL of 0 disables caching (every lookup misses).
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entry: Arc::new(Mutex::new(Slot::default())),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// The cached events, unless missing or expired.
    pub fn get(&self) -> Option<Arc<Vec<VisitEvent>>> {
        if self.ttl.is_zero() {
            return None;
        }
        self.entry
            .lock()
            .snapshot
            .as_ref()
            .filter(|snap| snap.loaded_at.elapsed() <= self.ttl)
            .map(|snap| Arc::clone(&snap.events))
    }

    /// Current generation. Read it before loading from the store and pass it
    /// to [`Self::insert_if_current`].
    pub fn generation(&self) -> u64 {
        self.entry.lock().generation
    }

    pub fn insert(&self, events: Arc<Vec<VisitEvent>>) {
        let generation = self.generation();
        self.insert_if_current(events, generation);
    }

    /// Store `events` unless an invalidation happened since `generation`
    /// was read. Returns whether the snapshot was stored.
    pub fn insert_if_current(&self, events: Arc<Vec<VisitEvent>>, generation: u64) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let mut slot = self.entry.lock();
        if slot.generation != generation {
            return false;
        }
        slot.snapshot = Some(Snapshot {
            events,
            loaded_at: Instant::now(),
        });
        true
    }

    pub fn invalidate(&self) {
        let mut slot = self.entry.lock();
        slot.snapshot = None;
        slot.generation = slot.generation.wrapping_add(1);
    }

    /// Number of events in the cached snapshot, 0 when none is held.
    pub fn len(&self) -> usize {
        self.entry
            .lock()
            .snapshot
            .as_ref()
            .map_or(0, |snap| snap.events.len())
    }

    /// Returns `true` when no snapshot is held.
    pub fn is_empty(&self) -> bool {
        self.entry.lock().snapshot.is_none()
    }
}
