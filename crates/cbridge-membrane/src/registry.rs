//! Boundary registry: bookkeeping of live foreign resources.
//!
//! Every handle and buffer gets a [`TokenId`] issued here. Ids come from a
//! monotonically increasing counter and are never reused, so a stale id can
//! never alias a newer resource. Entries are added when a resource is wrapped
//! and removed when it is released; whatever is left at shutdown leaked.
//!
//! The registry only observes. It never frees anything.
//!
//! Thread-safe via sharded `parking_lot::Mutex`. Writers lock one shard;
//! [`BoundaryRegistry::snapshot`] locks every shard in index order, so it sees
//! a state the registry actually passed through.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Origin;

/// Number of shards for registry locks (power of 2).
const NUM_SHARDS: usize = 16;

/// Registry-issued identity of a foreign resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenId(u64);

impl TokenId {
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What kind of resource an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Handle,
    Buffer,
}

/// Allocation metadata recorded for a live resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationMeta {
    pub kind: ResourceKind,
    /// Size in bytes of the foreign allocation, when known.
    pub size: usize,
    pub origin: Origin,
    /// Name of the call that created the resource.
    pub site: &'static str,
}

impl AllocationMeta {
    #[must_use]
    pub const fn handle(site: &'static str, size: usize) -> Self {
        Self {
            kind: ResourceKind::Handle,
            size,
            origin: Origin::Foreign,
            site,
        }
    }

    #[must_use]
    pub const fn buffer(site: &'static str, size: usize, origin: Origin) -> Self {
        Self {
            kind: ResourceKind::Buffer,
            size,
            origin,
            site,
        }
    }
}

/// A live entry as seen by [`BoundaryRegistry::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveEntry {
    pub id: TokenId,
    #[serde(flatten)]
    pub meta: AllocationMeta,
}

/// Thread-safe registry of live foreign resources.
pub struct BoundaryRegistry {
    shards: Box<[Mutex<HashMap<TokenId, AllocationMeta>>]>,
    next_id: AtomicU64,
    live: AtomicUsize,
    high_water: AtomicUsize,
}

impl BoundaryRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        let shards: Vec<Mutex<HashMap<TokenId, AllocationMeta>>> = (0..NUM_SHARDS)
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards: shards.into_boxed_slice(),
            next_id: AtomicU64::new(1),
            live: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    /// Issue a fresh id. Ids start at 1 and are never handed out twice.
    pub(crate) fn issue(&self) -> TokenId {
        TokenId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Track a live resource. Called only from handle/buffer construction.
    pub(crate) fn record(&self, id: TokenId, meta: AllocationMeta) {
        let mut shard = self.shard(id).lock();
        let previous = shard.insert(id, meta);
        debug_assert!(previous.is_none(), "token {id} recorded twice");
        // Count after inserting, under the shard lock: `live` never runs
        // ahead of the map.
        if previous.is_none() {
            let live = self.live.fetch_add(1, Ordering::AcqRel) + 1;
            self.high_water.fetch_max(live, Ordering::AcqRel);
        }
    }

    /// Stop tracking a resource. Returns the metadata if it was live.
    pub(crate) fn forget(&self, id: TokenId) -> Option<AllocationMeta> {
        let mut shard = self.shard(id).lock();
        if !shard.contains_key(&id) {
            return None;
        }
        // Uncount before removing, for the same reason as in `record`.
        self.live.fetch_sub(1, Ordering::AcqRel);
        shard.remove(&id)
    }

    /// Whether `id` is currently live.
    #[must_use]
    pub fn contains(&self, id: TokenId) -> bool {
        self.shard(id).lock().contains_key(&id)
    }

    /// Metadata for a live id.
    #[must_use]
    pub fn lookup(&self, id: TokenId) -> Option<AllocationMeta> {
        self.shard(id).lock().get(&id).cloned()
    }

    /// All live entries, sorted by id.
    ///
    /// Every shard is held at once while reading, so the result is the exact
    /// set of entries live at a single instant.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LiveEntry> {
        // Index order; `record` and `forget` hold at most one shard.
        let guards: Vec<_> = self.shards.iter().map(|shard| shard.lock()).collect();
        let mut entries: Vec<LiveEntry> = guards
            .iter()
            .flat_map(|shard| {
                shard.iter().map(|(id, meta)| LiveEntry {
                    id: *id,
                    meta: meta.clone(),
                })
            })
            .collect();
        drop(guards);
        entries.sort_by_key(|e| e.id);
        entries
    }

    /// Number of live entries.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Largest live count ever reached. Never exceeds the true peak of
    /// simultaneously live entries.
    #[must_use]
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    fn shard(&self, id: TokenId) -> &Mutex<HashMap<TokenId, AllocationMeta>> {
        &self.shards[(id.0 as usize) % NUM_SHARDS]
    }
}

impl Default for BoundaryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BoundaryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryRegistry")
            .field("live", &self.live_count())
            .field("high_water", &self.high_water())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_start_at_one() {
        let registry = BoundaryRegistry::new();
        let a = registry.issue();
        let b = registry.issue();
        assert_eq!(a.get(), 1);
        assert!(b > a);
    }

    #[test]
    fn record_and_forget_cycle() {
        let registry = BoundaryRegistry::new();
        let id = registry.issue();
        registry.record(id, AllocationMeta::handle("init_record", 280));
        assert!(registry.contains(id));
        assert_eq!(registry.live_count(), 1);

        let meta = registry.forget(id).expect("entry should be live");
        assert_eq!(meta.site, "init_record");
        assert_eq!(meta.size, 280);
        assert!(registry.is_empty());
        assert!(registry.forget(id).is_none());
    }

    #[test]
    fn snapshot_is_sorted_and_complete() {
        let registry = BoundaryRegistry::new();
        let ids: Vec<TokenId> = (0..40).map(|_| registry.issue()).collect();
        for id in &ids {
            registry.record(*id, AllocationMeta::buffer("alloc", 8, Origin::Foreign));
        }
        let snap = registry.snapshot();
        assert_eq!(snap.len(), 40);
        assert!(snap.windows(2).all(|w| w[0].id < w[1].id));
        for id in ids {
            registry.forget(id);
        }
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn high_water_tracks_peak() {
        let registry = BoundaryRegistry::new();
        let a = registry.issue();
        let b = registry.issue();
        registry.record(a, AllocationMeta::handle("x", 0));
        registry.record(b, AllocationMeta::handle("x", 0));
        registry.forget(a);
        registry.forget(b);
        let c = registry.issue();
        registry.record(c, AllocationMeta::handle("x", 0));
        assert_eq!(registry.high_water(), 2);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn snapshot_never_shows_entries_that_were_not_live_together() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicBool;
        use std::thread;

        const CYCLES: usize = 50_000;

        let registry = Arc::new(BoundaryRegistry::new());
        let done = Arc::new(AtomicBool::new(false));

        // One entry at a time, walking through every shard.
        let writer = {
            let registry = Arc::clone(&registry);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for _ in 0..CYCLES {
                    let id = registry.issue();
                    registry.record(id, AllocationMeta::handle("cycle", 8));
                    assert!(registry.forget(id).is_some());
                }
                done.store(true, Ordering::Release);
            })
        };

        let mut samples = 0usize;
        loop {
            let finished = done.load(Ordering::Acquire);
            let snap = registry.snapshot();
            assert!(snap.len() <= 1, "snapshot showed {} entries", snap.len());
            assert!(registry.live_count() <= 1);
            samples += 1;
            if finished {
                break;
            }
        }
        writer.join().unwrap();

        assert!(samples > 0);
        assert!(registry.is_empty());
        assert_eq!(registry.high_water(), 1);
    }

    #[test]
    fn snapshot_serializes_flat() {
        let registry = BoundaryRegistry::new();
        let id = registry.issue();
        registry.record(id, AllocationMeta::buffer("compress", 12, Origin::Foreign));
        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json[0]["id"], 1);
        assert_eq!(json[0]["kind"], "buffer");
        assert_eq!(json[0]["origin"], "foreign");
        assert_eq!(json[0]["site"], "compress");
    }
}
