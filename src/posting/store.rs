//! Arena of posting lists addressed by [`EntryRef`] handles.
//!
//! Lists are immutable once stored. [`PostingStore::apply`] builds a new
//! list and returns a new handle; the superseded list leaves the working
//! arena but stays on hold, and its slot is not handed out again until
//! [`PostingStore::reclaim`] sees that no reader of an older generation
//! remains. Readers resolve handles through a [`FrozenPostings`] snapshot.

use std::collections::BTreeSet;
use std::mem;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::PostingConfig;
use crate::error::{AttributeError, Result};
use crate::generation::{Generation, GenerationHoldList};
use crate::posting::change::{self, PostingChange};
use crate::posting::entry_ref::EntryRef;
use crate::posting::list::{PostingKind, PostingList};
use crate::posting::memory::MemoryUsage;
use crate::util::cow_vec::CowVec;

type Slot = Option<Arc<PostingList>>;

/// A list taken out of the working arena.
#[derive(Debug)]
struct Retired {
    /// Slot to recycle on reclaim; `None` when the slot was refilled in place.
    slot: Option<u32>,
    list: Arc<PostingList>,
}

/// Writer state saved before a batch so a failed batch can be undone.
#[derive(Debug, Clone)]
pub struct PostingStoreCheckpoint {
    arena: CowVec<Slot>,
    free_slots: Vec<u32>,
    pending_len: usize,
    doc_id_limit: u32,
    bit_vector_capacity: u32,
    bit_vectors_fit: bool,
    live_lists: usize,
    live_entries: usize,
    live_bytes: usize,
    bit_vector_bytes: usize,
    hold_bytes: usize,
}

/// Read-only view of the posting arena at one point in time.
#[derive(Debug, Clone, Default)]
pub struct FrozenPostings {
    arena: CowVec<Slot>,
}

impl FrozenPostings {
    /// Resolve a handle. The null handle resolves to `None`.
    pub fn get(&self, handle: EntryRef) -> Option<&Arc<PostingList>> {
        handle
            .slot()
            .and_then(|slot| self.arena.get(slot))
            .and_then(|slot| slot.as_ref())
    }
}

/// Owner of all posting lists of one attribute.
#[derive(Debug)]
pub struct PostingStore {
    kind: PostingKind,
    config: PostingConfig,
    bit_vectors_enabled: bool,
    arena: CowVec<Slot>,
    free_slots: Vec<u32>,
    pending: Vec<Retired>,
    hold: GenerationHoldList<Retired>,
    /// Live lists keyed by `(len, slot)`.
    by_len: BTreeSet<(usize, u32)>,
    /// Slots of live lists carrying a bit vector.
    shadowed: BTreeSet<u32>,
    doc_id_limit: u32,
    bit_vector_capacity: u32,
    bit_vectors_fit: bool,
    /// Lists examined by the last bit vector resize.
    resize_visited: usize,
    live_lists: usize,
    live_entries: usize,
    live_bytes: usize,
    bit_vector_bytes: usize,
    hold_bytes: usize,
}

impl PostingStore {
    /// Create an empty store.
    pub fn new(kind: PostingKind, config: PostingConfig, bit_vectors_enabled: bool) -> Self {
        PostingStore {
            kind,
            config,
            bit_vectors_enabled,
            arena: CowVec::new(),
            free_slots: Vec::new(),
            pending: Vec::new(),
            hold: GenerationHoldList::new(),
            by_len: BTreeSet::new(),
            shadowed: BTreeSet::new(),
            doc_id_limit: 0,
            bit_vector_capacity: 0,
            bit_vectors_fit: true,
            resize_visited: 0,
            live_lists: 0,
            live_entries: 0,
            live_bytes: 0,
            bit_vector_bytes: 0,
            hold_bytes: 0,
        }
    }

    pub fn kind(&self) -> PostingKind {
        self.kind
    }

    pub fn bit_vectors_enabled(&self) -> bool {
        self.bit_vectors_enabled
    }

    /// Resolve a handle in the working arena.
    pub fn get(&self, handle: EntryRef) -> Option<&Arc<PostingList>> {
        handle
            .slot()
            .and_then(|slot| self.arena.get(slot))
            .and_then(|slot| slot.as_ref())
    }

    /// Number of live posting lists.
    pub fn live_lists(&self) -> usize {
        self.live_lists
    }

    /// Number of live lists carrying a bit vector.
    pub fn bit_vector_count(&self) -> usize {
        self.shadowed.len()
    }

    /// Merge additions and removals into the list behind `handle`.
    ///
    /// A null handle creates a new list. The returned handle addresses the
    /// merged list, or is null when the merged list is empty. The list
    /// behind `handle` is never modified. Inputs need not be sorted.
    pub fn apply(
        &mut self,
        handle: EntryRef,
        additions: &[(u32, i32)],
        removals: &[u32],
    ) -> Result<EntryRef> {
        let normalized;
        let (additions, removals) = if change::is_normalized(additions, removals) {
            (additions, removals)
        } else {
            normalized = PostingChange::from_parts(additions.to_vec(), removals.to_vec());
            (normalized.additions(), normalized.removals())
        };

        let old = handle.slot().map(|slot| match self.arena.get(slot) {
            Some(Some(list)) => (slot, Arc::clone(list)),
            _ => panic!("posting list {handle} is not live"),
        });
        if additions.is_empty() && removals.is_empty() {
            return Ok(handle);
        }

        let empty = PostingList::new(self.kind);
        let base = old.as_ref().map(|(_, list)| list.as_ref()).unwrap_or(&empty);
        let mut merged = base.merge(additions, removals)?;

        let entries = self.live_entries - base.len() + merged.len();
        if entries > self.config.max_posting_entries {
            return Err(AttributeError::resource_exhausted(format!(
                "posting store limit of {} entries reached",
                self.config.max_posting_entries
            )));
        }

        if let Some((slot, list)) = old {
            self.retire(slot, list);
        }
        if merged.is_empty() {
            return Ok(EntryRef::NULL);
        }

        if self.wants_bit_vector(merged.len()) {
            self.try_attach_bit_vector(&mut merged);
        }
        let slot = self.allocate_slot();
        self.account_live(slot as usize, &merged);
        self.arena.set(slot as usize, Some(Arc::new(merged)));
        Ok(EntryRef::from_slot(slot))
    }

    /// Release the list behind `handle`. Readers keep seeing it until the
    /// next reclaim past the current generation.
    pub fn clear(&mut self, handle: EntryRef) {
        let Some(slot) = handle.slot() else {
            return;
        };
        if let Some(Some(list)) = self.arena.get(slot) {
            let list = Arc::clone(list);
            self.retire(slot, list);
        }
    }

    /// Grow or shrink the document id space covered by bit vectors.
    ///
    /// Lists at or above the density threshold get a shadow sized to
    /// `capacity`; shadows of lists below it are dropped, and shadows of
    /// any other length are rebuilt. Returns `false` when bit vectors are
    /// disabled or do not fit the configured budget; in the latter case
    /// every shadow is dropped and queries fall back to plain list
    /// iteration.
    ///
    /// Only lists at or above the threshold and lists already carrying a
    /// shadow are examined. A call that changes neither the capacity nor
    /// the threshold touches no list.
    pub fn resize_bit_vectors(&mut self, size: u32, capacity: u32) -> bool {
        if !self.bit_vectors_enabled {
            return false;
        }
        let capacity = capacity.max(size);
        let threshold = self.config.bit_vector_limit(size);
        let unchanged = capacity == self.bit_vector_capacity
            && threshold == self.config.bit_vector_limit(self.doc_id_limit);
        self.doc_id_limit = size;
        if unchanged {
            self.resize_visited = 0;
            return self.bit_vectors_fit;
        }
        self.bit_vector_capacity = capacity;

        let shadow_bytes = (capacity as usize).div_ceil(8);
        let qualifying: Vec<u32> = self
            .by_len
            .range((threshold, 0)..)
            .map(|&(_, slot)| slot)
            .collect();
        let fits = qualifying.len() * shadow_bytes <= self.config.max_bit_vector_bytes;
        if !fits {
            warn!(
                needed_bytes = qualifying.len() * shadow_bytes,
                budget_bytes = self.config.max_bit_vector_bytes,
                "bit vector resize failed, falling back to posting lists"
            );
        }

        let mut candidates = self.shadowed.clone();
        if fits {
            candidates.extend(qualifying);
        }
        self.resize_visited = candidates.len();

        for slot in candidates {
            let Some(Some(list)) = self.arena.get(slot as usize) else {
                continue;
            };
            let list = Arc::clone(list);
            let wanted = fits && list.len() >= threshold;
            let stale = match list.bit_vector() {
                Some(bits) => !wanted || bits.len() != list.bit_vector_len_for(capacity as usize),
                None => wanted,
            };
            if !stale {
                continue;
            }

            let mut rebuilt = (*list).clone();
            if wanted {
                rebuilt.attach_bit_vector(capacity as usize);
            } else {
                rebuilt.detach_bit_vector();
            }
            let slot = slot as usize;
            self.unaccount_live(slot, &list);
            self.hold_bytes += list.memory_usage();
            self.pending.push(Retired { slot: None, list });
            self.account_live(slot, &rebuilt);
            self.arena.set(slot, Some(Arc::new(rebuilt)));
        }
        self.bit_vectors_fit = fits;
        fits
    }

    /// Accounting for all lists.
    pub fn memory_usage(&self) -> MemoryUsage {
        let slot_bytes = mem::size_of::<Slot>();
        let used = self.live_bytes + self.live_lists * slot_bytes;
        let dead = (self.arena.len() - self.live_lists) * slot_bytes;
        MemoryUsage::new(used + dead + self.hold_bytes, used, dead, self.hold_bytes)
    }

    /// Snapshot the working arena for readers.
    pub fn freeze(&self) -> FrozenPostings {
        FrozenPostings {
            arena: self.arena.clone(),
        }
    }

    /// Stamp lists retired since the last call with `generation`.
    pub fn assign_generation(&mut self, generation: Generation) {
        for retired in self.pending.drain(..) {
            self.hold.hold(generation, retired);
        }
    }

    /// Drop held lists retired before `oldest_used` and recycle their slots.
    pub fn reclaim(&mut self, oldest_used: Generation) -> usize {
        let released = self.hold.reclaim(oldest_used);
        for retired in &released {
            self.hold_bytes -= retired.list.memory_usage();
            if let Some(slot) = retired.slot {
                self.free_slots.push(slot);
            }
        }
        if !released.is_empty() {
            debug!(
                released = released.len(),
                oldest_used, "reclaimed posting lists"
            );
        }
        released.len()
    }

    /// Save writer state before a batch.
    pub fn checkpoint(&self) -> PostingStoreCheckpoint {
        PostingStoreCheckpoint {
            arena: self.arena.clone(),
            free_slots: self.free_slots.clone(),
            pending_len: self.pending.len(),
            doc_id_limit: self.doc_id_limit,
            bit_vector_capacity: self.bit_vector_capacity,
            bit_vectors_fit: self.bit_vectors_fit,
            live_lists: self.live_lists,
            live_entries: self.live_entries,
            live_bytes: self.live_bytes,
            bit_vector_bytes: self.bit_vector_bytes,
            hold_bytes: self.hold_bytes,
        }
    }

    /// Undo everything since `checkpoint`. Lists created in between are
    /// dropped; lists retired in between become live again.
    pub fn rollback(&mut self, checkpoint: PostingStoreCheckpoint) {
        self.arena = checkpoint.arena;
        self.free_slots = checkpoint.free_slots;
        self.pending.truncate(checkpoint.pending_len);
        self.doc_id_limit = checkpoint.doc_id_limit;
        self.bit_vector_capacity = checkpoint.bit_vector_capacity;
        self.bit_vectors_fit = checkpoint.bit_vectors_fit;
        self.live_lists = checkpoint.live_lists;
        self.live_entries = checkpoint.live_entries;
        self.live_bytes = checkpoint.live_bytes;
        self.bit_vector_bytes = checkpoint.bit_vector_bytes;
        self.hold_bytes = checkpoint.hold_bytes;
        self.rebuild_indexes();
    }

    fn rebuild_indexes(&mut self) {
        let mut by_len = BTreeSet::new();
        let mut shadowed = BTreeSet::new();
        for (slot, list) in self.live() {
            by_len.insert((list.len(), slot as u32));
            if list.has_bit_vector() {
                shadowed.insert(slot as u32);
            }
        }
        self.by_len = by_len;
        self.shadowed = shadowed;
    }

    fn live(&self) -> impl Iterator<Item = (usize, &Arc<PostingList>)> + '_ {
        self.arena
            .iter()
            .enumerate()
            .filter_map(|(slot, list)| list.as_ref().map(|list| (slot, list)))
    }

    fn wants_bit_vector(&self, len: usize) -> bool {
        self.bit_vectors_enabled && len >= self.config.bit_vector_limit(self.doc_id_limit)
    }

    fn bit_vectors_fit(&self, list: &PostingList, capacity: u32) -> bool {
        let bytes = (capacity as usize).div_ceil(8);
        self.bit_vector_bytes - list.bit_vector_bytes() + bytes <= self.config.max_bit_vector_bytes
    }

    fn try_attach_bit_vector(&self, list: &mut PostingList) {
        let capacity = self.bit_vector_capacity.max(self.doc_id_limit);
        if self.bit_vectors_fit(list, capacity) {
            list.attach_bit_vector(capacity as usize);
        } else {
            debug!(len = list.len(), "bit vector budget exhausted, list kept plain");
        }
    }

    fn allocate_slot(&mut self) -> u32 {
        match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                self.arena.push(None);
                (self.arena.len() - 1) as u32
            }
        }
    }

    fn retire(&mut self, slot: usize, list: Arc<PostingList>) {
        self.arena.set(slot, None);
        self.unaccount_live(slot, &list);
        self.hold_bytes += list.memory_usage();
        self.pending.push(Retired {
            slot: Some(slot as u32),
            list,
        });
    }

    fn account_live(&mut self, slot: usize, list: &PostingList) {
        self.by_len.insert((list.len(), slot as u32));
        if list.has_bit_vector() {
            self.shadowed.insert(slot as u32);
        }
        self.live_lists += 1;
        self.live_entries += list.len();
        self.live_bytes += list.memory_usage();
        self.bit_vector_bytes += list.bit_vector_bytes();
    }

    fn unaccount_live(&mut self, slot: usize, list: &PostingList) {
        self.by_len.remove(&(list.len(), slot as u32));
        self.shadowed.remove(&(slot as u32));
        self.live_lists -= 1;
        self.live_entries -= list.len();
        self.live_bytes -= list.memory_usage();
        self.bit_vector_bytes -= list.bit_vector_bytes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_config() -> PostingConfig {
        PostingConfig {
            enable_bit_vectors: true,
            min_bit_vector_doc_freq: 2,
            bit_vector_doc_freq_divisor: 8,
            ..Default::default()
        }
    }

    fn contents(store: &PostingStore, handle: EntryRef) -> Vec<(u32, i32)> {
        store.get(handle).map(|list| list.to_vec()).unwrap_or_default()
    }

    #[test]
    fn test_apply_is_copy_on_write() {
        let mut store = PostingStore::new(PostingKind::Weighted, PostingConfig::default(), false);
        let first = store.apply(EntryRef::NULL, &[(3, 1), (7, 2)], &[]).unwrap();
        let frozen = store.freeze();

        let second = store.apply(first, &[(9, 1), (7, 5)], &[3]).unwrap();
        assert_ne!(first, second);
        assert_eq!(contents(&store, second), vec![(7, 5), (9, 1)]);

        // The snapshot still resolves the superseded list.
        let old = frozen.get(first).unwrap();
        assert_eq!(old.to_vec(), vec![(3, 1), (7, 2)]);
        assert!(store.get(first).is_none());
    }

    #[test]
    fn test_unsorted_input_is_normalized() {
        let mut store = PostingStore::new(PostingKind::Weighted, PostingConfig::default(), false);
        let handle = store
            .apply(EntryRef::NULL, &[(5, 1), (2, 3), (5, 4)], &[2, 9, 9])
            .unwrap();
        assert_eq!(contents(&store, handle), vec![(2, 3), (5, 4)]);
    }

    #[test]
    fn test_empty_change_keeps_handle() {
        let mut store = PostingStore::new(PostingKind::Plain, PostingConfig::default(), false);
        let handle = store.apply(EntryRef::NULL, &[(1, 1)], &[]).unwrap();
        assert_eq!(store.apply(handle, &[], &[]).unwrap(), handle);
        assert_eq!(store.apply(EntryRef::NULL, &[], &[4]).unwrap(), EntryRef::NULL);
    }

    #[test]
    fn test_removing_everything_yields_null() {
        let mut store = PostingStore::new(PostingKind::Plain, PostingConfig::default(), false);
        let handle = store.apply(EntryRef::NULL, &[(1, 1), (2, 1)], &[]).unwrap();
        let cleared = store.apply(handle, &[], &[1, 2]).unwrap();
        assert_eq!(cleared, EntryRef::NULL);
        assert_eq!(store.live_lists(), 0);
    }

    #[test]
    #[should_panic(expected = "is not live")]
    fn test_apply_to_released_handle_panics() {
        let mut store = PostingStore::new(PostingKind::Plain, PostingConfig::default(), false);
        let handle = store.apply(EntryRef::NULL, &[(1, 1)], &[]).unwrap();
        store.clear(handle);
        let _ = store.apply(handle, &[(2, 1)], &[]);
    }

    #[test]
    fn test_slots_recycled_only_after_reclaim() {
        let mut store = PostingStore::new(PostingKind::Plain, PostingConfig::default(), false);
        let first = store.apply(EntryRef::NULL, &[(1, 1)], &[]).unwrap();
        store.clear(first);
        store.assign_generation(1);

        let second = store.apply(EntryRef::NULL, &[(2, 1)], &[]).unwrap();
        assert_ne!(first, second);

        // A reader at generation 1 still blocks the release.
        assert_eq!(store.reclaim(1), 0);
        assert!(store.memory_usage().allocated_bytes_on_hold > 0);

        assert_eq!(store.reclaim(2), 1);
        assert_eq!(store.memory_usage().allocated_bytes_on_hold, 0);
        let third = store.apply(EntryRef::NULL, &[(3, 1)], &[]).unwrap();
        assert_eq!(third, first);
    }

    #[test]
    fn test_entry_limit_is_resource_exhausted() {
        let config = PostingConfig {
            max_posting_entries: 3,
            ..Default::default()
        };
        let mut store = PostingStore::new(PostingKind::Plain, config, false);
        let handle = store.apply(EntryRef::NULL, &[(1, 1), (2, 1)], &[]).unwrap();
        let err = store.apply(handle, &[(3, 1), (4, 1)], &[]).unwrap_err();
        assert!(err.is_resource_pressure());

        // The failed apply left the list untouched.
        assert_eq!(contents(&store, handle), vec![(1, 1), (2, 1)]);
    }

    #[test]
    fn test_bit_vectors_follow_density() {
        let mut store = PostingStore::new(PostingKind::Plain, dense_config(), true);
        assert!(store.resize_bit_vectors(16, 16));

        let sparse = store.apply(EntryRef::NULL, &[(1, 1)], &[]).unwrap();
        let dense = store
            .apply(EntryRef::NULL, &[(2, 1), (5, 1), (11, 1)], &[])
            .unwrap();
        assert!(!store.get(sparse).unwrap().has_bit_vector());
        let list = store.get(dense).unwrap();
        assert!(list.has_bit_vector());
        assert!(list.bit_vector_consistent());
        assert_eq!(store.bit_vector_count(), 1);

        let dense = store.apply(dense, &[(12, 1)], &[5]).unwrap();
        assert!(store.get(dense).unwrap().bit_vector_consistent());

        // Growing the doc id space raises the threshold to 64 / 8.
        assert!(store.resize_bit_vectors(64, 128));
        assert_eq!(store.bit_vector_count(), 0);
        assert!(store.resize_bit_vectors(8, 8));
        let list = store.get(dense).unwrap();
        assert!(list.has_bit_vector());
        assert!(list.bit_vector_consistent());
    }

    #[test]
    fn test_bit_vector_budget_degrades_to_plain_lists() {
        let config = PostingConfig {
            max_bit_vector_bytes: 4,
            ..dense_config()
        };
        let mut store = PostingStore::new(PostingKind::Plain, config, true);
        assert!(store.resize_bit_vectors(16, 16));
        let handle = store
            .apply(EntryRef::NULL, &[(1, 1), (2, 1), (3, 1), (4, 1)], &[])
            .unwrap();
        assert!(store.get(handle).unwrap().has_bit_vector());

        assert!(!store.resize_bit_vectors(16, 64));
        assert_eq!(store.bit_vector_count(), 0);
        assert_eq!(contents(&store, handle).len(), 4);
    }

    #[test]
    fn test_resize_skips_sparse_lists() {
        let mut store = PostingStore::new(PostingKind::Plain, dense_config(), true);
        for doc_id in 0..2000 {
            store.apply(EntryRef::NULL, &[(doc_id, 1)], &[]).unwrap();
        }
        let dense = store
            .apply(EntryRef::NULL, &[(1, 1), (2, 1), (3, 1)], &[])
            .unwrap();

        let mut capacity = 1;
        for size in 1..=2000u32 {
            if size > capacity {
                capacity *= 2;
            }
            store.resize_bit_vectors(size, capacity);
            // Single-document lists never qualify and are never visited.
            assert!(store.resize_visited <= 1, "size {size} visited {}", store.resize_visited);
        }
        assert_eq!(store.bit_vector_count(), 0);
        assert!(!store.get(dense).unwrap().has_bit_vector());
    }

    #[test]
    fn test_shrink_rebuilds_oversized_shadows() {
        let mut store = PostingStore::new(PostingKind::Plain, dense_config(), true);
        assert!(store.resize_bit_vectors(1024, 1024));
        let handle = store
            .apply(EntryRef::NULL, &[(1, 1), (2, 1), (3, 1)], &[])
            .unwrap();
        let list = store.get(handle).unwrap();
        assert_eq!(list.bit_vector().map(|bits| bits.len()), None);

        assert!(store.resize_bit_vectors(16, 1024));
        assert_eq!(store.get(handle).unwrap().bit_vector().map(|bits| bits.len()), Some(1024));
        assert_eq!(store.bit_vector_bytes, 128);

        assert!(store.resize_bit_vectors(16, 16));
        let list = store.get(handle).unwrap();
        assert_eq!(list.bit_vector().map(|bits| bits.len()), Some(16));
        assert!(list.bit_vector_consistent());
        assert_eq!(store.bit_vector_bytes, 2);
    }

    #[test]
    fn test_rollback_restores_bit_vector_index() {
        let mut store = PostingStore::new(PostingKind::Plain, dense_config(), true);
        assert!(store.resize_bit_vectors(16, 16));
        let checkpoint = store.checkpoint();
        store
            .apply(EntryRef::NULL, &[(1, 1), (2, 1), (3, 1)], &[])
            .unwrap();
        assert_eq!(store.bit_vector_count(), 1);
        store.rollback(checkpoint);
        assert_eq!(store.bit_vector_count(), 0);
        assert_eq!(store.live_lists(), 0);
    }

    #[test]
    fn test_disabled_bit_vectors() {
        let mut store = PostingStore::new(PostingKind::Plain, dense_config(), false);
        assert!(!store.resize_bit_vectors(16, 16));
        let handle = store
            .apply(EntryRef::NULL, &[(1, 1), (2, 1), (3, 1)], &[])
            .unwrap();
        assert!(!store.get(handle).unwrap().has_bit_vector());
    }

    #[test]
    fn test_rollback_restores_lists() {
        let mut store = PostingStore::new(PostingKind::Weighted, PostingConfig::default(), false);
        let handle = store.apply(EntryRef::NULL, &[(1, 2)], &[]).unwrap();
        let before = store.memory_usage();

        let checkpoint = store.checkpoint();
        let replaced = store.apply(handle, &[(4, 1)], &[]).unwrap();
        store.apply(EntryRef::NULL, &[(8, 1)], &[]).unwrap();
        assert!(store.get(handle).is_none());
        store.rollback(checkpoint);

        assert_eq!(contents(&store, handle), vec![(1, 2)]);
        assert!(store.get(replaced).is_none());
        assert_eq!(store.live_lists(), 1);
        assert_eq!(store.memory_usage(), before);
    }
}
