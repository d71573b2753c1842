//! Generation tracking for deferred reclamation.
//!
//! Readers register the generation they observed by taking a
//! [`GenerationGuard`]. The writer bumps the generation after publishing a
//! change and retires superseded data into a [`GenerationHoldList`] stamped
//! with the generation current at retirement. Retired data is dropped only
//! once no guard older than or equal to that stamp remains.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

/// Generation number.
pub type Generation = u64;

#[derive(Debug, Default)]
struct ReaderTable {
    /// Live guard count per generation.
    counts: BTreeMap<Generation, usize>,
}

/// Tracks the current generation and the generations held by readers.
#[derive(Debug, Default)]
pub struct GenerationHandler {
    current: AtomicU64,
    readers: Arc<Mutex<ReaderTable>>,
}

impl GenerationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation.
    pub fn current_generation(&self) -> Generation {
        self.current.load(Ordering::Acquire)
    }

    /// Advance the generation. Only the writer calls this.
    pub fn inc_generation(&self) -> Generation {
        let next = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(generation = next, "generation bumped");
        next
    }

    /// Register a reader at the current generation.
    pub fn take_guard(&self) -> GenerationGuard {
        let mut table = self.readers.lock();
        // Read under the lock so a concurrent reclaim cannot miss this reader.
        let generation = self.current.load(Ordering::Acquire);
        *table.counts.entry(generation).or_insert(0) += 1;
        GenerationGuard {
            generation,
            readers: Arc::clone(&self.readers),
        }
    }

    /// Oldest generation any reader may still observe.
    pub fn oldest_used_generation(&self) -> Generation {
        let table = self.readers.lock();
        table
            .counts
            .keys()
            .next()
            .copied()
            .unwrap_or_else(|| self.current.load(Ordering::Acquire))
    }

    /// Number of live reader guards.
    pub fn reader_count(&self) -> usize {
        self.readers.lock().counts.values().sum()
    }
}

/// A registered reader. Dropping the guard releases the generation.
#[derive(Debug)]
pub struct GenerationGuard {
    generation: Generation,
    readers: Arc<Mutex<ReaderTable>>,
}

impl GenerationGuard {
    /// Generation observed when the guard was taken.
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        let mut table = self.readers.lock();
        if let Some(count) = table.counts.get_mut(&self.generation) {
            *count -= 1;
            if *count == 0 {
                table.counts.remove(&self.generation);
            }
        }
    }
}

/// Items retired by the writer, waiting for readers to move on.
#[derive(Debug)]
pub struct GenerationHoldList<T> {
    held: Vec<(Generation, T)>,
}

impl<T> Default for GenerationHoldList<T> {
    fn default() -> Self {
        GenerationHoldList { held: Vec::new() }
    }
}

impl<T> GenerationHoldList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retire an item at the given generation.
    pub fn hold(&mut self, generation: Generation, item: T) {
        self.held.push((generation, item));
    }

    /// Release every item retired before `oldest_used`.
    pub fn reclaim(&mut self, oldest_used: Generation) -> Vec<T> {
        let mut released = Vec::new();
        let mut kept = Vec::with_capacity(self.held.len());
        for (generation, item) in self.held.drain(..) {
            if generation < oldest_used {
                released.push(item);
            } else {
                kept.push((generation, item));
            }
        }
        self.held = kept;
        released
    }

    /// Release everything regardless of readers. Used on teardown.
    pub fn reclaim_all(&mut self) -> Vec<T> {
        self.held.drain(..).map(|(_, item)| item).collect()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.held.iter().map(|(_, item)| item)
    }
}
