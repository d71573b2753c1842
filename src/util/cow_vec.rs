//! Chunked copy-on-write vector.
//!
//! Elements live in fixed-size chunks shared through `Arc`. Cloning the
//! vector only clones the chunk directory, and a write detaches just the
//! chunk it touches. The writer keeps one working copy and hands frozen
//! clones to readers.

use std::sync::Arc;

const CHUNK_SIZE: usize = 1024;

/// A vector whose clones share unmodified chunks.
#[derive(Debug)]
pub struct CowVec<T> {
    chunks: Vec<Arc<Vec<T>>>,
    len: usize,
}

impl<T> Clone for CowVec<T> {
    fn clone(&self) -> Self {
        CowVec {
            chunks: self.chunks.clone(),
            len: self.len,
        }
    }
}

impl<T> Default for CowVec<T> {
    fn default() -> Self {
        CowVec {
            chunks: Vec::new(),
            len: 0,
        }
    }
}

impl<T: Clone> CowVec<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.chunks[index / CHUNK_SIZE].get(index % CHUNK_SIZE)
    }

    /// Mutable access; detaches the containing chunk if it is shared.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        let chunk = Arc::make_mut(&mut self.chunks[index / CHUNK_SIZE]);
        chunk.get_mut(index % CHUNK_SIZE)
    }

    /// Overwrite an element. Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: T) {
        match self.get_mut(index) {
            Some(slot) => *slot = value,
            None => panic!("CowVec index {index} out of bounds (len {})", self.len),
        }
    }

    pub fn push(&mut self, value: T) {
        if self.len % CHUNK_SIZE == 0 {
            let mut chunk = Vec::with_capacity(CHUNK_SIZE);
            chunk.push(value);
            self.chunks.push(Arc::new(chunk));
        } else {
            let last = self.chunks.len() - 1;
            Arc::make_mut(&mut self.chunks[last]).push(value);
        }
        self.len += 1;
    }

    /// Grow to `new_len` with copies of `fill`, or truncate.
    pub fn resize(&mut self, new_len: usize, fill: T) {
        if new_len <= self.len {
            self.truncate(new_len);
            return;
        }
        while self.len < new_len {
            self.push(fill.clone());
        }
    }

    pub fn truncate(&mut self, new_len: usize) {
        if new_len >= self.len {
            return;
        }
        let keep_chunks = new_len.div_ceil(CHUNK_SIZE);
        self.chunks.truncate(keep_chunks);
        let tail = new_len % CHUNK_SIZE;
        if tail != 0 {
            if let Some(last) = self.chunks.last_mut() {
                Arc::make_mut(last).truncate(tail);
            }
        }
        self.len = new_len;
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }

    /// Number of chunks shared with at least one other clone.
    pub fn shared_chunks(&self) -> usize {
        self.chunks
            .iter()
            .filter(|chunk| Arc::strong_count(chunk) > 1)
            .count()
    }
}
