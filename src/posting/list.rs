//! Posting list representation and merge.

use std::collections::TryReserveError;
use std::mem;

use bit_vec::BitVec;
use serde::{Deserialize, Serialize};

use crate::error::{AttributeError, Result};

/// Whether a posting list carries per-document weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingKind {
    /// Document ids only; every posting has weight 1.
    Plain,
    /// Document ids with weights.
    Weighted,
}

/// An ordered, duplicate-free list of documents holding one value.
///
/// Document ids are strictly increasing. Weighted lists keep a parallel
/// weight array. A bit vector shadow indexed by document id may be
/// attached for dense lists; when present it has exactly the bits of the
/// listed documents set.
#[derive(Debug, Clone)]
pub struct PostingList {
    kind: PostingKind,
    doc_ids: Vec<u32>,
    weights: Vec<i32>,
    bit_vector: Option<BitVec>,
}

impl PostingList {
    /// Create an empty posting list.
    pub fn new(kind: PostingKind) -> Self {
        PostingList {
            kind,
            doc_ids: Vec::new(),
            weights: Vec::new(),
            bit_vector: None,
        }
    }

    pub fn kind(&self) -> PostingKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    pub fn doc_ids(&self) -> &[u32] {
        &self.doc_ids
    }

    /// Weight of the posting at position `pos`.
    pub fn weight_at(&self, pos: usize) -> i32 {
        match self.kind {
            PostingKind::Plain => 1,
            PostingKind::Weighted => self.weights[pos],
        }
    }

    /// Iterate `(doc_id, weight)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, i32)> + '_ {
        self.doc_ids
            .iter()
            .enumerate()
            .map(move |(pos, &doc_id)| (doc_id, self.weight_at(pos)))
    }

    /// Collect the postings as `(doc_id, weight)` pairs.
    pub fn to_vec(&self) -> Vec<(u32, i32)> {
        self.iter().collect()
    }

    /// Position of the first posting with document id >= `doc_id`,
    /// searching from `from`.
    pub fn lower_bound(&self, doc_id: u32, from: usize) -> usize {
        let from = from.min(self.doc_ids.len());
        from + self.doc_ids[from..].partition_point(|&d| d < doc_id)
    }

    pub fn contains(&self, doc_id: u32) -> bool {
        if let Some(bits) = &self.bit_vector {
            return bits.get(doc_id as usize).unwrap_or(false);
        }
        self.doc_ids.binary_search(&doc_id).is_ok()
    }

    /// Weight of the given document, if listed.
    pub fn weight_of(&self, doc_id: u32) -> Option<i32> {
        self.doc_ids
            .binary_search(&doc_id)
            .ok()
            .map(|pos| self.weight_at(pos))
    }

    pub fn bit_vector(&self) -> Option<&BitVec> {
        self.bit_vector.as_ref()
    }

    pub fn has_bit_vector(&self) -> bool {
        self.bit_vector.is_some()
    }

    /// True if the bit vector, when present, matches the document list.
    pub fn bit_vector_consistent(&self) -> bool {
        let Some(bits) = &self.bit_vector else {
            return true;
        };
        let set_bits = bits.iter().filter(|bit| *bit).count();
        set_bits == self.doc_ids.len()
            && self
                .doc_ids
                .iter()
                .all(|&doc_id| bits.get(doc_id as usize).unwrap_or(false))
    }

    /// Bytes used by postings and bit vector.
    pub fn memory_usage(&self) -> usize {
        let entry_bytes = match self.kind {
            PostingKind::Plain => mem::size_of::<u32>(),
            PostingKind::Weighted => mem::size_of::<u32>() + mem::size_of::<i32>(),
        };
        mem::size_of::<Self>() + self.doc_ids.len() * entry_bytes + self.bit_vector_bytes()
    }

    pub fn bit_vector_bytes(&self) -> usize {
        self.bit_vector
            .as_ref()
            .map(|bits| bits.len().div_ceil(8))
            .unwrap_or(0)
    }

    /// Merge sorted, deduplicated additions and removals into a new list.
    ///
    /// An id present in both sequences ends up present with the added
    /// weight. The result carries no bit vector.
    pub(crate) fn merge(&self, additions: &[(u32, i32)], removals: &[u32]) -> Result<PostingList> {
        let capacity = self.doc_ids.len() + additions.len();
        let mut merged = PostingList::with_capacity(self.kind, capacity)?;

        let (mut i, mut a, mut r) = (0, 0, 0);
        loop {
            let existing = self.doc_ids.get(i).copied();
            let added = additions.get(a).map(|&(doc_id, _)| doc_id);
            let next = match (existing, added) {
                (None, None) => break,
                (Some(e), None) => e,
                (None, Some(d)) => d,
                (Some(e), Some(d)) => e.min(d),
            };

            if added == Some(next) {
                merged.push(next, additions[a].1);
                a += 1;
                if existing == Some(next) {
                    i += 1;
                }
                continue;
            }

            while r < removals.len() && removals[r] < next {
                r += 1;
            }
            if removals.get(r) != Some(&next) {
                merged.push(next, self.weight_at(i));
            }
            i += 1;
        }

        Ok(merged)
    }

    fn with_capacity(kind: PostingKind, capacity: usize) -> Result<PostingList> {
        let exhausted = |e: TryReserveError| {
            AttributeError::resource_exhausted(format!(
                "cannot allocate posting list of {capacity} entries: {e}"
            ))
        };
        let mut list = PostingList::new(kind);
        list.doc_ids.try_reserve_exact(capacity).map_err(exhausted)?;
        if kind == PostingKind::Weighted {
            list.weights.try_reserve_exact(capacity).map_err(exhausted)?;
        }
        Ok(list)
    }

    fn push(&mut self, doc_id: u32, weight: i32) {
        debug_assert!(self.doc_ids.last().is_none_or(|&last| last < doc_id));
        self.doc_ids.push(doc_id);
        if self.kind == PostingKind::Weighted {
            self.weights.push(weight);
        }
    }

    /// Length of the bit vector [`attach_bit_vector`](Self::attach_bit_vector)
    /// builds for `size`.
    pub(crate) fn bit_vector_len_for(&self, size: usize) -> usize {
        let last = self.doc_ids.last().map(|&d| d as usize + 1).unwrap_or(0);
        size.max(last)
    }

    /// Attach a bit vector covering at least `size` document ids.
    pub(crate) fn attach_bit_vector(&mut self, size: usize) {
        let mut bits = BitVec::from_elem(self.bit_vector_len_for(size), false);
        for &doc_id in &self.doc_ids {
            bits.set(doc_id as usize, true);
        }
        self.bit_vector = Some(bits);
    }

    pub(crate) fn detach_bit_vector(&mut self) {
        self.bit_vector = None;
    }
}

impl PartialEq for PostingList {
    /// Content equality; the bit vector shadow is not compared.
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.iter().eq(other.iter())
    }
}
