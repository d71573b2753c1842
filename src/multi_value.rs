//! Per-document value sequences.

use std::sync::Arc;

use crate::dictionary::EnumIndex;
use crate::util::cow_vec::CowVec;

/// One element of a document: an enumerated value and its weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedEnum {
    pub index: EnumIndex,
    pub weight: i32,
}

impl WeightedEnum {
    pub fn new(index: EnumIndex, weight: i32) -> Self {
        WeightedEnum { index, weight }
    }
}

/// Maps each document id to its ordered element sequence.
///
/// Clones share storage, so a clone taken at commit time serves as the
/// readers' frozen view while the writer keeps updating its own copy.
#[derive(Debug, Clone, Default)]
pub struct MultiValueMapping {
    docs: CowVec<Arc<[WeightedEnum]>>,
    total_values: usize,
}

impl MultiValueMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of document ids covered.
    pub fn num_docs(&self) -> u32 {
        self.docs.len() as u32
    }

    /// Number of elements over all documents.
    pub fn total_values(&self) -> usize {
        self.total_values
    }

    /// Elements of `doc_id`; empty for unknown documents.
    pub fn get(&self, doc_id: u32) -> &[WeightedEnum] {
        self.docs
            .get(doc_id as usize)
            .map(|values| &**values)
            .unwrap_or(&[])
    }

    /// Grow the mapping to cover `doc_id`.
    pub fn add_doc(&mut self, doc_id: u32) {
        let wanted = doc_id as usize + 1;
        if wanted > self.docs.len() {
            self.docs.resize(wanted, empty());
        }
    }

    /// Replace the elements of `doc_id`. Returns the previous elements.
    pub fn set(&mut self, doc_id: u32, values: Vec<WeightedEnum>) -> Arc<[WeightedEnum]> {
        self.add_doc(doc_id);
        let new_values: Arc<[WeightedEnum]> = Arc::from(values);
        self.total_values += new_values.len();
        let slot = self
            .docs
            .get_mut(doc_id as usize)
            .unwrap_or_else(|| panic!("document {doc_id} missing after growth"));
        let old = std::mem::replace(slot, new_values);
        self.total_values -= old.len();
        old
    }

    /// Remove all elements of `doc_id`.
    pub fn clear_doc(&mut self, doc_id: u32) -> Arc<[WeightedEnum]> {
        if doc_id as usize >= self.docs.len() {
            return empty();
        }
        self.set(doc_id, Vec::new())
    }

    /// Drop documents at and above `doc_id_limit`.
    pub fn shrink(&mut self, doc_id_limit: u32) {
        let removed: usize = (doc_id_limit..self.num_docs())
            .map(|doc_id| self.get(doc_id).len())
            .sum();
        self.total_values -= removed;
        self.docs.truncate(doc_id_limit as usize);
    }
}

fn empty() -> Arc<[WeightedEnum]> {
    Arc::from(Vec::new())
}
