//! Attribute statistics.

use serde::{Deserialize, Serialize};

use crate::generation::Generation;
use crate::posting::MemoryUsage;

/// Snapshot of attribute statistics, refreshed on every commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeStatus {
    /// Committed document id limit.
    pub num_docs: u32,
    /// Elements over all documents.
    pub num_values: usize,
    /// Distinct raw values in the dictionary.
    pub num_unique_values: usize,
    /// Live posting lists.
    pub num_posting_lists: usize,
    /// Posting lists carrying a bit vector.
    pub num_bit_vectors: usize,
    /// Generation after the last commit.
    pub generation: Generation,
    /// Posting store memory.
    pub posting_memory: MemoryUsage,
}
