//! Staged posting updates for one enumerated value.

use std::collections::BTreeMap;

use crate::dictionary::EnumIndex;

/// Pending additions and removals for one enumerated value.
///
/// Changes are collected from per-document deltas in arbitrary order.
/// [`PostingChange::remove_dups`] must run before the change is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingChange {
    additions: Vec<(u32, i32)>,
    removals: Vec<u32>,
}

/// Staged changes keyed by the enumerated index owning the posting list.
pub type PostingMap = BTreeMap<EnumIndex, PostingChange>;

impl PostingChange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `doc_id` with `weight`.
    pub fn add(&mut self, doc_id: u32, weight: i32) {
        self.additions.push((doc_id, weight));
    }

    /// Stage removal of `doc_id`.
    pub fn remove(&mut self, doc_id: u32) {
        self.removals.push(doc_id);
    }

    pub fn clear(&mut self) {
        self.additions.clear();
        self.removals.clear();
    }

    pub fn additions(&self) -> &[(u32, i32)] {
        &self.additions
    }

    pub fn removals(&self) -> &[u32] {
        &self.removals
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// Sort and deduplicate both sequences.
    ///
    /// Additions keep the latest weight per document. Removals of
    /// documents that are also added are dropped, so such documents end up
    /// present with their latest weight.
    pub fn remove_dups(&mut self) {
        // Stable sort keeps staging order within equal ids.
        self.additions.sort_by_key(|&(doc_id, _)| doc_id);
        let mut deduped: Vec<(u32, i32)> = Vec::with_capacity(self.additions.len());
        for &(doc_id, weight) in &self.additions {
            match deduped.last_mut() {
                Some(last) if last.0 == doc_id => last.1 = weight,
                _ => deduped.push((doc_id, weight)),
            }
        }
        self.additions = deduped;

        self.removals.sort_unstable();
        self.removals.dedup();
        if !self.additions.is_empty() {
            let additions = &self.additions;
            self.removals.retain(|doc_id| {
                additions
                    .binary_search_by_key(doc_id, |&(added, _)| added)
                    .is_err()
            });
        }
    }

    /// True if both sequences are sorted, unique and disjoint.
    pub fn is_normalized(&self) -> bool {
        is_normalized(&self.additions, &self.removals)
    }

    /// Build a change from raw sequences, normalizing them.
    pub fn from_parts(additions: Vec<(u32, i32)>, removals: Vec<u32>) -> Self {
        let mut change = PostingChange {
            additions,
            removals,
        };
        change.remove_dups();
        change
    }
}

/// True if `additions` and `removals` are sorted, unique and disjoint.
pub(crate) fn is_normalized(additions: &[(u32, i32)], removals: &[u32]) -> bool {
    additions.windows(2).all(|w| w[0].0 < w[1].0)
        && removals.windows(2).all(|w| w[0] < w[1])
        && removals.iter().all(|doc_id| {
            additions
                .binary_search_by_key(doc_id, |&(added, _)| added)
                .is_err()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_dups_last_add_wins() {
        let mut change = PostingChange::new();
        change.add(9, 1);
        change.add(3, 1);
        change.add(9, 4);
        change.remove(5);
        change.remove(2);
        change.remove(5);

        change.remove_dups();
        assert_eq!(change.additions(), &[(3, 1), (9, 4)]);
        assert_eq!(change.removals(), &[2, 5]);
        assert!(change.is_normalized());
    }

    #[test]
    fn test_add_and_remove_same_doc_keeps_add() {
        let mut change = PostingChange::new();
        change.remove(7);
        change.add(7, 3);
        change.remove(7);

        change.remove_dups();
        assert_eq!(change.additions(), &[(7, 3)]);
        assert!(change.removals().is_empty());
    }

    #[test]
    fn test_remove_dups_is_idempotent() {
        let mut change = PostingChange::new();
        for (doc_id, weight) in [(4, 1), (1, 2), (4, 3), (8, 1)] {
            change.add(doc_id, weight);
        }
        for doc_id in [8, 2, 2, 6] {
            change.remove(doc_id);
        }

        change.remove_dups();
        let once = change.clone();
        change.remove_dups();
        assert_eq!(change, once);
    }

    #[test]
    fn test_clear() {
        let mut change = PostingChange::new();
        change.add(1, 1);
        change.remove(2);
        assert!(!change.is_empty());
        change.clear();
        assert!(change.is_empty());
    }
}
