//! Search context: one term evaluated against one attribute snapshot.

use std::sync::Arc;

use crate::attribute::reader::AttributeSnapshot;
use crate::config::AttributeConfig;
use crate::posting::{EntryRef, PostingList};
use crate::search::iterator::{
    AttributeIterator, AttributeIteratorKind, BitVectorIterator, EmptySearch, PostingListIterator,
    SearchIterator,
};
use crate::search::match_data::TermFieldMatchData;
use crate::search::matcher::TermMatcher;
use crate::search::term::{Int64Range, QueryTerm};
use crate::value::FoldedComparator;

/// A term bound to the attribute state it is evaluated against.
#[derive(Debug)]
pub struct SearchContext<'a> {
    matcher: TermMatcher,
    snapshot: &'a AttributeSnapshot,
    config: &'a AttributeConfig,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        term: QueryTerm,
        snapshot: &'a AttributeSnapshot,
        config: &'a AttributeConfig,
    ) -> Self {
        SearchContext {
            matcher: TermMatcher::new(term),
            snapshot,
            config,
        }
    }

    /// False for malformed terms, which match nothing.
    pub fn valid(&self) -> bool {
        self.matcher.is_valid()
    }

    pub fn term(&self) -> &QueryTerm {
        self.matcher.term()
    }

    pub fn doc_id_limit(&self) -> u32 {
        self.snapshot.doc_id_limit()
    }

    /// Inclusive integer range of the term, for the query planner.
    pub fn get_as_integer_term(&self) -> Int64Range {
        self.matcher.as_integer_range()
    }

    /// Index of the first element of `doc_id` at or after `elem_id` that
    /// matches the term, or -1.
    pub fn find(&self, doc_id: u32, elem_id: u32) -> i32 {
        self.find_weighted(doc_id, elem_id).0
    }

    /// Like [`Self::find`], also returning the element weight (0 on a miss).
    pub fn find_weighted(&self, doc_id: u32, elem_id: u32) -> (i32, i32) {
        if doc_id >= self.doc_id_limit() {
            return (-1, 0);
        }
        let elements = self.snapshot.values().get(doc_id);
        let dictionary = self.snapshot.dictionary();
        for (i, element) in elements.iter().enumerate().skip(elem_id as usize) {
            let matched = dictionary
                .value(element.index)
                .is_some_and(|value| self.matcher.matches(value));
            if matched {
                return (i as i32, element.weight);
            }
        }
        (-1, 0)
    }

    /// True when any element of `doc_id` matches.
    pub fn matches(&self, doc_id: u32) -> bool {
        self.valid() && self.find(doc_id, 0) >= 0
    }

    /// Distinct posting list handles of all dictionary entries matching the
    /// term, in dictionary order.
    pub fn matching_handles(&self) -> Vec<EntryRef> {
        let mut handles = Vec::new();
        let Some(start) = self.matcher.start_key() else {
            return handles;
        };
        let dictionary = self.snapshot.dictionary();
        let first = dictionary.lower_bound(&start, &FoldedComparator);
        for entry in &dictionary.entries()[first..] {
            let value = dictionary.entry_value(entry);
            if self.matcher.is_beyond(value) {
                break;
            }
            let handle = entry.data();
            if handle.is_valid() && self.matcher.matches(value) && handles.last() != Some(&handle) {
                handles.push(handle);
            }
        }
        handles
    }

    /// Posting lists of all matching values.
    pub fn posting_lists(&self) -> Vec<Arc<PostingList>> {
        self.matching_handles()
            .into_iter()
            .filter_map(|handle| self.snapshot.postings().get(handle).cloned())
            .collect()
    }

    /// Iterator scanning document elements. Filter iterators only report
    /// presence; strict ones seek to the next hit themselves.
    pub fn create_filter_iterator<'b>(
        &'b self,
        match_data: &'b mut TermFieldMatchData,
        strict: bool,
    ) -> Box<dyn SearchIterator + 'b> {
        if !self.valid() {
            return Box::new(EmptySearch::new());
        }
        let kind = AttributeIteratorKind::new(self.config.is_filter, strict);
        Box::new(AttributeIterator::new(self, match_data, kind))
    }

    /// Iterator using posting lists when the attribute keeps them, and the
    /// element scan otherwise.
    pub fn create_iterator<'b>(
        &'b self,
        match_data: &'b mut TermFieldMatchData,
        strict: bool,
    ) -> Box<dyn SearchIterator + 'b> {
        if !self.valid() {
            return Box::new(EmptySearch::new());
        }
        if !self.config.fast_search {
            return self.create_filter_iterator(match_data, strict);
        }

        let filter = self.config.is_filter;
        let mut lists = self.posting_lists();
        match lists.len() {
            0 => Box::new(EmptySearch::new()),
            1 if lists[0].has_bit_vector() => {
                let list = lists.remove(0);
                Box::new(BitVectorIterator::new(self, match_data, list, filter, strict))
            }
            _ => Box::new(PostingListIterator::new(self, match_data, lists, filter, strict)),
        }
    }

    /// Record every matching element of `doc_id`.
    pub(crate) fn unpack_elements(&self, doc_id: u32, match_data: &mut TermFieldMatchData) {
        match_data.reset(doc_id);
        let mut elem_id = 0;
        loop {
            let (found, weight) = self.find_weighted(doc_id, elem_id);
            if found < 0 {
                break;
            }
            match_data.push_element(found as u32, weight);
            elem_id = found as u32 + 1;
        }
    }
}
