//! Search iterators over attribute hits.
//!
//! Iterators walk document ids in increasing order within a range set by
//! [`SearchIterator::init_range`]. A strict iterator always rests on a hit
//! (or [`END_ID`]) and `seek` moves it to the first hit at or after the
//! target. A non-strict iterator only answers whether the target is a hit;
//! the caller advances it one candidate at a time.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;

use crate::posting::PostingList;
use crate::search::context::SearchContext;
use crate::search::match_data::TermFieldMatchData;

/// Document id past every valid document.
pub const END_ID: u32 = u32::MAX;

/// Common contract of all attribute iterators.
pub trait SearchIterator: fmt::Debug {
    /// Current document id. Meaningful as a hit only after a successful
    /// `seek`, or at any time for strict iterators.
    fn doc_id(&self) -> u32;

    /// Exclusive upper bound of the current range.
    fn end_id(&self) -> u32;

    /// Restrict iteration to `[begin_id, end_id)` and rewind.
    fn init_range(&mut self, begin_id: u32, end_id: u32);

    /// Check whether `target` is a hit. Targets must not decrease.
    fn seek(&mut self, target: u32) -> bool;

    /// Fill the match data for the hit at `doc_id`.
    fn unpack(&mut self, doc_id: u32);

    fn is_strict(&self) -> bool;

    /// Rough number of documents the iterator will inspect.
    fn cost(&self) -> u64;

    /// Match data written by `unpack`, if any.
    fn match_data(&self) -> Option<&TermFieldMatchData>;

    fn is_at_end(&self) -> bool {
        self.doc_id() >= self.end_id()
    }

    /// Move a strict iterator to the hit after the current one and return
    /// its document id.
    fn next(&mut self) -> u32 {
        let target = self.doc_id().saturating_add(1);
        self.seek(target);
        self.doc_id()
    }
}

/// Drive `iterator` over `[begin_id, end_id)` and collect every hit.
pub fn collect_hits(iterator: &mut dyn SearchIterator, begin_id: u32, end_id: u32) -> Vec<u32> {
    iterator.init_range(begin_id, end_id);
    let mut hits = Vec::new();
    let mut doc_id = begin_id;
    while doc_id < end_id {
        if iterator.seek(doc_id) {
            hits.push(doc_id);
            doc_id += 1;
        } else {
            doc_id = (doc_id + 1).max(iterator.doc_id());
        }
    }
    hits
}

/// Iterator without hits, used for terms that cannot match.
#[derive(Debug, Default)]
pub struct EmptySearch;

impl EmptySearch {
    pub fn new() -> Self {
        EmptySearch
    }
}

impl SearchIterator for EmptySearch {
    fn doc_id(&self) -> u32 {
        END_ID
    }

    fn end_id(&self) -> u32 {
        END_ID
    }

    fn init_range(&mut self, _begin_id: u32, _end_id: u32) {}

    fn seek(&mut self, _target: u32) -> bool {
        false
    }

    fn unpack(&mut self, _doc_id: u32) {}

    fn is_strict(&self) -> bool {
        true
    }

    fn cost(&self) -> u64 {
        0
    }

    fn match_data(&self) -> Option<&TermFieldMatchData> {
        None
    }
}

/// Variants of the scanning iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeIteratorKind {
    /// Presence only, caller advances.
    Filter,
    /// Presence only, seeks to the next hit.
    FilterStrict,
    /// Fills element data, caller advances.
    Ranked,
    /// Fills element data, seeks to the next hit.
    RankedStrict,
}

impl AttributeIteratorKind {
    pub fn new(filter: bool, strict: bool) -> Self {
        match (filter, strict) {
            (true, false) => AttributeIteratorKind::Filter,
            (true, true) => AttributeIteratorKind::FilterStrict,
            (false, false) => AttributeIteratorKind::Ranked,
            (false, true) => AttributeIteratorKind::RankedStrict,
        }
    }

    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            AttributeIteratorKind::Filter | AttributeIteratorKind::FilterStrict
        )
    }

    pub fn is_strict(&self) -> bool {
        matches!(
            self,
            AttributeIteratorKind::FilterStrict | AttributeIteratorKind::RankedStrict
        )
    }
}

/// Iterator testing each document's elements against the term.
#[derive(Debug)]
pub struct AttributeIterator<'a> {
    context: &'a SearchContext<'a>,
    match_data: &'a mut TermFieldMatchData,
    kind: AttributeIteratorKind,
    doc_id: u32,
    end_id: u32,
}

impl<'a> AttributeIterator<'a> {
    pub fn new(
        context: &'a SearchContext<'a>,
        match_data: &'a mut TermFieldMatchData,
        kind: AttributeIteratorKind,
    ) -> Self {
        let mut iterator = AttributeIterator {
            context,
            match_data,
            kind,
            doc_id: 0,
            end_id: 0,
        };
        iterator.init_range(0, context.doc_id_limit());
        iterator
    }

    pub fn kind(&self) -> AttributeIteratorKind {
        self.kind
    }

    fn next_hit(&self, from: u32) -> u32 {
        (from..self.end_id)
            .find(|&doc_id| self.context.matches(doc_id))
            .unwrap_or(END_ID)
    }
}

impl SearchIterator for AttributeIterator<'_> {
    fn doc_id(&self) -> u32 {
        self.doc_id
    }

    fn end_id(&self) -> u32 {
        self.end_id
    }

    fn init_range(&mut self, begin_id: u32, end_id: u32) {
        self.end_id = end_id.min(self.context.doc_id_limit());
        self.doc_id = if begin_id >= self.end_id {
            END_ID
        } else if self.kind.is_strict() {
            self.next_hit(begin_id)
        } else {
            begin_id
        };
    }

    fn seek(&mut self, target: u32) -> bool {
        if target >= self.end_id {
            self.doc_id = END_ID;
            return false;
        }
        if self.kind.is_strict() {
            if target > self.doc_id {
                self.doc_id = self.next_hit(target);
            }
            return self.doc_id == target;
        }
        if self.context.matches(target) {
            self.doc_id = target;
            return true;
        }
        false
    }

    fn unpack(&mut self, doc_id: u32) {
        if self.kind.is_filter() {
            self.match_data.reset_only_doc_id(doc_id);
        } else {
            self.context.unpack_elements(doc_id, self.match_data);
        }
    }

    fn is_strict(&self) -> bool {
        self.kind.is_strict()
    }

    fn cost(&self) -> u64 {
        self.context.doc_id_limit() as u64
    }

    fn match_data(&self) -> Option<&TermFieldMatchData> {
        Some(&*self.match_data)
    }
}

/// Iterator over the union of posting lists.
///
/// Positioned on a hit at all times, so it serves strict and non-strict
/// callers alike.
#[derive(Debug)]
pub struct PostingListIterator<'a> {
    context: &'a SearchContext<'a>,
    match_data: &'a mut TermFieldMatchData,
    lists: Vec<Arc<PostingList>>,
    positions: Vec<usize>,
    heap: BinaryHeap<Reverse<(u32, usize)>>,
    filter: bool,
    strict: bool,
    doc_id: u32,
    end_id: u32,
}

impl<'a> PostingListIterator<'a> {
    pub fn new(
        context: &'a SearchContext<'a>,
        match_data: &'a mut TermFieldMatchData,
        lists: Vec<Arc<PostingList>>,
        filter: bool,
        strict: bool,
    ) -> Self {
        let positions = vec![0; lists.len()];
        let mut iterator = PostingListIterator {
            context,
            match_data,
            lists,
            positions,
            heap: BinaryHeap::new(),
            filter,
            strict,
            doc_id: 0,
            end_id: 0,
        };
        iterator.init_range(0, context.doc_id_limit());
        iterator
    }

    fn settle(&mut self) {
        self.doc_id = match self.heap.peek() {
            Some(Reverse((doc_id, _))) if *doc_id < self.end_id => *doc_id,
            _ => END_ID,
        };
    }
}

impl SearchIterator for PostingListIterator<'_> {
    fn doc_id(&self) -> u32 {
        self.doc_id
    }

    fn end_id(&self) -> u32 {
        self.end_id
    }

    fn init_range(&mut self, begin_id: u32, end_id: u32) {
        self.end_id = end_id;
        self.heap.clear();
        for (i, list) in self.lists.iter().enumerate() {
            let position = list.lower_bound(begin_id, 0);
            self.positions[i] = position;
            if let Some(&doc_id) = list.doc_ids().get(position) {
                self.heap.push(Reverse((doc_id, i)));
            }
        }
        self.settle();
    }

    fn seek(&mut self, target: u32) -> bool {
        if target <= self.doc_id {
            return self.doc_id == target;
        }
        while let Some(&Reverse((doc_id, i))) = self.heap.peek() {
            if doc_id >= target {
                break;
            }
            self.heap.pop();
            let list = &self.lists[i];
            let position = list.lower_bound(target, self.positions[i]);
            self.positions[i] = position;
            if let Some(&next) = list.doc_ids().get(position) {
                self.heap.push(Reverse((next, i)));
            }
        }
        self.settle();
        self.doc_id == target
    }

    fn unpack(&mut self, doc_id: u32) {
        if self.filter {
            self.match_data.reset_only_doc_id(doc_id);
        } else {
            self.context.unpack_elements(doc_id, self.match_data);
        }
    }

    fn is_strict(&self) -> bool {
        self.strict
    }

    fn cost(&self) -> u64 {
        self.lists.iter().map(|list| list.len() as u64).sum()
    }

    fn match_data(&self) -> Option<&TermFieldMatchData> {
        Some(&*self.match_data)
    }
}

/// Iterator over a posting list's bit vector shadow.
#[derive(Debug)]
pub struct BitVectorIterator<'a> {
    context: &'a SearchContext<'a>,
    match_data: &'a mut TermFieldMatchData,
    list: Arc<PostingList>,
    filter: bool,
    strict: bool,
    doc_id: u32,
    end_id: u32,
}

impl<'a> BitVectorIterator<'a> {
    pub fn new(
        context: &'a SearchContext<'a>,
        match_data: &'a mut TermFieldMatchData,
        list: Arc<PostingList>,
        filter: bool,
        strict: bool,
    ) -> Self {
        let mut iterator = BitVectorIterator {
            context,
            match_data,
            list,
            filter,
            strict,
            doc_id: 0,
            end_id: 0,
        };
        iterator.init_range(0, context.doc_id_limit());
        iterator
    }

    fn next_hit(&self, from: u32) -> u32 {
        let hit = match self.list.bit_vector() {
            Some(bits) => {
                let limit = (self.end_id as usize).min(bits.len());
                (from as usize..limit)
                    .find(|&doc_id| bits.get(doc_id).unwrap_or(false))
                    .map(|doc_id| doc_id as u32)
            }
            None => self
                .list
                .doc_ids()
                .get(self.list.lower_bound(from, 0))
                .copied(),
        };
        hit.filter(|&doc_id| doc_id < self.end_id).unwrap_or(END_ID)
    }
}

impl SearchIterator for BitVectorIterator<'_> {
    fn doc_id(&self) -> u32 {
        self.doc_id
    }

    fn end_id(&self) -> u32 {
        self.end_id
    }

    fn init_range(&mut self, begin_id: u32, end_id: u32) {
        self.end_id = end_id;
        self.doc_id = if begin_id >= end_id {
            END_ID
        } else if self.strict {
            self.next_hit(begin_id)
        } else {
            begin_id
        };
    }

    fn seek(&mut self, target: u32) -> bool {
        if target >= self.end_id {
            self.doc_id = END_ID;
            return false;
        }
        if self.strict {
            if target > self.doc_id {
                self.doc_id = self.next_hit(target);
            }
            return self.doc_id == target;
        }
        if self.list.contains(target) {
            self.doc_id = target;
            return true;
        }
        false
    }

    fn unpack(&mut self, doc_id: u32) {
        if self.filter {
            self.match_data.reset_only_doc_id(doc_id);
        } else {
            self.context.unpack_elements(doc_id, self.match_data);
        }
    }

    fn is_strict(&self) -> bool {
        self.strict
    }

    fn cost(&self) -> u64 {
        self.end_id.min(self.context.doc_id_limit()) as u64 / 32
    }

    fn match_data(&self) -> Option<&TermFieldMatchData> {
        Some(&*self.match_data)
    }
}
