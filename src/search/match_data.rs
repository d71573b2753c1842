//! Per-term match data filled in by iterators.

use crate::search::iterator::END_ID;

/// One matching element of a multi-valued document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedElement {
    pub element_id: u32,
    pub weight: i32,
}

/// Match information for one term in one field.
///
/// Filter iterators only record the document id. Ranked iterators also
/// record the matching elements and the weight of the first one.
#[derive(Debug, Clone, PartialEq)]
pub struct TermFieldMatchData {
    doc_id: u32,
    weight: i32,
    elements: Vec<MatchedElement>,
}

impl Default for TermFieldMatchData {
    fn default() -> Self {
        TermFieldMatchData {
            doc_id: END_ID,
            weight: 0,
            elements: Vec::new(),
        }
    }
}

impl TermFieldMatchData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document the data describes, or [`END_ID`] before the first unpack.
    pub fn doc_id(&self) -> u32 {
        self.doc_id
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn elements(&self) -> &[MatchedElement] {
        &self.elements
    }

    /// Start describing `doc_id`, dropping previous element data.
    pub fn reset(&mut self, doc_id: u32) {
        self.doc_id = doc_id;
        self.weight = 0;
        self.elements.clear();
    }

    /// Record a hit without element data.
    pub fn reset_only_doc_id(&mut self, doc_id: u32) {
        self.doc_id = doc_id;
    }

    pub fn push_element(&mut self, element_id: u32, weight: i32) {
        if self.elements.is_empty() {
            self.weight = weight;
        }
        self.elements.push(MatchedElement { element_id, weight });
    }
}
