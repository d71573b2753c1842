//! Reader side of an attribute.

use std::sync::Arc;

use crate::config::AttributeConfig;
use crate::dictionary::DictionaryData;
use crate::error::Result;
use crate::generation::{Generation, GenerationGuard};
use crate::multi_value::MultiValueMapping;
use crate::posting::{FrozenPostings, PostingList};
use crate::search::{QueryTerm, SearchContext};
use crate::value::{AttributeValue, WeightedValue};

/// Immutable attribute state published by one commit.
#[derive(Debug, Clone)]
pub struct AttributeSnapshot {
    pub(crate) dictionary: Arc<DictionaryData>,
    pub(crate) postings: FrozenPostings,
    pub(crate) values: MultiValueMapping,
    pub(crate) doc_id_limit: u32,
    pub(crate) generation: Generation,
}

impl AttributeSnapshot {
    pub(crate) fn empty() -> Self {
        AttributeSnapshot {
            dictionary: Arc::new(DictionaryData::default()),
            postings: FrozenPostings::default(),
            values: MultiValueMapping::new(),
            doc_id_limit: 0,
            generation: 0,
        }
    }

    pub fn dictionary(&self) -> &DictionaryData {
        &self.dictionary
    }

    pub fn postings(&self) -> &FrozenPostings {
        &self.postings
    }

    pub fn values(&self) -> &MultiValueMapping {
        &self.values
    }

    pub fn doc_id_limit(&self) -> u32 {
        self.doc_id_limit
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// A consistent view of an attribute for the lifetime of one query.
///
/// The reader pins its generation, so posting list slots it may resolve
/// are not recycled while it is alive.
#[derive(Debug)]
pub struct AttributeReader {
    _guard: GenerationGuard,
    snapshot: Arc<AttributeSnapshot>,
    config: Arc<AttributeConfig>,
}

impl AttributeReader {
    pub(crate) fn new(
        guard: GenerationGuard,
        snapshot: Arc<AttributeSnapshot>,
        config: Arc<AttributeConfig>,
    ) -> Self {
        AttributeReader {
            _guard: guard,
            snapshot,
            config,
        }
    }

    pub fn snapshot(&self) -> &AttributeSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &AttributeConfig {
        &self.config
    }

    pub fn doc_id_limit(&self) -> u32 {
        self.snapshot.doc_id_limit
    }

    /// Elements of `doc_id` in stored order.
    pub fn values(&self, doc_id: u32) -> Vec<WeightedValue> {
        self.snapshot
            .values
            .get(doc_id)
            .iter()
            .filter_map(|element| {
                self.snapshot
                    .dictionary
                    .value(element.index)
                    .map(|value| WeightedValue {
                        value: value.clone(),
                        weight: element.weight,
                    })
            })
            .collect()
    }

    /// Posting list shared by all values folding to `value`.
    pub fn posting_list(&self, value: &AttributeValue) -> Option<Arc<PostingList>> {
        let handle = self.snapshot.dictionary.find_posting_list(value);
        self.snapshot.postings.get(handle).cloned()
    }

    /// Parse `term` and set up a search against this view.
    pub fn search_context(&self, term: &str) -> SearchContext<'_> {
        let term = QueryTerm::parse(term, self.config.value_kind());
        self.search_context_for(term)
    }

    /// Set up a search for an already parsed term.
    pub fn search_context_for(&self, term: QueryTerm) -> SearchContext<'_> {
        SearchContext::new(term, &self.snapshot, &self.config)
    }

    /// Like [`Self::search_context`], but reject malformed terms.
    pub fn try_search_context(&self, term: &str) -> Result<SearchContext<'_>> {
        let term = QueryTerm::try_parse(term, self.config.value_kind())?;
        Ok(self.search_context_for(term))
    }
}
