//! Value matching for parsed terms.

use std::cmp::Ordering;

use crate::search::term::{Int64Range, QueryTerm};
use crate::value::AttributeValue;

/// Evaluates a [`QueryTerm`] against attribute values and bounds the
/// dictionary range that can hold matches.
#[derive(Debug, Clone, PartialEq)]
pub struct TermMatcher {
    term: QueryTerm,
    folded: Option<String>,
}

impl TermMatcher {
    pub fn new(term: QueryTerm) -> Self {
        let folded = match &term {
            QueryTerm::Word(text) | QueryTerm::Prefix(text) => Some(fold(text)),
            _ => None,
        };
        TermMatcher { term, folded }
    }

    pub fn term(&self) -> &QueryTerm {
        &self.term
    }

    pub fn is_valid(&self) -> bool {
        self.term.is_valid()
    }

    pub fn as_integer_range(&self) -> Int64Range {
        self.term.as_integer_range()
    }

    pub fn matches(&self, value: &AttributeValue) -> bool {
        match (&self.term, value) {
            (QueryTerm::Integer(range), AttributeValue::Integer(v)) => range.contains(*v),
            (QueryTerm::Float(range), AttributeValue::Float(v)) => range.contains(*v),
            (QueryTerm::Float(range), AttributeValue::Integer(v)) => range.contains(*v as f64),
            (QueryTerm::Word(_), AttributeValue::String(v)) => {
                self.folded.as_deref().is_some_and(|word| fold(v) == word)
            }
            (QueryTerm::Prefix(_), AttributeValue::String(v)) => self
                .folded
                .as_deref()
                .is_some_and(|prefix| fold(v).starts_with(prefix)),
            _ => false,
        }
    }

    /// Smallest dictionary key that may match, in folded order.
    pub fn start_key(&self) -> Option<AttributeValue> {
        match &self.term {
            QueryTerm::Integer(range) if !range.is_empty() => {
                Some(AttributeValue::Integer(range.lower()))
            }
            QueryTerm::Float(range) => Some(AttributeValue::Float(range.start())),
            QueryTerm::Word(text) | QueryTerm::Prefix(text) => {
                Some(AttributeValue::String(text.clone()))
            }
            _ => None,
        }
    }

    /// True when `value`, and every value after it in folded order, cannot
    /// match.
    pub fn is_beyond(&self, value: &AttributeValue) -> bool {
        match (&self.term, value) {
            (QueryTerm::Integer(range), AttributeValue::Integer(v)) => *v > range.upper(),
            (QueryTerm::Float(range), AttributeValue::Float(v)) => range.is_beyond(*v),
            (QueryTerm::Word(text), AttributeValue::String(_)) => {
                value.cmp_folded(&AttributeValue::String(text.clone())) == Ordering::Greater
            }
            (QueryTerm::Prefix(_), AttributeValue::String(v)) => {
                let prefix = self.folded.as_deref().unwrap_or_default();
                let folded = fold(v);
                !folded.starts_with(prefix) && folded.as_str() > prefix
            }
            _ => true,
        }
    }
}

fn fold(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}
