//! Term search over enumerated attributes.
//!
//! A [`SearchContext`] binds a parsed [`QueryTerm`] to an attribute
//! snapshot. It answers per-document element lookups directly and builds
//! [`SearchIterator`]s, either scanning document elements or walking the
//! posting lists of the matching dictionary range.

pub mod context;
pub mod iterator;
pub mod match_data;
pub mod matcher;
pub mod term;

pub use context::SearchContext;
pub use iterator::{
    AttributeIterator, AttributeIteratorKind, BitVectorIterator, EmptySearch, END_ID,
    PostingListIterator, SearchIterator, collect_hits,
};
pub use match_data::{MatchedElement, TermFieldMatchData};
pub use matcher::TermMatcher;
pub use term::{FloatRange, Int64Range, QueryTerm};
