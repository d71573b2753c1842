//! # attribute-postings
//!
//! Posting lists for enumerated attribute columns.
//!
//! ## Features
//!
//! - Value dictionary with case-folded value groups sharing one posting list
//! - Copy-on-write posting store with optional bit vector shadows
//! - Bulk rebuild from loaded records and incremental per-commit updates
//! - Lock-free readers pinned to a generation
//! - Term search over element scans or posting lists

pub mod attribute;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod generation;
pub mod multi_value;
pub mod posting;
pub mod search;
pub mod util;
pub mod value;

pub mod prelude {
    pub use crate::attribute::{
        AttributeReader, AttributeStatus, EnumPostingAttribute, LoadedEnumValue, LoadedValue,
    };
    pub use crate::config::{AttributeConfig, BasicType, CollectionType, PostingConfig};
    pub use crate::error::{AttributeError, Result};
    pub use crate::posting::{EntryRef, PostingList};
    pub use crate::search::{
        QueryTerm, SearchContext, SearchIterator, TermFieldMatchData, collect_hits,
    };
    pub use crate::value::{AttributeValue, WeightedValue};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
