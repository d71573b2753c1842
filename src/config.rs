//! Attribute configuration.
//!
//! An attribute is described by its basic value type and collection type.
//! Together they select the value kind (integer, float or string) and the
//! posting kind (plain or weighted) used by the posting store, so a single
//! merge algorithm serves every combination.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AttributeError, Result};
use crate::posting::PostingKind;

/// Basic value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasicType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    String,
}

impl BasicType {
    /// Value kind the dictionary stores for this type.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            BasicType::Int8 | BasicType::Int16 | BasicType::Int32 | BasicType::Int64 => {
                ValueKind::Integer
            }
            BasicType::Float | BasicType::Double => ValueKind::Float,
            BasicType::String => ValueKind::String,
        }
    }

    /// Inclusive range of integers representable by this type, if integral.
    pub fn integer_bounds(&self) -> Option<(i64, i64)> {
        match self {
            BasicType::Int8 => Some((i8::MIN as i64, i8::MAX as i64)),
            BasicType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            BasicType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            BasicType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

/// Value kind stored in the dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    String,
}

/// Collection type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionType {
    /// One value per document.
    Single,
    /// Ordered values per document; weights are always 1.
    Array,
    /// Distinct weighted values per document.
    WeightedSet,
}

impl CollectionType {
    pub fn is_multi_value(&self) -> bool {
        !matches!(self, CollectionType::Single)
    }

    /// Posting kind used for this collection type.
    pub fn posting_kind(&self) -> PostingKind {
        match self {
            CollectionType::WeightedSet => PostingKind::Weighted,
            _ => PostingKind::Plain,
        }
    }
}

/// Posting store tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingConfig {
    /// Maintain bit vector shadows for large posting lists.
    pub enable_bit_vectors: bool,

    /// Lists shorter than this never get a bit vector.
    pub min_bit_vector_doc_freq: usize,

    /// A list gets a bit vector once it holds more than
    /// `doc_id_limit / bit_vector_doc_freq_divisor` documents.
    pub bit_vector_doc_freq_divisor: u32,

    /// Budget for all bit vectors together, in bytes.
    pub max_bit_vector_bytes: usize,

    /// Upper bound on live posting entries across all lists.
    pub max_posting_entries: usize,
}

impl Default for PostingConfig {
    fn default() -> Self {
        PostingConfig {
            enable_bit_vectors: false,
            min_bit_vector_doc_freq: 64,
            bit_vector_doc_freq_divisor: 64,
            max_bit_vector_bytes: 256 * 1024 * 1024,
            max_posting_entries: usize::MAX,
        }
    }
}

impl PostingConfig {
    /// Minimum list length that carries a bit vector for the given doc id limit.
    pub fn bit_vector_limit(&self, doc_id_limit: u32) -> usize {
        let divisor = self.bit_vector_doc_freq_divisor.max(1);
        self.min_bit_vector_doc_freq
            .max((doc_id_limit / divisor) as usize)
    }
}

/// Configuration of one attribute column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeConfig {
    /// Attribute name, used in log output.
    pub name: String,

    /// Basic value type.
    pub basic_type: BasicType,

    /// Collection type.
    pub collection_type: CollectionType,

    /// Maintain posting lists for this attribute.
    pub fast_search: bool,

    /// Planner hint: iterators only need to report presence.
    pub is_filter: bool,

    /// Posting store tuning.
    pub posting: PostingConfig,
}

impl Default for AttributeConfig {
    fn default() -> Self {
        AttributeConfig {
            name: "attribute".to_string(),
            basic_type: BasicType::Int64,
            collection_type: CollectionType::Single,
            fast_search: true,
            is_filter: false,
            posting: PostingConfig::default(),
        }
    }
}

impl AttributeConfig {
    /// Create a configuration with the given name and types.
    pub fn new<S: Into<String>>(
        name: S,
        basic_type: BasicType,
        collection_type: CollectionType,
    ) -> Self {
        AttributeConfig {
            name: name.into(),
            basic_type,
            collection_type,
            ..Default::default()
        }
    }

    /// Enable or disable posting lists.
    pub fn with_fast_search(mut self, fast_search: bool) -> Self {
        self.fast_search = fast_search;
        self
    }

    /// Set the filter hint.
    pub fn with_filter(mut self, is_filter: bool) -> Self {
        self.is_filter = is_filter;
        self
    }

    /// Replace the posting store tuning.
    pub fn with_posting(mut self, posting: PostingConfig) -> Self {
        self.posting = posting;
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AttributeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check the configuration for inconsistencies.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AttributeError::config("attribute name must not be empty"));
        }
        if self.posting.bit_vector_doc_freq_divisor == 0 {
            return Err(AttributeError::config(
                "bit_vector_doc_freq_divisor must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn value_kind(&self) -> ValueKind {
        self.basic_type.value_kind()
    }

    pub fn posting_kind(&self) -> PostingKind {
        self.collection_type.posting_kind()
    }

    /// Bit vectors are only maintained together with posting lists.
    pub fn bit_vectors_enabled(&self) -> bool {
        self.fast_search && self.posting.enable_bit_vectors
    }
}
