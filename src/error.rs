//! Error types for attribute posting operations.
//!
//! Only recoverable conditions are represented here. Broken caller contracts
//! (an update for an enumerated index the dictionary does not hold, a bulk
//! load stream out of order) panic instead, since dropping such an update
//! would leave the posting lists silently wrong.
//!
//! # Examples
//!
//! ```
//! use attribute_postings::error::{AttributeError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(AttributeError::invalid_argument("doc id out of range"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for attribute operations.
#[derive(Error, Debug)]
pub enum AttributeError {
    /// I/O errors (reading configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument supplied by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Allocation refused by the posting store or another arena
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Query term errors
    #[error("Query error: {0}")]
    Query(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with AttributeError.
pub type Result<T> = std::result::Result<T, AttributeError>;

impl AttributeError {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        AttributeError::Config(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        AttributeError::InvalidArgument(msg.into())
    }

    /// Create a new resource exhausted error.
    pub fn resource_exhausted<S: Into<String>>(msg: S) -> Self {
        AttributeError::ResourceExhausted(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        AttributeError::Query(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        AttributeError::Other(msg.into())
    }

    /// Whether the failed operation may succeed if retried after memory
    /// has been reclaimed.
    pub fn is_resource_pressure(&self) -> bool {
        matches!(self, AttributeError::ResourceExhausted(_))
    }
}
