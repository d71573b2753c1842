//! Enumerated attributes with posting lists.
//!
//! [`vector::AttributeVector`] carries the per-attribute bookkeeping shared
//! by all layers (configuration, document count, generation). The
//! [`posting_list_attribute::PostingListAttribute`] keeps the posting store
//! in step with the value dictionary, and
//! [`enum_posting_attribute::EnumPostingAttribute`] drives both from
//! document updates and bulk loads.

pub mod enum_posting_attribute;
pub mod loaded;
pub mod posting_list_attribute;
pub mod reader;
pub mod status;
pub mod vector;

pub use enum_posting_attribute::EnumPostingAttribute;
pub use loaded::{LoadedEnumValue, LoadedValue};
pub use posting_list_attribute::PostingListAttribute;
pub use reader::{AttributeReader, AttributeSnapshot};
pub use status::AttributeStatus;
pub use vector::AttributeVector;
