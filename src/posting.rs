//! Posting lists for enumerated values.
//!
//! The [`store::PostingStore`] owns every posting list of an attribute and
//! hands out [`entry_ref::EntryRef`] handles that the dictionary stores as
//! entry data. Pending updates for one value are staged in a
//! [`change::PostingChange`] and merged copy-on-write.

pub mod change;
pub mod entry_ref;
pub mod list;
pub mod memory;
pub mod store;

pub use change::{PostingChange, PostingMap};
pub use entry_ref::EntryRef;
pub use list::{PostingKind, PostingList};
pub use memory::MemoryUsage;
pub use store::{FrozenPostings, PostingStore, PostingStoreCheckpoint};
