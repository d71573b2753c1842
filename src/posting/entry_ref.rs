//! Opaque posting list handles.

use std::fmt;

/// Handle of one posting list instance in the posting store.
///
/// The null reference means "no postings for this value". Several
/// dictionary entries may hold the same reference when their values fold
/// to the same canonical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntryRef(u32);

impl EntryRef {
    /// The null reference.
    pub const NULL: EntryRef = EntryRef(0);

    /// Reference to the given arena slot.
    pub(crate) fn from_slot(slot: u32) -> Self {
        EntryRef(slot + 1)
    }

    /// Arena slot addressed by this reference, if not null.
    pub(crate) fn slot(&self) -> Option<usize> {
        self.0.checked_sub(1).map(|slot| slot as usize)
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    /// Raw encoded value.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot() {
            Some(slot) => write!(f, "EntryRef({slot})"),
            None => write!(f, "EntryRef(null)"),
        }
    }
}
