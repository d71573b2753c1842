//! Records produced by the attribute load step.

use std::cmp::Ordering;

use crate::dictionary::EnumIndex;
use crate::posting::EntryRef;
use crate::value::AttributeValue;

/// One loaded element referring to a dictionary entry by ordinal.
///
/// Ordinals number dictionary entries in dictionary order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedEnumValue {
    pub enum_ordinal: u32,
    pub doc_id: u32,
    pub weight: i32,
}

impl LoadedEnumValue {
    pub fn new(enum_ordinal: u32, doc_id: u32, weight: i32) -> Self {
        LoadedEnumValue {
            enum_ordinal,
            doc_id,
            weight,
        }
    }
}

/// One loaded element carrying its raw value.
///
/// A record with `doc_id` at or beyond the document id limit is a
/// placeholder: its value is kept in the dictionary but contributes no
/// posting. After the posting fill, `pidx` holds the posting list handle of
/// the record's folded group and `idx` its dictionary entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedValue {
    pub value: AttributeValue,
    pub doc_id: u32,
    pub weight: i32,
    pub idx: Option<EnumIndex>,
    pub pidx: EntryRef,
    pub(crate) order: usize,
}

impl LoadedValue {
    pub fn new<V: Into<AttributeValue>>(value: V, doc_id: u32, weight: i32) -> Self {
        LoadedValue {
            value: value.into(),
            doc_id,
            weight,
            idx: None,
            pidx: EntryRef::NULL,
            order: 0,
        }
    }

    /// Dictionary order, then document id, then load order.
    pub fn load_cmp(&self, other: &LoadedValue) -> Ordering {
        self.value
            .cmp_exact(&other.value)
            .then(self.doc_id.cmp(&other.doc_id))
            .then(self.order.cmp(&other.order))
    }
}

/// Number the records in load order and sort them for the posting fill.
pub fn sort_loaded_values(loaded: &mut [LoadedValue]) {
    for (order, record) in loaded.iter_mut().enumerate() {
        record.order = order;
    }
    loaded.sort_by(LoadedValue::load_cmp);
}
