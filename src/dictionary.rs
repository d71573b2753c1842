//! Enumerated value dictionary.
//!
//! Every distinct raw value of an attribute gets a stable [`EnumIndex`].
//! Entries are kept in dictionary order (folded form first, raw form
//! second), each carrying a reference count and the [`EntryRef`] of the
//! posting list shared by its folded group.
//!
//! The writer mutates a working copy. [`EnumStore::freeze`] hands out an
//! immutable [`DictionaryData`] snapshot; the next write detaches the
//! working copy from it.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::ValueKind;
use crate::error::{AttributeError, Result};
use crate::posting::EntryRef;
use crate::value::{AttributeValue, EnumComparator, ExactComparator, FoldedComparator};

/// Entries freed per paged [`EnumStore::free_unused_enums`] call.
const FREE_PAGE_SIZE: usize = 1024;

/// Stable identifier of a dictionary value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnumIndex(pub u32);

impl fmt::Display for EnumIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enum#{}", self.0)
    }
}

/// One dictionary entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    index: EnumIndex,
    ref_count: u32,
    data: EntryRef,
}

impl DictEntry {
    pub fn index(&self) -> EnumIndex {
        self.index
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Posting list handle of the entry's folded group.
    pub fn data(&self) -> EntryRef {
        self.data
    }
}

/// Position in dictionary order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DictionaryCursor(usize);

impl DictionaryCursor {
    pub fn position(&self) -> usize {
        self.0
    }
}

/// Dictionary content: ordered entries plus values by enum index.
#[derive(Debug, Clone, Default)]
pub struct DictionaryData {
    entries: Vec<DictEntry>,
    values: Vec<Option<AttributeValue>>,
}

impl DictionaryData {
    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in dictionary order.
    pub fn entries(&self) -> &[DictEntry] {
        &self.entries
    }

    pub fn entry_at(&self, position: usize) -> Option<&DictEntry> {
        self.entries.get(position)
    }

    /// Value of a live enum index.
    pub fn value(&self, index: EnumIndex) -> Option<&AttributeValue> {
        self.values.get(index.0 as usize).and_then(|v| v.as_ref())
    }

    /// Position of the first entry not ordered before `key`.
    pub fn lower_bound<C: EnumComparator + ?Sized>(&self, key: &AttributeValue, cmp: &C) -> usize {
        self.entries.partition_point(|entry| {
            let value = self.values[entry.index.0 as usize]
                .as_ref()
                .unwrap_or_else(|| panic!("dictionary entry {} has no value", entry.index));
            cmp.compare(value, key) == Ordering::Less
        })
    }

    /// Enum index holding exactly `value`.
    pub fn find_exact(&self, value: &AttributeValue) -> Option<EnumIndex> {
        let position = self.lower_bound(value, &ExactComparator);
        self.entries
            .get(position)
            .filter(|entry| self.entry_value(entry).cmp_exact(value) == Ordering::Equal)
            .map(|entry| entry.index)
    }

    /// Posting list handle for all values folding to `value`.
    pub fn find_posting_list(&self, value: &AttributeValue) -> EntryRef {
        let position = self.lower_bound(value, &FoldedComparator);
        self.entries
            .get(position)
            .filter(|entry| !self.entry_value(entry).folded_change(value))
            .map(|entry| entry.data)
            .unwrap_or(EntryRef::NULL)
    }

    /// Value stored for an entry.
    pub fn entry_value(&self, entry: &DictEntry) -> &AttributeValue {
        self.values[entry.index.0 as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("dictionary entry {} has no value", entry.index))
    }

    fn position_of(&self, index: EnumIndex) -> usize {
        let value = self
            .value(index)
            .unwrap_or_else(|| panic!("{index} is not in the dictionary"));
        let position = self.lower_bound(value, &ExactComparator);
        assert!(
            self.entries.get(position).map(|e| e.index) == Some(index),
            "{index} is not at its dictionary position"
        );
        position
    }
}

/// Writer state saved before a batch.
#[derive(Debug, Clone)]
pub struct EnumStoreCheckpoint {
    data: Arc<DictionaryData>,
    free_indexes: Vec<EnumIndex>,
}

/// Writer side of the dictionary.
#[derive(Debug)]
pub struct EnumStore {
    kind: ValueKind,
    data: Arc<DictionaryData>,
    free_indexes: Vec<EnumIndex>,
}

impl EnumStore {
    pub fn new(kind: ValueKind) -> Self {
        EnumStore {
            kind,
            data: Arc::new(DictionaryData::default()),
            free_indexes: Vec::new(),
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Working copy of the dictionary content.
    pub fn data(&self) -> &DictionaryData {
        &self.data
    }

    pub fn num_unique_values(&self) -> usize {
        self.data.len()
    }

    /// Publish the working copy as an immutable snapshot.
    pub fn freeze(&self) -> Arc<DictionaryData> {
        Arc::clone(&self.data)
    }

    pub fn begin(&self) -> DictionaryCursor {
        DictionaryCursor(0)
    }

    pub fn next(&self, cursor: DictionaryCursor) -> DictionaryCursor {
        DictionaryCursor(cursor.0 + 1)
    }

    pub fn is_valid(&self, cursor: DictionaryCursor) -> bool {
        cursor.0 < self.data.entries.len()
    }

    /// Enum index at `cursor`.
    pub fn key(&self, cursor: DictionaryCursor) -> EnumIndex {
        self.entry(cursor).index
    }

    /// Posting list handle at `cursor`.
    pub fn get_data(&self, cursor: DictionaryCursor) -> EntryRef {
        self.entry(cursor).data
    }

    pub fn ref_count(&self, cursor: DictionaryCursor) -> u32 {
        self.entry(cursor).ref_count
    }

    /// Value of a live enum index. Panics on a freed index.
    pub fn value(&self, index: EnumIndex) -> &AttributeValue {
        self.data
            .value(index)
            .unwrap_or_else(|| panic!("{index} is not in the dictionary"))
    }

    /// Make the working copy writable in place, detaching it from any
    /// published snapshot.
    pub fn thaw(&mut self, cursor: DictionaryCursor) {
        assert!(self.is_valid(cursor), "thaw of invalid cursor");
        Arc::make_mut(&mut self.data);
    }

    /// Overwrite the posting list handle at `cursor`. The working copy must
    /// have been thawed since the last freeze.
    pub fn write_data(&mut self, cursor: DictionaryCursor, data: EntryRef) {
        let Some(dictionary) = Arc::get_mut(&mut self.data) else {
            panic!("dictionary written without thaw");
        };
        dictionary.entries[cursor.0].data = data;
    }

    /// Write `data` to every entry of the folded group starting at `head`.
    /// Returns the cursor past the group.
    pub fn write_group_data(&mut self, head: DictionaryCursor, data: EntryRef) -> DictionaryCursor {
        let end = self.group_end(head);
        let mut cursor = head;
        while cursor < end {
            self.write_data(cursor, data);
            cursor = self.next(cursor);
        }
        end
    }

    /// Cursor past the last entry folding equal to the one at `head`.
    pub fn group_end(&self, head: DictionaryCursor) -> DictionaryCursor {
        let head_value = self.data.entry_value(self.entry(head));
        let mut cursor = self.next(head);
        while self.is_valid(cursor)
            && !self
                .data
                .entry_value(self.entry(cursor))
                .folded_change(head_value)
        {
            cursor = self.next(cursor);
        }
        cursor
    }

    /// First entry not ordered before the value of `index`.
    pub fn lower_bound<C: EnumComparator + ?Sized>(
        &self,
        index: EnumIndex,
        cmp: &C,
    ) -> DictionaryCursor {
        let value = self.value(index);
        DictionaryCursor(self.data.lower_bound(value, cmp))
    }

    pub fn lower_bound_value<C: EnumComparator + ?Sized>(
        &self,
        value: &AttributeValue,
        cmp: &C,
    ) -> DictionaryCursor {
        DictionaryCursor(self.data.lower_bound(value, cmp))
    }

    /// True when the values of `a` and `b` fold to different canonical values.
    pub fn folded_change(&self, a: EnumIndex, b: EnumIndex) -> bool {
        self.value(a).folded_change(self.value(b))
    }

    pub fn find_exact(&self, value: &AttributeValue) -> Option<EnumIndex> {
        self.data.find_exact(value)
    }

    /// First enum index of the folded group `value` belongs to.
    pub fn find_folded_head(&self, value: &AttributeValue) -> Option<EnumIndex> {
        let cursor = self.lower_bound_value(value, &FoldedComparator);
        if !self.is_valid(cursor) {
            return None;
        }
        let entry = self.entry(cursor);
        (!self.data.entry_value(entry).folded_change(value)).then_some(entry.index)
    }

    /// Folded group head of a live enum index.
    pub fn group_head(&self, index: EnumIndex) -> EnumIndex {
        let cursor = self.lower_bound(index, &FoldedComparator);
        self.key(cursor)
    }

    /// Add one reference to `value`, creating its entry if needed. A new
    /// entry joins the posting list of its folded group.
    pub fn insert(&mut self, value: AttributeValue) -> Result<EnumIndex> {
        if value.kind() != self.kind {
            return Err(AttributeError::invalid_argument(format!(
                "{:?} value {value} in {:?} dictionary",
                value.kind(),
                self.kind
            )));
        }
        if let Some(index) = self.find_exact(&value) {
            self.inc_ref(index);
            return Ok(index);
        }

        let group_data = self
            .find_folded_head(&value)
            .map(|head| self.entry(self.lower_bound(head, &ExactComparator)).data)
            .unwrap_or(EntryRef::NULL);
        let position = self.data.lower_bound(&value, &ExactComparator);
        let index = self.allocate_index();
        let dictionary = Arc::make_mut(&mut self.data);
        let slot = index.0 as usize;
        if slot == dictionary.values.len() {
            dictionary.values.push(Some(value));
        } else {
            dictionary.values[slot] = Some(value);
        }
        dictionary.entries.insert(
            position,
            DictEntry {
                index,
                ref_count: 1,
                data: group_data,
            },
        );
        Ok(index)
    }

    pub fn inc_ref(&mut self, index: EnumIndex) {
        let position = self.data.position_of(index);
        Arc::make_mut(&mut self.data).entries[position].ref_count += 1;
    }

    pub fn dec_ref(&mut self, index: EnumIndex) {
        let position = self.data.position_of(index);
        let entry = &mut Arc::make_mut(&mut self.data).entries[position];
        assert!(entry.ref_count > 0, "{index} reference count underflow");
        entry.ref_count -= 1;
    }

    /// Set the reference count of `index` to the observed `count`.
    pub fn fixup_ref_count(&mut self, index: EnumIndex, count: u32) {
        let position = self.data.position_of(index);
        if self.data.entries[position].ref_count == count {
            return;
        }
        let entry = &mut Arc::make_mut(&mut self.data).entries[position];
        debug!(
            enum_index = index.0,
            old = entry.ref_count,
            new = count,
            "fixed up reference count"
        );
        entry.ref_count = count;
    }

    /// Remove entries without references and recycle their indexes.
    /// A paged call frees at most one page of entries. Returns the number
    /// of entries removed.
    pub fn free_unused_enums(&mut self, do_paged: bool) -> usize {
        let limit = if do_paged { FREE_PAGE_SIZE } else { usize::MAX };
        let unused = self
            .data
            .entries
            .iter()
            .filter(|entry| entry.ref_count == 0)
            .take(limit)
            .count();
        if unused == 0 {
            return 0;
        }

        let dictionary = Arc::make_mut(&mut self.data);
        let mut freed = Vec::with_capacity(unused);
        dictionary.entries.retain(|entry| {
            if entry.ref_count == 0 && freed.len() < limit {
                freed.push(entry.index);
                false
            } else {
                true
            }
        });
        for index in &freed {
            dictionary.values[index.0 as usize] = None;
        }
        self.free_indexes.extend(freed.iter().copied());
        freed.len()
    }

    /// Replace the dictionary with `values`, which must be strictly
    /// increasing in dictionary order. Entries start without references
    /// or postings; enum index `i` holds `values[i]`.
    pub fn load_sorted(&mut self, values: Vec<AttributeValue>) -> Result<Vec<EnumIndex>> {
        if let Some(value) = values.iter().find(|value| value.kind() != self.kind) {
            return Err(AttributeError::invalid_argument(format!(
                "{:?} value {value} in {:?} dictionary",
                value.kind(),
                self.kind
            )));
        }
        if values
            .windows(2)
            .any(|w| w[0].cmp_exact(&w[1]) != Ordering::Less)
        {
            return Err(AttributeError::invalid_argument(
                "enumerated values are not strictly increasing",
            ));
        }

        let indexes: Vec<EnumIndex> = (0..values.len() as u32).map(EnumIndex).collect();
        let entries = indexes
            .iter()
            .map(|&index| DictEntry {
                index,
                ref_count: 0,
                data: EntryRef::NULL,
            })
            .collect();
        self.data = Arc::new(DictionaryData {
            entries,
            values: values.into_iter().map(Some).collect(),
        });
        self.free_indexes.clear();
        Ok(indexes)
    }

    pub fn checkpoint(&self) -> EnumStoreCheckpoint {
        EnumStoreCheckpoint {
            data: Arc::clone(&self.data),
            free_indexes: self.free_indexes.clone(),
        }
    }

    pub fn rollback(&mut self, checkpoint: EnumStoreCheckpoint) {
        self.data = checkpoint.data;
        self.free_indexes = checkpoint.free_indexes;
    }

    fn entry(&self, cursor: DictionaryCursor) -> &DictEntry {
        self.data
            .entries
            .get(cursor.0)
            .unwrap_or_else(|| panic!("dictionary cursor {} out of range", cursor.0))
    }

    fn allocate_index(&mut self) -> EnumIndex {
        match self.free_indexes.pop() {
            Some(index) => index,
            None => EnumIndex(self.data.values.len() as u32),
        }
    }
}
