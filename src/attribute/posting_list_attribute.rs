//! Posting list maintenance for an enumerated attribute.
//!
//! The dictionary owns one [`EntryRef`] per entry; entries whose values fold
//! to the same canonical value share one posting list. This module keeps
//! those handles in step with the posting store, both when rebuilding all
//! postings from a load and when applying incremental changes.

use tracing::{debug, info};

use crate::attribute::loaded::{LoadedEnumValue, LoadedValue};
use crate::attribute::vector::AttributeVector;
use crate::config::AttributeConfig;
use crate::dictionary::{DictionaryCursor, EnumIndex, EnumStore};
use crate::error::Result;
use crate::posting::{EntryRef, MemoryUsage, PostingChange, PostingMap, PostingStore};
use crate::value::{EnumComparator, FoldedComparator};

/// Posting layer of one attribute.
#[derive(Debug)]
pub struct PostingListAttribute {
    store: PostingStore,
}

impl PostingListAttribute {
    pub fn new(config: &AttributeConfig) -> Self {
        PostingListAttribute {
            store: PostingStore::new(
                config.posting_kind(),
                config.posting.clone(),
                config.bit_vectors_enabled(),
            ),
        }
    }

    pub fn store(&self) -> &PostingStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PostingStore {
        &mut self.store
    }

    /// Release every posting list and null every dictionary handle.
    ///
    /// Entries of one folded group are adjacent and share a handle, so each
    /// list is released once. The generation is bumped before and after the
    /// walk.
    pub fn clear_all_postings(&mut self, vector: &AttributeVector, dictionary: &mut EnumStore) {
        self.bump_generation(vector);
        let mut cursor = dictionary.begin();
        if dictionary.is_valid(cursor) {
            dictionary.thaw(cursor);
        }
        let mut prev = EntryRef::NULL;
        while dictionary.is_valid(cursor) {
            let handle = dictionary.get_data(cursor);
            if handle != prev {
                if handle.is_valid() {
                    self.store.clear(handle);
                }
                prev = handle;
            }
            dictionary.write_data(cursor, EntryRef::NULL);
            cursor = dictionary.next(cursor);
        }
        self.bump_generation(vector);
    }

    /// Rebuild all postings from records referring to dictionary entries by
    /// ordinal.
    ///
    /// Records must be sorted by ordinal and their document ids must be
    /// below the document id limit. Reference counts are set to the number
    /// of records seen per entry, and entries left without references are
    /// freed afterwards.
    pub fn fill_postings_fixup_enum_base(
        &mut self,
        vector: &AttributeVector,
        dictionary: &mut EnumStore,
        loaded: &[LoadedEnumValue],
    ) -> Result<()> {
        self.clear_all_postings(vector, dictionary);
        if loaded.is_empty() {
            dictionary.free_unused_enums(false);
            return Ok(());
        }
        let doc_id_limit = vector.get_num_docs();

        let mut cursor = dictionary.begin();
        let mut group_head = cursor;
        assert!(
            dictionary.is_valid(cursor),
            "loaded values refer to an empty dictionary"
        );
        let mut prev_ordinal = 0u32;
        let mut ref_count = 0u32;
        let mut change = PostingChange::new();
        let mut groups = 0usize;

        for elem in loaded {
            if elem.enum_ordinal != prev_ordinal {
                assert!(
                    prev_ordinal < elem.enum_ordinal,
                    "loaded values out of ordinal order"
                );
                dictionary.fixup_ref_count(dictionary.key(cursor), ref_count);
                ref_count = 0;
                while prev_ordinal != elem.enum_ordinal {
                    cursor = dictionary.next(cursor);
                    assert!(
                        dictionary.is_valid(cursor),
                        "enum ordinal {} beyond dictionary",
                        elem.enum_ordinal
                    );
                    prev_ordinal += 1;
                }
                if dictionary.folded_change(dictionary.key(group_head), dictionary.key(cursor)) {
                    self.flush_group(dictionary, group_head, &mut change)?;
                    groups += 1;
                    group_head = cursor;
                }
            }
            ref_count += 1;
            assert!(
                elem.doc_id < doc_id_limit,
                "doc id {} beyond limit {doc_id_limit}",
                elem.doc_id
            );
            change.add(elem.doc_id, elem.weight);
        }
        assert!(ref_count != 0, "empty posting group");
        dictionary.fixup_ref_count(dictionary.key(cursor), ref_count);
        self.flush_group(dictionary, group_head, &mut change)?;
        groups += 1;

        let freed = dictionary.free_unused_enums(false);
        info!(
            attribute = vector.name(),
            records = loaded.len(),
            groups,
            freed,
            "filled postings from enumerated load"
        );
        Ok(())
    }

    /// Rebuild all postings from records sorted in dictionary order.
    ///
    /// Consecutive records whose values fold equal form one posting list.
    /// Placeholder records (document id at or beyond the limit) contribute
    /// no posting. Every record gets the handle of its group in `pidx`.
    pub fn handle_fill_postings(
        &mut self,
        vector: &AttributeVector,
        dictionary: &mut EnumStore,
        loaded: &mut [LoadedValue],
    ) -> Result<()> {
        self.clear_all_postings(vector, dictionary);
        let doc_id_limit = vector.get_num_docs();
        self.store.resize_bit_vectors(doc_id_limit, doc_id_limit);
        if loaded.is_empty() {
            return Ok(());
        }

        let mut change = PostingChange::new();
        let mut group_start = 0;
        let mut groups = 0usize;
        let mut placeholders = 0usize;
        for i in 0..loaded.len() {
            if loaded[group_start].value.folded_change(&loaded[i].value) {
                let handle = self.apply_new(&mut change)?;
                for record in &mut loaded[group_start..i] {
                    record.pidx = handle;
                }
                groups += 1;
                group_start = i;
            }
            let record = &loaded[i];
            if record.doc_id < doc_id_limit {
                change.add(record.doc_id, record.weight);
            } else {
                placeholders += 1;
            }
        }
        let handle = self.apply_new(&mut change)?;
        for record in &mut loaded[group_start..] {
            record.pidx = handle;
        }
        groups += 1;

        info!(
            attribute = vector.name(),
            records = loaded.len(),
            groups,
            placeholders,
            "filled postings from load"
        );
        Ok(())
    }

    /// Apply staged changes keyed by enum index.
    ///
    /// Each index must be exactly the entry `cmp` finds for it; with the
    /// folded comparator that is the head of its folded group. The new
    /// handle is written to every entry of the group.
    pub fn update_postings<C: EnumComparator + ?Sized>(
        &mut self,
        dictionary: &mut EnumStore,
        changes: &mut PostingMap,
        cmp: &C,
    ) -> Result<()> {
        for (&index, change) in changes.iter_mut() {
            let cursor = dictionary.lower_bound(index, cmp);
            assert!(
                dictionary.is_valid(cursor) && dictionary.key(cursor) == index,
                "no dictionary entry for {index}"
            );
            change.remove_dups();
            let handle = self.store.apply(
                dictionary.get_data(cursor),
                change.additions(),
                change.removals(),
            )?;
            dictionary.thaw(cursor);
            dictionary.write_group_data(cursor, handle);
        }
        Ok(())
    }

    /// [`Self::update_postings`] with changes keyed by folded group head.
    pub fn update_postings_folded(
        &mut self,
        dictionary: &mut EnumStore,
        changes: &mut PostingMap,
    ) -> Result<()> {
        self.update_postings(dictionary, changes, &FoldedComparator)
    }

    /// Remove documents `[from_doc_id, to_doc_id)` from the posting list of
    /// `index`. The dictionary itself is not restructured.
    pub fn clear_postings<C: EnumComparator + ?Sized>(
        &mut self,
        dictionary: &mut EnumStore,
        index: EnumIndex,
        from_doc_id: u32,
        to_doc_id: u32,
        cmp: &C,
    ) -> Result<()> {
        let mut change = PostingChange::new();
        for doc_id in from_doc_id..to_doc_id {
            change.remove(doc_id);
        }

        let cursor = dictionary.lower_bound(index, cmp);
        assert!(dictionary.is_valid(cursor), "no dictionary entry for {index}");
        let handle = dictionary.get_data(cursor);
        assert!(handle.is_valid(), "{index} has no posting list");

        let handle = self
            .store
            .apply(handle, change.additions(), change.removals())?;
        dictionary.thaw(cursor);
        dictionary.write_group_data(cursor, handle);
        Ok(())
    }

    /// [`Self::clear_postings`] locating the entry by folded value.
    pub fn clear_postings_folded(
        &mut self,
        dictionary: &mut EnumStore,
        index: EnumIndex,
        from_doc_id: u32,
        to_doc_id: u32,
    ) -> Result<()> {
        self.clear_postings(dictionary, index, from_doc_id, to_doc_id, &FoldedComparator)
    }

    /// Grow bit vectors to cover `doc_id`. Returns `false` when bit vectors
    /// are disabled or could not be resized.
    pub fn forwarded_on_add_doc(
        &mut self,
        doc_id: u32,
        want_size: u32,
        want_capacity: u32,
    ) -> bool {
        if !self.store.bit_vectors_enabled() {
            return false;
        }
        let want_size = want_size.max(doc_id + 1);
        let want_capacity = want_capacity.max(doc_id + 1);
        self.store.resize_bit_vectors(want_size, want_capacity)
    }

    /// Shrink bit vectors to `new_size` document ids.
    pub fn forwarded_shrink_lid_space(&mut self, new_size: u32) {
        if !self.store.resize_bit_vectors(new_size, new_size) && self.store.bit_vectors_enabled() {
            debug!(new_size, "bit vectors dropped on shrink");
        }
    }

    pub fn memory_usage(&self) -> MemoryUsage {
        self.store.memory_usage()
    }

    fn bump_generation(&mut self, vector: &AttributeVector) {
        self.store.assign_generation(vector.current_generation());
        vector.inc_generation();
    }

    fn apply_new(&mut self, change: &mut PostingChange) -> Result<EntryRef> {
        change.remove_dups();
        let handle = self
            .store
            .apply(EntryRef::NULL, change.additions(), change.removals())?;
        change.clear();
        Ok(handle)
    }

    fn flush_group(
        &mut self,
        dictionary: &mut EnumStore,
        group_head: DictionaryCursor,
        change: &mut PostingChange,
    ) -> Result<()> {
        let handle = self.apply_new(change)?;
        dictionary.thaw(group_head);
        dictionary.write_group_data(group_head, handle);
        Ok(())
    }
}
