//! Enumerated multi-value attribute with posting lists.
//!
//! Writers buffer per-document updates and apply them in [`EnumPostingAttribute::commit`].
//! A commit diffs every touched document against its committed elements,
//! stages the differences per folded value group, merges them into the
//! posting store and publishes a new [`AttributeSnapshot`]. Readers pin a
//! generation and work on the snapshot that was current when they started.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ahash::AHashMap;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::attribute::loaded::{LoadedEnumValue, LoadedValue, sort_loaded_values};
use crate::attribute::posting_list_attribute::PostingListAttribute;
use crate::attribute::reader::{AttributeReader, AttributeSnapshot};
use crate::attribute::status::AttributeStatus;
use crate::attribute::vector::AttributeVector;
use crate::config::{AttributeConfig, CollectionType, ValueKind};
use crate::dictionary::{EnumIndex, EnumStore};
use crate::error::{AttributeError, Result};
use crate::multi_value::{MultiValueMapping, WeightedEnum};
use crate::posting::{EntryRef, MemoryUsage, PostingList, PostingMap};
use crate::value::{AttributeValue, WeightedValue};

/// Buffered update of one document.
#[derive(Debug, Clone, PartialEq)]
enum DocUpdate {
    Clear,
    Set(Vec<WeightedValue>),
    Append(WeightedValue),
    Remove(AttributeValue),
}

/// State owned by the single writer.
#[derive(Debug)]
struct Writer {
    dictionary: EnumStore,
    postings: PostingListAttribute,
    values: MultiValueMapping,
    pending: BTreeMap<u32, Vec<DocUpdate>>,
}

/// An enumerated attribute keeping one posting list per folded value.
#[derive(Debug)]
pub struct EnumPostingAttribute {
    vector: AttributeVector,
    writer: Mutex<Writer>,
    snapshot: ArcSwap<AttributeSnapshot>,
}

impl EnumPostingAttribute {
    pub fn new(config: AttributeConfig) -> Result<Self> {
        let vector = AttributeVector::new(config)?;
        let config = Arc::clone(vector.config());
        let writer = Writer {
            dictionary: EnumStore::new(config.value_kind()),
            postings: PostingListAttribute::new(&config),
            values: MultiValueMapping::new(),
            pending: BTreeMap::new(),
        };
        Ok(EnumPostingAttribute {
            vector,
            writer: Mutex::new(writer),
            snapshot: ArcSwap::from_pointee(AttributeSnapshot::empty()),
        })
    }

    pub fn vector(&self) -> &AttributeVector {
        &self.vector
    }

    pub fn config(&self) -> &AttributeConfig {
        self.vector.config()
    }

    pub fn name(&self) -> &str {
        self.vector.name()
    }

    /// Document id limit of the writer, including uncommitted documents.
    pub fn num_docs(&self) -> u32 {
        self.vector.get_num_docs()
    }

    /// Document id limit visible to readers.
    pub fn committed_doc_id_limit(&self) -> u32 {
        self.vector.committed_doc_id_limit()
    }

    /// Statistics of the last commit.
    pub fn status(&self) -> AttributeStatus {
        self.vector.get_status()
    }

    /// Posting store memory of the writer.
    pub fn memory_usage(&self) -> MemoryUsage {
        self.writer.lock().postings.memory_usage()
    }

    /// Add an empty document and return its id.
    pub fn add_doc(&self) -> Result<u32> {
        let mut writer = self.writer.lock();
        let doc_id = self.vector.get_num_docs();
        if doc_id >= u32::MAX - 1 {
            return Err(AttributeError::resource_exhausted("document id space exhausted"));
        }
        self.vector.set_num_docs(doc_id + 1);
        writer.values.add_doc(doc_id);
        let capacity = (doc_id + 1).checked_next_power_of_two().unwrap_or(u32::MAX);
        writer.postings.forwarded_on_add_doc(doc_id, doc_id + 1, capacity);
        Ok(doc_id)
    }

    /// Remove every value of `doc_id`.
    pub fn clear_doc(&self, doc_id: u32) -> Result<()> {
        self.check_doc(doc_id)?;
        self.push_update(doc_id, DocUpdate::Clear);
        Ok(())
    }

    /// Replace the values of `doc_id`.
    pub fn set_values(&self, doc_id: u32, values: Vec<WeightedValue>) -> Result<()> {
        self.check_doc(doc_id)?;
        let config = self.vector.config();
        if config.collection_type == CollectionType::Single && values.len() > 1 {
            return Err(AttributeError::invalid_argument(format!(
                "{} values for single value attribute '{}'",
                values.len(),
                config.name
            )));
        }
        let values = values
            .into_iter()
            .map(|v| self.normalize(v.value, v.weight))
            .collect::<Result<Vec<_>>>()?;
        self.push_update(doc_id, DocUpdate::Set(values));
        Ok(())
    }

    /// Add a value to `doc_id`. A weighted set replaces the weight of an
    /// existing equal value; a single value attribute replaces its value.
    pub fn append<V: Into<AttributeValue>>(
        &self,
        doc_id: u32,
        value: V,
        weight: i32,
    ) -> Result<()> {
        self.check_doc(doc_id)?;
        let value = self.normalize(value.into(), weight)?;
        self.push_update(doc_id, DocUpdate::Append(value));
        Ok(())
    }

    /// Remove every element of `doc_id` equal to `value`.
    pub fn remove<V: Into<AttributeValue>>(&self, doc_id: u32, value: V) -> Result<()> {
        self.check_doc(doc_id)?;
        let value = self.normalize(value.into(), 1)?.value;
        self.push_update(doc_id, DocUpdate::Remove(value));
        Ok(())
    }

    /// Apply buffered updates and publish them to readers.
    ///
    /// A failing batch is discarded as a whole and leaves the committed
    /// state untouched.
    pub fn commit(&self) -> Result<()> {
        let mut guard = self.writer.lock();
        let writer = &mut *guard;
        let updates = std::mem::take(&mut writer.pending);
        if !updates.is_empty() {
            let dictionary = writer.dictionary.checkpoint();
            let store = writer.postings.store().checkpoint();
            let values = writer.values.clone();
            let docs = updates.len();
            match self.apply_updates(writer, updates) {
                Ok(groups) => debug!(attribute = self.name(), docs, groups, "applied updates"),
                Err(err) => {
                    writer.dictionary.rollback(dictionary);
                    writer.postings.store_mut().rollback(store);
                    writer.values = values;
                    warn!(
                        attribute = self.name(),
                        docs,
                        error = %err,
                        "commit failed, batch discarded"
                    );
                    return Err(err);
                }
            }
        }
        self.publish(writer);
        Ok(())
    }

    /// Replace the attribute content with `records`.
    ///
    /// Records with a document id at or beyond `doc_id_limit` keep their
    /// value in the dictionary but add no posting. Buffered updates are
    /// dropped. A failing load leaves the attribute empty.
    pub fn load(&self, doc_id_limit: u32, records: Vec<LoadedValue>) -> Result<()> {
        let mut records = records
            .into_iter()
            .map(|record| {
                let normalized = self.normalize(record.value, record.weight)?;
                Ok(LoadedValue::new(normalized.value, record.doc_id, normalized.weight))
            })
            .collect::<Result<Vec<_>>>()?;
        sort_loaded_values(&mut records);
        self.check_loaded(records.iter().map(|r| (r.doc_id, &r.value)), doc_id_limit)?;

        let mut guard = self.writer.lock();
        let writer = &mut *guard;
        writer.pending.clear();
        self.vector.set_num_docs(doc_id_limit);
        if let Err(err) = self.fill_loaded(writer, doc_id_limit, &mut records) {
            self.reset(writer, doc_id_limit);
            warn!(attribute = self.name(), error = %err, "load failed, attribute emptied");
            return Err(err);
        }
        self.publish(writer);
        info!(
            attribute = self.name(),
            doc_id_limit,
            records = records.len(),
            unique_values = writer.dictionary.num_unique_values(),
            "loaded attribute"
        );
        Ok(())
    }

    /// Replace the attribute content with a sorted dictionary of `values`
    /// and records referring to it by ordinal.
    pub fn load_enumerated(
        &self,
        values: Vec<AttributeValue>,
        doc_id_limit: u32,
        records: Vec<LoadedEnumValue>,
    ) -> Result<()> {
        let kind = self.vector.config().value_kind();
        let values = values
            .into_iter()
            .map(|value| self.normalize(value, 1).map(|v| v.value))
            .collect::<Result<Vec<_>>>()?;
        let mut fresh = EnumStore::new(kind);
        let indexes = fresh.load_sorted(values)?;
        if let Some(record) = records
            .iter()
            .find(|r| r.enum_ordinal as usize >= indexes.len() || r.doc_id >= doc_id_limit)
        {
            return Err(AttributeError::invalid_argument(format!(
                "record ({}, doc {}) outside {} values and doc id limit {doc_id_limit}",
                record.enum_ordinal,
                record.doc_id,
                indexes.len()
            )));
        }
        let records: Vec<LoadedEnumValue> = records
            .into_iter()
            .map(|r| {
                LoadedEnumValue::new(r.enum_ordinal, r.doc_id, self.normalize_weight(r.weight))
            })
            .collect();
        let mut sorted = records.clone();
        sorted.sort_by_key(|r| (r.enum_ordinal, r.doc_id));
        self.check_loaded(
            sorted
                .iter()
                .map(|r| (r.doc_id, fresh.value(indexes[r.enum_ordinal as usize]))),
            doc_id_limit,
        )?;

        let mut guard = self.writer.lock();
        let writer = &mut *guard;
        writer.pending.clear();
        writer
            .postings
            .clear_all_postings(&self.vector, &mut writer.dictionary);
        writer.dictionary = fresh;
        self.vector.set_num_docs(doc_id_limit);
        writer
            .postings
            .store_mut()
            .resize_bit_vectors(doc_id_limit, doc_id_limit);
        if let Err(err) =
            writer
                .postings
                .fill_postings_fixup_enum_base(&self.vector, &mut writer.dictionary, &sorted)
        {
            self.reset(writer, doc_id_limit);
            warn!(
                attribute = self.name(),
                error = %err,
                "enumerated load failed, attribute emptied"
            );
            return Err(err);
        }

        let elements = records
            .iter()
            .map(|r| (r.doc_id, WeightedEnum::new(indexes[r.enum_ordinal as usize], r.weight)));
        writer.values = build_values(doc_id_limit, elements);
        self.publish(writer);
        Ok(())
    }

    /// Drop documents at and above `new_limit`.
    pub fn shrink_lid_space(&self, new_limit: u32) -> Result<()> {
        let mut guard = self.writer.lock();
        let writer = &mut *guard;
        let old_limit = self.vector.get_num_docs();
        if new_limit >= old_limit {
            return Ok(());
        }

        let removed: Vec<EnumIndex> = (new_limit..writer.values.num_docs())
            .flat_map(|doc_id| writer.values.get(doc_id).iter().map(|e| e.index))
            .collect();
        let heads: BTreeSet<EnumIndex> = removed
            .iter()
            .map(|&index| writer.dictionary.group_head(index))
            .collect();
        for &head in &heads {
            writer
                .postings
                .clear_postings_folded(&mut writer.dictionary, head, new_limit, old_limit)?;
        }
        for &index in &removed {
            writer.dictionary.dec_ref(index);
        }
        writer.values.shrink(new_limit);
        let freed = writer.dictionary.free_unused_enums(false);
        writer.postings.forwarded_shrink_lid_space(new_limit);
        self.vector.set_num_docs(new_limit);
        writer.pending.retain(|&doc_id, _| doc_id < new_limit);
        self.publish(writer);
        info!(
            attribute = self.name(),
            old_limit,
            new_limit,
            groups = heads.len(),
            freed,
            "shrank document id space"
        );
        Ok(())
    }

    /// Release retired posting lists no reader can still observe. Returns
    /// the number of lists released.
    pub fn reclaim_memory(&self) -> usize {
        let mut writer = self.writer.lock();
        let oldest_used = self.vector.oldest_used_generation();
        writer.postings.store_mut().reclaim(oldest_used)
    }

    /// Pin the current generation and return a view of the committed state.
    pub fn reader(&self) -> AttributeReader {
        let guard = self.vector.take_guard();
        let snapshot = self.snapshot.load_full();
        AttributeReader::new(guard, snapshot, Arc::clone(self.vector.config()))
    }

    /// Committed posting list shared by all values folding to `value`.
    pub fn posting_list(&self, value: &AttributeValue) -> Option<Arc<PostingList>> {
        self.reader().posting_list(value)
    }

    /// Committed values of `doc_id`.
    pub fn values(&self, doc_id: u32) -> Vec<WeightedValue> {
        self.reader().values(doc_id)
    }

    fn check_doc(&self, doc_id: u32) -> Result<()> {
        let num_docs = self.vector.get_num_docs();
        if doc_id >= num_docs {
            return Err(AttributeError::invalid_argument(format!(
                "document {doc_id} beyond limit {num_docs} of '{}'",
                self.name()
            )));
        }
        Ok(())
    }

    fn push_update(&self, doc_id: u32, update: DocUpdate) {
        self.writer
            .lock()
            .pending
            .entry(doc_id)
            .or_default()
            .push(update);
    }

    fn normalize_weight(&self, weight: i32) -> i32 {
        match self.vector.config().collection_type {
            CollectionType::WeightedSet => weight,
            _ => 1,
        }
    }

    /// Coerce `value` to the attribute's value kind.
    fn normalize(&self, value: AttributeValue, weight: i32) -> Result<WeightedValue> {
        let config = self.vector.config();
        let value = match (config.value_kind(), value) {
            (ValueKind::Integer, AttributeValue::Integer(v)) => {
                if let Some((min, max)) = config.basic_type.integer_bounds() {
                    if v < min || v > max {
                        return Err(AttributeError::invalid_argument(format!(
                            "{v} out of range for {:?} attribute '{}'",
                            config.basic_type, config.name
                        )));
                    }
                }
                AttributeValue::Integer(v)
            }
            (ValueKind::Float, AttributeValue::Integer(v)) => AttributeValue::Float(v as f64),
            (ValueKind::Float, value @ AttributeValue::Float(_)) => value,
            (ValueKind::String, value @ AttributeValue::String(_)) => value,
            (kind, value) => {
                return Err(AttributeError::invalid_argument(format!(
                    "{:?} value {value} for {kind:?} attribute '{}'",
                    value.kind(),
                    config.name
                )));
            }
        };
        Ok(WeightedValue {
            value,
            weight: self.normalize_weight(weight),
        })
    }

    /// Reject load records a document of this collection type cannot hold.
    /// `records` must be ordered by value, then document id.
    fn check_loaded<'v>(
        &self,
        records: impl Iterator<Item = (u32, &'v AttributeValue)>,
        doc_id_limit: u32,
    ) -> Result<()> {
        let collection_type = self.vector.config().collection_type;
        let mut per_doc: AHashMap<u32, usize> = AHashMap::new();
        let mut prev: Option<(u32, &AttributeValue)> = None;
        for (doc_id, value) in records {
            if doc_id >= doc_id_limit {
                prev = None;
                continue;
            }
            let duplicate = prev.is_some_and(|(prev_doc, prev_value)| {
                prev_doc == doc_id && prev_value.cmp_exact(value) == Ordering::Equal
            });
            if duplicate && collection_type == CollectionType::WeightedSet {
                return Err(AttributeError::invalid_argument(format!(
                    "value {value} repeated in weighted set of document {doc_id}"
                )));
            }
            let count = per_doc.entry(doc_id).or_default();
            *count += 1;
            if collection_type == CollectionType::Single && *count > 1 {
                return Err(AttributeError::invalid_argument(format!(
                    "document {doc_id} has several values in single value attribute"
                )));
            }
            prev = Some((doc_id, value));
        }
        Ok(())
    }

    /// Apply `updates` to the writer state. Returns the number of value
    /// groups whose postings changed.
    fn apply_updates(
        &self,
        writer: &mut Writer,
        updates: BTreeMap<u32, Vec<DocUpdate>>,
    ) -> Result<usize> {
        let collection_type = self.vector.config().collection_type;
        let num_docs = self.vector.get_num_docs();

        let mut staged = Vec::with_capacity(updates.len());
        for (doc_id, ops) in updates {
            if doc_id >= num_docs {
                continue;
            }
            let mut elements: Vec<WeightedValue> = writer
                .values
                .get(doc_id)
                .iter()
                .map(|e| WeightedValue {
                    value: writer.dictionary.value(e.index).clone(),
                    weight: e.weight,
                })
                .collect();
            for op in ops {
                apply_op(collection_type, &mut elements, op);
            }
            staged.push((doc_id, elements));
        }

        let mut interned = Vec::with_capacity(staged.len());
        for (doc_id, elements) in staged {
            let mut new = Vec::with_capacity(elements.len());
            for element in elements {
                let index = writer.dictionary.insert(element.value)?;
                new.push(WeightedEnum::new(index, element.weight));
            }
            interned.push((doc_id, new));
        }

        // Group heads are only stable once every new value is interned.
        let weighted = collection_type == CollectionType::WeightedSet;
        let mut changes = PostingMap::new();
        for (doc_id, new) in &interned {
            let old = group_weights(&writer.dictionary, writer.values.get(*doc_id), weighted);
            let new = group_weights(&writer.dictionary, new, weighted);
            for (head, weight) in &new {
                if old.get(head) != Some(weight) {
                    changes.entry(*head).or_default().add(*doc_id, *weight);
                }
            }
            for head in old.keys() {
                if !new.contains_key(head) {
                    changes.entry(*head).or_default().remove(*doc_id);
                }
            }
        }
        let groups = changes.len();
        writer
            .postings
            .update_postings_folded(&mut writer.dictionary, &mut changes)?;

        for (doc_id, new) in interned {
            let old = writer.values.set(doc_id, new);
            for element in old.iter() {
                writer.dictionary.dec_ref(element.index);
            }
        }
        writer.dictionary.free_unused_enums(false);
        Ok(groups)
    }

    fn fill_loaded(
        &self,
        writer: &mut Writer,
        doc_id_limit: u32,
        records: &mut [LoadedValue],
    ) -> Result<()> {
        writer
            .postings
            .handle_fill_postings(&self.vector, &mut writer.dictionary, records)?;

        let mut distinct: Vec<AttributeValue> = Vec::new();
        for record in records.iter() {
            if distinct
                .last()
                .is_none_or(|last| last.cmp_exact(&record.value) != Ordering::Equal)
            {
                distinct.push(record.value.clone());
            }
        }
        let indexes = writer.dictionary.load_sorted(distinct)?;

        let mut counts = vec![0u32; indexes.len()];
        let mut handles = vec![EntryRef::NULL; indexes.len()];
        let mut ordinal = 0;
        for i in 0..records.len() {
            if i > 0 && records[i - 1].value.cmp_exact(&records[i].value) != Ordering::Equal {
                ordinal += 1;
            }
            let record = &mut records[i];
            record.idx = Some(indexes[ordinal]);
            if record.doc_id < doc_id_limit {
                counts[ordinal] += 1;
            }
            handles[ordinal] = record.pidx;
        }

        let dictionary = &mut writer.dictionary;
        let mut cursor = dictionary.begin();
        if dictionary.is_valid(cursor) {
            dictionary.thaw(cursor);
        }
        for (ordinal, &index) in indexes.iter().enumerate() {
            dictionary.fixup_ref_count(index, counts[ordinal]);
            dictionary.write_data(cursor, handles[ordinal]);
            cursor = dictionary.next(cursor);
        }

        let mut elements: Vec<(u32, usize, WeightedEnum)> = records
            .iter()
            .filter(|r| r.doc_id < doc_id_limit)
            .filter_map(|r| r.idx.map(|idx| (r.doc_id, r.order, WeightedEnum::new(idx, r.weight))))
            .collect();
        elements.sort_by_key(|&(doc_id, order, _)| (doc_id, order));
        writer.values = build_values(
            doc_id_limit,
            elements.into_iter().map(|(doc_id, _, element)| (doc_id, element)),
        );
        writer.dictionary.free_unused_enums(false);
        Ok(())
    }

    /// Drop all content after a failed load.
    fn reset(&self, writer: &mut Writer, doc_id_limit: u32) {
        let config = self.vector.config();
        writer.dictionary = EnumStore::new(config.value_kind());
        writer.postings = PostingListAttribute::new(config);
        writer
            .postings
            .store_mut()
            .resize_bit_vectors(doc_id_limit, doc_id_limit);
        writer.values = build_values(doc_id_limit, std::iter::empty());
        self.publish(writer);
    }

    /// Freeze the writer state for readers, then advance the generation and
    /// reclaim what no reader can reach.
    fn publish(&self, writer: &mut Writer) {
        let doc_id_limit = self.vector.get_num_docs();
        let generation = self.vector.current_generation();
        self.snapshot.store(Arc::new(AttributeSnapshot {
            dictionary: writer.dictionary.freeze(),
            postings: writer.postings.store().freeze(),
            values: writer.values.clone(),
            doc_id_limit,
            generation,
        }));
        self.vector.set_committed_doc_id_limit(doc_id_limit);

        let store = writer.postings.store_mut();
        store.assign_generation(generation);
        let next = self.vector.inc_generation();
        trace!(attribute = self.name(), generation = next, "generation bumped");
        store.reclaim(self.vector.oldest_used_generation());

        self.vector.update_status(AttributeStatus {
            num_docs: doc_id_limit,
            num_values: writer.values.total_values(),
            num_unique_values: writer.dictionary.num_unique_values(),
            num_posting_lists: store.live_lists(),
            num_bit_vectors: store.bit_vector_count(),
            generation: next,
            posting_memory: store.memory_usage(),
        });
    }
}

fn apply_op(collection_type: CollectionType, elements: &mut Vec<WeightedValue>, op: DocUpdate) {
    match op {
        DocUpdate::Clear => elements.clear(),
        DocUpdate::Set(values) => {
            elements.clear();
            for value in values {
                apply_op(collection_type, elements, DocUpdate::Append(value));
            }
        }
        DocUpdate::Append(value) => match collection_type {
            CollectionType::Single => *elements = vec![value],
            CollectionType::Array => elements.push(value),
            CollectionType::WeightedSet => {
                match elements
                    .iter_mut()
                    .find(|e| e.value.cmp_exact(&value.value) == Ordering::Equal)
                {
                    Some(existing) => existing.weight = value.weight,
                    None => elements.push(value),
                }
            }
        },
        DocUpdate::Remove(value) => {
            elements.retain(|e| e.value.cmp_exact(&value) != Ordering::Equal);
        }
    }
}

/// Posting weight per folded group head for one document.
///
/// Plain postings carry weight 1. Weighted postings take the weight of the
/// group member last in dictionary order, as the bulk fill does.
fn group_weights(
    dictionary: &EnumStore,
    elements: &[WeightedEnum],
    weighted: bool,
) -> AHashMap<EnumIndex, i32> {
    let mut members: AHashMap<EnumIndex, (EnumIndex, i32)> =
        AHashMap::with_capacity(elements.len());
    for element in elements {
        let head = dictionary.group_head(element.index);
        let weight = if weighted { element.weight } else { 1 };
        members
            .entry(head)
            .and_modify(|member| {
                let later = dictionary
                    .value(element.index)
                    .cmp_exact(dictionary.value(member.0))
                    != Ordering::Less;
                if later {
                    *member = (element.index, weight);
                }
            })
            .or_insert((element.index, weight));
    }
    members
        .into_iter()
        .map(|(head, (_, weight))| (head, weight))
        .collect()
}

/// Multi-value mapping covering `doc_id_limit` documents, filled from
/// `(doc_id, element)` pairs grouped by document in element order.
fn build_values(
    doc_id_limit: u32,
    elements: impl Iterator<Item = (u32, WeightedEnum)>,
) -> MultiValueMapping {
    let mut values = MultiValueMapping::new();
    if doc_id_limit > 0 {
        values.add_doc(doc_id_limit - 1);
    }
    let mut per_doc: BTreeMap<u32, Vec<WeightedEnum>> = BTreeMap::new();
    for (doc_id, element) in elements {
        per_doc.entry(doc_id).or_default().push(element);
    }
    for (doc_id, elements) in per_doc {
        values.set(doc_id, elements);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BasicType;

    fn strings(collection_type: CollectionType) -> EnumPostingAttribute {
        EnumPostingAttribute::new(AttributeConfig::new("s", BasicType::String, collection_type))
            .unwrap()
    }

    fn docs(attribute: &EnumPostingAttribute, value: &str) -> Vec<(u32, i32)> {
        attribute
            .posting_list(&value.into())
            .map(|list| list.to_vec())
            .unwrap_or_default()
    }

    #[test]
    fn test_commit_publishes_postings() {
        let attribute = strings(CollectionType::Array);
        for _ in 0..3 {
            attribute.add_doc().unwrap();
        }
        attribute.append(0, "a", 1).unwrap();
        attribute.append(1, "a", 1).unwrap();
        attribute.append(2, "b", 1).unwrap();
        assert!(docs(&attribute, "a").is_empty());

        attribute.commit().unwrap();
        assert_eq!(docs(&attribute, "a"), vec![(0, 1), (1, 1)]);
        assert_eq!(docs(&attribute, "b"), vec![(2, 1)]);
        assert_eq!(attribute.status().num_posting_lists, 2);
        assert_eq!(attribute.committed_doc_id_limit(), 3);
    }

    #[test]
    fn test_folded_values_share_postings() {
        let attribute = strings(CollectionType::Array);
        for _ in 0..2 {
            attribute.add_doc().unwrap();
        }
        attribute.append(0, "foo", 1).unwrap();
        attribute.append(1, "FOO", 1).unwrap();
        attribute.commit().unwrap();
        assert_eq!(docs(&attribute, "Foo"), vec![(0, 1), (1, 1)]);

        attribute.remove(0, "foo").unwrap();
        attribute.commit().unwrap();
        assert_eq!(docs(&attribute, "foo"), vec![(1, 1)]);
        assert_eq!(attribute.status().num_unique_values, 1);
    }

    #[test]
    fn test_weighted_set_weights() {
        let attribute = EnumPostingAttribute::new(AttributeConfig::new(
            "w",
            BasicType::Int32,
            CollectionType::WeightedSet,
        ))
        .unwrap();
        attribute.add_doc().unwrap();
        attribute.append(0, 5i64, 10).unwrap();
        attribute.commit().unwrap();
        attribute.append(0, 5i64, 20).unwrap();
        attribute.commit().unwrap();
        assert_eq!(attribute.posting_list(&5i64.into()).unwrap().to_vec(), vec![(0, 20)]);
        assert_eq!(attribute.values(0), vec![WeightedValue::new(5i64, 20)]);
    }

    #[test]
    fn test_rejects_bad_updates() {
        let attribute = EnumPostingAttribute::new(AttributeConfig::new(
            "i8",
            BasicType::Int8,
            CollectionType::Single,
        ))
        .unwrap();
        attribute.add_doc().unwrap();
        assert!(attribute.append(1, 1i64, 1).is_err());
        assert!(attribute.append(0, 300i64, 1).is_err());
        assert!(attribute.append(0, "x", 1).is_err());
        assert!(
            attribute
                .set_values(0, vec![WeightedValue::new(1i64, 1), WeightedValue::new(2i64, 1)])
                .is_err()
        );
    }

    #[test]
    fn test_failed_commit_discards_batch() {
        let mut config = AttributeConfig::new("limited", BasicType::Int64, CollectionType::Array);
        config.posting.max_posting_entries = 2;
        let attribute = EnumPostingAttribute::new(config).unwrap();
        for _ in 0..3 {
            attribute.add_doc().unwrap();
        }
        attribute.append(0, 1i64, 1).unwrap();
        attribute.append(1, 1i64, 1).unwrap();
        attribute.commit().unwrap();

        attribute.append(2, 1i64, 1).unwrap();
        let err = attribute.commit().unwrap_err();
        assert!(err.is_resource_pressure());
        assert_eq!(attribute.posting_list(&1i64.into()).unwrap().to_vec(), vec![(0, 1), (1, 1)]);
        assert!(attribute.values(2).is_empty());

        // The batch is gone; the next commit succeeds.
        attribute.commit().unwrap();
        assert_eq!(attribute.status().num_values, 2);
    }

    #[test]
    fn test_reader_keeps_its_snapshot() {
        let attribute = strings(CollectionType::Single);
        attribute.add_doc().unwrap();
        attribute.append(0, "old", 1).unwrap();
        attribute.commit().unwrap();

        let reader = attribute.reader();
        attribute.append(0, "new", 1).unwrap();
        attribute.commit().unwrap();

        assert_eq!(reader.values(0), vec![WeightedValue::new("old", 1)]);
        assert!(reader.posting_list(&"old".into()).is_some());
        assert_eq!(attribute.values(0), vec![WeightedValue::new("new", 1)]);
        assert!(attribute.posting_list(&"old".into()).is_none());

        drop(reader);
        attribute.commit().unwrap();
        assert_eq!(attribute.memory_usage().allocated_bytes_on_hold, 0);
    }

    #[test]
    fn test_group_weights_takes_last_member() {
        let mut dictionary = EnumStore::new(ValueKind::String);
        let upper = dictionary.insert("A".into()).unwrap();
        let lower = dictionary.insert("a".into()).unwrap();
        let elements = [WeightedEnum::new(lower, 7), WeightedEnum::new(upper, 3)];

        let weighted = group_weights(&dictionary, &elements, true);
        assert_eq!(weighted.len(), 1);
        assert_eq!(weighted[&upper], 7);
        let plain = group_weights(&dictionary, &elements, false);
        assert_eq!(plain[&upper], 1);
    }

    #[test]
    fn test_cleared_postings_match_nothing() {
        use crate::config::PostingConfig;
        use crate::search::{TermFieldMatchData, collect_hits};

        let config = AttributeConfig::new("s", BasicType::String, CollectionType::Array)
            .with_posting(PostingConfig {
                enable_bit_vectors: true,
                min_bit_vector_doc_freq: 2,
                bit_vector_doc_freq_divisor: 4,
                ..Default::default()
            });
        let attribute = EnumPostingAttribute::new(config).unwrap();
        for value in ["Foo", "foo", "bar", "foo", "baz", "FOO"] {
            let doc_id = attribute.add_doc().unwrap();
            attribute.append(doc_id, value, 1).unwrap();
        }
        attribute.commit().unwrap();
        let before = attribute.reader();
        assert!(attribute.status().num_bit_vectors > 0);

        {
            let mut guard = attribute.writer.lock();
            let writer = &mut *guard;
            writer
                .postings
                .clear_all_postings(&attribute.vector, &mut writer.dictionary);
            attribute.publish(writer);
        }
        assert_eq!(attribute.status().num_posting_lists, 0);

        let terms = ["foo", "bar", "ba*", "f*"];
        let after = attribute.reader();
        for term in terms {
            let context = after.search_context(term);
            assert!(context.valid());
            for strict in [false, true] {
                let mut match_data = TermFieldMatchData::new();
                let mut iterator = context.create_iterator(&mut match_data, strict);
                let hits = collect_hits(iterator.as_mut(), 0, context.doc_id_limit());
                assert!(hits.is_empty(), "{term} strict={strict} matched {hits:?}");
            }
        }

        // A reader pinned before the clear keeps its lists.
        let context = before.search_context("foo");
        let mut match_data = TermFieldMatchData::new();
        let mut iterator = context.create_iterator(&mut match_data, true);
        assert_eq!(collect_hits(iterator.as_mut(), 0, 6), vec![0, 1, 3, 5]);
    }
}
