//! Integration tests for posting list maintenance.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use attribute_postings::attribute::{
    AttributeVector, EnumPostingAttribute, LoadedValue, PostingListAttribute,
};
use attribute_postings::config::{AttributeConfig, BasicType, CollectionType, PostingConfig};
use attribute_postings::dictionary::EnumStore;
use attribute_postings::error::Result;
use attribute_postings::posting::{EntryRef, PostingChange, PostingKind, PostingMap, PostingStore};
use attribute_postings::value::{AttributeValue, WeightedValue};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Posting content per folded group, keyed by the group head's value.
fn postings_by_group(attribute: &EnumPostingAttribute) -> BTreeMap<String, Vec<(u32, i32)>> {
    let reader = attribute.reader();
    let snapshot = reader.snapshot();
    let dictionary = snapshot.dictionary();
    let mut groups = BTreeMap::new();
    let mut prev = EntryRef::NULL;
    for entry in dictionary.entries() {
        let handle = entry.data();
        if handle == prev || !handle.is_valid() {
            continue;
        }
        prev = handle;
        let list = snapshot
            .postings()
            .get(handle)
            .unwrap_or_else(|| panic!("{handle} not in snapshot"));
        let key = dictionary.entry_value(entry).to_string().to_lowercase();
        assert!(groups.insert(key, list.to_vec()).is_none());
    }
    groups
}

fn weighted_strings() -> AttributeConfig {
    AttributeConfig::new("tags", BasicType::String, CollectionType::WeightedSet)
        .with_posting(PostingConfig {
            enable_bit_vectors: true,
            min_bit_vector_doc_freq: 4,
            bit_vector_doc_freq_divisor: 4,
            ..Default::default()
        })
}

#[test]
fn test_apply_change_scenario() -> Result<()> {
    let mut store = PostingStore::new(PostingKind::Weighted, PostingConfig::default(), false);
    let handle = store.apply(EntryRef::NULL, &[(3, 1), (7, 2)], &[])?;
    let handle = store.apply(handle, &[(7, 5), (9, 1)], &[3])?;

    assert_eq!(store.get(handle).unwrap().to_vec(), vec![(7, 5), (9, 1)]);
    assert_eq!(store.live_lists(), 1);
    Ok(())
}

#[test]
fn test_remove_dups_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let mut change = PostingChange::new();
        for _ in 0..rng.random_range(0..40) {
            let doc_id = rng.random_range(0..20);
            if rng.random_bool(0.6) {
                change.add(doc_id, rng.random_range(-5..5));
            } else {
                change.remove(doc_id);
            }
        }
        change.remove_dups();
        let once = change.clone();
        change.remove_dups();
        assert_eq!(change, once);
        assert!(change.is_normalized());
    }
}

#[test]
fn test_update_postings_matches_model() -> Result<()> {
    let config = AttributeConfig::new("w", BasicType::Int64, CollectionType::WeightedSet);
    let mut dictionary = EnumStore::new(config.value_kind());
    let mut postings = PostingListAttribute::new(&config);
    let index = dictionary.insert(42i64.into())?;

    let mut rng = StdRng::seed_from_u64(3);
    let mut model: BTreeMap<u32, i32> = BTreeMap::new();
    for _ in 0..100 {
        let mut changes = PostingMap::new();
        let change = changes.entry(index).or_default();
        let mut staged: BTreeMap<u32, Option<i32>> = BTreeMap::new();
        for _ in 0..rng.random_range(1..10) {
            let doc_id = rng.random_range(0..30);
            if rng.random_bool(0.5) {
                let weight = rng.random_range(1..100);
                change.add(doc_id, weight);
                staged.insert(doc_id, Some(weight));
            } else {
                change.remove(doc_id);
                // A removal never overrides an addition of the same batch.
                staged.entry(doc_id).or_insert(None);
            }
        }
        for (doc_id, weight) in staged {
            match weight {
                Some(weight) => model.insert(doc_id, weight),
                None => model.remove(&doc_id),
            };
        }
        postings.update_postings_folded(&mut dictionary, &mut changes)?;

        let handle = dictionary.data().find_posting_list(&42i64.into());
        let actual = postings.store().get(handle).map(|list| list.to_vec()).unwrap_or_default();
        let expected: Vec<(u32, i32)> = model.iter().map(|(&d, &w)| (d, w)).collect();
        assert_eq!(actual, expected);
    }
    Ok(())
}

#[test]
fn test_clear_postings_range() -> Result<()> {
    let config = AttributeConfig::new("a", BasicType::Int32, CollectionType::Array);
    let mut dictionary = EnumStore::new(config.value_kind());
    let mut postings = PostingListAttribute::new(&config);
    let index = dictionary.insert(1i64.into())?;
    let mut changes = PostingMap::new();
    for doc_id in 0..20 {
        changes.entry(index).or_default().add(doc_id, 1);
    }
    postings.update_postings_folded(&mut dictionary, &mut changes)?;

    postings.clear_postings_folded(&mut dictionary, index, 5, 12)?;
    let handle = dictionary.data().find_posting_list(&1i64.into());
    let docs: Vec<u32> = postings.store().get(handle).unwrap().doc_ids().to_vec();
    let expected: Vec<u32> = (0..5).chain(12..20).collect();
    assert_eq!(docs, expected);
    Ok(())
}

#[test]
fn test_clear_all_postings_nulls_handles() -> Result<()> {
    let config = AttributeConfig::new("a", BasicType::String, CollectionType::Array);
    let vector = AttributeVector::new(config.clone())?;
    let mut dictionary = EnumStore::new(config.value_kind());
    let mut postings = PostingListAttribute::new(&config);
    let mut changes = PostingMap::new();
    for (doc_id, value) in ["x", "y", "z"].into_iter().enumerate() {
        let index = dictionary.insert(value.into())?;
        changes.entry(index).or_default().add(doc_id as u32, 1);
    }
    postings.update_postings_folded(&mut dictionary, &mut changes)?;
    assert_eq!(postings.store().live_lists(), 3);

    postings.clear_all_postings(&vector, &mut dictionary);
    assert!(dictionary.data().entries().iter().all(|entry| entry.data() == EntryRef::NULL));
    assert_eq!(postings.store().live_lists(), 0);
    for value in ["x", "y", "z"] {
        let handle = dictionary.data().find_posting_list(&value.into());
        assert!(postings.store().get(handle).is_none());
    }
    Ok(())
}

#[test]
fn test_bulk_load_single_value_scenario() -> Result<()> {
    let config = AttributeConfig::new("s", BasicType::String, CollectionType::Single);
    let attribute = EnumPostingAttribute::new(config)?;
    let records = vec![
        LoadedValue::new("a", 0, 1),
        LoadedValue::new("a", 1, 1),
        LoadedValue::new("b", 2, 1),
    ];
    attribute.load(3, records)?;

    let groups = postings_by_group(&attribute);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups["a"], vec![(0, 1), (1, 1)]);
    assert_eq!(groups["b"], vec![(2, 1)]);

    let reader = attribute.reader();
    let dictionary = reader.snapshot().dictionary();
    assert_eq!(dictionary.len(), 2);
    assert_eq!(dictionary.entries()[0].ref_count(), 2);
    assert_eq!(reader.values(1), vec![WeightedValue::new("a", 1)]);
    Ok(())
}

#[test]
fn test_bulk_load_folds_and_skips_placeholders() -> Result<()> {
    let config = AttributeConfig::new("s", BasicType::String, CollectionType::Array);
    let attribute = EnumPostingAttribute::new(config)?;
    let records = vec![
        LoadedValue::new("Foo", 1, 1),
        LoadedValue::new("foo", 0, 1),
        LoadedValue::new("bar", 0, 1),
        LoadedValue::new("zap", 7, 1),
    ];
    attribute.load(2, records)?;

    let reader = attribute.reader();
    let dictionary = reader.snapshot().dictionary();
    let foo = dictionary.find_posting_list(&"foo".into());
    assert!(foo.is_valid());
    assert_eq!(dictionary.find_posting_list(&"FOO".into()), foo);
    assert_eq!(reader.posting_list(&"fOo".into()).unwrap().doc_ids(), &[0, 1]);
    // The placeholder value has no references and is dropped.
    assert_eq!(dictionary.find_exact(&"zap".into()), None);
    assert_eq!(
        reader.values(0),
        vec![WeightedValue::new("foo", 1), WeightedValue::new("bar", 1)]
    );
    Ok(())
}

#[test]
fn test_load_enumerated() -> Result<()> {
    use attribute_postings::attribute::LoadedEnumValue;

    let config = AttributeConfig::new("n", BasicType::Int64, CollectionType::WeightedSet);
    let attribute = EnumPostingAttribute::new(config)?;
    attribute.add_doc()?;
    attribute.append(0, 99i64, 1)?;
    attribute.commit()?;

    let values: Vec<AttributeValue> = vec![10i64.into(), 20i64.into(), 30i64.into()];
    let records = vec![
        LoadedEnumValue::new(2, 0, 3),
        LoadedEnumValue::new(0, 1, 4),
        LoadedEnumValue::new(0, 0, 5),
    ];
    attribute.load_enumerated(values, 2, records)?;

    assert!(attribute.posting_list(&99i64.into()).is_none());
    assert!(attribute.posting_list(&20i64.into()).is_none());
    assert_eq!(attribute.posting_list(&10i64.into()).unwrap().to_vec(), vec![(0, 5), (1, 4)]);
    assert_eq!(attribute.posting_list(&30i64.into()).unwrap().to_vec(), vec![(0, 3)]);
    assert_eq!(
        attribute.values(0),
        vec![WeightedValue::new(30i64, 3), WeightedValue::new(10i64, 5)]
    );
    assert_eq!(attribute.status().num_unique_values, 2);

    let bad = attribute.load_enumerated(vec![1i64.into()], 1, vec![LoadedEnumValue::new(4, 0, 1)]);
    assert!(bad.is_err());
    // A rejected load leaves the previous content in place.
    assert_eq!(attribute.posting_list(&30i64.into()).unwrap().to_vec(), vec![(0, 3)]);
    Ok(())
}

#[test]
fn test_shrink_lid_space() -> Result<()> {
    let config = AttributeConfig::new("a", BasicType::Int32, CollectionType::Array);
    let attribute = EnumPostingAttribute::new(config)?;
    for doc_id in 0..10 {
        attribute.add_doc()?;
        attribute.append(doc_id, 1i64, 1)?;
        attribute.append(doc_id, (doc_id as i64) + 100, 1)?;
    }
    attribute.commit()?;

    attribute.shrink_lid_space(4)?;
    assert_eq!(attribute.committed_doc_id_limit(), 4);
    assert_eq!(attribute.posting_list(&1i64.into()).unwrap().doc_ids(), &[0, 1, 2, 3]);
    assert!(attribute.posting_list(&105i64.into()).is_none());
    assert_eq!(attribute.status().num_unique_values, 5);
    assert!(attribute.append(4, 1i64, 1).is_err());
    Ok(())
}

/// Weighted-set model: per document the distinct raw values and weights.
type Model = BTreeMap<u32, BTreeMap<String, i32>>;

fn expected_groups(model: &Model) -> BTreeMap<String, Vec<(u32, i32)>> {
    let mut groups: BTreeMap<String, BTreeMap<u32, (String, i32)>> = BTreeMap::new();
    for (&doc_id, values) in model {
        for (value, &weight) in values {
            let member = groups.entry(value.to_lowercase()).or_default();
            let later = member.get(&doc_id).is_none_or(|(current, _)| {
                AttributeValue::from(value.as_str())
                    .cmp_exact(&AttributeValue::from(current.as_str()))
                    == Ordering::Greater
            });
            if later {
                member.insert(doc_id, (value.clone(), weight));
            }
        }
    }
    groups
        .into_iter()
        .map(|(key, docs)| (key, docs.into_iter().map(|(d, (_, w))| (d, w)).collect()))
        .collect()
}

fn assert_bit_vectors_consistent(attribute: &EnumPostingAttribute) {
    let reader = attribute.reader();
    let snapshot = reader.snapshot();
    let handles: BTreeSet<EntryRef> = snapshot
        .dictionary()
        .entries()
        .iter()
        .map(|entry| entry.data())
        .filter(|handle| handle.is_valid())
        .collect();
    for handle in handles {
        assert!(snapshot.postings().get(handle).unwrap().bit_vector_consistent());
    }
}

#[test]
fn test_incremental_updates_match_model_and_bulk_load() -> Result<()> {
    const VALUES: [&str; 8] = ["a", "A", "b", "B", "c", "ca", "Ca", "d"];
    let attribute = EnumPostingAttribute::new(weighted_strings())?;
    let mut model = Model::new();
    let mut rng = StdRng::seed_from_u64(42);

    for round in 0..40 {
        for _ in 0..rng.random_range(0..3) {
            let doc_id = attribute.add_doc()?;
            model.insert(doc_id, BTreeMap::new());
        }
        let num_docs = attribute.num_docs();
        if num_docs == 0 {
            continue;
        }
        for _ in 0..rng.random_range(1..12) {
            let doc_id = rng.random_range(0..num_docs);
            let value = VALUES[rng.random_range(0..VALUES.len())];
            let doc = model.entry(doc_id).or_default();
            match rng.random_range(0..10) {
                0 => {
                    attribute.clear_doc(doc_id)?;
                    doc.clear();
                }
                1..=2 => {
                    attribute.remove(doc_id, value)?;
                    doc.remove(value);
                }
                3 => {
                    let weight = rng.random_range(1..50);
                    attribute.set_values(doc_id, vec![WeightedValue::new(value, weight)])?;
                    doc.clear();
                    doc.insert(value.to_string(), weight);
                }
                _ => {
                    let weight = rng.random_range(1..50);
                    attribute.append(doc_id, value, weight)?;
                    doc.insert(value.to_string(), weight);
                }
            }
        }
        attribute.commit()?;

        assert_eq!(postings_by_group(&attribute), expected_groups(&model), "round {round}");
        assert_bit_vectors_consistent(&attribute);
    }

    // Rebuild the same state through the bulk path.
    let reader = attribute.reader();
    let mut records = Vec::new();
    for doc_id in 0..reader.doc_id_limit() {
        for value in reader.values(doc_id) {
            records.push(LoadedValue::new(value.value, doc_id, value.weight));
        }
    }
    let bulk = EnumPostingAttribute::new(weighted_strings())?;
    bulk.load(reader.doc_id_limit(), records)?;
    assert_eq!(postings_by_group(&bulk), postings_by_group(&attribute));
    assert_bit_vectors_consistent(&bulk);
    Ok(())
}
