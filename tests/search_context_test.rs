//! Integration tests for term search over attributes.

use attribute_postings::attribute::{AttributeReader, EnumPostingAttribute};
use attribute_postings::config::{AttributeConfig, BasicType, CollectionType, PostingConfig};
use attribute_postings::error::Result;
use attribute_postings::search::{SearchContext, TermFieldMatchData, collect_hits};
use attribute_postings::value::WeightedValue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_integers(config: AttributeConfig, docs: u32, seed: u64) -> Result<EnumPostingAttribute> {
    let attribute = EnumPostingAttribute::new(config)?;
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..docs {
        let doc_id = attribute.add_doc()?;
        let values = (0..rng.random_range(0..4))
            .map(|_| WeightedValue::new(rng.random_range(0..12i64), rng.random_range(1..10)))
            .collect();
        attribute.set_values(doc_id, values)?;
    }
    attribute.commit()?;
    Ok(attribute)
}

fn scan(context: &SearchContext<'_>) -> Vec<u32> {
    (0..context.doc_id_limit()).filter(|&doc_id| context.matches(doc_id)).collect()
}

fn filter_hits(context: &SearchContext<'_>, strict: bool) -> Vec<u32> {
    let mut match_data = TermFieldMatchData::new();
    let mut iterator = context.create_filter_iterator(&mut match_data, strict);
    collect_hits(iterator.as_mut(), 0, context.doc_id_limit())
}

fn posting_hits(context: &SearchContext<'_>, strict: bool) -> Vec<u32> {
    let mut match_data = TermFieldMatchData::new();
    let mut iterator = context.create_iterator(&mut match_data, strict);
    collect_hits(iterator.as_mut(), 0, context.doc_id_limit())
}

const TERMS: [&str; 8] = ["5", "[2;6]", "<3", ">7", "<2;9]", "[;4>", "42", "[8;2]"];

fn assert_paths_agree(reader: &AttributeReader) {
    for term in TERMS {
        let context = reader.search_context(term);
        let expected = scan(&context);
        for strict in [false, true] {
            assert_eq!(filter_hits(&context, strict), expected, "scan {term} strict={strict}");
            assert_eq!(posting_hits(&context, strict), expected, "postings {term} strict={strict}");
        }
    }
}

#[test]
fn test_scan_and_postings_agree() -> Result<()> {
    for collection_type in [CollectionType::Array, CollectionType::WeightedSet] {
        for is_filter in [false, true] {
            let config = AttributeConfig::new("n", BasicType::Int32, collection_type)
                .with_filter(is_filter);
            let attribute = random_integers(config, 200, 9)?;
            assert_paths_agree(&attribute.reader());
        }
    }
    Ok(())
}

#[test]
fn test_bit_vector_path_agrees() -> Result<()> {
    let config = AttributeConfig::new("bv", BasicType::Int64, CollectionType::Array)
        .with_posting(PostingConfig {
            enable_bit_vectors: true,
            min_bit_vector_doc_freq: 8,
            bit_vector_doc_freq_divisor: 16,
            ..Default::default()
        });
    let attribute = random_integers(config, 300, 5)?;
    let reader = attribute.reader();
    assert!(attribute.status().num_bit_vectors > 0);

    let context = reader.search_context("5");
    let mut match_data = TermFieldMatchData::new();
    let iterator = context.create_iterator(&mut match_data, true);
    assert!(format!("{iterator:?}").contains("BitVectorIterator"));
    drop(iterator);

    assert_paths_agree(&reader);
    Ok(())
}

#[test]
fn test_without_fast_search_falls_back_to_scan() -> Result<()> {
    let config = AttributeConfig::new("slow", BasicType::Int32, CollectionType::Array)
        .with_fast_search(false);
    let attribute = random_integers(config, 50, 1)?;
    let reader = attribute.reader();
    let context = reader.search_context("[0;11]");
    let mut match_data = TermFieldMatchData::new();
    let iterator = context.create_iterator(&mut match_data, true);
    assert!(format!("{iterator:?}").contains("AttributeIterator"));
    drop(iterator);
    assert_paths_agree(&reader);
    Ok(())
}

#[test]
fn test_invalid_term_yields_empty_iterator() -> Result<()> {
    let config = AttributeConfig::new("n", BasicType::Int32, CollectionType::Array);
    let attribute = random_integers(config, 20, 2)?;
    let reader = attribute.reader();
    let context = reader.search_context("not a number");
    assert!(!context.valid());
    assert!(!context.get_as_integer_term().is_valid());

    let mut match_data = TermFieldMatchData::new();
    let mut iterator = context.create_filter_iterator(&mut match_data, true);
    assert!(format!("{iterator:?}").contains("EmptySearch"));
    assert!(iterator.is_at_end());
    assert!(collect_hits(iterator.as_mut(), 0, 20).is_empty());
    drop(iterator);

    assert!(reader.try_search_context("not a number").is_err());
    Ok(())
}

#[test]
fn test_integer_term_range() -> Result<()> {
    let config = AttributeConfig::new("n", BasicType::Int64, CollectionType::Single);
    let attribute = EnumPostingAttribute::new(config)?;
    let reader = attribute.reader();
    let range = reader.search_context("[3;10>").get_as_integer_term();
    assert_eq!((range.lower(), range.upper()), (3, 9));
    let exact = reader.search_context("-7").get_as_integer_term();
    assert_eq!((exact.lower(), exact.upper()), (-7, -7));
    Ok(())
}

#[test]
fn test_find_and_ranked_unpack() -> Result<()> {
    let config = AttributeConfig::new("w", BasicType::Int32, CollectionType::WeightedSet);
    let attribute = EnumPostingAttribute::new(config)?;
    attribute.add_doc()?;
    attribute.add_doc()?;
    attribute.set_values(
        1,
        vec![
            WeightedValue::new(3i64, 10),
            WeightedValue::new(8i64, 20),
            WeightedValue::new(4i64, 30),
        ],
    )?;
    attribute.commit()?;

    let reader = attribute.reader();
    let context = reader.search_context("[3;4]");
    assert_eq!(context.find(1, 0), 0);
    assert_eq!(context.find(1, 1), 2);
    assert_eq!(context.find(1, 3), -1);
    assert_eq!(context.find(0, 0), -1);
    assert_eq!(context.find(5, 0), -1);
    assert_eq!(context.find_weighted(1, 1), (2, 30));
    assert_eq!(context.find_weighted(0, 0), (-1, 0));

    for strict in [false, true] {
        let mut match_data = TermFieldMatchData::new();
        let mut iterator = context.create_iterator(&mut match_data, strict);
        assert!(iterator.seek(1));
        iterator.unpack(1);
        let unpacked = iterator.match_data().unwrap();
        assert_eq!(unpacked.doc_id(), 1);
        let elements: Vec<(u32, i32)> = unpacked
            .elements()
            .iter()
            .map(|e| (e.element_id, e.weight))
            .collect();
        assert_eq!(elements, vec![(0, 10), (2, 30)]);
    }
    Ok(())
}

#[test]
fn test_filter_unpack_records_doc_only() -> Result<()> {
    let config =
        AttributeConfig::new("f", BasicType::String, CollectionType::Array).with_filter(true);
    let attribute = EnumPostingAttribute::new(config)?;
    attribute.add_doc()?;
    attribute.append(0, "Foo", 1)?;
    attribute.append(0, "food", 1)?;
    attribute.commit()?;

    let reader = attribute.reader();
    let context = reader.search_context("fo*");
    let mut match_data = TermFieldMatchData::new();
    let mut iterator = context.create_filter_iterator(&mut match_data, true);
    assert_eq!(iterator.doc_id(), 0);
    iterator.unpack(0);
    let unpacked = iterator.match_data().unwrap();
    assert_eq!(unpacked.doc_id(), 0);
    assert!(unpacked.elements().is_empty());
    assert_eq!(iterator.next(), attribute_postings::search::END_ID);
    Ok(())
}

#[test]
fn test_string_terms_fold_case() -> Result<()> {
    let config = AttributeConfig::new("s", BasicType::String, CollectionType::Single);
    let attribute = EnumPostingAttribute::new(config)?;
    for value in ["Foo", "FOOD", "fo", "f", "bar"] {
        let doc_id = attribute.add_doc()?;
        attribute.append(doc_id, value, 1)?;
    }
    attribute.commit()?;
    let reader = attribute.reader();

    let prefix = reader.search_context("fo*");
    assert_eq!(posting_hits(&prefix, true), vec![0, 1, 2]);
    assert_eq!(filter_hits(&prefix, false), vec![0, 1, 2]);
    let word = reader.search_context("FOO");
    assert_eq!(posting_hits(&word, true), vec![0]);
    assert!(posting_hits(&reader.search_context("baz"), true).is_empty());
    Ok(())
}

#[test]
fn test_float_ranges() -> Result<()> {
    let config = AttributeConfig::new("d", BasicType::Double, CollectionType::Array);
    let attribute = EnumPostingAttribute::new(config)?;
    for value in [0.5, 1.5, 2.0, 2.5, 3.0] {
        let doc_id = attribute.add_doc()?;
        attribute.append(doc_id, value, 1)?;
    }
    attribute.commit()?;
    let reader = attribute.reader();
    let context = reader.search_context("<1.5;2.5]");
    assert_eq!(posting_hits(&context, true), vec![2, 3]);
    assert_eq!(scan(&context), vec![2, 3]);
    Ok(())
}
