//! Page tree operations on documents that went through the writer and parser

mod common;

use common::{numbered_document, page_content, page_marker};
use proptest::prelude::*;
use std::collections::BTreeSet;
use vellum_pdf::operations::{merge, split_document, SplitMode};
use vellum_pdf::page_tree::{extract_pages, page_ids, remove_pages, rotate_pages, MAX_TREE_DEPTH};
use vellum_pdf::{deep_copy, CopyMap, Dictionary, Document, ErrorKind, Object, ObjectId};

fn reparse(doc: &Document) -> Document {
    Document::parse(&doc.write().unwrap()).unwrap()
}

#[test]
fn test_remove_first_and_last_of_ten() {
    let mut doc = reparse(&numbered_document(10));
    remove_pages(&mut doc, &BTreeSet::from([0, 9])).unwrap();

    let doc = reparse(&doc);
    assert_eq!(doc.page_count().unwrap(), 8);
    assert_eq!(page_content(&doc, 0), page_marker(1));
    assert_eq!(page_content(&doc, 7), page_marker(8));
}

#[test]
fn test_remove_every_page_is_rejected() {
    let mut doc = numbered_document(3);
    let before = doc.clone();
    let err = remove_pages(&mut doc, &BTreeSet::from([0, 1, 2])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WouldRemoveAllPages);
    assert_eq!(doc.objects(), before.objects());
    assert_eq!(doc.page_count().unwrap(), 3);
}

#[test]
fn test_out_of_range_index() {
    let mut doc = numbered_document(2);
    let err = remove_pages(&mut doc, &BTreeSet::from([5])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PageIndexOutOfRange);
    assert_eq!(doc.page_count().unwrap(), 2);
}

#[test]
fn test_extract_keeps_requested_order() {
    let source = reparse(&numbered_document(5));
    let extracted = reparse(&extract_pages(&source, &[4, 0, 4]).unwrap());

    assert_eq!(extracted.page_count().unwrap(), 3);
    assert_eq!(page_content(&extracted, 0), page_marker(4));
    assert_eq!(page_content(&extracted, 1), page_marker(0));
    assert_eq!(page_content(&extracted, 2), page_marker(4));
    assert_eq!(source.page_count().unwrap(), 5);
}

#[test]
fn test_merge_appends_in_order() {
    let a = reparse(&numbered_document(2));
    let b = reparse(&numbered_document(3));
    let merged = reparse(&merge(&a, &b).unwrap());

    assert_eq!(merged.page_count().unwrap(), 5);
    let expected = [0, 1, 0, 1, 2];
    for (index, marker) in expected.into_iter().enumerate() {
        assert_eq!(page_content(&merged, index), page_marker(marker));
    }
}

#[test]
fn test_split_then_merge_restores_pages() {
    let doc = numbered_document(4);
    let parts = split_document(&doc, &SplitMode::SinglePages).unwrap();
    assert_eq!(parts.len(), 4);

    let mut joined = parts[0].clone();
    for part in &parts[1..] {
        joined = merge(&joined, part).unwrap();
    }
    for index in 0..4 {
        assert_eq!(page_content(&joined, index), page_marker(index));
    }
}

#[test]
fn test_rotation_survives_round_trip() {
    let mut doc = numbered_document(2);
    rotate_pages(&mut doc, &[1], -90).unwrap();
    let doc = reparse(&doc);
    let rotation = vellum_pdf::page_tree::get_page(&doc, 1).unwrap().rotation;
    assert_eq!(rotation, 270);
    assert_eq!(vellum_pdf::page_tree::get_page(&doc, 0).unwrap().rotation, 0);
}

#[test]
fn test_tree_deeper_than_limit() {
    let mut doc = Document::new();
    let root = doc.catalog().unwrap().get_reference("Pages").unwrap();

    let mut leaf = Dictionary::new();
    leaf.set("Type", Object::name("Page"));
    let mut child = doc.add_object(leaf);
    for _ in 0..MAX_TREE_DEPTH + 2 {
        let mut node = Dictionary::new();
        node.set("Type", Object::name("Pages"));
        node.set("Kids", vec![Object::Reference(child)]);
        node.set("Count", 1);
        child = doc.add_object(node);
    }
    let pages = doc.get_mut(root).and_then(Object::as_dict_mut).unwrap();
    pages.set("Kids", vec![Object::Reference(child)]);

    let err = doc.page_count().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TreeTooDeep);
}

#[test]
fn test_deep_copy_terminates_on_cycles() {
    let mut from = Document::new();
    let a = from.add_object(Object::Null);
    let b = from.add_object(Object::Null);
    let mut first = Dictionary::new();
    first.set("Next", b);
    let mut second = Dictionary::new();
    second.set("Next", a);
    second.set("Self", b);
    from.set_object(a, first);
    from.set_object(b, second);

    let mut into = Document::new();
    let before = into.objects().len();
    let mut map = CopyMap::new();
    let copy_a = deep_copy(a, &from, &mut into, &mut map);

    assert_eq!(into.objects().len(), before + 2);
    let copy_b = into.get(copy_a).unwrap().as_dict().unwrap().get_reference("Next").unwrap();
    let copied = into.get(copy_b).unwrap().as_dict().unwrap();
    assert_eq!(copied.get_reference("Next"), Some(copy_a));
    assert_eq!(copied.get_reference("Self"), Some(copy_b));
}

fn assert_counts_consistent(doc: &Document) {
    let root = doc.catalog().unwrap().get_reference("Pages").unwrap();
    let mut pending: Vec<ObjectId> = vec![root];
    while let Some(id) = pending.pop() {
        let node = doc.get(id).unwrap().as_dict().unwrap();
        if node.has_type("Pages") {
            let kids: Vec<ObjectId> = node
                .get_array("Kids")
                .unwrap()
                .iter()
                .filter_map(Object::as_reference)
                .collect();
            let leaves = kids
                .iter()
                .map(|&kid| leaf_count(doc, kid))
                .sum::<i64>();
            assert_eq!(node.get_integer("Count"), Some(leaves));
            pending.extend(kids);
        }
    }
}

fn leaf_count(doc: &Document, id: ObjectId) -> i64 {
    let node = doc.get(id).unwrap().as_dict().unwrap();
    if node.has_type("Pages") {
        node.get_array("Kids")
            .unwrap()
            .iter()
            .filter_map(Object::as_reference)
            .map(|kid| leaf_count(doc, kid))
            .sum()
    } else {
        1
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_remove_keeps_survivors_in_order(
        total in 2usize..12,
        picks in proptest::collection::btree_set(0usize..12, 1..6),
    ) {
        let selection: BTreeSet<usize> = picks.into_iter().filter(|&i| i < total).collect();
        prop_assume!(!selection.is_empty() && selection.len() < total);

        let mut doc = numbered_document(total);
        remove_pages(&mut doc, &selection).unwrap();

        let survivors: Vec<usize> = (0..total).filter(|i| !selection.contains(i)).collect();
        prop_assert_eq!(doc.page_count().unwrap(), survivors.len());
        for (index, original) in survivors.iter().enumerate() {
            prop_assert_eq!(page_content(&doc, index), page_marker(*original));
        }
        assert_counts_consistent(&doc);
    }

    #[test]
    fn prop_extract_matches_indices(indices in proptest::collection::vec(0usize..6, 1..8)) {
        let source = numbered_document(6);
        let extracted = extract_pages(&source, &indices).unwrap();
        prop_assert_eq!(page_ids(&extracted).unwrap().len(), indices.len());
        for (index, original) in indices.iter().enumerate() {
            prop_assert_eq!(page_content(&extracted, index), page_marker(*original));
        }
        assert_counts_consistent(&extracted);
    }
}
