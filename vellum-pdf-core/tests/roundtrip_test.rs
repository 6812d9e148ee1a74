//! Writer → parser round trips
//!
//! Documents are written with both cross-reference styles and parsed back;
//! the object graph must survive unchanged apart from renumbering.

mod common;

use common::{contains, numbered_document, page_content, page_marker};
use proptest::prelude::*;
use tempfile::TempDir;
use vellum_pdf::parser::ObjectParser;
use vellum_pdf::writer::write_object;
use vellum_pdf::{Document, Object, ParseOptions, PdfString, PdfVersion, WriterConfig};

fn assert_same_pages(a: &Document, b: &Document) {
    let count = a.page_count().unwrap();
    assert_eq!(b.page_count().unwrap(), count);
    for index in 0..count {
        assert_eq!(page_content(a, index), page_content(b, index));
    }
}

#[test]
fn test_classic_xref_round_trip() {
    let doc = numbered_document(3);
    let bytes = doc.write().unwrap();
    assert!(bytes.starts_with(b"%PDF-1.7"));
    assert!(contains(&bytes, b"\nxref\n"));
    assert!(bytes.ends_with(b"%%EOF\n"));

    let parsed = Document::parse(&bytes).unwrap();
    assert_same_pages(&doc, &parsed);
    assert_eq!(parsed.summary().title.as_deref(), Some("Numbered"));

    // A second pass is stable
    let again = parsed.write().unwrap();
    assert_eq!(again, bytes);
}

#[test]
fn test_compact_round_trip() {
    let doc = numbered_document(4);
    let classic = doc.write().unwrap();
    let compact = doc.write_with_config(&WriterConfig::compact()).unwrap();
    assert!(compact.len() < classic.len());
    assert!(contains(&compact, b"/ObjStm"));
    assert!(!contains(&compact, b"\nxref\n"));

    let parsed = Document::parse(&compact).unwrap();
    assert!(parsed.version() >= PdfVersion::V1_5);
    assert_same_pages(&doc, &parsed);

    let reparsed = Document::parse_with_options(&compact, &ParseOptions::strict()).unwrap();
    assert_same_pages(&doc, &reparsed);
}

#[test]
fn test_unreachable_objects_are_dropped() {
    let mut doc = numbered_document(1);
    doc.add_object(PdfString::from_text("orphan"));
    let bytes = doc.write().unwrap();
    assert!(!contains(&bytes, b"(orphan)"));

    let kept = doc
        .write_with_config(&WriterConfig {
            garbage_collect: false,
            ..WriterConfig::default()
        })
        .unwrap();
    assert!(contains(&kept, b"(orphan)"));
}

#[test]
fn test_incremental_update_wins() {
    let doc = numbered_document(1);
    let mut bytes = doc.write().unwrap();
    let parsed = Document::parse(&bytes).unwrap();
    let info = parsed.trailer().get_reference("Info").unwrap();
    let root = parsed.trailer().get_reference("Root").unwrap();

    let tail = String::from_utf8_lossy(&bytes).into_owned();
    let prev: u64 = tail[tail.rfind("startxref").unwrap() + 9..]
        .split_whitespace()
        .next()
        .unwrap()
        .parse()
        .unwrap();

    let object_offset = bytes.len();
    bytes.extend_from_slice(format!("{} 0 obj\n<< /Title (Revised) >>\nendobj\n", info.number()).as_bytes());
    let xref_offset = bytes.len();
    let section = format!(
        "xref\n{} 1\n{:010} 00000 n \ntrailer\n<< /Size {} /Root {} 0 R /Info {} 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
        info.number(),
        object_offset,
        parsed.next_object_number(),
        root.number(),
        info.number(),
        prev,
        xref_offset
    );
    bytes.extend_from_slice(section.as_bytes());

    let updated = Document::parse(&bytes).unwrap();
    assert_eq!(updated.summary().title.as_deref(), Some("Revised"));
    assert_eq!(page_content(&updated, 0), page_marker(0));
}

#[test]
fn test_recovers_from_broken_startxref() {
    let doc = numbered_document(2);
    let mut bytes = doc.write().unwrap();
    let at = bytes.windows(9).rposition(|w| w == b"startxref").unwrap();
    bytes.truncate(at);
    bytes.extend_from_slice(b"startxref\n999999\n%%EOF\n");

    let recovered = Document::parse(&bytes).unwrap();
    assert_same_pages(&doc, &recovered);
    assert!(Document::parse_with_options(&bytes, &ParseOptions::strict()).is_err());
}

#[test]
fn test_save_and_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("numbered.pdf");
    let doc = numbered_document(2);
    doc.save(&path).unwrap();

    let opened = Document::open(&path).unwrap();
    assert_same_pages(&doc, &opened);
}

#[test]
fn test_metadata_update_is_idempotent() {
    let mut doc = numbered_document(1);
    doc.set_info_entry("Author", PdfString::from_text("Ada"));
    let once = doc.write().unwrap();
    doc.set_info_entry("Author", PdfString::from_text("Ada"));
    let twice = doc.write().unwrap();
    assert_eq!(once, twice);

    let parsed = Document::parse(&twice).unwrap();
    assert_eq!(parsed.summary().author.as_deref(), Some("Ada"));
}

fn reparse_object(object: &Object) -> Object {
    let mut out = Vec::new();
    write_object(&mut out, object);
    out.push(b' ');
    ObjectParser::new(&out).parse_object().unwrap()
}

fn scalar_strategy() -> impl Strategy<Value = Object> {
    prop_oneof![
        Just(Object::Null),
        any::<bool>().prop_map(Object::Boolean),
        any::<i32>().prop_map(|n| Object::Integer(i64::from(n))),
        proptest::collection::vec(any::<u8>(), 0..64).prop_map(|b| Object::String(PdfString::new(b))),
        "[A-Za-z0-9#()/ <>.-]{1,24}".prop_map(Object::Name),
    ]
}

fn object_strategy() -> impl Strategy<Value = Object> {
    scalar_strategy().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(Object::Array),
            proptest::collection::btree_map("[A-Za-z]{1,8}", inner, 0..6).prop_map(|entries| {
                let mut dict = vellum_pdf::Dictionary::new();
                for (key, value) in entries {
                    dict.set(key, value);
                }
                Object::Dictionary(dict)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn prop_written_objects_parse_back(object in object_strategy()) {
        prop_assert_eq!(reparse_object(&object), object);
    }

    #[test]
    fn prop_reals_keep_six_decimals(value in -1.0e6f64..1.0e6) {
        let parsed = reparse_object(&Object::Real(value));
        let back = parsed.as_real().unwrap();
        prop_assert!((back - value).abs() <= 1e-6 * value.abs().max(1.0));
    }

    #[test]
    fn prop_parser_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = Document::parse(&data);
    }
}
