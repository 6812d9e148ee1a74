//! Image recompression toward a target size

mod common;

use common::{image_document, numbered_document, SizedCodec};
use std::ops::ControlFlow;
use vellum_pdf::images::{
    compress_pdf, compress_pdf_with_progress, strip_metadata, CompressOptions, CompressionPreset,
};
use vellum_pdf::{Document, ErrorKind, Object, PdfString, Stream};

fn first_image(doc: &Document) -> Stream {
    let page = vellum_pdf::page_tree::get_page(doc, 0).unwrap();
    let id = page
        .resources
        .get_dict("XObject")
        .and_then(|x| x.get_reference("Im0"))
        .unwrap();
    doc.get(id).and_then(Object::as_stream).cloned().unwrap()
}

#[test]
fn test_output_never_grows() {
    let input = image_document(200, 200).write().unwrap();
    for preset in CompressionPreset::ALL {
        let outcome = compress_pdf(&input, &SizedCodec, &CompressOptions::new(preset)).unwrap();
        assert!(outcome.bytes.len() <= input.len(), "{preset:?}");
        assert_eq!(outcome.report.original_size, input.len());
        assert_eq!(outcome.report.compressed_size, outcome.bytes.len());
    }
}

#[test]
fn test_stronger_presets_shrink_more() {
    let input = image_document(300, 200).write().unwrap();
    let gentle = compress_pdf(&input, &SizedCodec, &CompressOptions::new(CompressionPreset::Maximum)).unwrap();
    let strong = compress_pdf(&input, &SizedCodec, &CompressOptions::new(CompressionPreset::Minimum)).unwrap();
    assert!(strong.bytes.len() <= gentle.bytes.len());
    assert!(strong.report.reduction >= gentle.report.reduction);
    assert_eq!(gentle.report.images_found, 1);
}

#[test]
fn test_recompressed_image_is_jpeg() {
    let input = image_document(120, 80).write().unwrap();
    let outcome = compress_pdf(&input, &SizedCodec, &CompressOptions::new(CompressionPreset::Medium)).unwrap();
    assert!(!outcome.report.returned_original);

    let doc = Document::parse(&outcome.bytes).unwrap();
    let image = first_image(&doc);
    assert_eq!(image.filters(), vec!["DCTDecode"]);
    assert_eq!(image.dictionary().get_integer("Width"), Some(120));
    assert!(image.data().starts_with(b"SZ01"));
}

#[test]
fn test_large_images_are_downscaled() {
    let input = image_document(1200, 600).write().unwrap();
    let options = CompressOptions::new(CompressionPreset::Minimum).with_max_attempts(1);
    let outcome = compress_pdf(&input, &SizedCodec, &options).unwrap();

    let doc = Document::parse(&outcome.bytes).unwrap();
    let image = first_image(&doc);
    assert_eq!(image.dictionary().get_integer("Width"), Some(1000));
    assert_eq!(image.dictionary().get_integer("Height"), Some(500));
}

#[test]
fn test_document_without_images_is_returned_as_is() {
    let doc = numbered_document(2);
    let input = doc.write_with_config(&vellum_pdf::WriterConfig::compact()).unwrap();
    let outcome = compress_pdf(&input, &SizedCodec, &CompressOptions::default()).unwrap();
    assert!(outcome.bytes.len() <= input.len());
    assert_eq!(outcome.report.images_found, 0);
}

#[test]
fn test_progress_can_cancel() {
    let input = image_document(64, 64).write().unwrap();
    let mut calls = 0;
    let result = compress_pdf_with_progress(&input, &SizedCodec, &CompressOptions::default(), |_| {
        calls += 1;
        ControlFlow::Break(())
    });
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
    assert_eq!(calls, 1);
}

#[test]
fn test_strip_metadata_removes_xmp_and_thumbnails() {
    let mut doc = numbered_document(1);
    let mut xmp = Stream::new(b"<x:xmpmeta/>".to_vec());
    xmp.dictionary_mut().set("Type", Object::name("Metadata"));
    xmp.dictionary_mut().set("Subtype", Object::name("XML"));
    let xmp = doc.add_object(xmp);
    doc.catalog_mut().unwrap().set("Metadata", xmp);
    doc.set_info_entry("Creator", PdfString::from_text("scanner"));

    let report = strip_metadata(&mut doc).unwrap();
    assert!(!report.is_empty());
    assert!(doc.catalog().unwrap().get("Metadata").is_none());

    let written = doc.write().unwrap();
    assert!(!written.windows(9).any(|w| w == b"xmpmeta/>"));
    assert_eq!(Document::parse(&written).unwrap().page_count().unwrap(), 1);
}
