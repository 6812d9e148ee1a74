//! Fixture builders shared by the integration tests

#![allow(dead_code)]

use vellum_pdf::images::{ImageCodec, RasterImage};
use vellum_pdf::page_tree::create_page;
use vellum_pdf::render::page_geometry;
use vellum_pdf::{CodecError, Dictionary, Document, Object, PdfString, Stream};

/// Content stream that identifies page `index`
pub fn page_marker(index: usize) -> Vec<u8> {
    format!("BT /F1 12 Tf 72 720 Td (Page {index}) Tj ET").into_bytes()
}

/// Document with `pages` Letter pages, each drawing its own marker text.
pub fn numbered_document(pages: usize) -> Document {
    let mut doc = Document::new();
    for index in 0..pages {
        create_page(&mut doc, [0.0, 0.0, 612.0, 792.0], Some(page_marker(index))).unwrap();
    }
    doc.set_info_entry("Title", PdfString::from_text("Numbered"));
    doc.set_info_entry("Producer", PdfString::from_text("vellum tests"));
    doc
}

/// Decoded, concatenated content of page `index`
pub fn page_content(doc: &Document, index: usize) -> Vec<u8> {
    page_geometry(doc, index).unwrap().content
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Raw RGB image stream of `width` by `height` noisy pixels.
pub fn rgb_image_stream(width: u32, height: u32) -> Stream {
    let mut samples = Vec::with_capacity((width * height * 3) as usize);
    let mut state = 0x2545_f491_u32;
    for _ in 0..width * height * 3 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        samples.push((state & 0xff) as u8);
    }
    let mut dict = Dictionary::new();
    dict.set("Type", Object::name("XObject"));
    dict.set("Subtype", Object::name("Image"));
    dict.set("Width", width);
    dict.set("Height", height);
    dict.set("ColorSpace", Object::name("DeviceRGB"));
    dict.set("BitsPerComponent", 8);
    Stream::with_dictionary(dict, samples)
}

/// One page showing one raw RGB image
pub fn image_document(width: u32, height: u32) -> Document {
    let mut doc = Document::new();
    let image = doc.add_object(rgb_image_stream(width, height));
    let page = create_page(
        &mut doc,
        [0.0, 0.0, 612.0, 792.0],
        Some(b"q 200 0 0 200 100 100 cm /Im0 Do Q".to_vec()),
    )
    .unwrap();
    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", image);
    let mut resources = Dictionary::new();
    resources.set("XObject", xobjects);
    doc.get_mut(page)
        .and_then(Object::as_dict_mut)
        .unwrap()
        .set("Resources", resources);
    doc
}

/// Codec whose output size follows quality and pixel count, so recompression
/// results are predictable without a real JPEG encoder.
pub struct SizedCodec;

impl ImageCodec for SizedCodec {
    fn decode(&self, data: &[u8]) -> Result<RasterImage, CodecError> {
        if data.len() < 9 || &data[..4] != b"SZ01" {
            return Err(CodecError::Decode("not a sized image".to_string()));
        }
        let width = u32::from(u16::from_be_bytes([data[4], data[5]]));
        let height = u32::from(u16::from_be_bytes([data[6], data[7]]));
        let components = data[8];
        let samples = vec![128; (width * height) as usize * components as usize];
        RasterImage::new(width, height, components, samples)
    }

    fn encode(&self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, CodecError> {
        let pixels = image.width as usize * image.height as usize * image.components as usize;
        let mut out = b"SZ01".to_vec();
        out.extend_from_slice(&(image.width as u16).to_be_bytes());
        out.extend_from_slice(&(image.height as u16).to_be_bytes());
        out.push(image.components);
        out.resize(9 + pixels * usize::from(quality) / 400, 0);
        Ok(out)
    }

    fn resize(&self, image: &RasterImage, width: u32, height: u32) -> Result<RasterImage, CodecError> {
        let samples = vec![128; width as usize * height as usize * image.components as usize];
        RasterImage::new(width, height, image.components, samples)
    }
}
