//! # vellum-pdf
//!
//! A PDF document model and transformation engine: parse a file into an
//! object graph, change it, and write a valid PDF back out.
//!
//! ## Features
//!
//! - **Parsing**: classic and stream cross-reference sections, incremental
//!   updates, object streams, and recovery of files with a broken xref
//! - **Page tree**: counting, extraction, removal, insertion and rotation of pages
//! - **Content editing**: text and image overlays appended without touching
//!   existing content streams
//! - **Compression**: iterative image recompression toward a target size
//!   reduction, plus lossless metadata stripping
//! - **Encryption**: the standard security handler, RC4 40/128-bit and AES 128/256-bit
//! - **Writing**: classic xref tables or compressed xref streams with object streams
//!
//! ## Quick Start
//!
//! ```rust
//! use vellum_pdf::operations::{watermark_text, WatermarkOptions};
//! use vellum_pdf::page_tree::create_page;
//! use vellum_pdf::{Document, Result};
//!
//! # fn main() -> Result<()> {
//! let mut doc = Document::new();
//! create_page(&mut doc, [0.0, 0.0, 595.0, 842.0], Some(b"0 0 m 100 100 l S".to_vec()))?;
//! watermark_text(&mut doc, "DRAFT", &WatermarkOptions::default())?;
//!
//! let bytes = doc.write()?;
//! let reopened = Document::parse(&bytes)?;
//! assert_eq!(reopened.page_count()?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Compressing
//!
//! ```rust,no_run
//! use vellum_pdf::images::{compress_pdf, CompressOptions, CompressionPreset, ImageCodec};
//!
//! # fn run(codec: &dyn ImageCodec) -> vellum_pdf::Result<()> {
//! let input = std::fs::read("scan.pdf")?;
//! let outcome = compress_pdf(&input, codec, &CompressOptions::new(CompressionPreset::Medium))?;
//! println!("saved {:.0}%", outcome.report.reduction * 100.0);
//! std::fs::write("scan.small.pdf", outcome.bytes)?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "compression")]
pub mod compression;
pub mod content;
pub mod document;
pub mod encryption;
pub mod error;
pub mod graphics;
pub mod images;
pub mod objects;
pub mod operations;
pub mod page_tree;
pub mod parser;
pub mod render;
pub mod writer;

pub use document::{deep_copy, CopyMap, Document, DocumentSummary};
pub use encryption::{decrypt, encrypt, EncryptionAlgorithm, EncryptionOptions, Permissions, SecurityInfo};
pub use error::{CodecError, ErrorKind, PdfError, Result, SecurityError, StructuralError};
pub use graphics::{Color, ImageXObject};
pub use images::{ImageCodec, RasterImage};
pub use objects::{Dictionary, Object, ObjectId, PdfString, Stream};
pub use page_tree::{PageNode, PageRange};
pub use parser::{ParseError, ParseOptions, PdfVersion};
pub use render::{PageGeometry, Rasterizer, RgbaBitmap};
pub use writer::WriterConfig;

#[cfg(feature = "external-images")]
pub use images::ImageCrateCodec;

/// Current version of vellum-pdf
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_document_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Document>();
    }
}
