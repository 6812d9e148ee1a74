//! Whole-document operations built on the page tree and content editor
//!
//! Merging, splitting, watermarking and image import. Page selection uses
//! [`PageRange`](crate::page_tree::PageRange).

pub mod images;
pub mod merge;
pub mod split;
pub mod watermark;

pub use images::{images_to_document, PageSize};
pub use merge::{merge, merge_documents, MergeOptions, MetadataMode};
pub use split::{split_document, split_groups, SplitMode};
pub use watermark::{watermark_image, watermark_text, WatermarkOptions};
