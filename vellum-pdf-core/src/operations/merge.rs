//! Concatenating documents

use crate::document::{deep_copy, CopyMap, Document};
use crate::error::{Result, StructuralError};
use crate::objects::Object;
use crate::page_tree::{import_pages, page_count, PageRange};

/// Where the merged document's `Info` entries come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataMode {
    #[default]
    FromFirst,
    FromDocument(usize),
    None,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Pages to take from each input, by position; missing entries mean all pages
    pub page_ranges: Vec<Option<PageRange>>,
    pub metadata: MetadataMode,
}

impl MergeOptions {
    pub fn with_page_ranges(mut self, ranges: Vec<Option<PageRange>>) -> Self {
        self.page_ranges = ranges;
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataMode) -> Self {
        self.metadata = metadata;
        self
    }
}

/// All pages of `first` followed by all pages of `second`.
pub fn merge(first: &Document, second: &Document) -> Result<Document> {
    merge_documents(&[first, second], &MergeOptions::default())
}

/// Pages of every input in order. Inputs are copied, never modified.
pub fn merge_documents(inputs: &[&Document], options: &MergeOptions) -> Result<Document> {
    if inputs.is_empty() {
        return Err(StructuralError::EmptySelection.into());
    }
    let mut merged = Document::new();
    if let Some(version) = inputs.iter().map(|doc| doc.version()).max() {
        merged.set_version(version);
    }

    for (position, input) in inputs.iter().enumerate() {
        let selection = match options.page_ranges.get(position) {
            Some(Some(range)) => Some(range.indices(page_count(input)?)?),
            _ => None,
        };
        let copied = import_pages(&mut merged, input, selection.as_deref())?;
        tracing::debug!(input = position, pages = copied.len(), "merged input");
    }

    let info_source = match options.metadata {
        MetadataMode::FromFirst => inputs.first(),
        MetadataMode::FromDocument(index) => inputs.get(index),
        MetadataMode::None => None,
    };
    if let Some(source) = info_source {
        if let Some(info) = source.info() {
            let mut map = CopyMap::new();
            for (key, value) in info.iter() {
                let copied = match (value, source.resolve(value)) {
                    (_, Object::Null) => continue,
                    (
                        Object::Reference(id),
                        Object::Dictionary(_) | Object::Array(_) | Object::Stream(_),
                    ) => Object::Reference(deep_copy(*id, source, &mut merged, &mut map)),
                    (_, resolved) => resolved.clone(),
                };
                merged.set_info_entry(key, copied);
            }
        }
    }
    Ok(merged)
}
