//! Splitting a document into several

use crate::document::Document;
use crate::error::{Result, StructuralError};
use crate::page_tree::{extract_pages, page_count, PageRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitMode {
    /// One document per page
    SinglePages,
    /// Consecutive chunks of at most N pages
    ChunkSize(usize),
    /// One document per range
    Ranges(Vec<PageRange>),
    /// Start a new document before each of these 0-based page indices
    SplitAt(Vec<usize>),
}

/// Page index groups, one per output document.
pub fn split_groups(total: usize, mode: &SplitMode) -> Result<Vec<Vec<usize>>> {
    if total == 0 {
        return Err(StructuralError::EmptySelection.into());
    }
    let groups = match mode {
        SplitMode::SinglePages => (0..total).map(|i| vec![i]).collect(),
        SplitMode::ChunkSize(0) => {
            return Err(StructuralError::InvalidPageRange("chunk size must be positive".to_string()).into())
        }
        SplitMode::ChunkSize(size) => (0..total)
            .collect::<Vec<_>>()
            .chunks(*size)
            .map(<[usize]>::to_vec)
            .collect(),
        SplitMode::Ranges(ranges) => ranges
            .iter()
            .map(|range| range.indices(total))
            .collect::<Result<Vec<_>>>()?,
        SplitMode::SplitAt(points) => {
            let mut bounds: Vec<usize> = points.iter().copied().filter(|&p| p > 0 && p < total).collect();
            bounds.sort_unstable();
            bounds.dedup();
            bounds.push(total);
            let mut start = 0;
            bounds
                .into_iter()
                .map(|end| {
                    let group = (start..end).collect();
                    start = end;
                    group
                })
                .collect()
        }
    };
    Ok(groups)
}

/// One new document per group of `mode`; the source is not modified.
pub fn split_document(doc: &Document, mode: &SplitMode) -> Result<Vec<Document>> {
    let groups = split_groups(page_count(doc)?, mode)?;
    groups.iter().map(|indices| extract_pages(doc, indices)).collect()
}
