//! Building a document with one page per image

use crate::content::{draw_image, ImagePlacement};
use crate::document::Document;
use crate::error::{Result, StructuralError};
use crate::graphics::ImageXObject;
use crate::page_tree::create_page;

/// Page size for [`images_to_document`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSize {
    /// Page matches the image at the given resolution
    Natural { dpi: f64 },
    /// Fixed page size in points; the image is fitted inside the margin
    Fixed { width: f64, height: f64, margin: f64 },
}

impl PageSize {
    pub const A4: PageSize = PageSize::Fixed {
        width: 595.0,
        height: 842.0,
        margin: 36.0,
    };
    pub const LETTER: PageSize = PageSize::Fixed {
        width: 612.0,
        height: 792.0,
        margin: 36.0,
    };
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Natural { dpi: 72.0 }
    }
}

/// New document with one page per image, in order.
pub fn images_to_document(images: &[ImageXObject], size: PageSize) -> Result<Document> {
    if images.is_empty() {
        return Err(StructuralError::EmptySelection.into());
    }
    let mut doc = Document::new();
    for image in images {
        let (pixel_width, pixel_height) = (f64::from(image.width()), f64::from(image.height()));
        let (page_width, page_height, placement) = match size {
            PageSize::Natural { dpi } => {
                let scale = 72.0 / dpi.max(1.0);
                let (w, h) = (pixel_width * scale, pixel_height * scale);
                (w, h, ImagePlacement::new(0.0, 0.0, w, h))
            }
            PageSize::Fixed { width, height, margin } => {
                let (room_w, room_h) = ((width - 2.0 * margin).max(1.0), (height - 2.0 * margin).max(1.0));
                let fit = (room_w / pixel_width).min(room_h / pixel_height);
                let (w, h) = (pixel_width * fit, pixel_height * fit);
                (width, height, ImagePlacement::new((width - w) / 2.0, (height - h) / 2.0, w, h))
            }
        };
        let page = create_page(&mut doc, [0.0, 0.0, page_width, page_height], None)?;
        let image_id = image.add_to(&mut doc)?;
        draw_image(&mut doc, page, image_id, &placement)?;
    }
    tracing::debug!(pages = images.len(), "built document from images");
    Ok(doc)
}
