//! Rasterization hand-off
//!
//! Rendering itself happens outside this crate. [`page_geometry`] collects what
//! a renderer needs for one page and [`Rasterizer`] is the seam it plugs into.

use crate::content::concatenated_content;
use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::objects::Dictionary;
use crate::page_tree::{get_page, page_count};
use crate::parser::ParseError;

/// Everything needed to draw one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub index: usize,
    pub media_box: [f64; 4],
    pub crop_box: Option<[f64; 4]>,
    /// Clockwise: 0, 90, 180 or 270
    pub rotation: i32,
    /// All content streams decoded and joined by newlines
    pub content: Vec<u8>,
    pub resources: Dictionary,
}

impl PageGeometry {
    /// Visible area: the crop box clipped to the media box.
    pub fn visible_box(&self) -> [f64; 4] {
        let media = self.media_box;
        match self.crop_box {
            Some(crop) => [
                crop[0].max(media[0]),
                crop[1].max(media[1]),
                crop[2].min(media[2]),
                crop[3].min(media[3]),
            ],
            None => media,
        }
    }

    /// Bitmap size at `scale` pixels per point, after rotation.
    pub fn pixel_size(&self, scale: f64) -> (u32, u32) {
        let [x0, y0, x1, y1] = self.visible_box();
        let to_pixels = |points: f64| (points.abs() * scale).round().max(1.0) as u32;
        let (w, h) = (to_pixels(x1 - x0), to_pixels(y1 - y0));
        if self.rotation % 180 == 0 {
            (w, h)
        } else {
            (h, w)
        }
    }
}

/// 8-bit RGBA pixels, row by row from the top
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaBitmap {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![255; width as usize * height as usize * 4],
        }
    }
}

/// External page renderer
pub trait Rasterizer {
    fn render(&self, page: &PageGeometry, scale: f64) -> Result<RgbaBitmap>;
}

/// Geometry of the page at `index`.
pub fn page_geometry(doc: &Document, index: usize) -> Result<PageGeometry> {
    doc.ensure_unlocked()?;
    let page = get_page(doc, index)?;
    let content = concatenated_content(doc, &page.content_ids(doc)).ok_or_else(|| {
        PdfError::from(ParseError::StreamDecodeError(format!(
            "content of page {} cannot be decoded",
            index + 1
        )))
    })?;
    Ok(PageGeometry {
        index,
        media_box: page.media_box,
        crop_box: page.crop_box,
        rotation: page.rotation,
        content,
        resources: page.resources,
    })
}

/// Renders every page in order.
pub fn render_pages(doc: &Document, rasterizer: &dyn Rasterizer, scale: f64) -> Result<Vec<RgbaBitmap>> {
    (0..page_count(doc)?)
        .map(|index| rasterizer.render(&page_geometry(doc, index)?, scale))
        .collect()
}
