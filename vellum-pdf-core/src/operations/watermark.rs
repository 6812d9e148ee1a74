//! Text and image watermarks centered on each selected page

use crate::content::{draw_image, draw_text, winansi, ImagePlacement, TextStyle};
use crate::document::Document;
use crate::error::Result;
use crate::graphics::{Color, ImageXObject};
use crate::objects::ObjectId;
use crate::page_tree::{page_ids, page_node, PageRange};
use std::collections::HashSet;

/// Baseline offset that puts the middle of Helvetica capitals on the anchor
const CAP_CENTER: f64 = 0.36;

/// Settings shared by [`watermark_text`] and [`watermark_image`]
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkOptions {
    pub pages: PageRange,
    pub opacity: f64,
    /// Counterclockwise, in degrees
    pub rotation: f64,
    pub font_size: f64,
    pub color: Color,
    /// Image size as a fraction of the largest size that fits the page
    pub image_scale: f64,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            pages: PageRange::All,
            opacity: 0.3,
            rotation: 45.0,
            font_size: 48.0,
            color: Color::gray(0.5),
            image_scale: 0.5,
        }
    }
}

impl WatermarkOptions {
    pub fn with_pages(mut self, pages: PageRange) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_image_scale(mut self, scale: f64) -> Self {
        self.image_scale = scale;
        self
    }
}

/// Selected page ids, deduplicated in selection order
fn selected_pages(doc: &Document, pages: &PageRange) -> Result<Vec<ObjectId>> {
    let ids = page_ids(doc)?;
    let mut seen = HashSet::new();
    Ok(pages
        .indices(ids.len())?
        .into_iter()
        .map(|index| ids[index])
        .filter(|id| seen.insert(*id))
        .collect())
}

fn center_of(media_box: [f64; 4]) -> (f64, f64) {
    (
        (media_box[0] + media_box[2]) / 2.0,
        (media_box[1] + media_box[3]) / 2.0,
    )
}

/// Draws `text` across the middle of every selected page. Returns the number
/// of pages changed.
pub fn watermark_text(doc: &mut Document, text: &str, options: &WatermarkOptions) -> Result<usize> {
    doc.ensure_unlocked()?;
    let pages = selected_pages(doc, &options.pages)?;
    let style = TextStyle {
        font_size: options.font_size,
        color: options.color,
        rotation: options.rotation,
        opacity: options.opacity,
    };
    let half_width = winansi::helvetica_width(&winansi::encode(text), options.font_size) / 2.0;
    let half_height = options.font_size * CAP_CENTER;
    let (cos, sin) = (options.rotation.to_radians().cos(), options.rotation.to_radians().sin());

    for &page in &pages {
        let (cx, cy) = center_of(page_node(doc, page)?.media_box);
        // Move the anchor back along the rotated baseline and down along its normal
        let origin = (
            cx - cos * half_width + sin * half_height,
            cy - sin * half_width - cos * half_height,
        );
        draw_text(doc, page, text, origin, &style)?;
    }
    tracing::debug!(pages = pages.len(), "added text watermark");
    Ok(pages.len())
}

/// Paints `image` centered on every selected page, scaled to
/// `options.image_scale` of the largest fitting size. The image is stored once.
pub fn watermark_image(doc: &mut Document, image: &ImageXObject, options: &WatermarkOptions) -> Result<usize> {
    doc.ensure_unlocked()?;
    let pages = selected_pages(doc, &options.pages)?;
    if pages.is_empty() {
        return Ok(0);
    }
    let image_id = image.add_to(doc)?;
    let (image_width, image_height) = (f64::from(image.width()), f64::from(image.height()));

    for &page in &pages {
        let node = page_node(doc, page)?;
        let fit = (node.width() / image_width).min(node.height() / image_height);
        let (width, height) = (image_width * fit * options.image_scale, image_height * fit * options.image_scale);
        let (cx, cy) = center_of(node.media_box);
        let placement = ImagePlacement {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
            rotation: options.rotation,
            opacity: options.opacity,
        };
        draw_image(doc, page, image_id, &placement)?;
    }
    tracing::debug!(pages = pages.len(), "added image watermark");
    Ok(pages.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::parse_operations;
    use crate::graphics::jpeg_header;
    use crate::page_tree::{create_page, get_page};

    fn doc_with_pages(count: usize) -> Document {
        let mut doc = Document::new();
        for _ in 0..count {
            create_page(&mut doc, [0.0, 0.0, 600.0, 800.0], Some(b"q Q".to_vec())).unwrap();
        }
        doc
    }

    #[test]
    fn test_unrotated_text_is_centered() {
        let mut doc = doc_with_pages(1);
        let options = WatermarkOptions::default().with_rotation(0.0).with_font_size(10.0);
        watermark_text(&mut doc, "WW", &options).unwrap();

        let page = get_page(&doc, 0).unwrap();
        let ids = page.content_ids(&doc);
        let data = doc.get(ids[1]).unwrap().as_stream().unwrap().data();
        let ops = parse_operations(data).unwrap();
        let tm = ops.iter().find(|op| op.operator == "Tm").unwrap();
        // "WW" is 18.88 wide at 10pt
        assert_eq!(tm.operands[4].as_real(), Some(290.56));
        assert_eq!(tm.operands[5].as_real(), Some(396.4));
    }

    #[test]
    fn test_page_selection() {
        let mut doc = doc_with_pages(3);
        let options = WatermarkOptions::default().with_pages(PageRange::parse("2-3").unwrap());
        assert_eq!(watermark_text(&mut doc, "DRAFT", &options).unwrap(), 2);
        let counts: Vec<usize> = (0..3).map(|i| get_page(&doc, i).unwrap().content_ids(&doc).len()).collect();
        assert_eq!(counts, vec![1, 2, 2]);

        let bad = WatermarkOptions::default().with_pages(PageRange::parse("4").unwrap());
        assert!(watermark_text(&mut doc, "DRAFT", &bad).is_err());
    }

    #[test]
    fn test_image_watermark_shares_one_image() {
        let mut doc = doc_with_pages(2);
        let image = ImageXObject::from_jpeg(jpeg_header(300, 100, 3, false)).unwrap();
        let before = doc.objects().len();
        let options = WatermarkOptions::default().with_rotation(0.0);
        assert_eq!(watermark_image(&mut doc, &image, &options).unwrap(), 2);

        let images = doc
            .objects()
            .values()
            .filter_map(|o| o.as_stream())
            .filter(|s| s.dictionary().get_name("Subtype") == Some("Image"))
            .count();
        assert_eq!(images, 1);
        // image, then per page: opacity state and content stream
        assert_eq!(doc.objects().len(), before + 1 + 2 * 2);

        let page = get_page(&doc, 0).unwrap();
        let data = doc.get(page.content_ids(&doc)[1]).unwrap().as_stream().unwrap().data();
        let ops = parse_operations(data).unwrap();
        let cm = ops.iter().find(|op| op.operator == "cm").unwrap();
        let values: Vec<f64> = cm.operands.iter().filter_map(|o| o.as_real()).collect();
        // fits 600 wide at half scale: 300 x 100, centered
        assert_eq!(values, vec![300.0, 0.0, 0.0, 100.0, 150.0, 350.0]);
    }
}
