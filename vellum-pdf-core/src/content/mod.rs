//! Appending drawing operators to existing pages
//!
//! New content always goes into a fresh stream wrapped in `q ... Q`; existing
//! streams are never rewritten. When the existing content leaves the graphics
//! state modified (unbalanced `q`/`Q`, or a `cm`/`gs` outside any pair) the old
//! streams are bracketed so the new block starts from the default state.

mod operation;
mod resources;
pub mod winansi;

pub use operation::{encode_operations, parse_operations, Operation};

use crate::document::Document;
use crate::error::{Result, StructuralError};
use crate::graphics::Color;
use crate::objects::{Dictionary, Object, ObjectId, PdfString, Stream};
use crate::page_tree::page_node;
use crate::writer::{format_real, write_name, write_string};
use resources::PageResources;

const FONT_RESOURCE: &str = "Helv";
const GSTATE_RESOURCE: &str = "GS";
const XOBJECT_RESOURCE: &str = "Im";

/// How [`draw_text`] sets its text
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_size: f64,
    pub color: Color,
    /// Counterclockwise, in degrees
    pub rotation: f64,
    pub opacity: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            color: Color::black(),
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

/// Where [`draw_image`] puts an image, in default user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Counterclockwise around the image center, in degrees
    pub rotation: f64,
    pub opacity: f64,
}

impl ImagePlacement {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

/// Graphics state depth profile of a sequence of operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct StateBalance {
    min_depth: i64,
    final_depth: i64,
    /// `cm` or `gs` while no `q` is open
    unguarded_change: bool,
}

impl StateBalance {
    fn of(operations: &[Operation]) -> Self {
        let mut balance = StateBalance::default();
        let mut depth = 0i64;
        for operation in operations {
            match operation.operator.as_str() {
                "q" => depth += 1,
                "Q" => {
                    depth -= 1;
                    balance.min_depth = balance.min_depth.min(depth);
                }
                "cm" | "gs" if depth <= 0 => balance.unguarded_change = true,
                _ => {}
            }
        }
        balance.final_depth = depth;
        balance
    }

    fn leaks(&self) -> bool {
        self.min_depth < 0 || self.final_depth != 0 || self.unguarded_change
    }
}

/// Whether `operations` draw anything or set state that drawing depends on.
fn depends_on_state(operations: &[Operation]) -> bool {
    operations
        .iter()
        .any(|op| !matches!(op.operator.as_str(), "q" | "Q" | "BMC" | "BDC" | "EMC" | "MP" | "DP"))
}

/// Decoded bytes of every stream in `ids`, newline separated. `None` when any
/// stream cannot be decoded.
pub(crate) fn concatenated_content(doc: &Document, ids: &[ObjectId]) -> Option<Vec<u8>> {
    let mut data = Vec::new();
    for &id in ids {
        let stream = doc.get(id).and_then(Object::as_stream)?;
        match stream.decoded_data() {
            Ok(decoded) => data.extend_from_slice(&decoded),
            Err(e) => {
                tracing::warn!("content stream {id} cannot be decoded: {e}");
                return None;
            }
        }
        data.push(b'\n');
    }
    Some(data)
}

/// Appends `operators` to the page as a new `q ... Q` content stream and
/// returns the new stream's id.
pub fn append_operators(doc: &mut Document, page: ObjectId, operators: &[u8]) -> Result<ObjectId> {
    doc.ensure_unlocked()?;
    let node = page_node(doc, page)?;
    if !node.dictionary.has_type("Page") {
        return Err(StructuralError::InvalidPageNode(page).into());
    }
    let new_operations = parse_operations(operators)?;
    let existing = node.content_ids(doc);

    // Q count at the start of the new stream; zero when no isolation is needed
    let mut restore = 0;
    let mut prefix = None;
    if !existing.is_empty() && depends_on_state(&new_operations) {
        let balance = concatenated_content(doc, &existing)
            .and_then(|data| parse_operations(&data).ok())
            .map(|ops| StateBalance::of(&ops))
            .unwrap_or(StateBalance {
                unguarded_change: true,
                ..StateBalance::default()
            });
        if balance.leaks() {
            let saves = 1 - balance.min_depth;
            restore = saves + balance.final_depth;
            tracing::debug!(%page, saves, restore, "isolating existing page content");
            prefix = Some(doc.add_object(Stream::new(b"q\n".repeat(saves as usize))));
        }
    }

    let mut data = b"Q\n".repeat(restore.max(0) as usize);
    data.extend_from_slice(b"q\n");
    data.extend_from_slice(operators);
    data.extend_from_slice(b"\nQ\n");
    let stream = doc.add_object(Stream::new(data));

    let mut contents: Vec<Object> = existing.into_iter().map(Object::Reference).collect();
    if let Some(prefix) = prefix {
        contents.insert(0, Object::Reference(prefix));
    }
    contents.push(Object::Reference(stream));
    let contents = match contents.as_slice() {
        [single] => single.clone(),
        _ => Object::Array(contents),
    };

    let dict = doc
        .get_mut(page)
        .and_then(Object::as_dict_mut)
        .ok_or(StructuralError::InvalidPageNode(page))?;
    dict.set("Contents", contents);
    Ok(stream)
}

fn is_helvetica(value: &Object) -> bool {
    value.as_dict().is_some_and(|font| {
        font.get_name("Subtype") == Some("Type1")
            && font.get_name("BaseFont") == Some("Helvetica")
            && font.get_name("Encoding") == Some("WinAnsiEncoding")
    })
}

/// Name of a Helvetica WinAnsi font on the page, adding one if needed.
fn ensure_helvetica(doc: &mut Document, resources: &mut PageResources) -> Result<String> {
    if let Some(name) = resources.find(doc, "Font", is_helvetica) {
        return Ok(name);
    }
    let mut font = Dictionary::new();
    font.set("Type", Object::name("Font"));
    font.set("Subtype", Object::name("Type1"));
    font.set("BaseFont", Object::name("Helvetica"));
    font.set("Encoding", Object::name("WinAnsiEncoding"));
    let font = doc.add_object(font);
    resources.insert(doc, "Font", FONT_RESOURCE, font.into())
}

/// Opacity rounded to two decimals and clamped to [0, 1].
fn normalize_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        return 1.0;
    }
    (opacity.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// Name of an `ExtGState` with fill and stroke alpha `opacity`, adding one if needed.
fn ensure_opacity_state(doc: &mut Document, resources: &mut PageResources, opacity: f64) -> Result<String> {
    let alpha = |dict: &Dictionary, key: &str| dict.get(key).and_then(Object::as_real);
    let matches = |value: &Object| {
        value
            .as_dict()
            .is_some_and(|gs| alpha(gs, "ca") == Some(opacity) && alpha(gs, "CA") == Some(opacity))
    };
    if let Some(name) = resources.find(doc, "ExtGState", matches) {
        return Ok(name);
    }
    let mut state = Dictionary::new();
    state.set("Type", Object::name("ExtGState"));
    state.set("ca", opacity);
    state.set("CA", opacity);
    let state = doc.add_object(state);
    resources.insert(doc, "ExtGState", GSTATE_RESOURCE, state.into())
}

fn push_name(out: &mut Vec<u8>, name: &str) {
    write_name(out, name);
    out.push(b' ');
}

fn push_numbers(out: &mut Vec<u8>, numbers: &[f64]) {
    for &n in numbers {
        out.extend_from_slice(format_real(n).as_bytes());
        out.push(b' ');
    }
}

fn rotation_terms(degrees: f64) -> (f64, f64) {
    let radians = degrees.to_radians();
    (radians.cos(), radians.sin())
}

/// Sets `text` in Helvetica with its baseline origin at `position`.
pub fn draw_text(
    doc: &mut Document,
    page: ObjectId,
    text: &str,
    position: (f64, f64),
    style: &TextStyle,
) -> Result<ObjectId> {
    doc.ensure_unlocked()?;
    let mut resources = PageResources::load(doc, page)?;
    let font = ensure_helvetica(doc, &mut resources)?;
    let state = ensure_opacity_state(doc, &mut resources, normalize_opacity(style.opacity))?;

    let (cos, sin) = rotation_terms(style.rotation);
    let mut ops = Vec::new();
    push_name(&mut ops, &state);
    ops.extend_from_slice(b"gs\n");
    ops.extend_from_slice(style.color.fill_operator().as_bytes());
    ops.extend_from_slice(b"\nBT\n");
    push_name(&mut ops, &font);
    push_numbers(&mut ops, &[style.font_size]);
    ops.extend_from_slice(b"Tf\n");
    push_numbers(&mut ops, &[cos, sin, -sin, cos, position.0, position.1]);
    ops.extend_from_slice(b"Tm\n");
    write_string(&mut ops, &PdfString::new(winansi::encode(text)));
    ops.extend_from_slice(b" Tj\nET");

    append_operators(doc, page, &ops)
}

/// Paints the image XObject `image` into the rectangle given by `placement`.
pub fn draw_image(doc: &mut Document, page: ObjectId, image: ObjectId, placement: &ImagePlacement) -> Result<ObjectId> {
    doc.ensure_unlocked()?;
    let is_image = doc
        .get(image)
        .and_then(Object::as_stream)
        .is_some_and(|s| s.dictionary().get_name("Subtype") == Some("Image"));
    if !is_image {
        return Err(StructuralError::InvalidObject {
            id: image,
            reason: "not an image XObject".to_string(),
        }
        .into());
    }

    let mut resources = PageResources::load(doc, page)?;
    let name = match resources.find(doc, "XObject", |v| v.as_reference() == Some(image)) {
        Some(name) => name,
        None => resources.insert(doc, "XObject", XOBJECT_RESOURCE, image.into())?,
    };
    let state = ensure_opacity_state(doc, &mut resources, normalize_opacity(placement.opacity))?;

    let ImagePlacement {
        x,
        y,
        width: w,
        height: h,
        ..
    } = *placement;
    let (cos, sin) = rotation_terms(placement.rotation);
    let (cx, cy) = (x + w / 2.0, y + h / 2.0);
    let matrix = [
        w * cos,
        w * sin,
        -h * sin,
        h * cos,
        cx - cos * w / 2.0 + sin * h / 2.0,
        cy - sin * w / 2.0 - cos * h / 2.0,
    ];

    let mut ops = Vec::new();
    push_name(&mut ops, &state);
    ops.extend_from_slice(b"gs\n");
    push_numbers(&mut ops, &matrix);
    ops.extend_from_slice(b"cm\n");
    push_name(&mut ops, &name);
    ops.extend_from_slice(b"Do");

    append_operators(doc, page, &ops)
}
