//! Iterative image recompression toward a target size reduction
//!
//! Every attempt starts from a fresh parse of the original bytes so lossy
//! passes never compound. Attempts tighten quality and dimensions until the
//! measured reduction is close enough to the target or the attempt budget is
//! spent; the smallest output wins and is never larger than the input.

use super::{fit_within, strip_metadata, ImageCodec, RasterImage};
use crate::document::Document;
use crate::error::{CodecError, PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::page_tree::{page_ids, page_node};
use crate::writer::WriterConfig;
use std::collections::{BTreeSet, HashSet};
use std::ops::ControlFlow;

/// Quality tiers, from gentlest to most aggressive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CompressionPreset {
    Maximum,
    High,
    Medium,
    Low,
    Minimum,
}

impl CompressionPreset {
    pub const ALL: [CompressionPreset; 5] = [
        CompressionPreset::Maximum,
        CompressionPreset::High,
        CompressionPreset::Medium,
        CompressionPreset::Low,
        CompressionPreset::Minimum,
    ];

    /// JPEG quality for recompressed images
    pub fn quality(self) -> u8 {
        match self {
            CompressionPreset::Maximum => 90,
            CompressionPreset::High => 80,
            CompressionPreset::Medium => 65,
            CompressionPreset::Low => 50,
            CompressionPreset::Minimum => 35,
        }
    }

    /// Longest image side in pixels
    pub fn max_dimension(self) -> u32 {
        match self {
            CompressionPreset::Maximum => 4096,
            CompressionPreset::High => 3000,
            CompressionPreset::Medium => 2000,
            CompressionPreset::Low => 1500,
            CompressionPreset::Minimum => 1000,
        }
    }

    /// Size reduction this tier usually reaches
    pub fn target_reduction(self) -> f64 {
        match self {
            CompressionPreset::Maximum => 0.10,
            CompressionPreset::High => 0.25,
            CompressionPreset::Medium => 0.40,
            CompressionPreset::Low => 0.55,
            CompressionPreset::Minimum => 0.70,
        }
    }

    /// The gentlest tier whose hint reaches `target` (a fraction).
    pub fn for_target(target: f64) -> Self {
        Self::ALL
            .into_iter()
            .find(|preset| preset.target_reduction() >= target)
            .unwrap_or(CompressionPreset::Minimum)
    }
}

impl std::str::FromStr for CompressionPreset {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "maximum" | "max" => Ok(CompressionPreset::Maximum),
            "high" => Ok(CompressionPreset::High),
            "medium" => Ok(CompressionPreset::Medium),
            "low" => Ok(CompressionPreset::Low),
            "minimum" | "min" => Ok(CompressionPreset::Minimum),
            other => Err(CodecError::Unsupported(format!("unknown compression preset '{other}'")).into()),
        }
    }
}

/// Compression settings
#[derive(Debug, Clone, PartialEq)]
pub struct CompressOptions {
    pub preset: CompressionPreset,
    /// Custom target reduction in percent; overrides the preset's hint
    pub target_percent: Option<f64>,
    pub max_attempts: u32,
    /// Quality multiplier applied between attempts
    pub quality_backoff: f64,
    /// Dimension multiplier applied between attempts
    pub dimension_backoff: f64,
    /// An attempt succeeds once it reaches this share of the target
    pub success_ratio: f64,
    pub min_quality: u8,
    pub strip_metadata: bool,
    /// Fail when images were found but none could be recompressed
    pub require_images: bool,
    pub writer: WriterConfig,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            preset: CompressionPreset::Medium,
            target_percent: None,
            max_attempts: 3,
            quality_backoff: 0.7,
            dimension_backoff: 0.75,
            success_ratio: 0.9,
            min_quality: 10,
            strip_metadata: true,
            require_images: false,
            writer: WriterConfig::compact(),
        }
    }
}

impl CompressOptions {
    pub fn new(preset: CompressionPreset) -> Self {
        Self {
            preset,
            ..Self::default()
        }
    }

    /// Custom target, clamped to [0, 95] percent.
    pub fn with_target_percent(mut self, percent: f64) -> Self {
        self.target_percent = Some(percent);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_require_images(mut self, require: bool) -> Self {
        self.require_images = require;
        self
    }

    pub fn with_writer(mut self, writer: WriterConfig) -> Self {
        self.writer = writer;
        self
    }

    /// Target reduction as a fraction in [0, 0.95]
    pub fn target(&self) -> f64 {
        match self.target_percent {
            Some(percent) if percent.is_finite() => percent.clamp(0.0, 95.0) / 100.0,
            Some(_) => 0.0,
            None => self.preset.target_reduction(),
        }
    }

    fn starting_preset(&self) -> CompressionPreset {
        match self.target_percent {
            Some(_) => CompressionPreset::for_target(self.target()),
            None => self.preset,
        }
    }
}

/// Reported before each image; returning `Break` aborts the operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageProgress {
    pub attempt: u32,
    /// 0-based position among this attempt's images
    pub index: usize,
    pub total: usize,
    pub image: ObjectId,
}

/// An image left untouched because it could not be processed
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SkippedImage {
    pub object_number: u32,
    pub reason: String,
}

/// Outcome of one recompression pass over a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageStats {
    pub found: usize,
    pub recompressed: usize,
    /// Re-encoding would not have been smaller
    pub kept: usize,
    pub skipped: Vec<SkippedImage>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CompressionReport {
    pub original_size: usize,
    pub compressed_size: usize,
    /// Achieved reduction as a fraction
    pub reduction: f64,
    pub target_reduction: f64,
    pub attempts: u32,
    pub quality: u8,
    pub max_dimension: u32,
    pub images_found: usize,
    pub images_recompressed: usize,
    pub skipped: Vec<SkippedImage>,
    /// Nothing helped and the input was returned as is
    pub returned_original: bool,
}

#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub bytes: Vec<u8>,
    pub report: CompressionReport,
}

/// One finished pass of the compression loop
struct Attempt {
    bytes: Vec<u8>,
    quality: u8,
    max_dimension: u32,
    stats: ImageStats,
}

/// Compresses `input` without progress reporting.
pub fn compress_pdf(input: &[u8], codec: &dyn ImageCodec, options: &CompressOptions) -> Result<CompressionOutcome> {
    compress_pdf_with_progress(input, codec, options, |_: &ImageProgress| ControlFlow::Continue(()))
}

/// Compresses `input`, calling `observer` before each image.
pub fn compress_pdf_with_progress<F>(
    input: &[u8],
    codec: &dyn ImageCodec,
    options: &CompressOptions,
    mut observer: F,
) -> Result<CompressionOutcome>
where
    F: FnMut(&ImageProgress) -> ControlFlow<()>,
{
    let original_size = input.len();
    let target = options.target();
    let preset = options.starting_preset();
    let mut quality = preset.quality();
    let mut max_dimension = preset.max_dimension();

    let mut best: Option<Attempt> = None;
    let mut last_stats = ImageStats::default();
    let mut attempts = 0;

    while attempts < options.max_attempts.max(1) {
        attempts += 1;
        tracing::debug!(attempt = attempts, quality, max_dimension, "compression attempt");

        let mut doc = Document::parse(input)?;
        doc.ensure_unlocked()?;
        if options.strip_metadata {
            strip_metadata(&mut doc)?;
        }
        let stats = recompress_images(&mut doc, codec, quality, max_dimension, |progress| {
            observer(&ImageProgress {
                attempt: attempts,
                ..*progress
            })
        })?;
        if options.require_images && stats.found > 0 && stats.recompressed + stats.kept == 0 {
            return Err(CodecError::Decode(format!(
                "none of {} images could be recompressed",
                stats.found
            ))
            .into());
        }

        let output = doc.write_with_config(&options.writer)?;
        let reduction = reduction(original_size, output.len());
        tracing::debug!(attempt = attempts, size = output.len(), reduction, "attempt finished");

        if best.as_ref().map_or(true, |attempt| output.len() < attempt.bytes.len()) {
            best = Some(Attempt {
                bytes: output,
                quality,
                max_dimension,
                stats: stats.clone(),
            });
        }
        last_stats = stats;
        if reduction >= options.success_ratio * target {
            break;
        }

        quality = ((f64::from(quality) * options.quality_backoff).round() as u8).max(options.min_quality);
        max_dimension = ((f64::from(max_dimension) * options.dimension_backoff).round() as u32).max(1);
    }

    // Statistics describe the attempt whose bytes are returned
    let (bytes, quality, max_dimension, stats, returned_original) = match best {
        Some(attempt) if attempt.bytes.len() < original_size => (
            attempt.bytes,
            attempt.quality,
            attempt.max_dimension,
            attempt.stats,
            false,
        ),
        _ => {
            let untouched = ImageStats {
                recompressed: 0,
                kept: last_stats.found.saturating_sub(last_stats.skipped.len()),
                ..last_stats
            };
            (input.to_vec(), quality, max_dimension, untouched, true)
        }
    };

    let report = CompressionReport {
        original_size,
        compressed_size: bytes.len(),
        reduction: reduction(original_size, bytes.len()),
        target_reduction: target,
        attempts,
        quality,
        max_dimension,
        images_found: stats.found,
        images_recompressed: stats.recompressed,
        skipped: stats.skipped,
        returned_original,
    };
    tracing::info!(
        "compressed {} -> {} bytes ({:.1}% reduction, {} attempts)",
        report.original_size,
        report.compressed_size,
        report.reduction * 100.0,
        report.attempts
    );
    Ok(CompressionOutcome { bytes, report })
}

fn reduction(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    1.0 - compressed as f64 / original as f64
}

/// Image XObjects reachable from page resources, including inside form XObjects.
fn collect_images(doc: &Document) -> Result<Vec<ObjectId>> {
    let mut images = BTreeSet::new();
    let mut seen_forms = HashSet::new();
    let mut pending: Vec<Dictionary> = Vec::new();
    for page in page_ids(doc)? {
        pending.push(page_node(doc, page)?.resources);
    }

    while let Some(resources) = pending.pop() {
        let Some(xobjects) = resources.get("XObject").and_then(|x| doc.resolve_dict(x)) else {
            continue;
        };
        for value in xobjects.values() {
            let Some(id) = value.as_reference() else {
                continue;
            };
            let Some(stream) = doc.get(id).and_then(Object::as_stream) else {
                continue;
            };
            match stream.dictionary().get_name("Subtype") {
                Some("Image") => {
                    images.insert(id);
                }
                Some("Form") if seen_forms.insert(id) => {
                    if let Some(inner) = stream
                        .dictionary()
                        .get("Resources")
                        .and_then(|r| doc.resolve_dict(r))
                    {
                        pending.push(inner.clone());
                    }
                }
                _ => {}
            }
        }
    }
    Ok(images.into_iter().collect())
}

/// Recompresses every eligible image in place at `quality`, downscaling to
/// `max_dimension`. Images shared by several pages are rewritten once and all
/// pages see the new version.
pub fn recompress_images<F>(
    doc: &mut Document,
    codec: &dyn ImageCodec,
    quality: u8,
    max_dimension: u32,
    mut observer: F,
) -> Result<ImageStats>
where
    F: FnMut(&ImageProgress) -> ControlFlow<()>,
{
    doc.ensure_unlocked()?;
    let images = collect_images(doc)?;
    let mut stats = ImageStats {
        found: images.len(),
        ..ImageStats::default()
    };

    for (index, &id) in images.iter().enumerate() {
        let progress = ImageProgress {
            attempt: 1,
            index,
            total: images.len(),
            image: id,
        };
        if observer(&progress).is_break() {
            tracing::info!("compression cancelled before image {id}");
            return Err(PdfError::OperationCancelled);
        }

        match recompress_image(doc, id, codec, quality, max_dimension) {
            Ok(true) => stats.recompressed += 1,
            Ok(false) => stats.kept += 1,
            Err(e) => {
                tracing::warn!("skipping image {id}: {e}");
                stats.skipped.push(SkippedImage {
                    object_number: id.number(),
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(stats)
}

fn components_of(doc: &Document, color_space: Option<&Object>) -> Option<u8> {
    let space = doc.resolve(color_space?);
    match space {
        Object::Name(name) => match name.as_str() {
            "DeviceGray" | "CalGray" | "G" => Some(1),
            "DeviceRGB" | "CalRGB" | "RGB" => Some(3),
            _ => None,
        },
        Object::Array(items) if items.first().and_then(Object::as_name) == Some("ICCBased") => {
            let profile = doc.resolve_dict(items.get(1)?)?;
            profile.get_integer("N").and_then(|n| match n {
                1 => Some(1),
                3 => Some(3),
                _ => None,
            })
        }
        _ => None,
    }
}

/// Returns whether the image was replaced.
fn recompress_image(
    doc: &mut Document,
    id: ObjectId,
    codec: &dyn ImageCodec,
    quality: u8,
    max_dimension: u32,
) -> std::result::Result<bool, CodecError> {
    let stream = doc
        .get(id)
        .and_then(Object::as_stream)
        .ok_or_else(|| CodecError::Decode(format!("{id} is not a stream")))?;
    let dict = stream.dictionary();
    if dict.get("ImageMask").and_then(Object::as_bool) == Some(true) {
        return Err(CodecError::Unsupported("stencil mask".to_string()));
    }
    let dimension = |key: &str| {
        dict.get_integer(key)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| CodecError::Decode(format!("missing /{key}")))
    };
    let (width, height) = (dimension("Width")?, dimension("Height")?);
    let original_len = stream.data().len();

    let raster = match stream.filters().as_slice() {
        ["DCTDecode"] => codec.decode(stream.data())?,
        [] | ["FlateDecode"] => {
            if dict.get_integer("BitsPerComponent") != Some(8) {
                return Err(CodecError::Unsupported("raw samples must be 8 bits".to_string()));
            }
            let components = components_of(doc, dict.get("ColorSpace"))
                .ok_or_else(|| CodecError::Unsupported("color space".to_string()))?;
            let samples = stream
                .decoded_data()
                .map_err(|e| CodecError::Decode(e.to_string()))?;
            RasterImage::new(width, height, components, samples)?
        }
        other => return Err(CodecError::Unsupported(format!("filter chain {other:?}"))),
    };
    if !matches!(raster.components, 1 | 3) {
        return Err(CodecError::Unsupported(format!("{} components", raster.components)));
    }

    let (target_width, target_height) = fit_within(raster.width, raster.height, max_dimension);
    let raster = if (target_width, target_height) != (raster.width, raster.height) {
        codec.resize(&raster, target_width, target_height)?
    } else {
        raster
    };
    let encoded = codec.encode(&raster, quality)?;
    if encoded.len() >= original_len {
        return Ok(false);
    }

    let Some(Object::Stream(stream)) = doc.get_mut(id) else {
        return Ok(false);
    };
    let (dict, data) = stream.parts_mut();
    *data = encoded;
    dict.set("Filter", Object::name("DCTDecode"));
    dict.remove("DecodeParms");
    dict.set("Width", raster.width);
    dict.set("Height", raster.height);
    dict.set("BitsPerComponent", 8);
    if !dict.contains_key("ColorSpace") {
        dict.set("ColorSpace", Object::name(raster.color_space()));
    }
    Ok(true)
}
