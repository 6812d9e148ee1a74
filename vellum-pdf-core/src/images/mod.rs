//! Raster images: the codec seam, image recompression and metadata stripping
//!
//! Pixel work is delegated to an [`ImageCodec`]. The engine itself only walks
//! the document, decides what to recompress and measures the result.

mod compress;
mod metadata;

#[cfg(feature = "external-images")]
mod codec;

pub use compress::{
    compress_pdf, compress_pdf_with_progress, recompress_images, CompressOptions,
    CompressionOutcome, CompressionPreset, CompressionReport, ImageProgress, ImageStats,
    SkippedImage,
};
pub use metadata::{strip_metadata, StripReport};

#[cfg(feature = "external-images")]
pub use codec::ImageCrateCodec;

use crate::error::CodecError;

/// Decoded 8-bit samples, interleaved, row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// 1 for gray, 3 for RGB, 4 for CMYK
    pub components: u8,
    pub samples: Vec<u8>,
}

impl RasterImage {
    /// Checks that `samples` holds exactly `width * height * components` bytes.
    pub fn new(width: u32, height: u32, components: u8, samples: Vec<u8>) -> Result<Self, CodecError> {
        let expected = width as usize * height as usize * components as usize;
        if width == 0 || height == 0 {
            return Err(CodecError::Decode(format!("empty image {width}x{height}")));
        }
        if samples.len() < expected {
            return Err(CodecError::Decode(format!(
                "{width}x{height}x{components} image needs {expected} bytes, got {}",
                samples.len()
            )));
        }
        let mut samples = samples;
        samples.truncate(expected);
        Ok(Self {
            width,
            height,
            components,
            samples,
        })
    }

    pub fn color_space(&self) -> &'static str {
        match self.components {
            1 => "DeviceGray",
            4 => "DeviceCMYK",
            _ => "DeviceRGB",
        }
    }
}

/// Raster codec used for decoding, re-encoding and resizing images.
///
/// Implementations must be pure: the same input gives the same output and no
/// state is shared between calls.
pub trait ImageCodec: Send + Sync {
    /// Decodes encoded image bytes (JPEG for `DCTDecode` streams).
    fn decode(&self, data: &[u8]) -> Result<RasterImage, CodecError>;

    /// Encodes as JPEG at `quality` (1-100).
    fn encode(&self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, CodecError>;

    fn resize(&self, image: &RasterImage, width: u32, height: u32) -> Result<RasterImage, CodecError>;
}

/// Largest size with the same aspect ratio whose longer side is at most `max_dimension`.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || max_dimension == 0 {
        return (width, height);
    }
    let scale = f64::from(max_dimension) / f64::from(longest);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}
