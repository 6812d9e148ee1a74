//! [`ImageCodec`] backed by the `image` crate

use super::{ImageCodec, RasterImage};
use crate::error::CodecError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, RgbImage};

/// JPEG and PNG decoding, baseline JPEG encoding and Lanczos3 resizing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec;

impl ImageCrateCodec {
    pub fn new() -> Self {
        Self
    }
}

fn to_dynamic(image: &RasterImage) -> Result<DynamicImage, CodecError> {
    let mismatch = || CodecError::Encode("sample buffer does not match dimensions".to_string());
    match image.components {
        1 => GrayImage::from_raw(image.width, image.height, image.samples.clone())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(mismatch),
        3 => RgbImage::from_raw(image.width, image.height, image.samples.clone())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(mismatch),
        n => Err(CodecError::Unsupported(format!("{n}-component raster"))),
    }
}

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, data: &[u8]) -> Result<RasterImage, CodecError> {
        let decoded =
            image::load_from_memory(data).map_err(|e| CodecError::Decode(e.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());
        // Alpha is dropped; PDF carries it in a separate SMask
        if decoded.color().has_color() {
            RasterImage::new(width, height, 3, decoded.to_rgb8().into_raw())
        } else {
            RasterImage::new(width, height, 1, decoded.to_luma8().into_raw())
        }
    }

    fn encode(&self, image: &RasterImage, quality: u8) -> Result<Vec<u8>, CodecError> {
        let color = match image.components {
            1 => ExtendedColorType::L8,
            3 => ExtendedColorType::Rgb8,
            n => return Err(CodecError::Unsupported(format!("JPEG from {n} components"))),
        };
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
            .write_image(&image.samples, image.width, image.height, color)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buffer)
    }

    fn resize(&self, image: &RasterImage, width: u32, height: u32) -> Result<RasterImage, CodecError> {
        let resized = to_dynamic(image)?.resize_exact(width, height, FilterType::Lanczos3);
        let samples = match image.components {
            1 => resized.to_luma8().into_raw(),
            _ => resized.to_rgb8().into_raw(),
        };
        RasterImage::new(width, height, image.components, samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RasterImage {
        let samples = (0..width * height)
            .flat_map(|i| {
                let v = (i % 256) as u8;
                [v, 255 - v, v / 2]
            })
            .collect();
        RasterImage::new(width, height, 3, samples).unwrap()
    }

    #[test]
    fn test_jpeg_round_trip() {
        let codec = ImageCrateCodec::new();
        let jpeg = codec.encode(&gradient(64, 32), 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = codec.decode(&jpeg).unwrap();
        assert_eq!((decoded.width, decoded.height, decoded.components), (64, 32, 3));
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let codec = ImageCrateCodec::new();
        let image = gradient(128, 128);
        let high = codec.encode(&image, 95).unwrap();
        let low = codec.encode(&image, 20).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_resize_gray() {
        let codec = ImageCrateCodec::new();
        let gray = RasterImage::new(10, 10, 1, vec![200; 100]).unwrap();
        let small = codec.resize(&gray, 5, 4).unwrap();
        assert_eq!((small.width, small.height, small.samples.len()), (5, 4, 20));
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(ImageCrateCodec::new().decode(b"not an image").is_err());
    }
}
