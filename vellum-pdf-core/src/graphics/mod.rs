//! Colors and image XObjects used when drawing onto pages

mod color;
mod image;

pub use color::Color;
pub use image::{ImageColorSpace, ImageXObject};

#[cfg(test)]
pub(crate) use image::tests::jpeg_header;
