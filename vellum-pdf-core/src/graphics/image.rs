//! Image XObjects built from encoded image files
//!
//! JPEG data is embedded as is behind `DCTDecode`. Other formats need an
//! [`ImageCodec`] and are stored as Flate-compressed samples.

use crate::document::Document;
use crate::error::{CodecError, Result};
use crate::images::{ImageCodec, RasterImage};
use crate::objects::{Dictionary, Object, ObjectId, Stream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageColorSpace {
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
}

impl ImageColorSpace {
    fn from_components(components: u8) -> std::result::Result<Self, CodecError> {
        match components {
            1 => Ok(ImageColorSpace::DeviceGray),
            3 => Ok(ImageColorSpace::DeviceRGB),
            4 => Ok(ImageColorSpace::DeviceCMYK),
            n => Err(CodecError::Unsupported(format!("{n} color components"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageColorSpace::DeviceGray => "DeviceGray",
            ImageColorSpace::DeviceRGB => "DeviceRGB",
            ImageColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Dct,
    /// Raw samples, compressed with Flate on insertion when available
    Raw,
}

/// An image ready to be added to a document as an XObject.
#[derive(Debug, Clone)]
pub struct ImageXObject {
    data: Vec<u8>,
    encoding: Encoding,
    width: u32,
    height: u32,
    color_space: ImageColorSpace,
    /// Adobe CMYK JPEGs store inverted samples
    inverted: bool,
}

struct JpegHeader {
    width: u32,
    height: u32,
    components: u8,
    adobe: bool,
}

impl ImageXObject {
    /// Embeds JPEG data after reading its frame header.
    pub fn from_jpeg(data: Vec<u8>) -> Result<Self> {
        let header = parse_jpeg_header(&data)?;
        let color_space = ImageColorSpace::from_components(header.components)?;
        Ok(Self {
            inverted: header.adobe && color_space == ImageColorSpace::DeviceCMYK,
            data,
            encoding: Encoding::Dct,
            width: header.width,
            height: header.height,
            color_space,
        })
    }

    /// Embeds decoded samples.
    pub fn from_raster(image: RasterImage) -> Result<Self> {
        let color_space = ImageColorSpace::from_components(image.components)?;
        Ok(Self {
            data: image.samples,
            encoding: Encoding::Raw,
            width: image.width,
            height: image.height,
            color_space,
            inverted: false,
        })
    }

    /// JPEG is passed through; anything else is decoded by `codec`.
    pub fn load(data: Vec<u8>, codec: Option<&dyn ImageCodec>) -> Result<Self> {
        if is_jpeg(&data) {
            return Self::from_jpeg(data);
        }
        match codec {
            Some(codec) => Self::from_raster(codec.decode(&data)?),
            None => Err(CodecError::Unsupported("only JPEG can be embedded without a codec".to_string()).into()),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color_space(&self) -> ImageColorSpace {
        self.color_space
    }

    pub fn to_stream(&self) -> Result<Stream> {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("XObject"));
        dict.set("Subtype", Object::name("Image"));
        dict.set("Width", self.width);
        dict.set("Height", self.height);
        dict.set("ColorSpace", Object::name(self.color_space.name()));
        dict.set("BitsPerComponent", 8);
        if self.inverted {
            dict.set("Decode", [1, 0, 1, 0, 1, 0, 1, 0].map(Object::from).to_vec());
        }

        let mut stream = Stream::with_dictionary(dict, Vec::new());
        match self.encoding {
            Encoding::Dct => {
                stream.set_data(self.data.clone());
                stream.set_filter("DCTDecode");
            }
            #[cfg(feature = "compression")]
            Encoding::Raw => stream.set_flate_data(&self.data)?,
            #[cfg(not(feature = "compression"))]
            Encoding::Raw => stream.set_data(self.data.clone()),
        }
        Ok(stream)
    }

    pub fn add_to(&self, doc: &mut Document) -> Result<ObjectId> {
        Ok(doc.add_object(self.to_stream()?))
    }
}

pub(crate) fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8])
}

fn parse_jpeg_header(data: &[u8]) -> std::result::Result<JpegHeader, CodecError> {
    let truncated = || CodecError::Decode("truncated JPEG".to_string());
    if !is_jpeg(data) {
        return Err(CodecError::Decode("missing JPEG start marker".to_string()));
    }

    let mut adobe = false;
    let mut pos = 2;
    loop {
        // Fill bytes may precede a marker
        while data.get(pos) == Some(&0xFF) && data.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        if data.get(pos) != Some(&0xFF) {
            return Err(CodecError::Decode(format!("expected marker at byte {pos}")));
        }
        let marker = *data.get(pos + 1).ok_or_else(truncated)?;
        pos += 2;

        match marker {
            0xD9 => return Err(CodecError::Decode("no frame header before end of image".to_string())),
            0x01 | 0xD0..=0xD8 => continue,
            _ => {}
        }

        let segment = data.get(pos..pos + 2).ok_or_else(truncated)?;
        let length = usize::from(u16::from_be_bytes([segment[0], segment[1]]));
        if length < 2 {
            return Err(CodecError::Decode("bad segment length".to_string()));
        }
        let body = data.get(pos + 2..pos + length).ok_or_else(truncated)?;

        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            if body.len() < 6 {
                return Err(truncated());
            }
            let height = u32::from(u16::from_be_bytes([body[1], body[2]]));
            let width = u32::from(u16::from_be_bytes([body[3], body[4]]));
            if width == 0 || height == 0 {
                return Err(CodecError::Decode(format!("empty JPEG frame {width}x{height}")));
            }
            return Ok(JpegHeader {
                width,
                height,
                components: body[5],
                adobe,
            });
        }
        if marker == 0xEE && body.starts_with(b"Adobe") {
            adobe = true;
        }
        pos += length;
    }
}
