//! PDF string objects
//!
//! Strings are byte sequences. The literal/hex distinction is only a
//! presentation hint and does not take part in equality.

/// How a string was (or should be) written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    #[default]
    Literal,
    Hexadecimal,
}

#[derive(Debug, Clone, Default)]
pub struct PdfString {
    bytes: Vec<u8>,
    format: StringFormat,
}

impl PdfString {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            format: StringFormat::Literal,
        }
    }

    pub fn hex(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            format: StringFormat::Hexadecimal,
        }
    }

    /// Encodes text as PDFDocEncoding when it is Latin-1, UTF-16BE with a BOM otherwise.
    pub fn from_text(text: &str) -> Self {
        if text.chars().all(|c| (c as u32) < 0x100) {
            Self::new(text.chars().map(|c| c as u8).collect())
        } else {
            let mut bytes = vec![0xFE, 0xFF];
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            Self::hex(bytes)
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn format(&self) -> StringFormat {
        self.format
    }

    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decodes a text string (UTF-16BE with BOM, UTF-8 with BOM, or Latin-1).
    pub fn to_text(&self) -> String {
        match self.bytes.as_slice() {
            [0xFE, 0xFF, rest @ ..] => {
                let units: Vec<u16> = rest
                    .chunks(2)
                    .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
            bytes => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

impl PartialEq for PdfString {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl From<Vec<u8>> for PdfString {
    fn from(bytes: Vec<u8>) -> Self {
        PdfString::new(bytes)
    }
}
