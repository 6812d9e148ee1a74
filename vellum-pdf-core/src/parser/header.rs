//! PDF Header Parser
//!
//! Parses PDF header and version according to ISO 32000-1 Section 7.5.2

use super::lexer::find_subslice;
use super::{ParseError, ParseResult};
use std::fmt;
use std::str::FromStr;

/// Readers accept a header anywhere in the first kilobyte.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// PDF Version information
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl PdfVersion {
    pub const V1_4: PdfVersion = PdfVersion::new(1, 4);
    pub const V1_5: PdfVersion = PdfVersion::new(1, 5);
    pub const V1_6: PdfVersion = PdfVersion::new(1, 6);
    pub const V1_7: PdfVersion = PdfVersion::new(1, 7);
    pub const V2_0: PdfVersion = PdfVersion::new(2, 0);

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Check if this version is supported
    pub fn is_supported(&self) -> bool {
        matches!((self.major, self.minor), (1, 0..=7) | (2, 0))
    }
}

impl Default for PdfVersion {
    fn default() -> Self {
        Self::V1_7
    }
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PdfVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.trim().split_once('.').ok_or(ParseError::InvalidHeader)?;
        let major = major.parse().map_err(|_| ParseError::InvalidHeader)?;
        let minor = minor
            .chars()
            .take_while(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .map_err(|_| ParseError::InvalidHeader)?;
        Ok(Self { major, minor })
    }
}

/// PDF Header information
#[derive(Debug, Clone, PartialEq)]
pub struct PdfHeader {
    pub version: PdfVersion,
    /// Bytes of junk preceding `%PDF-`; some producers' offsets are relative to it
    pub offset: usize,
    pub has_binary_marker: bool,
}

impl PdfHeader {
    pub fn parse(data: &[u8]) -> ParseResult<Self> {
        if data.is_empty() {
            return Err(ParseError::EmptyFile);
        }

        let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
        let offset = find_subslice(window, b"%PDF-").ok_or(ParseError::InvalidHeader)?;

        let line_start = offset + 5;
        let line_end = data[line_start..]
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .map_or(data.len(), |i| i + line_start);
        let line = String::from_utf8_lossy(&data[line_start..line_end]);
        let version: PdfVersion = line.parse()?;

        Ok(Self {
            version,
            offset,
            has_binary_marker: Self::check_binary_marker(&data[line_end..]),
        })
    }

    /// A comment with at least four bytes >= 128 on the second line
    fn check_binary_marker(rest: &[u8]) -> bool {
        let rest = rest
            .iter()
            .position(|&b| b != b'\r' && b != b'\n')
            .map_or(&[][..], |start| &rest[start..]);
        if rest.first() != Some(&b'%') {
            return false;
        }
        rest.iter()
            .skip(1)
            .take_while(|&&b| b != b'\r' && b != b'\n')
            .filter(|&&b| b >= 128)
            .count()
            >= 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_header() {
        let header = PdfHeader::parse(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n1 0 obj").unwrap();
        assert_eq!(header.version, PdfVersion::new(1, 7));
        assert_eq!(header.offset, 0);
        assert!(header.has_binary_marker);
    }

    #[test]
    fn test_header_with_leading_junk() {
        let mut data = vec![b'x'; 300];
        data.extend_from_slice(b"%PDF-2.0\r\n");
        let header = PdfHeader::parse(&data).unwrap();
        assert_eq!(header.version, PdfVersion::V2_0);
        assert_eq!(header.offset, 300);
        assert!(!header.has_binary_marker);
    }

    #[test]
    fn test_header_beyond_window_is_rejected() {
        let mut data = vec![b' '; 2000];
        data.extend_from_slice(b"%PDF-1.4\n");
        assert!(matches!(PdfHeader::parse(&data), Err(ParseError::InvalidHeader)));
    }

    #[test]
    fn test_empty_and_garbage() {
        assert!(matches!(PdfHeader::parse(b""), Err(ParseError::EmptyFile)));
        assert!(matches!(PdfHeader::parse(b"hello"), Err(ParseError::InvalidHeader)));
        assert!(matches!(PdfHeader::parse(b"%PDF-x.y\n"), Err(ParseError::InvalidHeader)));
    }

    #[test]
    fn test_version_ordering_and_display() {
        assert!(PdfVersion::V1_4 < PdfVersion::V1_7);
        assert!(PdfVersion::V1_7 < PdfVersion::V2_0);
        assert_eq!(PdfVersion::V1_5.to_string(), "1.5");
        assert_eq!("1.6".parse::<PdfVersion>().unwrap(), PdfVersion::V1_6);
    }
}
