//! PDF Stream Filters
//!
//! Handles decoding of PDF streams according to ISO 32000-1 Section 7.4.
//! Image codecs (DCT, JPX, CCITT, JBIG2) are recognized but not decoded here;
//! [`decode_until_image`] stops in front of them.

use super::{ParseError, ParseResult};
use crate::objects::{Dictionary, Object};

/// Supported PDF filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// ASCII hex decode
    ASCIIHexDecode,

    /// ASCII 85 decode
    ASCII85Decode,

    /// LZW decode
    LZWDecode,

    /// Flate decode (zlib/deflate compression)
    FlateDecode,

    /// Run length decode
    RunLengthDecode,

    /// CCITT fax decode
    CCITTFaxDecode,

    /// JBIG2 decode
    JBIG2Decode,

    /// DCT decode (JPEG)
    DCTDecode,

    /// JPX decode (JPEG 2000)
    JPXDecode,

    /// Crypt filter
    Crypt,
}

impl Filter {
    /// Parse filter from name, including the inline-image abbreviations
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "LZWDecode" | "LZW" => Some(Filter::LZWDecode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            "CCITTFaxDecode" | "CCF" => Some(Filter::CCITTFaxDecode),
            "JBIG2Decode" => Some(Filter::JBIG2Decode),
            "DCTDecode" | "DCT" => Some(Filter::DCTDecode),
            "JPXDecode" => Some(Filter::JPXDecode),
            "Crypt" => Some(Filter::Crypt),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Filter::ASCIIHexDecode => "ASCIIHexDecode",
            Filter::ASCII85Decode => "ASCII85Decode",
            Filter::LZWDecode => "LZWDecode",
            Filter::FlateDecode => "FlateDecode",
            Filter::RunLengthDecode => "RunLengthDecode",
            Filter::CCITTFaxDecode => "CCITTFaxDecode",
            Filter::JBIG2Decode => "JBIG2Decode",
            Filter::DCTDecode => "DCTDecode",
            Filter::JPXDecode => "JPXDecode",
            Filter::Crypt => "Crypt",
        }
    }

    /// Filters whose output is pixels rather than bytes
    pub fn is_image_codec(&self) -> bool {
        matches!(
            self,
            Filter::CCITTFaxDecode | Filter::JBIG2Decode | Filter::DCTDecode | Filter::JPXDecode
        )
    }
}

/// A filter together with its `/DecodeParms` entry.
#[derive(Debug, Clone)]
pub struct FilterStage {
    pub filter: Filter,
    pub params: Option<Dictionary>,
}

/// Reads `/Filter` and `/DecodeParms` into decode order.
pub fn filter_chain(dict: &Dictionary) -> ParseResult<Vec<FilterStage>> {
    let names: Vec<&Object> = match dict.get("Filter") {
        None => return Ok(Vec::new()),
        Some(Object::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    };

    let params: Vec<Option<&Dictionary>> = match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        Some(Object::Array(items)) => items.iter().map(Object::as_dict).collect(),
        Some(Object::Dictionary(d)) => vec![Some(d)],
        _ => Vec::new(),
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let name = name.as_name().ok_or_else(|| {
                ParseError::StreamDecodeError(format!("Invalid filter entry: {}", name.type_name()))
            })?;
            let filter = Filter::from_name(name)
                .ok_or_else(|| ParseError::StreamDecodeError(format!("Unknown filter: {name}")))?;
            Ok(FilterStage {
                filter,
                params: params.get(i).copied().flatten().cloned(),
            })
        })
        .collect()
}

/// Decode stream data according to its filters
pub fn decode_stream(data: &[u8], dict: &Dictionary) -> ParseResult<Vec<u8>> {
    let (decoded, image_stage) = decode_until_image(data, dict)?;
    match image_stage {
        None => Ok(decoded),
        Some(stage) => Err(ParseError::StreamDecodeError(format!(
            "{} is an image codec",
            stage.filter.name()
        ))),
    }
}

/// Undo byte-level filters, stopping at the first image codec.
///
/// Returns the bytes fed to that codec and the codec stage itself, if any.
pub fn decode_until_image(
    data: &[u8],
    dict: &Dictionary,
) -> ParseResult<(Vec<u8>, Option<FilterStage>)> {
    let mut current = data.to_vec();
    for stage in filter_chain(dict)? {
        if stage.filter.is_image_codec() {
            return Ok((current, Some(stage)));
        }
        current = apply_filter(&current, &stage)?;
    }
    Ok((current, None))
}

/// Apply a single decode filter
pub fn apply_filter(data: &[u8], stage: &FilterStage) -> ParseResult<Vec<u8>> {
    let decoded = match stage.filter {
        Filter::ASCIIHexDecode => decode_ascii_hex(data)?,
        Filter::ASCII85Decode => decode_ascii85(data)?,
        Filter::RunLengthDecode => decode_run_length(data),
        Filter::FlateDecode => decode_flate(data)?,
        Filter::LZWDecode => {
            let early_change = stage
                .params
                .as_ref()
                .and_then(|p| p.get_integer("EarlyChange"))
                .unwrap_or(1);
            decode_lzw(data, early_change != 0)?
        }
        // Documents are decrypted as a whole; Identity is the only per-stream crypt filter left
        Filter::Crypt => data.to_vec(),
        image => {
            return Err(ParseError::StreamDecodeError(format!(
                "{} is an image codec",
                image.name()
            )))
        }
    };

    match stage.filter {
        Filter::FlateDecode | Filter::LZWDecode => match &stage.params {
            Some(params) => apply_predictor(decoded, params),
            None => Ok(decoded),
        },
        _ => Ok(decoded),
    }
}

#[cfg(feature = "compression")]
fn decode_flate(data: &[u8]) -> ParseResult<Vec<u8>> {
    crate::compression::decompress_tolerant(data)
        .map_err(|e| ParseError::StreamDecodeError(format!("Flate decode error: {e}")))
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8]) -> ParseResult<Vec<u8>> {
    Err(ParseError::StreamDecodeError(
        "FlateDecode requires the 'compression' feature".to_string(),
    ))
}

fn decode_ascii_hex(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &ch in data {
        if ch == b'>' {
            break;
        }
        if super::lexer::is_whitespace(ch) {
            continue;
        }
        let value = hex_digit_value(ch).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Invalid hex character: {}", ch as char))
        })?;
        match high.take() {
            Some(h) => result.push((h << 4) | value),
            None => high = Some(value),
        }
    }

    if let Some(h) = high {
        result.push(h << 4);
    }
    Ok(result)
}

fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

fn decode_ascii85(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut count = 0;

    let body = data.strip_prefix(b"<~").unwrap_or(data);
    for &ch in body {
        match ch {
            b'~' => break,
            b'z' if count == 0 => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[count] = ch - b'!';
                count += 1;
                if count == 5 {
                    result.extend_from_slice(&ascii85_group_value(&group)?.to_be_bytes());
                    count = 0;
                }
            }
            _ if super::lexer::is_whitespace(ch) => {}
            _ => {
                return Err(ParseError::StreamDecodeError(format!(
                    "Invalid ASCII85 character: {}",
                    ch as char
                )))
            }
        }
    }

    if count == 1 {
        return Err(ParseError::StreamDecodeError(
            "Truncated ASCII85 group".to_string(),
        ));
    }
    if count > 1 {
        for slot in group.iter_mut().skip(count) {
            *slot = b'u' - b'!';
        }
        let bytes = ascii85_group_value(&group)?.to_be_bytes();
        result.extend_from_slice(&bytes[..count - 1]);
    }

    Ok(result)
}

fn ascii85_group_value(group: &[u8; 5]) -> ParseResult<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + u64::from(digit));
    u32::try_from(value)
        .map_err(|_| ParseError::StreamDecodeError("ASCII85 group out of range".to_string()))
}

fn decode_run_length(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let end = (i + length as usize + 1).min(data.len());
                result.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&byte) = data.get(i) {
                    result.extend(std::iter::repeat(byte).take(257 - length as usize));
                }
                i += 1;
            }
        }
    }
    result
}

fn decode_lzw(data: &[u8], early_change: bool) -> ParseResult<Vec<u8>> {
    const CLEAR: u16 = 256;
    const EOD: u16 = 257;

    let mut table: Vec<Vec<u8>> = (0..=255u8).map(|b| vec![b]).collect();
    table.push(Vec::new());
    table.push(Vec::new());

    let mut result = Vec::new();
    let mut code_len = 9u32;
    let mut bit_buffer = 0u32;
    let mut bits = 0u32;
    let mut previous: Option<Vec<u8>> = None;

    for &byte in data {
        bit_buffer = (bit_buffer << 8) | u32::from(byte);
        bits += 8;

        while bits >= code_len {
            let code = ((bit_buffer >> (bits - code_len)) & ((1 << code_len) - 1)) as u16;
            bits -= code_len;

            match code {
                CLEAR => {
                    table.truncate(258);
                    code_len = 9;
                    previous = None;
                    continue;
                }
                EOD => return Ok(result),
                _ => {}
            }

            let entry = if (code as usize) < table.len() {
                table[code as usize].clone()
            } else if let Some(prev) = &previous {
                let mut entry = prev.clone();
                entry.push(prev[0]);
                entry
            } else {
                return Err(ParseError::StreamDecodeError(format!(
                    "Invalid LZW code {code}"
                )));
            };

            result.extend_from_slice(&entry);
            if let Some(mut prev) = previous.take() {
                if let Some(&first) = entry.first() {
                    prev.push(first);
                    table.push(prev);
                }
            }
            previous = Some(entry);

            let threshold = table.len() + usize::from(early_change);
            code_len = match threshold {
                t if t >= 2048 => 12,
                t if t >= 1024 => 11,
                t if t >= 512 => 10,
                _ => 9,
            };
        }
    }

    Ok(result)
}

/// Undo PNG (10-15) and TIFF (2) predictors.
fn apply_predictor(data: Vec<u8>, params: &Dictionary) -> ParseResult<Vec<u8>> {
    let predictor = params.get_integer("Predictor").unwrap_or(1);
    if predictor <= 1 {
        return Ok(data);
    }

    let colors = params.get_integer("Colors").unwrap_or(1).max(1) as usize;
    let bpc = params.get_integer("BitsPerComponent").unwrap_or(8).max(1) as usize;
    let columns = params.get_integer("Columns").unwrap_or(1).max(1) as usize;
    let bytes_per_pixel = (colors * bpc).div_ceil(8).max(1);
    let row_len = (colors * bpc * columns).div_ceil(8);

    match predictor {
        2 => Ok(undo_tiff_predictor(data, row_len, bytes_per_pixel, bpc)),
        10..=15 => undo_png_predictor(&data, row_len, bytes_per_pixel),
        other => Err(ParseError::StreamDecodeError(format!(
            "Unsupported predictor {other}"
        ))),
    }
}

fn undo_tiff_predictor(mut data: Vec<u8>, row_len: usize, bpp: usize, bpc: usize) -> Vec<u8> {
    if bpc != 8 {
        tracing::warn!("TIFF predictor with {bpc} bits per component left undecoded");
        return data;
    }
    for row in data.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    data
}

fn undo_png_predictor(data: &[u8], row_len: usize, bpp: usize) -> ParseResult<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let (kind, encoded) = match chunk.split_first() {
            Some(split) => split,
            None => break,
        };
        let mut row = encoded.to_vec();
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            row[i] = match kind {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(ParseError::StreamDecodeError(format!(
                        "Invalid PNG row filter {other}"
                    )))
                }
            };
        }

        result.extend_from_slice(&row[..encoded.len().min(row_len)]);
        previous = row;
    }

    Ok(result)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict_with_filter(filter: Object) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", filter);
        dict
    }

    #[test]
    fn test_ascii_hex_decode() {
        assert_eq!(decode_ascii_hex(b"48 65 6C 6C 6F>").unwrap(), b"Hello");
        assert_eq!(decode_ascii_hex(b"7>").unwrap(), vec![0x70]);
        assert!(decode_ascii_hex(b"4G>").is_err());
    }

    #[test]
    fn test_ascii85_decode() {
        assert_eq!(decode_ascii85(b"87cURD]i,\"Ebo7~>").unwrap(), b"Hello World");
        assert_eq!(decode_ascii85(b"z~>").unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(decode_ascii85(b"<~87cURD]i,\"Ebo7~>").unwrap(), b"Hello World");
        assert!(decode_ascii85(b"8~>").is_err());
    }

    #[test]
    fn test_run_length_decode() {
        // literal run of 3, then 4 repeats of 'z', then EOD
        let data = [2, b'a', b'b', b'c', 253, b'z', 128];
        assert_eq!(decode_run_length(&data), b"abczzzz");
    }

    #[test]
    fn test_lzw_decode_spec_sample() {
        // Example from ISO 32000-1 7.4.4.2: "-----A---B"
        let encoded = [0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01];
        assert_eq!(decode_lzw(&encoded, true).unwrap(), b"-----A---B");
    }

    #[test]
    fn test_png_up_predictor() {
        let mut params = Dictionary::new();
        params.set("Predictor", 12);
        params.set("Columns", 3);
        // two rows: None [1 2 3], Up [1 1 1]
        let data = vec![0, 1, 2, 3, 2, 1, 1, 1];
        assert_eq!(apply_predictor(data, &params).unwrap(), vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_png_sub_and_paeth_predictors() {
        let mut params = Dictionary::new();
        params.set("Predictor", 15);
        params.set("Columns", 3);
        let data = vec![1, 5, 1, 1, 4, 0, 0, 0];
        assert_eq!(apply_predictor(data, &params).unwrap(), vec![5, 6, 7, 5, 6, 7]);
    }

    #[test]
    fn test_tiff_predictor() {
        let mut params = Dictionary::new();
        params.set("Predictor", 2);
        params.set("Columns", 4);
        assert_eq!(
            apply_predictor(vec![10, 1, 1, 1], &params).unwrap(),
            vec![10, 11, 12, 13]
        );
    }

    #[test]
    fn test_decode_stream_no_filter() {
        assert_eq!(decode_stream(b"raw", &Dictionary::new()).unwrap(), b"raw");
    }

    #[test]
    fn test_decode_stream_filter_array() {
        let dict = dict_with_filter(Object::Array(vec![
            Object::name("ASCIIHexDecode"),
            Object::name("RunLengthDecode"),
        ]));
        assert_eq!(decode_stream(b"02616263FE7A80>", &dict).unwrap(), b"abczzz");
    }

    #[test]
    fn test_decode_stream_unknown_filter() {
        let dict = dict_with_filter(Object::name("BogusDecode"));
        assert!(decode_stream(b"data", &dict).is_err());
    }

    #[test]
    fn test_decode_until_image_stops_at_dct() {
        let dict = dict_with_filter(Object::Array(vec![
            Object::name("ASCIIHexDecode"),
            Object::name("DCTDecode"),
        ]));
        let (bytes, stage) = decode_until_image(b"FFD8>", &dict).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8]);
        assert_eq!(stage.unwrap().filter, Filter::DCTDecode);
        assert!(decode_stream(b"FFD8>", &dict).is_err());
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_flate_with_png_predictor() {
        let rows = vec![2u8, 1, 2, 3, 2, 1, 1, 1];
        let compressed = crate::compression::compress(&rows).unwrap();
        let mut params = Dictionary::new();
        params.set("Predictor", 12);
        params.set("Columns", 3);
        let mut dict = dict_with_filter(Object::name("FlateDecode"));
        dict.set("DecodeParms", params);
        assert_eq!(decode_stream(&compressed, &dict).unwrap(), vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_filter_names() {
        assert_eq!(Filter::from_name("Fl"), Some(Filter::FlateDecode));
        assert_eq!(Filter::from_name("Unknown"), None);
        assert!(Filter::DCTDecode.is_image_codec());
        assert!(!Filter::FlateDecode.is_image_codec());
        assert_eq!(Filter::LZWDecode.name(), "LZWDecode");
    }
}
