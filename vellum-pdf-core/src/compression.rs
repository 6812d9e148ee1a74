//! Flate (zlib) helpers for PDF streams

use crate::error::{PdfError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compress data using Flate/Zlib compression
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    compress_with_level(data, Compression::default())
}

/// Compress with the best (slowest) level; used for xref and object streams.
pub fn compress_best(data: &[u8]) -> Result<Vec<u8>> {
    compress_with_level(data, Compression::best())
}

fn compress_with_level(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(data).map_err(PdfError::Io)?;
    encoder.finish().map_err(PdfError::Io)
}

/// Decompress data using Flate/Zlib decompression
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(PdfError::Io)?;
    Ok(decompressed)
}

/// Decompresses as much as possible.
///
/// Truncated or checksum-damaged streams are common; when some output was
/// produced before the error it is returned instead of the error.
pub fn decompress_tolerant(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match decoder.read(&mut chunk) {
            Ok(0) => return Ok(decompressed),
            Ok(n) => decompressed.extend_from_slice(&chunk[..n]),
            Err(e) if !decompressed.is_empty() => {
                tracing::warn!("flate stream truncated after {} bytes: {e}", decompressed.len());
                return Ok(decompressed);
            }
            Err(e) => return Err(e),
        }
    }
}
