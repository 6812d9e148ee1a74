//! Cross-reference stream encoding for PDF 1.5+
//!
//! ISO 32000-1:2008 Section 7.5.8.

use crate::objects::{Dictionary, Object, Stream};
use crate::parser::xref::XRefEntry;

/// Collects one entry per object number, starting at 0, and encodes them as
/// the binary body of an xref stream.
#[derive(Debug, Clone)]
pub struct XRefStreamWriter {
    entries: Vec<XRefEntry>,
    /// Field widths [type, field2, field3]
    widths: [usize; 3],
}

impl Default for XRefStreamWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XRefStreamWriter {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            widths: [1, 1, 1],
        }
    }

    /// Entry for the next object number.
    pub fn push(&mut self, entry: XRefEntry) {
        let (second, third) = match entry {
            XRefEntry::Free { next, generation } => (u64::from(next), u64::from(generation)),
            XRefEntry::InUse { offset, generation } => (offset, u64::from(generation)),
            XRefEntry::Compressed {
                stream_number,
                index,
            } => (u64::from(stream_number), u64::from(index)),
        };
        self.widths[1] = self.widths[1].max(bytes_needed(second));
        self.widths[2] = self.widths[2].max(bytes_needed(third));
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn widths(&self) -> [usize; 3] {
        self.widths
    }

    /// Fixed-width big-endian rows, one per entry.
    pub fn encode_entries(&self) -> Vec<u8> {
        let row = self.widths.iter().sum::<usize>();
        let mut data = Vec::with_capacity(row * self.entries.len());
        for entry in &self.entries {
            let (kind, second, third) = match *entry {
                XRefEntry::Free { next, generation } => (0, u64::from(next), u64::from(generation)),
                XRefEntry::InUse { offset, generation } => (1, offset, u64::from(generation)),
                XRefEntry::Compressed {
                    stream_number,
                    index,
                } => (2, u64::from(stream_number), u64::from(index)),
            };
            write_field(&mut data, kind, self.widths[0]);
            write_field(&mut data, second, self.widths[1]);
            write_field(&mut data, third, self.widths[2]);
        }
        data
    }

    /// The xref stream object. `trailer` supplies Root, Info, ID and Encrypt.
    pub fn into_stream(self, trailer: &Dictionary, compress: bool) -> crate::Result<Stream> {
        let mut data = self.encode_entries();
        let mut dict = trailer.clone();
        dict.set("Type", Object::name("XRef"));
        dict.set("Size", self.entries.len());
        dict.set(
            "W",
            self.widths
                .iter()
                .map(|&w| Object::Integer(w as i64))
                .collect::<Vec<_>>(),
        );
        dict.set(
            "Index",
            vec![Object::Integer(0), Object::Integer(self.entries.len() as i64)],
        );

        #[cfg(feature = "compression")]
        if compress {
            data = crate::compression::compress_best(&data)?;
            dict.set("Filter", Object::name("FlateDecode"));
        }
        #[cfg(not(feature = "compression"))]
        let _ = compress;

        Ok(Stream::with_dictionary(dict, data))
    }
}

/// Minimum bytes needed to represent a value
fn bytes_needed(value: u64) -> usize {
    if value == 0 {
        1
    } else {
        (value.ilog2() / 8 + 1) as usize
    }
}

fn write_field(data: &mut Vec<u8>, value: u64, width: usize) {
    for i in (0..width).rev() {
        data.push(((value >> (i * 8)) & 0xFF) as u8);
    }
}
