//! PDF Cross-Reference Parser
//!
//! Parses xref tables and xref streams according to ISO 32000-1 Sections 7.5.4
//! and 7.5.8, follows `/Prev` chains of incremental updates, and rebuilds the
//! table from object headers when the file's own xref data is unusable.

use super::lexer::{find_subslice, is_whitespace, rfind_subslice, Lexer, Token};
use super::objects::ObjectParser;
use super::{ParseError, ParseOptions, ParseResult};
use crate::objects::{Dictionary, Object, Stream};
use std::collections::{BTreeMap, HashSet};

/// Cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    Free { next: u32, generation: u16 },
    InUse { offset: u64, generation: u16 },
    /// Stored inside an object stream
    Compressed { stream_number: u32, index: u32 },
}

/// Trailer keys that describe one xref section rather than the document
const SECTION_KEYS: &[&str] = &[
    "Prev", "XRefStm", "Type", "W", "Index", "Filter", "DecodeParms", "Length",
];

/// One xref section with its trailer
#[derive(Debug)]
struct XRefSection {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dictionary,
}

/// Merged view of all xref sections, newest first
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dictionary,
    recovered: bool,
}

impl XRefTable {
    /// Read the xref chain starting at the last `startxref`.
    pub fn read(data: &[u8], header_offset: usize, options: &ParseOptions) -> ParseResult<Self> {
        let start = find_startxref(data)?;
        let mut table = Self::default();
        let mut next = Some(start);
        let mut visited = HashSet::new();

        while let Some(offset) = next {
            if !visited.insert(offset) {
                tracing::warn!("xref /Prev chain loops back to offset {offset}");
                break;
            }
            if visited.len() > options.max_xref_sections {
                tracing::warn!(
                    "xref chain longer than {} sections, ignoring older updates",
                    options.max_xref_sections
                );
                break;
            }

            let mut section = read_section(data, offset, header_offset)?;
            next = section
                .trailer
                .get_integer("Prev")
                .and_then(|prev| usize::try_from(prev).ok());

            // Hybrid files: the XRefStm lists objects hidden from classic readers
            if let Some(stm) = section
                .trailer
                .get_integer("XRefStm")
                .and_then(|o| usize::try_from(o).ok())
            {
                match read_section(data, stm, header_offset) {
                    Ok(hidden) => {
                        for (number, entry) in hidden.entries {
                            let replace = matches!(
                                section.entries.get(&number),
                                None | Some(XRefEntry::Free { .. })
                            );
                            if replace {
                                section.entries.insert(number, entry);
                            }
                        }
                    }
                    Err(e) => tracing::warn!("ignoring unreadable XRefStm at {stm}: {e}"),
                }
            }

            table.merge_older(section);
        }

        Ok(table)
    }

    /// Rebuild the table by scanning for `n g obj` headers and `trailer` dictionaries.
    pub fn recover(data: &[u8]) -> ParseResult<Self> {
        tracing::warn!("rebuilding cross-reference table by scanning the file");
        let mut entries = BTreeMap::new();

        let mut search = 0;
        while let Some(found) = find_subslice(&data[search..], b"obj") {
            let keyword = search + found;
            search = keyword + 3;

            let preceded = keyword > 0 && is_whitespace(data[keyword - 1]);
            let followed = data
                .get(keyword + 3)
                .map_or(true, |&c| is_whitespace(c) || matches!(c, b'<' | b'[' | b'(' | b'/' | b'%'));
            if !preceded || !followed {
                continue;
            }
            if let Some((offset, number, generation)) = object_header_before(data, keyword) {
                // Later definitions win, as with incremental updates
                entries.insert(
                    number,
                    XRefEntry::InUse {
                        offset: offset as u64,
                        generation,
                    },
                );
            }
        }

        if entries.is_empty() {
            return Err(ParseError::InvalidXRef(
                "no object headers found while scanning".to_string(),
            ));
        }

        let mut trailer = Dictionary::new();
        let mut trailers = Vec::new();
        let mut search = 0;
        while let Some(found) = find_subslice(&data[search..], b"trailer") {
            let position = search + found + b"trailer".len();
            search = position;
            if let Ok(Object::Dictionary(dict)) = ObjectParser::at(data, position).parse_object() {
                trailers.push(dict);
            }
        }
        for dict in trailers.into_iter().rev() {
            for (key, value) in dict.iter() {
                if !trailer.contains_key(key) && !SECTION_KEYS.contains(&key.as_str()) {
                    trailer.set(key.clone(), value.clone());
                }
            }
        }

        Ok(Self {
            entries,
            trailer,
            recovered: true,
        })
    }

    fn merge_older(&mut self, section: XRefSection) {
        for (number, entry) in section.entries {
            self.entries.entry(number).or_insert(entry);
        }
        for (key, value) in section.trailer.iter() {
            if !self.trailer.contains_key(key) && !SECTION_KEYS.contains(&key.as_str()) {
                self.trailer.set(key.clone(), value.clone());
            }
        }
    }

    pub fn entries(&self) -> &BTreeMap<u32, XRefEntry> {
        &self.entries
    }

    pub fn get_entry(&self, number: u32) -> Option<&XRefEntry> {
        self.entries.get(&number)
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }

    /// Whether the table was rebuilt by scanning
    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Offset named by the last `startxref` keyword
pub fn find_startxref(data: &[u8]) -> ParseResult<usize> {
    let keyword = rfind_subslice(data, b"startxref")
        .ok_or_else(|| ParseError::InvalidXRef("startxref not found".to_string()))?;
    let mut lexer = Lexer::at(data, keyword + b"startxref".len());
    match lexer.next_token()? {
        Token::Integer(offset) if offset >= 0 && (offset as usize) < data.len() => {
            Ok(offset as usize)
        }
        other => Err(ParseError::InvalidXRef(format!(
            "bad startxref value: {other:?}"
        ))),
    }
}

fn read_section(data: &[u8], offset: usize, header_offset: usize) -> ParseResult<XRefSection> {
    match read_section_at(data, offset) {
        Ok(section) => Ok(section),
        // Offsets written relative to a header preceded by junk
        Err(e) if header_offset > 0 => {
            read_section_at(data, offset + header_offset).map_err(|_| e)
        }
        Err(e) => Err(e),
    }
}

fn read_section_at(data: &[u8], offset: usize) -> ParseResult<XRefSection> {
    let mut lexer = Lexer::at(data, offset);
    match lexer.peek_token()? {
        Token::Keyword(k) if k == "xref" => parse_classic_section(data, offset),
        Token::Integer(_) => parse_stream_section(data, offset),
        other => Err(ParseError::InvalidXRef(format!(
            "expected xref at offset {offset}, found {other:?}"
        ))),
    }
}

fn parse_classic_section(data: &[u8], offset: usize) -> ParseResult<XRefSection> {
    let mut lexer = Lexer::at(data, offset);
    lexer.next_token()?; // xref
    let mut entries = BTreeMap::new();

    loop {
        let start = match lexer.next_token()? {
            Token::Keyword(k) if k == "trailer" => break,
            Token::Integer(start) if start >= 0 => start as u32,
            other => {
                return Err(ParseError::InvalidXRef(format!(
                    "unexpected {other:?} in xref table"
                )))
            }
        };
        let count = match lexer.next_token()? {
            Token::Integer(count) if count >= 0 => count as u32,
            other => {
                return Err(ParseError::InvalidXRef(format!(
                    "bad subsection count {other:?}"
                )))
            }
        };

        let mut subsection = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let field1 = lexer.next_token()?;
            let field2 = lexer.next_token()?;
            let kind = lexer.next_token()?;
            let entry = match (field1, field2, kind) {
                (Token::Integer(offset), Token::Integer(generation), Token::Keyword(k))
                    if k == "n" =>
                {
                    XRefEntry::InUse {
                        offset: offset.max(0) as u64,
                        generation: generation.clamp(0, u16::MAX as i64) as u16,
                    }
                }
                (Token::Integer(next), Token::Integer(generation), Token::Keyword(k))
                    if k == "f" =>
                {
                    XRefEntry::Free {
                        next: next.max(0) as u32,
                        generation: generation.clamp(0, u16::MAX as i64) as u16,
                    }
                }
                other => {
                    return Err(ParseError::InvalidXRef(format!(
                        "malformed xref entry {other:?}"
                    )))
                }
            };
            subsection.push(entry);
        }

        // Broken writers number the first subsection from 1 while listing object 0
        let start = match subsection.first() {
            Some(XRefEntry::Free {
                generation: 65535, ..
            }) if start == 1 => 0,
            _ => start,
        };

        for (i, entry) in subsection.into_iter().enumerate() {
            entries.insert(start + i as u32, entry);
        }
    }

    let trailer = match ObjectParser::at(data, lexer.position()).parse_object() {
        Ok(Object::Dictionary(dict)) => dict,
        Ok(other) => {
            return Err(ParseError::MalformedTrailer(format!(
                "trailer is a {}",
                other.type_name()
            )))
        }
        Err(e) => return Err(ParseError::MalformedTrailer(e.to_string())),
    };

    Ok(XRefSection { entries, trailer })
}

fn parse_stream_section(data: &[u8], offset: usize) -> ParseResult<XRefSection> {
    let (_, object) = ObjectParser::at(data, offset).parse_indirect_object(None)?;
    let stream = match object {
        Object::Stream(stream)
            if stream.dictionary().has_type("XRef") || stream.dictionary().contains_key("W") =>
        {
            stream
        }
        other => {
            return Err(ParseError::InvalidXRef(format!(
                "object at offset {offset} is a {} and not an xref stream",
                other.type_name()
            )))
        }
    };

    let entries = decode_xref_stream(&stream)?.into_iter().collect();
    let mut trailer = stream.dictionary().clone();
    for key in SECTION_KEYS.iter().filter(|k| !matches!(**k, "Prev" | "XRefStm")) {
        trailer.remove(key);
    }
    Ok(XRefSection { entries, trailer })
}

/// Decode the binary rows of an xref stream
pub fn decode_xref_stream(stream: &Stream) -> ParseResult<Vec<(u32, XRefEntry)>> {
    let dict = stream.dictionary();
    let widths: Vec<usize> = dict
        .get_array("W")
        .ok_or_else(|| ParseError::MissingKey("W".to_string()))?
        .iter()
        .map(|w| w.as_integer().and_then(|w| usize::try_from(w).ok()).unwrap_or(0))
        .collect();
    if widths.len() < 3 || widths.iter().any(|&w| w > 8) {
        return Err(ParseError::InvalidXRef(format!("bad /W {widths:?}")));
    }

    let size = dict.get_integer("Size").unwrap_or(0).max(0) as u32;
    let index: Vec<(u32, u32)> = match dict.get_array("Index") {
        Some(items) => items
            .chunks(2)
            .filter_map(|pair| match pair {
                [start, count] => Some((
                    start.as_integer()?.max(0) as u32,
                    count.as_integer()?.max(0) as u32,
                )),
                _ => None,
            })
            .collect(),
        None => vec![(0, size)],
    };

    let data = stream
        .decoded_data()
        .map_err(|e| ParseError::InvalidXRef(format!("xref stream: {e}")))?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(ParseError::InvalidXRef("xref stream row width is zero".to_string()));
    }

    let mut rows = data.chunks_exact(row_len);
    let mut entries = Vec::new();
    'sections: for (start, count) in index {
        for i in 0..count {
            let row = match rows.next() {
                Some(row) => row,
                None => {
                    tracing::warn!("xref stream shorter than its /Index declares");
                    break 'sections;
                }
            };
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            let kind = if widths[0] == 0 { 1 } else { read_field(f1) };
            let field2 = read_field(f2);
            let field3 = read_field(&f3[..widths[2]]);

            let entry = match kind {
                0 => XRefEntry::Free {
                    next: field2 as u32,
                    generation: field3 as u16,
                },
                1 => XRefEntry::InUse {
                    offset: field2,
                    generation: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_number: field2 as u32,
                    index: field3 as u32,
                },
                // Unknown types are references to the null object
                _ => continue,
            };
            entries.push((start + i, entry));
        }
    }

    Ok(entries)
}

fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Finds `number generation` right before an `obj` keyword at `keyword`.
fn object_header_before(data: &[u8], keyword: usize) -> Option<(usize, u32, u16)> {
    let mut pos = keyword;
    let skip_ws = |pos: &mut usize| {
        while *pos > 0 && is_whitespace(data[*pos - 1]) {
            *pos -= 1;
        }
    };
    let read_digits = |pos: &mut usize| -> Option<u64> {
        let end = *pos;
        while *pos > 0 && data[*pos - 1].is_ascii_digit() {
            *pos -= 1;
        }
        if *pos == end || end - *pos > 10 {
            return None;
        }
        std::str::from_utf8(&data[*pos..end]).ok()?.parse().ok()
    };

    skip_ws(&mut pos);
    let generation = read_digits(&mut pos)?;
    if pos == 0 || !is_whitespace(data[pos - 1]) {
        return None;
    }
    skip_ws(&mut pos);
    let number = read_digits(&mut pos)?;
    if pos > 0 && !is_whitespace(data[pos - 1]) && !matches!(data[pos - 1], b'>' | b')' | b']') {
        return None;
    }

    Some((
        pos,
        u32::try_from(number).ok()?,
        u16::try_from(generation).ok()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classic_file() -> Vec<u8> {
        let mut data = b"%PDF-1.4\n".to_vec();
        let obj1 = data.len();
        data.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let obj2 = data.len();
        data.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [] /Count 0 >> endobj\n");
        let xref = data.len();
        data.extend_from_slice(
            format!(
                "xref\n0 3\n0000000000 65535 f \n{obj1:010} 00000 n \n{obj2:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n"
            )
            .as_bytes(),
        );
        data
    }

    #[test]
    fn test_find_startxref_uses_last_occurrence() {
        let data = b"startxref\n5\n%%EOF\nxxxxxx startxref\n9\n%%EOF";
        assert_eq!(find_startxref(data).unwrap(), 9);
        assert!(find_startxref(b"no keyword here").is_err());
    }

    #[test]
    fn test_read_classic_table() {
        let data = classic_file();
        let table = XRefTable::read(&data, 0, &ParseOptions::default()).unwrap();
        assert_eq!(table.len(), 3);
        assert!(matches!(table.get_entry(0), Some(XRefEntry::Free { .. })));
        assert!(matches!(table.get_entry(1), Some(XRefEntry::InUse { offset: 9, .. })));
        assert_eq!(
            table.trailer().get_reference("Root"),
            Some(crate::objects::ObjectId::new(1, 0))
        );
        assert!(!table.is_recovered());
    }

    #[test]
    fn test_off_by_one_subsection_is_corrected() {
        let data = b"xref\n1 2\n0000000000 65535 f \n0000000017 00000 n \ntrailer << /Root 1 0 R >>";
        let section = parse_classic_section(data, 0).unwrap();
        assert!(matches!(section.entries.get(&1), Some(XRefEntry::InUse { offset: 17, .. })));
    }

    #[test]
    fn test_prev_chain_newest_wins_and_loops_stop() {
        let mut data = classic_file();
        let first_xref = find_startxref(&data).unwrap();
        let obj1 = data.len();
        data.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R /Lang (en) >> endobj\n");
        let xref = data.len();
        data.extend_from_slice(
            format!(
                "xref\n1 1\n{obj1:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R /Prev {first_xref} /Info 9 0 R >>\nstartxref\n{xref}\n%%EOF\n"
            )
            .as_bytes(),
        );

        let table = XRefTable::read(&data, 0, &ParseOptions::default()).unwrap();
        assert_eq!(
            table.get_entry(1),
            Some(&XRefEntry::InUse { offset: obj1 as u64, generation: 0 })
        );
        assert!(table.get_entry(2).is_some());
        assert!(table.trailer().contains_key("Info"));
        assert!(!table.trailer().contains_key("Prev"));

        // A section whose /Prev points at itself terminates
        let looped: &[u8] =
            b"xref\n0 1\n0000000000 65535 f \ntrailer << /Root 1 0 R /Prev 0 >>\nstartxref\n0\n";
        let table = XRefTable::read(looped, 0, &ParseOptions::default()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_decode_xref_stream_rows() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("XRef"));
        dict.set("W", Object::Array(vec![1.into(), 2.into(), 1.into()]));
        dict.set("Index", Object::Array(vec![5.into(), 3.into()]));
        dict.set("Size", 8);
        let rows = vec![
            0, 0, 0, 255, // free
            1, 0x01, 0x10, 0, // offset 272
            2, 0, 7, 3, // in stream 7, index 3
        ];
        let stream = Stream::with_dictionary(dict, rows);
        let entries = decode_xref_stream(&stream).unwrap();
        assert_eq!(
            entries,
            vec![
                (5, XRefEntry::Free { next: 0, generation: 255 }),
                (6, XRefEntry::InUse { offset: 272, generation: 0 }),
                (7, XRefEntry::Compressed { stream_number: 7, index: 3 }),
            ]
        );
    }

    #[test]
    fn test_recover_scans_object_headers() {
        let mut data = classic_file();
        // Destroy the startxref pointer and the table
        let pos = find_subslice(&data, b"xref\n0 3").unwrap();
        data.truncate(pos);
        data.extend_from_slice(b"trailer << /Root 1 0 R /Size 3 >>\n%%EOF");

        let table = XRefTable::recover(&data).unwrap();
        assert!(table.is_recovered());
        assert!(matches!(table.get_entry(1), Some(XRefEntry::InUse { offset: 9, .. })));
        assert!(table.get_entry(2).is_some());
        assert!(table.trailer().contains_key("Root"));
        assert!(XRefTable::recover(b"%PDF-1.4 nothing").is_err());
    }

    #[test]
    fn test_object_header_detection() {
        let data = b"garbage 12 0 obj";
        assert_eq!(object_header_before(data, 13), Some((8, 12, 0)));
        let data = b"x12 0 obj";
        assert_eq!(object_header_before(data, 6), None);
    }
}
