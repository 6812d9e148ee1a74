//! PDF serialization
//!
//! The writer emits the header, every live indirect object, a cross-reference
//! section (classic table or compressed stream) and the trailer. Offsets are
//! recorded while the bodies are written; the index is written afterwards.
//!
//! When the document carries active encryption, each object is encrypted with
//! its final object number on the way out and the trailer receives `Encrypt`.

mod format;
mod xref_stream;

pub use format::{format_real, write_name, write_object, write_string};
pub use xref_stream::XRefStreamWriter;

use crate::document::Document;
use crate::encryption::SecurityState;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId, Stream};
use crate::parser::xref::XRefEntry;
use crate::parser::PdfVersion;
use std::collections::{BTreeMap, HashMap};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Cross-reference stream instead of a classic table (raises the output to PDF 1.5)
    pub xref_stream: bool,
    /// Pack non-stream objects into object streams; implies `xref_stream`
    pub object_streams: bool,
    /// Flate-compress streams that carry no filter yet
    pub compress_streams: bool,
    /// Number written objects consecutively from 1
    pub renumber: bool,
    /// Write only objects reachable from the trailer
    pub garbage_collect: bool,
    pub objects_per_stream: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            xref_stream: false,
            object_streams: false,
            compress_streams: true,
            renumber: false,
            garbage_collect: true,
            objects_per_stream: 100,
        }
    }
}

impl WriterConfig {
    /// Smallest output: object streams, a compressed xref stream, compact numbering.
    pub fn compact() -> Self {
        Self {
            xref_stream: true,
            object_streams: true,
            renumber: true,
            ..Self::default()
        }
    }

    pub fn with_xref_stream(mut self, enabled: bool) -> Self {
        self.xref_stream = enabled;
        self
    }

    pub fn with_object_streams(mut self, enabled: bool) -> Self {
        self.object_streams = enabled;
        self
    }

    pub fn with_compress_streams(mut self, enabled: bool) -> Self {
        self.compress_streams = enabled;
        self
    }

    pub fn with_renumber(mut self, enabled: bool) -> Self {
        self.renumber = enabled;
        self
    }

    pub fn with_garbage_collect(mut self, enabled: bool) -> Self {
        self.garbage_collect = enabled;
        self
    }

    pub fn with_objects_per_stream(mut self, count: usize) -> Self {
        self.objects_per_stream = count.max(1);
        self
    }

    fn uses_xref_stream(&self) -> bool {
        self.xref_stream || self.object_streams
    }
}

/// Serialize `doc` into memory.
pub fn write(doc: &Document, config: &WriterConfig) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PdfWriter::new(&mut out, config.clone()).write_document(doc)?;
    Ok(out)
}

/// Serialize `doc` into a file, replacing it.
pub fn save(doc: &Document, path: impl AsRef<Path>, config: &WriterConfig) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    let written = PdfWriter::new(&mut writer, config.clone()).write_document(doc)?;
    writer.flush()?;
    tracing::debug!("saved {} bytes to {}", written, path.display());
    Ok(())
}

/// Streaming PDF writer over any [`Write`] sink.
pub struct PdfWriter<W: Write> {
    writer: W,
    config: WriterConfig,
    current_position: u64,
    entries: BTreeMap<u32, XRefEntry>,
}

impl<W: Write> PdfWriter<W> {
    pub fn new(writer: W, config: WriterConfig) -> Self {
        Self {
            writer,
            config,
            current_position: 0,
            entries: BTreeMap::new(),
        }
    }

    /// Writes the complete file and returns the number of bytes written.
    pub fn write_document(mut self, doc: &Document) -> Result<u64> {
        doc.ensure_unlocked()?;
        let encryption = match doc.security() {
            Some(SecurityState::Active(active)) => Some(active),
            _ => None,
        };
        let root = doc
            .catalog_id()
            .filter(|id| doc.get(*id).is_some_and(|root| root.as_dict().is_some()))
            .ok_or_else(|| {
                PdfError::Serialization("trailer Root is not a dictionary".to_string())
            })?;

        let mut plan = Plan::new(doc, &self.config, root);

        let mut version = doc.version();
        if self.config.uses_xref_stream() && version < PdfVersion::V1_5 {
            version = PdfVersion::V1_5;
        }
        self.write_header(version)?;

        let mut packable: Vec<(ObjectId, Object)> = Vec::new();
        for (new_id, mut object) in plan.take_objects(doc) {
            #[cfg(feature = "compression")]
            if self.config.compress_streams {
                if let Object::Stream(stream) = &mut object {
                    stream.compress_flate()?;
                }
            }

            if self.config.object_streams
                && new_id.generation() == 0
                && !matches!(object, Object::Stream(_))
            {
                packable.push((new_id, object));
                continue;
            }
            if let Some(active) = encryption {
                active.encrypt_object(new_id, &mut object)?;
            }
            self.write_indirect(new_id, &object)?;
        }

        let mut trailer = plan.trailer(doc);
        if let Some(active) = encryption {
            let encrypt_id = plan.allocate();
            self.write_indirect(encrypt_id, &Object::Dictionary(active.encrypt_dictionary()))?;
            trailer.set("Encrypt", encrypt_id);
        }

        for members in packable.chunks(self.config.objects_per_stream.max(1)) {
            let container = plan.allocate();
            let mut stream = Object::Stream(pack_object_stream(
                members,
                self.config.compress_streams,
            )?);
            for (index, (member, _)) in members.iter().enumerate() {
                self.entries.insert(
                    member.number(),
                    XRefEntry::Compressed {
                        stream_number: container.number(),
                        index: index as u32,
                    },
                );
            }
            if let Some(active) = encryption {
                active.encrypt_object(container, &mut stream)?;
            }
            self.write_indirect(container, &stream)?;
        }

        if self.config.uses_xref_stream() {
            let xref_id = plan.allocate();
            self.write_xref_stream(xref_id, &trailer)?;
        } else {
            let xref_position = self.current_position;
            let size = self.write_xref_table()?;
            trailer.set("Size", size);
            self.write_trailer(&trailer, xref_position)?;
        }

        self.writer.flush()?;
        tracing::debug!(
            "wrote {} objects in {} bytes",
            self.entries.len(),
            self.current_position
        );
        Ok(self.current_position)
    }

    fn write_header(&mut self, version: PdfVersion) -> Result<()> {
        self.write_bytes(format!("%PDF-{version}\n").as_bytes())?;
        // Binary comment to ensure file is treated as binary
        self.write_bytes(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'])
    }

    fn write_indirect(&mut self, id: ObjectId, object: &Object) -> Result<()> {
        self.entries.insert(
            id.number(),
            XRefEntry::InUse {
                offset: self.current_position,
                generation: id.generation(),
            },
        );
        let mut body = format!("{} {} obj\n", id.number(), id.generation()).into_bytes();
        format::write_object(&mut body, object);
        body.extend_from_slice(b"\nendobj\n");
        self.write_bytes(&body)
    }

    /// Free numbers are chained from entry 0 as the table requires.
    fn complete_entries(&self, size: u32) -> Vec<XRefEntry> {
        let free: Vec<u32> = (1..size)
            .filter(|n| !self.entries.contains_key(n))
            .collect();
        let next_free = |after: u32| free.iter().copied().find(|&n| n > after).unwrap_or(0);

        (0..size)
            .map(|number| match self.entries.get(&number) {
                Some(entry) if number != 0 => *entry,
                _ => XRefEntry::Free {
                    next: next_free(number),
                    generation: if number == 0 { 65535 } else { 0 },
                },
            })
            .collect()
    }

    fn write_xref_table(&mut self) -> Result<u32> {
        let size = self.entries.keys().next_back().map_or(1, |n| n + 1);
        let mut table = format!("xref\n0 {size}\n").into_bytes();
        for entry in self.complete_entries(size) {
            let line = match entry {
                XRefEntry::InUse { offset, generation } => format!("{offset:010} {generation:05} n \n"),
                XRefEntry::Free { next, generation } => format!("{next:010} {generation:05} f \n"),
                XRefEntry::Compressed { .. } => {
                    return Err(PdfError::Serialization(
                        "compressed objects need an xref stream".to_string(),
                    ))
                }
            };
            table.extend_from_slice(line.as_bytes());
        }
        self.write_bytes(&table)?;
        Ok(size)
    }

    fn write_trailer(&mut self, trailer: &Dictionary, xref_position: u64) -> Result<()> {
        let mut out = b"trailer\n".to_vec();
        format::write_dictionary(&mut out, trailer);
        out.extend_from_slice(format!("\nstartxref\n{xref_position}\n%%EOF\n").as_bytes());
        self.write_bytes(&out)
    }

    fn write_xref_stream(&mut self, id: ObjectId, trailer: &Dictionary) -> Result<()> {
        let position = self.current_position;
        self.entries.insert(
            id.number(),
            XRefEntry::InUse {
                offset: position,
                generation: 0,
            },
        );
        let size = id.number() + 1;
        let mut xref = XRefStreamWriter::new();
        for entry in self.complete_entries(size) {
            xref.push(entry);
        }
        let stream = xref.into_stream(trailer, self.config.compress_streams)?;
        self.write_indirect(id, &Object::Stream(stream))?;
        self.write_bytes(format!("startxref\n{position}\n%%EOF\n").as_bytes())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.current_position += data.len() as u64;
        Ok(())
    }
}

/// Which objects get written and under which ids.
struct Plan {
    order: Vec<(ObjectId, ObjectId)>,
    ids: HashMap<ObjectId, ObjectId>,
    /// Info given directly in the trailer, promoted to an indirect object
    direct_info: Option<ObjectId>,
    next_number: u32,
}

impl Plan {
    fn new(doc: &Document, config: &WriterConfig, root: ObjectId) -> Self {
        let mut selected: Vec<ObjectId> = if config.garbage_collect {
            doc.reachable_ids().into_iter().collect()
        } else {
            doc.objects().keys().copied().collect()
        };
        if !selected.contains(&root) {
            selected.push(root);
            selected.sort();
        }

        let mut order = Vec::with_capacity(selected.len());
        let mut ids = HashMap::with_capacity(selected.len());
        let mut used = std::collections::HashSet::new();
        let mut next_number = 1;
        for old in selected {
            let new = if config.renumber {
                ObjectId::new(next_number, 0)
            } else {
                old
            };
            if !used.insert(new.number()) {
                tracing::warn!("object {old} shares its number with another object; skipped");
                continue;
            }
            next_number = next_number.max(new.number() + 1);
            ids.insert(old, new);
            order.push((old, new));
        }

        let mut plan = Self {
            order,
            ids,
            direct_info: None,
            next_number,
        };
        if matches!(doc.trailer().get("Info"), Some(Object::Dictionary(_))) {
            plan.direct_info = Some(plan.allocate());
        }
        plan
    }

    fn allocate(&mut self) -> ObjectId {
        let id = ObjectId::new(self.next_number, 0);
        self.next_number += 1;
        id
    }

    /// Cloned, renumbered objects in output order.
    fn take_objects(&self, doc: &Document) -> Vec<(ObjectId, Object)> {
        let mut objects: Vec<(ObjectId, Object)> = self
            .order
            .iter()
            .map(|&(old, new)| {
                let mut object = doc.get(old).cloned().unwrap_or(Object::Null);
                self.remap(&mut object);
                (new, object)
            })
            .collect();
        if let (Some(id), Some(Object::Dictionary(info))) =
            (self.direct_info, doc.trailer().get("Info"))
        {
            let mut info = Object::Dictionary(info.clone());
            self.remap(&mut info);
            objects.push((id, info));
        }
        objects.sort_by_key(|(id, _)| *id);
        objects
    }

    /// Document-level trailer entries; section keys are added by the writer.
    fn trailer(&self, doc: &Document) -> Dictionary {
        let mut trailer = Dictionary::new();
        for (key, value) in doc.trailer().iter() {
            if matches!(key.as_str(), "Size" | "Prev" | "XRefStm" | "Encrypt") {
                continue;
            }
            // The promoted Info id is already a written id
            if key == "Info" {
                if let Some(id) = self.direct_info {
                    trailer.set(key.clone(), Object::Reference(id));
                    continue;
                }
            }
            let mut value = value.clone();
            self.remap(&mut value);
            if !value.is_null() {
                trailer.set(key.clone(), value);
            }
        }
        trailer
    }

    /// References to objects that are not written become null.
    fn remap(&self, object: &mut Object) {
        let mut pending: Vec<&mut Object> = vec![object];
        while let Some(node) = pending.pop() {
            match node {
                Object::Reference(id) => match self.ids.get(id) {
                    Some(&new) => *id = new,
                    None => *node = Object::Null,
                },
                Object::Array(items) => pending.extend(items.iter_mut()),
                Object::Dictionary(dict) => pending.extend(dict.entries_mut().map(|(_, v)| v)),
                Object::Stream(stream) => {
                    pending.extend(stream.dictionary_mut().entries_mut().map(|(_, v)| v))
                }
                _ => {}
            }
        }
    }
}

/// Builds an `ObjStm` holding `members`.
fn pack_object_stream(members: &[(ObjectId, Object)], compress: bool) -> Result<Stream> {
    let mut header = String::new();
    let mut body = Vec::new();
    for (id, object) in members {
        header.push_str(&format!("{} {} ", id.number(), body.len()));
        format::write_object(&mut body, object);
        body.push(b'\n');
    }

    let mut dict = Dictionary::new();
    dict.set("Type", Object::name("ObjStm"));
    dict.set("N", members.len());
    dict.set("First", header.len());
    let mut data = header.into_bytes();
    data.extend_from_slice(&body);

    let mut stream = Stream::with_dictionary(dict, data);
    #[cfg(feature = "compression")]
    if compress {
        let packed = crate::compression::compress_best(stream.data())?;
        stream.set_data(packed);
        stream.set_filter("FlateDecode");
    }
    #[cfg(not(feature = "compression"))]
    let _ = compress;
    Ok(stream)
}
