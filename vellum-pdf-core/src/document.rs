use crate::encryption::{SecurityInfo, SecurityState};
use crate::error::{Result, SecurityError};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::parser::{read_document, ParseOptions, PdfVersion};
use crate::writer::{self, WriterConfig};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

mod copy;
mod info;

pub use copy::{deep_copy, CopyMap};
pub use info::{format_pdf_date, parse_pdf_date, DocumentSummary};

static NULL: Object = Object::Null;

/// An in-memory PDF object graph.
///
/// Every indirect object is owned by the document and addressed by its
/// [`ObjectId`]; objects refer to each other only through
/// [`Object::Reference`], so cyclic graphs are fine.
///
/// # Example
///
/// ```rust
/// use vellum_pdf::{Document, Object};
///
/// let mut doc = Document::new();
/// let id = doc.add_object(Object::Integer(42));
/// assert_eq!(doc.get(id), Some(&Object::Integer(42)));
///
/// let bytes = doc.write()?;
/// let reparsed = Document::parse(&bytes)?;
/// assert!(reparsed.catalog().is_some());
/// # Ok::<(), vellum_pdf::PdfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) objects: BTreeMap<ObjectId, Object>,
    pub(crate) trailer: Dictionary,
    pub(crate) version: PdfVersion,
    pub(crate) next_object_number: u32,
    pub(crate) security: Option<SecurityState>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates a document with a catalog and an empty page tree.
    pub fn new() -> Self {
        let mut doc = Self {
            objects: BTreeMap::new(),
            trailer: Dictionary::new(),
            version: PdfVersion::V1_7,
            next_object_number: 1,
            security: None,
        };

        let catalog_id = doc.add_object(Object::Null);
        let mut pages = Dictionary::new();
        pages.set("Type", Object::name("Pages"));
        pages.set("Kids", Vec::<Object>::new());
        pages.set("Count", 0);
        let pages_id = doc.add_object(pages);

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name("Catalog"));
        catalog.set("Pages", pages_id);
        doc.objects.insert(catalog_id, Object::Dictionary(catalog));
        doc.trailer.set("Root", catalog_id);
        doc
    }

    pub(crate) fn from_parts(
        objects: BTreeMap<ObjectId, Object>,
        trailer: Dictionary,
        version: PdfVersion,
        next_object_number: u32,
        security: Option<SecurityState>,
    ) -> Self {
        Self {
            objects,
            trailer,
            version,
            next_object_number,
            security,
        }
    }

    /// Parse PDF bytes with lenient defaults.
    pub fn parse(data: &[u8]) -> Result<Self> {
        read_document(data, &ParseOptions::default())
    }

    pub fn parse_with_options(data: &[u8], options: &ParseOptions) -> Result<Self> {
        read_document(data, options)
    }

    /// Read and parse a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    pub fn version(&self) -> PdfVersion {
        self.version
    }

    pub fn set_version(&mut self, version: PdfVersion) {
        self.version = version;
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }

    pub fn objects(&self) -> &BTreeMap<ObjectId, Object> {
        &self.objects
    }

    /// Stores `object` under a number never handed out before.
    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        let id = ObjectId::new(self.next_object_number, 0);
        self.next_object_number += 1;
        self.objects.insert(id, object.into());
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    /// Replaces or inserts the object stored under `id`.
    pub fn set_object(&mut self, id: ObjectId, object: impl Into<Object>) -> Option<Object> {
        if id.number() >= self.next_object_number {
            self.next_object_number = id.number() + 1;
        }
        self.objects.insert(id, object.into())
    }

    /// Removing an object does not free its number for reuse.
    pub fn remove_object(&mut self, id: ObjectId) -> Option<Object> {
        self.objects.remove(&id)
    }

    pub fn next_object_number(&self) -> u32 {
        self.next_object_number
    }

    /// Follow one level of reference. Dangling references resolve to null.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.resolve_id(*id),
            other => other,
        }
    }

    pub fn resolve_id(&self, id: ObjectId) -> &Object {
        match self.objects.get(&id) {
            Some(object) => object,
            None => {
                tracing::warn!("dangling reference {id} resolved as null");
                &NULL
            }
        }
    }

    /// Dictionary behind `object`, or the dictionary of a stream.
    pub fn resolve_dict<'a>(&'a self, object: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(object) {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(stream.dictionary()),
            _ => None,
        }
    }

    pub fn catalog_id(&self) -> Option<ObjectId> {
        self.trailer.get_reference("Root")
    }

    pub fn catalog(&self) -> Option<&Dictionary> {
        self.get(self.catalog_id()?)?.as_dict()
    }

    pub fn catalog_mut(&mut self) -> Option<&mut Dictionary> {
        let id = self.catalog_id()?;
        self.get_mut(id)?.as_dict_mut()
    }

    /// The document information dictionary, stored directly or indirectly.
    pub fn info(&self) -> Option<&Dictionary> {
        self.resolve_dict(self.trailer.get("Info")?)
    }

    /// Sets one `Info` entry, creating the dictionary when needed.
    pub fn set_info_entry(&mut self, key: &str, value: impl Into<Object>) {
        let value = value.into();
        if let Some(id) = self.trailer.get_reference("Info") {
            if let Some(Object::Dictionary(info)) = self.objects.get_mut(&id) {
                info.set(key, value);
                return;
            }
        }
        if let Some(Object::Dictionary(info)) = self.trailer.get_mut("Info") {
            info.set(key, value);
            return;
        }
        let mut info = Dictionary::new();
        info.set(key, value);
        let id = self.add_object(info);
        self.trailer.set("Info", id);
    }

    /// Ids reachable from the trailer, found breadth-first.
    pub fn reachable_ids(&self) -> BTreeSet<ObjectId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        self.trailer
            .values()
            .for_each(|value| value.for_each_reference(&mut |id| queue.push_back(id)));

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(object) = self.objects.get(&id) {
                object.for_each_reference(&mut |child| {
                    if !seen.contains(&child) {
                        queue.push_back(child);
                    }
                });
            }
        }
        seen.retain(|id| self.objects.contains_key(id));
        seen
    }

    /// Drops objects unreachable from the trailer. Returns how many were removed.
    pub fn remove_unreachable(&mut self) -> usize {
        let reachable = self.reachable_ids();
        let before = self.objects.len();
        self.objects.retain(|id, _| reachable.contains(id));
        before - self.objects.len()
    }

    pub fn is_encrypted(&self) -> bool {
        self.security.is_some()
    }

    /// Encrypted and not opened with a password yet
    pub fn is_locked(&self) -> bool {
        self.security.as_ref().is_some_and(SecurityState::is_locked)
    }

    pub fn security(&self) -> Option<&SecurityState> {
        self.security.as_ref()
    }

    pub fn security_info(&self) -> Option<SecurityInfo> {
        self.security.as_ref().map(SecurityState::info)
    }

    pub(crate) fn ensure_unlocked(&self) -> Result<()> {
        if self.is_locked() {
            return Err(SecurityError::DocumentLocked.into());
        }
        Ok(())
    }

    /// Serialize with the default [`WriterConfig`].
    pub fn write(&self) -> Result<Vec<u8>> {
        writer::write(self, &WriterConfig::default())
    }

    pub fn write_with_config(&self, config: &WriterConfig) -> Result<Vec<u8>> {
        writer::write(self, config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        writer::save(self, path, &WriterConfig::default())
    }

    pub fn save_with_config(&self, path: impl AsRef<Path>, config: &WriterConfig) -> Result<()> {
        writer::save(self, path, config)
    }

    pub fn page_count(&self) -> Result<usize> {
        crate::page_tree::page_count(self)
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary::of(self)
    }
}
