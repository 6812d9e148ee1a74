//! Copying object subgraphs between documents

use super::Document;
use crate::objects::{Object, ObjectId};
use std::collections::{HashMap, HashSet, VecDeque};

/// Source id to destination id map shared across several copies, so objects
/// referenced from more than one copied root are copied once.
#[derive(Debug, Clone, Default)]
pub struct CopyMap {
    mapped: HashMap<ObjectId, ObjectId>,
    excluded: HashSet<ObjectId>,
}

impl CopyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: ObjectId) -> Option<ObjectId> {
        self.mapped.get(&source).copied()
    }

    /// Pre-assigns a destination; the caller fills in the object body.
    pub fn map_to(&mut self, source: ObjectId, destination: ObjectId) {
        self.mapped.insert(source, destination);
    }

    /// References to `source` become null instead of being followed.
    pub fn exclude(&mut self, source: ObjectId) {
        self.excluded.insert(source);
    }

    pub fn len(&self) -> usize {
        self.mapped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapped.is_empty()
    }

    /// Clones `value` with every reference rewritten to `into`, copying what is not mapped yet.
    pub fn copy_value(&mut self, value: &Object, from: &Document, into: &mut Document) -> Object {
        let mut queue = VecDeque::new();
        let mut copy = value.clone();
        self.remap(&mut copy, from, into, &mut queue);
        self.drain(from, into, &mut queue);
        copy
    }

    fn remap(
        &mut self,
        value: &mut Object,
        from: &Document,
        into: &mut Document,
        queue: &mut VecDeque<ObjectId>,
    ) {
        let mut pending: Vec<&mut Object> = vec![value];
        while let Some(node) = pending.pop() {
            match node {
                Object::Reference(id) => {
                    let source = *id;
                    if self.excluded.contains(&source) {
                        *node = Object::Null;
                    } else if let Some(&destination) = self.mapped.get(&source) {
                        *id = destination;
                    } else if from.get(source).is_none() {
                        tracing::warn!("dangling reference {source} copied as null");
                        *node = Object::Null;
                    } else {
                        let destination = into.add_object(Object::Null);
                        self.mapped.insert(source, destination);
                        queue.push_back(source);
                        *id = destination;
                    }
                }
                Object::Array(items) => pending.extend(items.iter_mut()),
                Object::Dictionary(dict) => pending.extend(dict.entries_mut().map(|(_, v)| v)),
                Object::Stream(stream) => {
                    pending.extend(stream.dictionary_mut().entries_mut().map(|(_, v)| v))
                }
                _ => {}
            }
        }
    }

    fn drain(&mut self, from: &Document, into: &mut Document, queue: &mut VecDeque<ObjectId>) {
        while let Some(source) = queue.pop_front() {
            let Some(destination) = self.get(source) else {
                continue;
            };
            let mut body = from.get(source).cloned().unwrap_or(Object::Null);
            self.remap(&mut body, from, into, queue);
            into.set_object(destination, body);
        }
    }
}

/// Copies `id` and everything it transitively references from `from` into
/// `into`, returning the id of the copy.
///
/// Objects already present in `map` are reused rather than copied again, which
/// also makes cycles terminate: an object is mapped before its body is copied.
pub fn deep_copy(id: ObjectId, from: &Document, into: &mut Document, map: &mut CopyMap) -> ObjectId {
    if let Some(existing) = map.get(id) {
        return existing;
    }
    let destination = into.add_object(Object::Null);
    map.map_to(id, destination);
    let mut queue = VecDeque::from([id]);
    map.drain(from, into, &mut queue);
    destination
}
