//! Object streams (ISO 32000-1 Section 7.5.7)
//!
//! Compressed objects are stored as a header of `number offset` pairs followed by
//! the serialized objects, all relative to `/First`.

use super::objects::ObjectParser;
use super::xref::XRefEntry;
use super::{ParseError, ParseResult};
use crate::objects::{Object, ObjectId, Stream};
use std::collections::{BTreeMap, HashSet};

/// A decoded object stream
#[derive(Debug)]
pub struct ObjectStream {
    /// Object number of the containing stream
    pub number: u32,
    /// Objects in stream order
    pub objects: Vec<(u32, Object)>,
}

impl ObjectStream {
    pub fn parse(number: u32, stream: &Stream) -> ParseResult<Self> {
        let corrupt = |reason: String| ParseError::CorruptObjectStream { number, reason };

        let dict = stream.dictionary();
        if let Some(kind) = dict.type_name() {
            if kind != "ObjStm" {
                return Err(corrupt(format!("stream has /Type /{kind}")));
            }
        }
        let count = dict
            .get_integer("N")
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| corrupt("missing /N".to_string()))?;
        let first = dict
            .get_integer("First")
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| corrupt("missing /First".to_string()))?;

        let data = stream
            .decoded_data()
            .map_err(|e| corrupt(e.to_string()))?;
        if first > data.len() {
            return Err(corrupt(format!("/First {first} beyond {} bytes", data.len())));
        }

        let mut header = ObjectParser::new(&data[..first]);
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            let pair = (header.parse_object(), header.parse_object());
            match pair {
                (Ok(Object::Integer(n)), Ok(Object::Integer(offset))) if n >= 0 && offset >= 0 => {
                    offsets.push((n as u32, offset as usize));
                }
                _ => return Err(corrupt("malformed offset table".to_string())),
            }
        }

        let mut objects = Vec::with_capacity(count);
        for (object_number, offset) in offsets {
            let position = first + offset;
            if position > data.len() {
                return Err(corrupt(format!("object {object_number} offset out of range")));
            }
            let object = ObjectParser::at(&data, position)
                .parse_object()
                .map_err(|e| corrupt(format!("object {object_number}: {e}")))?;
            objects.push((object_number, object));
        }

        Ok(Self { number, objects })
    }
}

/// Loads every `Compressed` xref entry into `objects`.
///
/// Entries whose container is missing are skipped with a warning; a container
/// that exists but cannot be decoded is an error.
pub fn expand_object_streams(
    objects: &mut BTreeMap<ObjectId, Object>,
    entries: &BTreeMap<u32, XRefEntry>,
) -> ParseResult<()> {
    let mut wanted: BTreeMap<u32, HashSet<u32>> = BTreeMap::new();
    for (&number, entry) in entries {
        if let XRefEntry::Compressed { stream_number, .. } = *entry {
            wanted.entry(stream_number).or_default().insert(number);
        }
    }

    for (stream_number, members) in wanted {
        let container = objects
            .iter()
            .find(|(id, _)| id.number() == stream_number)
            .and_then(|(_, object)| object.as_stream());
        let container = match container {
            Some(stream) => stream,
            None => {
                tracing::warn!(
                    "object stream {stream_number} is missing; {} objects unavailable",
                    members.len()
                );
                continue;
            }
        };

        let parsed = ObjectStream::parse(stream_number, container)?;
        for (number, object) in parsed.objects {
            // A direct object defined in a newer section wins
            let id = ObjectId::new(number, 0);
            if members.contains(&number) && !objects.contains_key(&id) {
                objects.insert(id, object);
            }
        }
    }

    Ok(())
}

/// Adds objects from every loaded object stream that are not defined elsewhere.
pub fn expand_all_object_streams(objects: &mut BTreeMap<ObjectId, Object>) {
    let containers: Vec<(u32, Stream)> = objects
        .iter()
        .filter_map(|(id, object)| {
            object
                .as_stream()
                .filter(|s| s.dictionary().has_type("ObjStm"))
                .map(|s| (id.number(), s.clone()))
        })
        .collect();

    for (number, stream) in containers {
        match ObjectStream::parse(number, &stream) {
            Ok(parsed) => {
                for (member, object) in parsed.objects {
                    objects.entry(ObjectId::new(member, 0)).or_insert(object);
                }
            }
            Err(e) => tracing::warn!("skipping unreadable object stream: {e}"),
        }
    }
}

/// Drops object stream and xref stream containers; the writer builds its own.
pub fn remove_container_streams(objects: &mut BTreeMap<ObjectId, Object>) {
    objects.retain(|_, object| {
        !object
            .as_stream()
            .is_some_and(|s| s.dictionary().has_type("ObjStm") || s.dictionary().has_type("XRef"))
    });
}
