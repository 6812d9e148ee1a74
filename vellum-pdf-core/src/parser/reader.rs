//! Builds a [`Document`] from PDF bytes
//!
//! Every object listed in the cross-reference data is loaded eagerly; object
//! streams are expanded and their containers dropped so the in-memory graph
//! only holds addressable objects.

use super::header::{PdfHeader, PdfVersion};
use super::object_stream::{expand_all_object_streams, expand_object_streams, remove_container_streams};
use super::objects::ObjectParser;
use super::xref::{XRefEntry, XRefTable};
use super::{ParseError, ParseOptions};
use crate::document::Document;
use crate::encryption;
use crate::error::Result;
use crate::objects::{Dictionary, Object, ObjectId};
use std::collections::BTreeMap;

/// Parse a complete PDF file.
pub fn read_document(data: &[u8], options: &ParseOptions) -> Result<Document> {
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ParseError::EmptyFile.into());
    }

    let header = match PdfHeader::parse(data) {
        Ok(header) => header,
        Err(e) if options.strict => return Err(e.into()),
        Err(e) => {
            tracing::warn!("{e}; assuming PDF 1.4");
            PdfHeader {
                version: PdfVersion::V1_4,
                offset: 0,
                has_binary_marker: false,
            }
        }
    };

    let xref = read_xref(data, header.offset, options)?;
    let recovered = xref.is_recovered();
    let mut trailer = xref.trailer().clone();
    let mut objects = load_objects(data, &xref, header.offset, options)?;

    let compressed: BTreeMap<u32, XRefEntry> = xref
        .entries()
        .iter()
        .filter(|(_, entry)| matches!(entry, XRefEntry::Compressed { .. }))
        .map(|(&number, &entry)| (number, entry))
        .collect();

    let security = if trailer.contains_key("Encrypt") {
        let locked = encryption::lock(&objects, &trailer, compressed, recovered)?;
        Some(encryption::open_with_empty_password(
            &mut objects,
            &mut trailer,
            locked,
        )?)
    } else {
        if recovered {
            expand_all_object_streams(&mut objects);
        } else {
            expand_object_streams(&mut objects, &compressed)?;
        }
        remove_container_streams(&mut objects);
        None
    };
    let locked = security.as_ref().is_some_and(|s| s.is_locked());

    for key in ["Prev", "XRefStm", "Size"] {
        trailer.remove(key);
    }
    if !locked {
        establish_root(&mut objects, &mut trailer)?;
        remove_linearization_dict(&mut objects);
    }

    let mut version = header.version;
    if let Some(catalog_version) = catalog_version(&objects, &trailer) {
        version = version.max(catalog_version);
    }

    let highest = objects.keys().map(|id| id.number()).max().unwrap_or(0);
    let declared = xref
        .trailer()
        .get_integer("Size")
        .and_then(|size| u32::try_from(size).ok())
        .unwrap_or(0);
    let next_object_number = (highest + 1).max(declared).max(1);

    tracing::debug!(
        "parsed PDF {version}: {} objects, next object number {next_object_number}",
        objects.len()
    );

    Ok(Document::from_parts(
        objects,
        trailer,
        version,
        next_object_number,
        security,
    ))
}

fn read_xref(data: &[u8], header_offset: usize, options: &ParseOptions) -> Result<XRefTable> {
    let failure = match XRefTable::read(data, header_offset, options) {
        Ok(table) if table.trailer().contains_key("Root") || table.trailer().contains_key("Encrypt") => {
            return Ok(table)
        }
        Ok(table) if !options.recover_xref => return Ok(table),
        Ok(_) => ParseError::MalformedTrailer("trailer has no Root".to_string()),
        Err(e) if !options.recover_xref => return Err(e.into()),
        Err(e) => e,
    };

    tracing::warn!("cross-reference data unusable ({failure}), scanning for objects");
    Ok(XRefTable::recover(data)?)
}

fn load_objects(
    data: &[u8],
    xref: &XRefTable,
    header_offset: usize,
    options: &ParseOptions,
) -> Result<BTreeMap<ObjectId, Object>> {
    let resolve_length = |id: ObjectId| -> Option<i64> {
        match xref.get_entry(id.number())? {
            XRefEntry::InUse { offset, .. } => {
                let (_, object) = parse_at(data, *offset as usize, header_offset, options, None).ok()?;
                object.as_integer()
            }
            _ => None,
        }
    };

    let mut objects = BTreeMap::new();
    for (&number, entry) in xref.entries() {
        let XRefEntry::InUse { offset, generation } = *entry else {
            continue;
        };
        if number == 0 {
            continue;
        }

        let expected = ObjectId::new(number, generation);
        match parse_at(data, offset as usize, header_offset, options, Some(&resolve_length)) {
            Ok((id, object)) => {
                if id.number() != number {
                    tracing::warn!("xref entry for object {number} points at object {id}");
                }
                objects.insert(expected, object);
            }
            Err(e) if options.strict => return Err(e.into()),
            Err(e) => {
                tracing::warn!("object {expected} is unreadable, replaced by null: {e}");
                objects.insert(expected, Object::Null);
            }
        }
    }
    Ok(objects)
}

/// Parses the object at `offset`, retrying relative to the header when junk precedes it.
fn parse_at(
    data: &[u8],
    offset: usize,
    header_offset: usize,
    options: &ParseOptions,
    resolve_length: Option<super::objects::LengthResolver<'_>>,
) -> std::result::Result<(ObjectId, Object), ParseError> {
    let parse = |position: usize| {
        if position >= data.len() {
            return Err(ParseError::InvalidXRef(format!(
                "object offset {position} beyond end of file"
            )));
        }
        ObjectParser::at(data, position)
            .with_max_depth(options.max_nesting)
            .parse_indirect_object(resolve_length)
    };

    match parse(offset) {
        Ok(found) => Ok(found),
        Err(e) if header_offset > 0 => parse(offset + header_offset).map_err(|_| e),
        Err(e) => Err(e),
    }
}

/// Makes sure `Root` names a catalog dictionary stored as an indirect object.
fn establish_root(
    objects: &mut BTreeMap<ObjectId, Object>,
    trailer: &mut Dictionary,
) -> Result<()> {
    match trailer.get("Root").cloned() {
        Some(Object::Reference(id)) => {
            if objects.get(&id).and_then(Object::as_dict).is_some() {
                return Ok(());
            }
            Err(ParseError::UnresolvableRoot.into())
        }
        Some(Object::Dictionary(catalog)) => {
            let number = objects.keys().map(|id| id.number()).max().unwrap_or(0) + 1;
            let id = ObjectId::new(number, 0);
            objects.insert(id, Object::Dictionary(catalog));
            trailer.set("Root", id);
            Ok(())
        }
        Some(_) => Err(ParseError::UnresolvableRoot.into()),
        None => {
            let catalog = objects
                .iter()
                .find(|(_, object)| object.as_dict().is_some_and(|d| d.has_type("Catalog")))
                .map(|(&id, _)| id);
            match catalog {
                Some(id) => {
                    tracing::warn!("trailer has no Root, using catalog {id}");
                    trailer.set("Root", id);
                    Ok(())
                }
                None => Err(ParseError::MalformedTrailer(
                    "no Root entry and no catalog object".to_string(),
                )
                .into()),
            }
        }
    }
}

fn remove_linearization_dict(objects: &mut BTreeMap<ObjectId, Object>) {
    objects.retain(|_, object| {
        !object
            .as_dict()
            .is_some_and(|dict| dict.contains_key("Linearized"))
    });
}

fn catalog_version(objects: &BTreeMap<ObjectId, Object>, trailer: &Dictionary) -> Option<PdfVersion> {
    let catalog = objects.get(&trailer.get_reference("Root")?)?.as_dict()?;
    catalog.get_name("Version")?.parse().ok()
}
