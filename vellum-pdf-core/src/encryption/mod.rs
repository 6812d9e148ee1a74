//! PDF encryption support according to ISO 32000-1 Chapter 7.6
//!
//! Only the Standard Security Handler is implemented: RC4 40/128-bit
//! (revisions 2 and 3), AES-128 crypt filters (revision 4) and AES-256
//! (revision 6, revision 5 read only).
//!
//! A parsed document whose user password is empty is decrypted in memory and
//! re-encrypted by the writer with the same handler. Any other encrypted
//! document stays [locked](SecurityState::Locked) until [`decrypt`] is called
//! with a valid password.

mod aes;
mod permissions;
mod rc4;
mod standard_security;

pub use permissions::{PermissionBits, Permissions, PrintPermission};
pub use rc4::Rc4;
pub use standard_security::{CryptMethod, DataKind, EncryptionAlgorithm, StandardSecurityHandler};

use crate::error::{PdfError, Result, SecurityError};
use crate::objects::{Dictionary, Object, ObjectId, PdfString};
use crate::parser::object_stream::{
    expand_all_object_streams, expand_object_streams, remove_container_streams,
};
use crate::parser::xref::XRefEntry;
use crate::parser::{ParseError, PdfVersion};
use crate::Document;
use rand::Rng;
use std::collections::BTreeMap;

/// Options for [`encrypt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionOptions {
    pub algorithm: EncryptionAlgorithm,
    /// Leave XMP metadata streams in clear (revision 4 and later)
    pub encrypt_metadata: bool,
}

impl Default for EncryptionOptions {
    fn default() -> Self {
        Self::new(EncryptionAlgorithm::default())
    }
}

impl EncryptionOptions {
    pub fn new(algorithm: EncryptionAlgorithm) -> Self {
        Self {
            algorithm,
            encrypt_metadata: true,
        }
    }

    pub fn with_encrypt_metadata(mut self, encrypt_metadata: bool) -> Self {
        self.encrypt_metadata = encrypt_metadata;
        self
    }
}

/// Handler and file key applied when the document is written
#[derive(Debug, Clone)]
pub struct ActiveEncryption {
    handler: StandardSecurityHandler,
    key: Vec<u8>,
}

impl ActiveEncryption {
    pub fn handler(&self) -> &StandardSecurityHandler {
        &self.handler
    }

    /// The `/Encrypt` dictionary to write in the trailer
    pub fn encrypt_dictionary(&self) -> Dictionary {
        self.handler.to_dict()
    }

    /// Encrypt strings and stream data of one object about to be written as `id`.
    pub fn encrypt_object(&self, id: ObjectId, object: &mut Object) -> Result<()> {
        crypt_object(object, id, &self.handler, &self.key, Direction::Encrypt)
    }
}

/// Encrypted document that could not be opened
#[derive(Debug, Clone)]
pub struct LockedState {
    encrypt: Dictionary,
    encrypt_id: Option<ObjectId>,
    file_id: Vec<u8>,
    /// Objects still sealed inside encrypted object streams
    compressed: BTreeMap<u32, XRefEntry>,
    recovered: bool,
    reason: SecurityError,
}

impl LockedState {
    /// Why the empty user password did not open the document
    pub fn reason(&self) -> &SecurityError {
        &self.reason
    }
}

#[derive(Debug, Clone)]
pub enum SecurityState {
    /// Output will be encrypted with this handler
    Active(ActiveEncryption),
    /// Objects are still ciphertext
    Locked(LockedState),
}

/// Summary of a document's encryption for display
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SecurityInfo {
    pub revision: i64,
    pub method: String,
    pub key_bits: usize,
    pub permissions: Permissions,
    pub encrypt_metadata: bool,
    pub locked: bool,
}

impl SecurityInfo {
    fn from_handler(handler: &StandardSecurityHandler, locked: bool) -> Self {
        let method = match handler.stream_method() {
            CryptMethod::Identity => "None".to_string(),
            CryptMethod::Rc4 => format!("RC4 {}-bit", handler.key_bits()),
            CryptMethod::AesV2 => "AES-128".to_string(),
            CryptMethod::AesV3 => "AES-256".to_string(),
        };
        Self {
            revision: handler.revision(),
            method,
            key_bits: handler.key_bits(),
            permissions: handler.permissions(),
            encrypt_metadata: handler.encrypts_metadata(),
            locked,
        }
    }
}

impl SecurityState {
    pub fn is_locked(&self) -> bool {
        matches!(self, SecurityState::Locked(_))
    }

    pub fn info(&self) -> SecurityInfo {
        match self {
            SecurityState::Active(active) => SecurityInfo::from_handler(&active.handler, false),
            SecurityState::Locked(locked) => {
                match StandardSecurityHandler::from_dict(&locked.encrypt, &locked.file_id) {
                    Ok(handler) => SecurityInfo::from_handler(&handler, true),
                    Err(_) => {
                        let revision = locked.encrypt.get_integer("R").unwrap_or(0);
                        let p = locked.encrypt.get_integer("P").unwrap_or(-1) as u32 as i32;
                        SecurityInfo {
                            revision,
                            method: locked
                                .encrypt
                                .get_name("Filter")
                                .unwrap_or("unknown")
                                .to_string(),
                            key_bits: locked.encrypt.get_integer("Length").unwrap_or(0) as usize,
                            permissions: Permissions::from_p_value(p, revision),
                            encrypt_metadata: true,
                            locked: true,
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// Encrypt or decrypt every string and stream reachable inside `object`.
fn crypt_object(
    object: &mut Object,
    id: ObjectId,
    handler: &StandardSecurityHandler,
    key: &[u8],
    direction: Direction,
) -> Result<()> {
    let apply = |data: &[u8], kind: DataKind| -> std::result::Result<Vec<u8>, SecurityError> {
        match direction {
            Direction::Encrypt => handler.encrypt_bytes(key, id, data, kind),
            Direction::Decrypt => handler.decrypt_bytes(key, id, data, kind),
        }
    };

    let mut pending: Vec<&mut Object> = vec![object];
    while let Some(current) = pending.pop() {
        match current {
            Object::String(string) => match apply(string.as_bytes(), DataKind::String) {
                Ok(bytes) => string.set_bytes(bytes),
                Err(e) if direction == Direction::Decrypt => {
                    tracing::warn!("cannot decrypt string in object {id}: {e}");
                }
                Err(e) => return Err(e.into()),
            },
            Object::Array(items) => pending.extend(items.iter_mut()),
            Object::Dictionary(dict) => pending.extend(dict.entries_mut().map(|(_, value)| value)),
            Object::Stream(stream) => {
                let (dict, data) = stream.parts_mut();
                let in_clear = dict.has_type("XRef")
                    || (dict.has_type("Metadata") && !handler.encrypts_metadata());
                if !in_clear {
                    match apply(data, DataKind::Stream) {
                        Ok(bytes) => *data = bytes,
                        Err(e) if direction == Direction::Decrypt => {
                            tracing::warn!("cannot decrypt stream {id}: {e}");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                pending.extend(dict.entries_mut().map(|(_, value)| value));
            }
            _ => {}
        }
    }
    Ok(())
}

fn decrypt_objects(
    objects: &mut BTreeMap<ObjectId, Object>,
    handler: &StandardSecurityHandler,
    key: &[u8],
    skip: Option<ObjectId>,
) -> Result<()> {
    for (&id, object) in objects.iter_mut() {
        if Some(id) != skip {
            crypt_object(object, id, handler, key, Direction::Decrypt)?;
        }
    }
    Ok(())
}

/// First element of the trailer `ID` array
fn file_id(trailer: &Dictionary) -> Vec<u8> {
    trailer
        .get_array("ID")
        .and_then(|id| id.first())
        .and_then(Object::as_string)
        .map(|s| s.as_bytes().to_vec())
        .unwrap_or_default()
}

/// Captures what is needed to decrypt the document later. Called by the reader
/// before any object stream has been expanded.
pub(crate) fn lock(
    objects: &BTreeMap<ObjectId, Object>,
    trailer: &Dictionary,
    compressed: BTreeMap<u32, XRefEntry>,
    recovered: bool,
) -> std::result::Result<LockedState, ParseError> {
    let (encrypt, encrypt_id) = match trailer.get("Encrypt") {
        Some(Object::Reference(id)) => match objects.get(id).and_then(Object::as_dict) {
            Some(dict) => (dict.clone(), Some(*id)),
            None => {
                return Err(ParseError::MalformedTrailer(format!(
                    "Encrypt reference {id} is not a dictionary"
                )))
            }
        },
        Some(Object::Dictionary(dict)) => (dict.clone(), None),
        _ => {
            return Err(ParseError::MalformedTrailer(
                "Encrypt is not a dictionary".to_string(),
            ))
        }
    };

    Ok(LockedState {
        encrypt,
        encrypt_id,
        file_id: file_id(trailer),
        compressed,
        recovered,
        reason: SecurityError::IncorrectPassword,
    })
}

/// Decrypt the object map with `password`. Nothing is modified on failure.
pub(crate) fn unlock(
    objects: &mut BTreeMap<ObjectId, Object>,
    trailer: &mut Dictionary,
    locked: &LockedState,
    password: &str,
) -> Result<ActiveEncryption> {
    let handler = StandardSecurityHandler::from_dict(&locked.encrypt, &locked.file_id)?;
    let key = handler
        .authenticate(password)
        .ok_or(SecurityError::IncorrectPassword)?;

    let mut plain = objects.clone();
    decrypt_objects(&mut plain, &handler, &key, locked.encrypt_id)?;
    if locked.recovered {
        expand_all_object_streams(&mut plain);
    } else {
        expand_object_streams(&mut plain, &locked.compressed)?;
    }
    remove_container_streams(&mut plain);
    if let Some(id) = locked.encrypt_id {
        plain.remove(&id);
    }

    let mut plain_trailer = trailer.clone();
    plain_trailer.remove("Encrypt");
    let root_ok = plain_trailer
        .get_reference("Root")
        .and_then(|id| plain.get(&id))
        .is_some_and(|root| root.as_dict().is_some());
    if !root_ok {
        return Err(ParseError::UnresolvableRoot.into());
    }

    *objects = plain;
    *trailer = plain_trailer;
    Ok(ActiveEncryption { handler, key })
}

/// Called by the reader: open with the empty user password or lock.
pub(crate) fn open_with_empty_password(
    objects: &mut BTreeMap<ObjectId, Object>,
    trailer: &mut Dictionary,
    locked: LockedState,
) -> Result<SecurityState> {
    match unlock(objects, trailer, &locked, "") {
        Ok(active) => {
            tracing::debug!(
                "opened encrypted document (R{}) with the empty user password",
                active.handler.revision()
            );
            Ok(SecurityState::Active(active))
        }
        Err(PdfError::Security(reason)) => {
            tracing::info!("document is encrypted and stays locked: {reason}");
            Ok(SecurityState::Locked(LockedState { reason, ..locked }))
        }
        Err(other) => Err(other),
    }
}

/// Encrypt `doc` on output with the standard security handler.
///
/// The `/Encrypt` dictionary and the encrypted strings and streams only exist in
/// the written bytes; the in-memory objects stay plaintext.
///
/// # Example
///
/// ```rust
/// use vellum_pdf::encryption::{encrypt, EncryptionAlgorithm, EncryptionOptions, Permissions};
/// use vellum_pdf::Document;
///
/// let mut doc = Document::new();
/// encrypt(
///     &mut doc,
///     "user",
///     "owner",
///     &Permissions::all().with_copy(false),
///     &EncryptionOptions::new(EncryptionAlgorithm::Aes128),
/// )?;
/// assert!(doc.is_encrypted());
/// # Ok::<(), vellum_pdf::PdfError>(())
/// ```
pub fn encrypt(
    doc: &mut Document,
    user_password: &str,
    owner_password: &str,
    permissions: &Permissions,
    options: &EncryptionOptions,
) -> Result<()> {
    match &doc.security {
        Some(SecurityState::Locked(_)) => return Err(SecurityError::DocumentLocked.into()),
        Some(SecurityState::Active(_)) => return Err(SecurityError::AlreadyEncrypted.into()),
        None => {}
    }

    // Validate first so a rejected permission set leaves the document untouched
    permissions.to_p_value(options.algorithm.revision())?;

    let mut id = file_id(&doc.trailer);
    if id.is_empty() {
        let mut fresh = [0u8; 16];
        rand::thread_rng().fill(&mut fresh);
        id = fresh.to_vec();
        doc.trailer.set(
            "ID",
            vec![
                Object::String(PdfString::hex(id.clone())),
                Object::String(PdfString::hex(id.clone())),
            ],
        );
    }

    let (handler, key) =
        StandardSecurityHandler::create(options, user_password, owner_password, permissions, &id)?;

    let minimum = match options.algorithm {
        EncryptionAlgorithm::Rc4_40 => None,
        EncryptionAlgorithm::Rc4_128 => Some(PdfVersion::V1_4),
        EncryptionAlgorithm::Aes128 => Some(PdfVersion::V1_6),
        EncryptionAlgorithm::Aes256 => Some(PdfVersion::V1_7),
    };
    if let Some(minimum) = minimum {
        doc.version = doc.version.max(minimum);
    }

    tracing::debug!(
        "document will be encrypted with revision {}",
        handler.revision()
    );
    doc.security = Some(SecurityState::Active(ActiveEncryption { handler, key }));
    Ok(())
}

/// Remove encryption from `doc`, authenticating with the user or owner password.
///
/// Fails with [`SecurityError::IncorrectPassword`] and leaves the document
/// unchanged when neither password matches.
pub fn decrypt(doc: &mut Document, password: &str) -> Result<()> {
    let state = match &doc.security {
        None => return Err(SecurityError::NotEncrypted.into()),
        Some(state) => state,
    };

    match state {
        SecurityState::Active(active) => {
            if active.handler.authenticate(password).is_none() {
                return Err(SecurityError::IncorrectPassword.into());
            }
        }
        SecurityState::Locked(locked) => {
            let locked = locked.clone();
            unlock(&mut doc.objects, &mut doc.trailer, &locked, password)?;
        }
    }

    doc.security = None;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_objects() -> (BTreeMap<ObjectId, Object>, ObjectId) {
        let mut objects = BTreeMap::new();
        let id = ObjectId::new(4, 0);
        let mut dict = Dictionary::new();
        dict.set("Title", PdfString::new(b"Quarterly".to_vec()));
        dict.set("Nested", vec![Object::String(PdfString::new(b"deep".to_vec()))]);
        objects.insert(id, Object::Dictionary(dict));
        (objects, id)
    }

    #[test]
    fn test_crypt_object_round_trip_nested_strings() {
        let (handler, key) = StandardSecurityHandler::create(
            &EncryptionOptions::new(EncryptionAlgorithm::Rc4_128),
            "",
            "owner",
            &Permissions::all(),
            b"file-id",
        )
        .unwrap();
        let (mut objects, id) = sample_objects();
        let original = objects.clone();

        let object = objects.get_mut(&id).unwrap();
        crypt_object(object, id, &handler, &key, Direction::Encrypt).unwrap();
        assert_ne!(objects, original);

        decrypt_objects(&mut objects, &handler, &key, None).unwrap();
        assert_eq!(objects, original);
    }

    #[test]
    fn test_xref_streams_and_clear_metadata_are_untouched() {
        let options = EncryptionOptions::new(EncryptionAlgorithm::Aes128).with_encrypt_metadata(false);
        let (handler, key) =
            StandardSecurityHandler::create(&options, "", "o", &Permissions::all(), b"id").unwrap();

        let mut metadata = crate::objects::Stream::new(b"<x:xmpmeta/>".to_vec());
        metadata.dictionary_mut().set("Type", Object::name("Metadata"));
        let mut object = Object::Stream(metadata.clone());
        crypt_object(&mut object, ObjectId::new(9, 0), &handler, &key, Direction::Encrypt).unwrap();
        assert_eq!(object, Object::Stream(metadata));

        let mut content = Object::Stream(crate::objects::Stream::new(b"BT ET".to_vec()));
        crypt_object(&mut content, ObjectId::new(10, 0), &handler, &key, Direction::Encrypt).unwrap();
        assert_ne!(content.as_stream().unwrap().data(), b"BT ET");
    }

    #[test]
    fn test_unlock_failure_leaves_objects_unchanged() {
        let (handler, key) = StandardSecurityHandler::create(
            &EncryptionOptions::new(EncryptionAlgorithm::Rc4_128),
            "secret",
            "owner",
            &Permissions::all(),
            b"file-id",
        )
        .unwrap();
        let (mut objects, id) = sample_objects();
        let object = objects.get_mut(&id).unwrap();
        crypt_object(object, id, &handler, &key, Direction::Encrypt).unwrap();
        let sealed = objects.clone();

        let mut trailer = Dictionary::new();
        trailer.set("Root", id);
        trailer.set("Encrypt", handler.to_dict());
        trailer.set("ID", vec![Object::String(PdfString::hex(b"file-id".to_vec()))]);
        let locked = lock(&objects, &trailer, BTreeMap::new(), false).unwrap();

        let err = unlock(&mut objects, &mut trailer, &locked, "guess").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::IncorrectPassword);
        assert_eq!(objects, sealed);
        assert!(trailer.contains_key("Encrypt"));

        unlock(&mut objects, &mut trailer, &locked, "secret").unwrap();
        assert!(!trailer.contains_key("Encrypt"));
        let title = objects[&id].as_dict().unwrap().get("Title").unwrap();
        assert_eq!(title.as_string().unwrap().as_bytes(), b"Quarterly");
    }

    #[test]
    fn test_encrypt_rejects_invalid_permissions_without_mutation() {
        let mut doc = Document::new();
        let before = doc.trailer.clone();
        let err = encrypt(
            &mut doc,
            "u",
            "o",
            &Permissions::all(),
            &EncryptionOptions::new(EncryptionAlgorithm::Rc4_40),
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidPermissionSet);
        assert!(doc.security.is_none());
        assert_eq!(doc.trailer, before);
    }

    #[test]
    fn test_encrypt_twice_and_decrypt_plain() {
        let mut doc = Document::new();
        assert!(matches!(
            decrypt(&mut doc, "").unwrap_err(),
            PdfError::Security(SecurityError::NotEncrypted)
        ));

        let options = EncryptionOptions::new(EncryptionAlgorithm::Aes256);
        encrypt(&mut doc, "u", "o", &Permissions::all(), &options).unwrap();
        assert_eq!(doc.version, PdfVersion::V1_7);
        assert!(doc.trailer.get_array("ID").is_some());
        assert!(matches!(
            encrypt(&mut doc, "u", "o", &Permissions::all(), &options).unwrap_err(),
            PdfError::Security(SecurityError::AlreadyEncrypted)
        ));

        assert_eq!(
            decrypt(&mut doc, "nope").unwrap_err().kind(),
            crate::ErrorKind::IncorrectPassword
        );
        decrypt(&mut doc, "o").unwrap();
        assert!(doc.security.is_none());
    }
}
