//! Standard Security Handler (ISO 32000-1 Section 7.6.3, ISO 32000-2 Section 7.6.4)
//!
//! Revisions 2-4 derive the file key from an MD5 hash of the padded password;
//! revisions 5 and 6 wrap a random 256-bit file key with a SHA-2 based hash.

use super::aes;
use super::permissions::Permissions;
use super::EncryptionOptions;
use super::rc4::rc4;
use crate::error::SecurityError;
use crate::objects::{Dictionary, Object, ObjectId, PdfString};
use rand::Rng;
use sha2::{Digest, Sha256, Sha384, Sha512};
use unicode_normalization::UnicodeNormalization;

/// Padding used in password processing
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// How strings or streams are enciphered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CryptMethod {
    Identity,
    Rc4,
    AesV2,
    AesV3,
}

impl CryptMethod {
    fn from_cfm(name: Option<&str>) -> Result<Self, SecurityError> {
        match name {
            None | Some("None") => Ok(CryptMethod::Identity),
            Some("V2") => Ok(CryptMethod::Rc4),
            Some("AESV2") => Ok(CryptMethod::AesV2),
            Some("AESV3") => Ok(CryptMethod::AesV3),
            Some(other) => Err(SecurityError::UnsupportedHandler(format!(
                "crypt filter method {other}"
            ))),
        }
    }

    fn cfm_name(&self) -> &'static str {
        match self {
            CryptMethod::Identity => "None",
            CryptMethod::Rc4 => "V2",
            CryptMethod::AesV2 => "AESV2",
            CryptMethod::AesV3 => "AESV3",
        }
    }
}

/// Encryption algorithms offered when encrypting a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(non_camel_case_types)]
pub enum EncryptionAlgorithm {
    /// RC4 with a 40-bit key (revision 2)
    Rc4_40,
    /// RC4 with a 128-bit key (revision 3)
    Rc4_128,
    /// AES-128 crypt filters (revision 4)
    Aes128,
    /// AES-256 (revision 6)
    #[default]
    Aes256,
}

impl EncryptionAlgorithm {
    pub fn revision(&self) -> i64 {
        match self {
            EncryptionAlgorithm::Rc4_40 => 2,
            EncryptionAlgorithm::Rc4_128 => 3,
            EncryptionAlgorithm::Aes128 => 4,
            EncryptionAlgorithm::Aes256 => 6,
        }
    }

    fn version(&self) -> i64 {
        match self {
            EncryptionAlgorithm::Rc4_40 => 1,
            EncryptionAlgorithm::Rc4_128 => 2,
            EncryptionAlgorithm::Aes128 => 4,
            EncryptionAlgorithm::Aes256 => 5,
        }
    }

    fn key_length(&self) -> usize {
        match self {
            EncryptionAlgorithm::Rc4_40 => 5,
            EncryptionAlgorithm::Rc4_128 | EncryptionAlgorithm::Aes128 => 16,
            EncryptionAlgorithm::Aes256 => 32,
        }
    }

    fn method(&self) -> CryptMethod {
        match self {
            EncryptionAlgorithm::Rc4_40 | EncryptionAlgorithm::Rc4_128 => CryptMethod::Rc4,
            EncryptionAlgorithm::Aes128 => CryptMethod::AesV2,
            EncryptionAlgorithm::Aes256 => CryptMethod::AesV3,
        }
    }
}

/// Whether bytes belong to a string or to stream data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    String,
    Stream,
}

/// Parsed `/Encrypt` dictionary of the standard handler
#[derive(Debug, Clone)]
pub struct StandardSecurityHandler {
    version: i64,
    revision: i64,
    /// File key length in bytes
    key_length: usize,
    owner_hash: Vec<u8>,
    user_hash: Vec<u8>,
    owner_key: Vec<u8>,
    user_key: Vec<u8>,
    perms: Vec<u8>,
    p: i32,
    encrypt_metadata: bool,
    string_method: CryptMethod,
    stream_method: CryptMethod,
    file_id: Vec<u8>,
}

impl StandardSecurityHandler {
    /// Read an encryption dictionary. `file_id` is the first element of the trailer `ID`.
    pub fn from_dict(dict: &Dictionary, file_id: &[u8]) -> Result<Self, SecurityError> {
        let invalid = |message: &str| SecurityError::InvalidEncryptDictionary(message.to_string());

        match dict.get_name("Filter") {
            Some("Standard") => {}
            Some(other) => return Err(SecurityError::UnsupportedHandler(other.to_string())),
            None => return Err(invalid("missing /Filter")),
        }

        let version = dict.get_integer("V").unwrap_or(0);
        let revision = dict.get_integer("R").ok_or_else(|| invalid("missing /R"))?;
        if !matches!(revision, 2..=6) {
            return Err(SecurityError::UnsupportedRevision(revision));
        }

        let string_bytes = |key: &str| -> Option<Vec<u8>> {
            dict.get(key)
                .and_then(Object::as_string)
                .map(|s| s.as_bytes().to_vec())
        };
        let owner_hash = string_bytes("O").ok_or_else(|| invalid("missing /O"))?;
        let user_hash = string_bytes("U").ok_or_else(|| invalid("missing /U"))?;
        let p = dict.get_integer("P").ok_or_else(|| invalid("missing /P"))? as u32 as i32;
        let encrypt_metadata = dict
            .get("EncryptMetadata")
            .and_then(Object::as_bool)
            .unwrap_or(true);

        let (string_method, stream_method, cf_length) = if version >= 4 {
            let filters = dict.get_dict("CF");
            let lookup = |entry: &str| -> Result<(CryptMethod, Option<i64>), SecurityError> {
                match dict.get_name(entry).unwrap_or("Identity") {
                    "Identity" => Ok((CryptMethod::Identity, None)),
                    name => {
                        let filter = filters
                            .and_then(|cf| cf.get_dict(name))
                            .ok_or_else(|| invalid("crypt filter not found in /CF"))?;
                        Ok((
                            CryptMethod::from_cfm(filter.get_name("CFM"))?,
                            filter.get_integer("Length"),
                        ))
                    }
                }
            };
            let (strings, string_length) = lookup("StrF")?;
            let (streams, stream_length) = lookup("StmF")?;
            (strings, streams, string_length.or(stream_length))
        } else {
            (CryptMethod::Rc4, CryptMethod::Rc4, None)
        };

        let key_length = match (version, revision) {
            (_, 5) | (_, 6) | (5, _) => 32,
            (1, _) | (0, _) => 5,
            (4, _) => match cf_length {
                // /Length in crypt filters is in bytes, though some writers use bits
                Some(n) if n > 32 => (n / 8) as usize,
                Some(n) if n >= 5 => n as usize,
                _ => 16,
            },
            _ => {
                let bits = dict.get_integer("Length").unwrap_or(40);
                if bits % 8 != 0 || !(40..=128).contains(&bits) {
                    return Err(invalid("/Length must be a multiple of 8 between 40 and 128"));
                }
                (bits / 8) as usize
            }
        };

        let (owner_key, user_key, perms) = if revision >= 5 {
            let owner_key = string_bytes("OE").ok_or_else(|| invalid("missing /OE"))?;
            let user_key = string_bytes("UE").ok_or_else(|| invalid("missing /UE"))?;
            if owner_hash.len() < 48 || user_hash.len() < 48 || owner_key.len() < 32 || user_key.len() < 32 {
                return Err(invalid("/O, /U, /OE or /UE too short"));
            }
            (owner_key, user_key, string_bytes("Perms").unwrap_or_default())
        } else {
            if owner_hash.len() < 32 || user_hash.len() < 32 {
                return Err(invalid("/O and /U must be 32 bytes"));
            }
            (Vec::new(), Vec::new(), Vec::new())
        };

        Ok(Self {
            version,
            revision,
            key_length,
            owner_hash,
            user_hash,
            owner_key,
            user_key,
            perms,
            p,
            encrypt_metadata,
            string_method,
            stream_method,
            file_id: file_id.to_vec(),
        })
    }

    /// Set up a new handler; returns it with the file key.
    pub fn create(
        options: &EncryptionOptions,
        user_password: &str,
        owner_password: &str,
        permissions: &Permissions,
        file_id: &[u8],
    ) -> Result<(Self, Vec<u8>), SecurityError> {
        let algorithm = options.algorithm;
        let revision = algorithm.revision();
        let p = permissions.to_p_value(revision)?;
        let owner_password = if owner_password.is_empty() {
            user_password
        } else {
            owner_password
        };

        let mut handler = Self {
            version: algorithm.version(),
            revision,
            key_length: algorithm.key_length(),
            owner_hash: Vec::new(),
            user_hash: Vec::new(),
            owner_key: Vec::new(),
            user_key: Vec::new(),
            perms: Vec::new(),
            p,
            // Revisions 2 and 3 have no way to leave metadata in clear
            encrypt_metadata: options.encrypt_metadata || revision < 4,
            string_method: algorithm.method(),
            stream_method: algorithm.method(),
            file_id: file_id.to_vec(),
        };

        if revision >= 5 {
            let key = handler.init_aes256(user_password, owner_password)?;
            return Ok((handler, key));
        }

        let user = legacy_password_bytes(user_password);
        let owner = legacy_password_bytes(owner_password);
        handler.owner_hash = handler.compute_owner_hash(&owner, &user);
        let key = handler.compute_file_key(&user);
        handler.user_hash = handler.compute_user_hash(&key);
        Ok((handler, key))
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// File key length in bits
    pub fn key_bits(&self) -> usize {
        self.key_length * 8
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::from_p_value(self.p, self.revision)
    }

    pub fn encrypts_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    pub fn stream_method(&self) -> CryptMethod {
        self.stream_method
    }

    pub fn string_method(&self) -> CryptMethod {
        self.string_method
    }

    /// Try the password as user password, then as owner password.
    pub fn authenticate(&self, password: &str) -> Option<Vec<u8>> {
        self.authenticate_user(password)
            .or_else(|| self.authenticate_owner(password))
    }

    pub fn authenticate_user(&self, password: &str) -> Option<Vec<u8>> {
        if self.revision >= 5 {
            let password = sasl_prep(password);
            let validation_salt = &self.user_hash[32..40];
            let key_salt = &self.user_hash[40..48];
            if self.hash(&password, validation_salt, &[]) != self.user_hash[..32] {
                return None;
            }
            let intermediate = self.hash(&password, key_salt, &[]);
            return self.unwrap_file_key(&intermediate, &self.user_key);
        }
        self.authenticate_user_legacy(&legacy_password_bytes(password))
    }

    pub fn authenticate_owner(&self, password: &str) -> Option<Vec<u8>> {
        if self.revision >= 5 {
            let password = sasl_prep(password);
            let user_data = &self.user_hash[..48];
            let validation_salt = &self.owner_hash[32..40];
            let key_salt = &self.owner_hash[40..48];
            if self.hash(&password, validation_salt, user_data) != self.owner_hash[..32] {
                return None;
            }
            let intermediate = self.hash(&password, key_salt, user_data);
            return self.unwrap_file_key(&intermediate, &self.owner_key);
        }

        // Algorithm 7: recover the padded user password from /O
        let rc4_key = self.owner_rc4_key(&legacy_password_bytes(password));
        let mut user = self.owner_hash[..32].to_vec();
        if self.revision == 2 {
            user = rc4(&rc4_key, &user);
        } else {
            for i in (0..=19u8).rev() {
                let step_key: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
                user = rc4(&step_key, &user);
            }
        }
        self.authenticate_user_legacy(&user)
    }

    fn authenticate_user_legacy(&self, password: &[u8]) -> Option<Vec<u8>> {
        let key = self.compute_file_key(password);
        let expected = self.compute_user_hash(&key);
        let compared = if self.revision == 2 { 32 } else { 16 };
        (expected[..compared] == self.user_hash[..compared]).then_some(key)
    }

    /// Algorithm 2
    fn compute_file_key(&self, password: &[u8]) -> Vec<u8> {
        let mut input = Vec::with_capacity(32 + 32 + 4 + self.file_id.len() + 4);
        input.extend_from_slice(&pad_password(password));
        input.extend_from_slice(&self.owner_hash[..32]);
        input.extend_from_slice(&(self.p as u32).to_le_bytes());
        input.extend_from_slice(&self.file_id);
        if self.revision >= 4 && !self.encrypt_metadata {
            input.extend_from_slice(&[0xFF; 4]);
        }

        let mut hash = md5::compute(&input).0;
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = md5::compute(&hash[..self.key_length]).0;
            }
        }
        hash[..self.key_length].to_vec()
    }

    /// Algorithms 4 and 5
    fn compute_user_hash(&self, key: &[u8]) -> Vec<u8> {
        if self.revision == 2 {
            return rc4(key, &PADDING);
        }

        let mut input = PADDING.to_vec();
        input.extend_from_slice(&self.file_id);
        let mut result = rc4(key, &md5::compute(&input).0);
        for i in 1..=19u8 {
            let step_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            result = rc4(&step_key, &result);
        }
        result.resize(32, 0);
        result
    }

    fn owner_rc4_key(&self, owner_password: &[u8]) -> Vec<u8> {
        let mut hash = md5::compute(pad_password(owner_password)).0;
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = md5::compute(hash).0;
            }
        }
        hash[..self.key_length].to_vec()
    }

    /// Algorithm 3
    fn compute_owner_hash(&self, owner_password: &[u8], user_password: &[u8]) -> Vec<u8> {
        let rc4_key = self.owner_rc4_key(owner_password);
        let mut result = rc4(&rc4_key, &pad_password(user_password));
        if self.revision >= 3 {
            for i in 1..=19u8 {
                let step_key: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
                result = rc4(&step_key, &result);
            }
        }
        result
    }

    /// Revision 5 hash (plain SHA-256) or the revision 6 hardened hash (Algorithm 2.B)
    fn hash(&self, password: &[u8], salt: &[u8], user_data: &[u8]) -> Vec<u8> {
        let mut k: Vec<u8> = Sha256::new()
            .chain_update(password)
            .chain_update(salt)
            .chain_update(user_data)
            .finalize()
            .to_vec();
        if self.revision == 5 {
            return k;
        }

        let mut round = 0u32;
        loop {
            let mut k1 = Vec::with_capacity(64 * (password.len() + k.len() + user_data.len()));
            for _ in 0..64 {
                k1.extend_from_slice(password);
                k1.extend_from_slice(&k);
                k1.extend_from_slice(user_data);
            }

            // k1 is 64 repetitions, so always a whole number of blocks
            if aes::cbc_encrypt_no_padding(&k[..16], &k[16..32], &mut k1).is_err() {
                return k[..32].to_vec();
            }
            let e = k1;

            // The first 16 bytes as a big-endian number mod 3; 256 = 1 (mod 3)
            let selector: u32 = e[..16].iter().map(|&b| u32::from(b)).sum::<u32>() % 3;
            k = match selector {
                0 => Sha256::digest(&e).to_vec(),
                1 => Sha384::digest(&e).to_vec(),
                _ => Sha512::digest(&e).to_vec(),
            };

            round += 1;
            let last = u32::from(e.last().copied().unwrap_or(0));
            if round >= 64 && last <= round - 32 {
                break;
            }
        }
        k.truncate(32);
        k
    }

    fn unwrap_file_key(&self, intermediate: &[u8], wrapped: &[u8]) -> Option<Vec<u8>> {
        let mut key = wrapped[..32].to_vec();
        aes::cbc_decrypt_no_padding(&intermediate[..32], &[0u8; 16], &mut key).ok()?;
        if self.revision == 6 && !self.perms_match(&key) {
            tracing::warn!("/Perms does not match /P; using /P");
        }
        Some(key)
    }

    fn perms_match(&self, key: &[u8]) -> bool {
        if self.perms.len() < 16 {
            return false;
        }
        let mut block = self.perms[..16].to_vec();
        if aes::cbc_decrypt_no_padding(key, &[0u8; 16], &mut block).is_err() {
            return false;
        }
        &block[9..12] == b"adb" && block[..4] == (self.p as u32).to_le_bytes()
    }

    /// Algorithms 8, 9 and 10
    fn init_aes256(&mut self, user_password: &str, owner_password: &str) -> Result<Vec<u8>, SecurityError> {
        let mut rng = rand::thread_rng();
        let mut key = vec![0u8; 32];
        rng.fill(&mut key[..]);

        let user = sasl_prep(user_password);
        let mut salts = [0u8; 16];
        rng.fill(&mut salts);
        let mut user_hash = self.hash(&user, &salts[..8], &[]);
        user_hash.extend_from_slice(&salts);
        let mut user_key = key.clone();
        aes::cbc_encrypt_no_padding(&self.hash(&user, &salts[8..], &[]), &[0u8; 16], &mut user_key)?;

        let owner = sasl_prep(owner_password);
        let mut salts = [0u8; 16];
        rng.fill(&mut salts);
        let mut owner_hash = self.hash(&owner, &salts[..8], &user_hash);
        owner_hash.extend_from_slice(&salts);
        let mut owner_key = key.clone();
        aes::cbc_encrypt_no_padding(
            &self.hash(&owner, &salts[8..], &user_hash),
            &[0u8; 16],
            &mut owner_key,
        )?;

        let mut perms = [0u8; 16];
        perms[..4].copy_from_slice(&(self.p as u32).to_le_bytes());
        perms[4..8].copy_from_slice(&[0xFF; 4]);
        perms[8] = if self.encrypt_metadata { b'T' } else { b'F' };
        perms[9..12].copy_from_slice(b"adb");
        rng.fill(&mut perms[12..]);
        aes::cbc_encrypt_no_padding(&key, &[0u8; 16], &mut perms)?;

        self.user_hash = user_hash;
        self.user_key = user_key;
        self.owner_hash = owner_hash;
        self.owner_key = owner_key;
        self.perms = perms.to_vec();
        Ok(key)
    }

    /// Algorithm 1: per-object key for RC4 and AESV2
    fn object_key(&self, key: &[u8], id: ObjectId, method: CryptMethod) -> Vec<u8> {
        if method == CryptMethod::AesV3 {
            return key.to_vec();
        }
        let mut input = Vec::with_capacity(key.len() + 9);
        input.extend_from_slice(key);
        input.extend_from_slice(&id.number().to_le_bytes()[..3]);
        input.extend_from_slice(&id.generation().to_le_bytes());
        if method == CryptMethod::AesV2 {
            input.extend_from_slice(b"sAlT");
        }
        let hash = md5::compute(&input).0;
        hash[..(key.len() + 5).min(16)].to_vec()
    }

    fn method_for(&self, kind: DataKind) -> CryptMethod {
        match kind {
            DataKind::String => self.string_method,
            DataKind::Stream => self.stream_method,
        }
    }

    pub fn encrypt_bytes(
        &self,
        key: &[u8],
        id: ObjectId,
        data: &[u8],
        kind: DataKind,
    ) -> Result<Vec<u8>, SecurityError> {
        let method = self.method_for(kind);
        let object_key = self.object_key(key, id, method);
        match method {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => Ok(rc4(&object_key, data)),
            CryptMethod::AesV2 | CryptMethod::AesV3 => aes::encrypt_with_iv(&object_key, data),
        }
    }

    pub fn decrypt_bytes(
        &self,
        key: &[u8],
        id: ObjectId,
        data: &[u8],
        kind: DataKind,
    ) -> Result<Vec<u8>, SecurityError> {
        let method = self.method_for(kind);
        let object_key = self.object_key(key, id, method);
        match method {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => Ok(rc4(&object_key, data)),
            CryptMethod::AesV2 | CryptMethod::AesV3 => aes::decrypt_with_iv(&object_key, data),
        }
    }

    /// The `/Encrypt` dictionary describing this handler
    pub fn to_dict(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("Standard"));
        dict.set("V", self.version);
        dict.set("R", self.revision);
        dict.set("Length", (self.key_length * 8) as i64);
        dict.set("O", PdfString::hex(self.owner_hash.clone()));
        dict.set("U", PdfString::hex(self.user_hash.clone()));
        dict.set("P", i64::from(self.p));

        if self.version >= 4 {
            let mut filter = Dictionary::new();
            filter.set("Type", Object::name("CryptFilter"));
            filter.set("CFM", Object::name(self.stream_method.cfm_name()));
            filter.set("Length", self.key_length);
            filter.set("AuthEvent", Object::name("DocOpen"));
            let mut filters = Dictionary::new();
            filters.set("StdCF", filter);
            dict.set("CF", filters);
            dict.set("StmF", Object::name("StdCF"));
            dict.set("StrF", Object::name("StdCF"));
        }
        if self.revision >= 4 && !self.encrypt_metadata {
            dict.set("EncryptMetadata", false);
        }
        if self.revision >= 5 {
            dict.set("OE", PdfString::hex(self.owner_key.clone()));
            dict.set("UE", PdfString::hex(self.user_key.clone()));
            dict.set("Perms", PdfString::hex(self.perms.clone()));
        }
        dict
    }
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

/// PDFDocEncoding approximation: Latin-1 characters map to single bytes.
fn legacy_password_bytes(password: &str) -> Vec<u8> {
    password
        .chars()
        .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
        .collect()
}

/// SASLprep (approximated by NFKC) and truncation to 127 bytes
fn sasl_prep(password: &str) -> Vec<u8> {
    let normalized: String = password.nfkc().collect();
    let mut bytes = normalized.into_bytes();
    bytes.truncate(127);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE_ID: &[u8] = b"0123456789abcdef";

    fn reparse(handler: &StandardSecurityHandler) -> StandardSecurityHandler {
        StandardSecurityHandler::from_dict(&handler.to_dict(), FILE_ID).unwrap()
    }

    #[test]
    fn test_user_and_owner_authentication_all_algorithms() {
        for algorithm in [
            EncryptionAlgorithm::Rc4_40,
            EncryptionAlgorithm::Rc4_128,
            EncryptionAlgorithm::Aes128,
            EncryptionAlgorithm::Aes256,
        ] {
            let permissions = if algorithm == EncryptionAlgorithm::Rc4_40 {
                Permissions::none()
            } else {
                Permissions::all()
            };
            let (handler, key) =
                StandardSecurityHandler::create(
                    &EncryptionOptions::new(algorithm),
                    "user",
                    "owner",
                    &permissions,
                    FILE_ID,
                )
                    .unwrap();
            let handler = reparse(&handler);

            assert_eq!(handler.authenticate_user("user"), Some(key.clone()), "{algorithm:?}");
            assert_eq!(handler.authenticate_owner("owner"), Some(key.clone()), "{algorithm:?}");
            assert_eq!(handler.authenticate("owner"), Some(key.clone()));
            assert_eq!(handler.authenticate_user("wrong"), None);
            assert_eq!(handler.authenticate("wrong"), None);
            assert_eq!(handler.permissions(), permissions);
        }
    }

    #[test]
    fn test_empty_user_password_opens() {
        let (handler, key) = StandardSecurityHandler::create(
            &EncryptionOptions::new(EncryptionAlgorithm::Rc4_128),
            "",
            "owner",
            &Permissions::all(),
            FILE_ID,
        )
        .unwrap();
        assert_eq!(reparse(&handler).authenticate(""), Some(key));
    }

    #[test]
    fn test_string_round_trip_per_method() {
        for algorithm in [EncryptionAlgorithm::Rc4_128, EncryptionAlgorithm::Aes128, EncryptionAlgorithm::Aes256] {
            let (handler, key) =
                StandardSecurityHandler::create(
                &EncryptionOptions::new(algorithm),
                "u",
                "o",
                &Permissions::all(),
                FILE_ID,
            )
            .unwrap();
            let id = ObjectId::new(12, 0);
            let encrypted = handler.encrypt_bytes(&key, id, b"Hello", DataKind::String).unwrap();
            assert_ne!(encrypted, b"Hello");
            assert_eq!(
                handler.decrypt_bytes(&key, id, &encrypted, DataKind::String).unwrap(),
                b"Hello"
            );
        }
    }

    #[test]
    fn test_object_keys_differ_per_object() {
        let (handler, key) = StandardSecurityHandler::create(
            &EncryptionOptions::new(EncryptionAlgorithm::Rc4_128),
            "u",
            "o",
            &Permissions::all(),
            FILE_ID,
        )
        .unwrap();
        let a = handler.encrypt_bytes(&key, ObjectId::new(1, 0), b"same", DataKind::String).unwrap();
        let b = handler.encrypt_bytes(&key, ObjectId::new(2, 0), b"same", DataKind::String).unwrap();
        assert_ne!(a, b);
        assert_eq!(handler.object_key(&key, ObjectId::new(1, 0), CryptMethod::Rc4).len(), 16);
    }

    #[test]
    fn test_crypt_filter_dictionary_shape() {
        let (handler, _) = StandardSecurityHandler::create(
            &EncryptionOptions::new(EncryptionAlgorithm::Aes128),
            "u",
            "",
            &Permissions::all(),
            FILE_ID,
        )
        .unwrap();
        let dict = handler.to_dict();
        assert_eq!(dict.get_integer("V"), Some(4));
        assert_eq!(dict.get_integer("R"), Some(4));
        assert_eq!(dict.get_name("StmF"), Some("StdCF"));
        let std_cf = dict.get_dict("CF").unwrap().get_dict("StdCF").unwrap();
        assert_eq!(std_cf.get_name("CFM"), Some("AESV2"));
        assert_eq!(std_cf.get_integer("Length"), Some(16));
        // Empty owner password falls back to the user password
        assert!(reparse(&handler).authenticate_owner("u").is_some());
    }

    #[test]
    fn test_rejects_foreign_handlers_and_revisions() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("Adobe.PubSec"));
        assert!(matches!(
            StandardSecurityHandler::from_dict(&dict, FILE_ID),
            Err(SecurityError::UnsupportedHandler(_))
        ));

        dict.set("Filter", Object::name("Standard"));
        dict.set("R", 7);
        assert!(matches!(
            StandardSecurityHandler::from_dict(&dict, FILE_ID),
            Err(SecurityError::UnsupportedRevision(7))
        ));
    }

    #[test]
    fn test_high_res_printing_rejected_for_revision_2() {
        let err = StandardSecurityHandler::create(
            &EncryptionOptions::new(EncryptionAlgorithm::Rc4_40),
            "u",
            "o",
            &Permissions::all(),
            FILE_ID,
        )
        .unwrap_err();
        assert!(matches!(err, SecurityError::InvalidPermissionSet(_)));
    }
}
