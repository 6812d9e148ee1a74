use crate::objects::ObjectId;
use crate::parser::ParseError;
use thiserror::Error;

/// Top-level error for every document operation.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Structural(#[from] StructuralError),

    #[error("Image codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    OperationCancelled,
}

pub type Result<T> = std::result::Result<T, PdfError>;

/// Violations of document invariants detected before any mutation happens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("Page tree is deeper than {limit} levels")]
    TreeTooDeep { limit: usize },

    #[error("Page index {index} out of range (document has {count} pages)")]
    PageIndexOutOfRange { index: usize, count: usize },

    #[error("Operation would remove every page of the document")]
    WouldRemoveAllPages,

    #[error("No pages selected")]
    EmptySelection,

    #[error("Document has no page tree")]
    MissingPageTree,

    #[error("Object {0} is not a page tree node")]
    InvalidPageNode(ObjectId),

    #[error("Invalid object {id}: {reason}")]
    InvalidObject { id: ObjectId, reason: String },

    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    #[error("Invalid rotation angle: {0} (must be a multiple of 90)")]
    InvalidRotation(i32),
}

/// Failure of a single image decode/encode.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("unsupported image: {0}")]
    Unsupported(String),
}

/// Standard security handler errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SecurityError {
    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Unsupported security handler revision {0}")]
    UnsupportedRevision(i64),

    #[error("Unsupported security handler: {0}")]
    UnsupportedHandler(String),

    #[error("Invalid permission set: {0}")]
    InvalidPermissionSet(String),

    #[error("Document is encrypted and has not been unlocked")]
    DocumentLocked,

    #[error("Document is already encrypted")]
    AlreadyEncrypted,

    #[error("Document is not encrypted")]
    NotEncrypted,

    #[error("Invalid encryption dictionary: {0}")]
    InvalidEncryptDictionary(String),

    #[error("Cipher failure: {0}")]
    Cipher(String),
}

/// Flat classification of [`PdfError`] for callers that only need the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    MalformedTrailer,
    UnresolvableRoot,
    CorruptObjectStream,
    TreeTooDeep,
    PageIndexOutOfRange,
    WouldRemoveAllPages,
    Structural,
    Codec,
    InvalidPermissionSet,
    IncorrectPassword,
    UnsupportedEncryption,
    DocumentLocked,
    Security,
    Serialization,
    Io,
    Cancelled,
}

impl PdfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PdfError::Parse(err) => match err {
                ParseError::MalformedTrailer(_) => ErrorKind::MalformedTrailer,
                ParseError::UnresolvableRoot => ErrorKind::UnresolvableRoot,
                ParseError::CorruptObjectStream { .. } => ErrorKind::CorruptObjectStream,
                _ => ErrorKind::Parse,
            },
            PdfError::Structural(err) => match err {
                StructuralError::TreeTooDeep { .. } => ErrorKind::TreeTooDeep,
                StructuralError::PageIndexOutOfRange { .. } => ErrorKind::PageIndexOutOfRange,
                StructuralError::WouldRemoveAllPages => ErrorKind::WouldRemoveAllPages,
                _ => ErrorKind::Structural,
            },
            PdfError::Codec(_) => ErrorKind::Codec,
            PdfError::Security(err) => match err {
                SecurityError::IncorrectPassword => ErrorKind::IncorrectPassword,
                SecurityError::InvalidPermissionSet(_) => ErrorKind::InvalidPermissionSet,
                SecurityError::UnsupportedRevision(_) | SecurityError::UnsupportedHandler(_) => {
                    ErrorKind::UnsupportedEncryption
                }
                SecurityError::DocumentLocked => ErrorKind::DocumentLocked,
                _ => ErrorKind::Security,
            },
            PdfError::Serialization(_) => ErrorKind::Serialization,
            PdfError::Io(_) => ErrorKind::Io,
            PdfError::OperationCancelled => ErrorKind::Cancelled,
        }
    }
}
