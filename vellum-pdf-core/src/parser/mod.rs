//! PDF Parser Module
//!
//! Reads PDF files into a [`Document`](crate::Document) according to ISO 32000-1
//! (PDF 1.7) and ISO 32000-2 (PDF 2.0). Classic xref tables, cross-reference
//! streams, hybrid files and incremental updates are supported; damaged files
//! are recovered by scanning for object headers when the xref data is unusable.

pub mod filters;
pub mod header;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod reader;
pub mod xref;

pub use self::header::PdfVersion;
pub use self::lexer::{Lexer, Token};
pub use self::objects::ObjectParser;
pub use self::reader::read_document;

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF Parser errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty file")]
    EmptyFile,

    #[error("Invalid PDF header")]
    InvalidHeader,

    #[error("Syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Invalid xref table: {0}")]
    InvalidXRef(String),

    #[error("Malformed trailer: {0}")]
    MalformedTrailer(String),

    #[error("Document catalog (Root) cannot be resolved")]
    UnresolvableRoot,

    #[error("Corrupt object stream {number}: {reason}")]
    CorruptObjectStream { number: u32, reason: String },

    #[error("Stream decode error: {0}")]
    StreamDecodeError(String),

    #[error("Nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}

/// Options for parsing PDF files with different levels of strictness
///
/// ```
/// use vellum_pdf::parser::ParseOptions;
///
/// let strict = ParseOptions::strict();
/// assert!(strict.strict && !strict.recover_xref);
///
/// let lenient = ParseOptions::default();
/// assert!(lenient.recover_xref);
/// ```
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Fail on malformed objects instead of replacing them with null
    pub strict: bool,
    /// Rebuild the xref table by scanning the file when it is damaged
    pub recover_xref: bool,
    /// Upper bound on `/Prev` sections followed
    pub max_xref_sections: usize,
    /// Maximum nesting of arrays and dictionaries
    pub max_nesting: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParseOptions {
    /// Create strict parsing options
    pub fn strict() -> Self {
        Self {
            strict: true,
            recover_xref: false,
            max_xref_sections: 256,
            max_nesting: 256,
        }
    }

    /// Create lenient parsing options for damaged real-world files
    pub fn lenient() -> Self {
        Self {
            strict: false,
            recover_xref: true,
            max_xref_sections: 1024,
            max_nesting: 256,
        }
    }
}
