//! Error types for the parsing engine.
//!
//! [§ 1.2 Terminology](https://www.w3.org/TR/xml/#dt-error)
//!
//! "fatal error: An error which a conforming XML processor MUST detect and
//! report to the application. After encountering a fatal error, the
//! processor MAY continue processing the data to search for further errors
//! and MAY report such errors to the application."
//!
//! Well-formedness violations abort the parse. Validity violations are
//! collected as [`Diagnostic`]s unless the caller asks for them to be raised.

use std::fmt;

use strum_macros::Display;
use thiserror::Error;

use crate::encoding::Encoding;

/// Where in the entity stack an error was detected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    /// Name of the entity being read, `None` for the document entity.
    pub entity: Option<String>,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column of the current character.
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity {
            Some(entity) => write!(f, "{entity} line {}.{}", self.line, self.column),
            None => write!(f, "line {}.{}", self.line, self.column),
        }
    }
}

/// Anything that stops a parse.
#[derive(Debug, Error)]
pub enum XmlError {
    /// A violation of a well-formedness constraint or of the grammar.
    #[error("well-formedness error at {position}: {message}")]
    WellFormed {
        /// Where the violation was detected.
        position: Position,
        /// Description, usually prefixed with the production number.
        message: String,
    },

    /// A reference that is recognized but not allowed in the current
    /// reference mode, e.g. a character reference directly in the DTD.
    #[error("forbidden reference at {position}: {reference}")]
    ForbiddenReference {
        /// Where the reference ended.
        position: Position,
        /// The reference as written, e.g. `&amp;` or `%pe;`.
        reference: String,
    },

    /// A validity violation, only raised when the caller asked for it.
    #[error("validity error at {position}: {message}")]
    Validity {
        /// Where the violation was detected.
        position: Position,
        /// Description naming the validity constraint.
        message: String,
    },

    /// A parser guard tripped: zero-progress tag omission or the nesting
    /// depth bound.
    #[error("fatal error at {position}: {message}")]
    Fatal {
        /// Where the guard tripped.
        position: Position,
        /// Description of the guard.
        message: String,
    },

    /// An external entity could not be opened.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Input bytes could not be decoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl XmlError {
    /// True for [`XmlError::WellFormed`].
    #[must_use]
    pub const fn is_well_formedness(&self) -> bool {
        matches!(self, Self::WellFormed { .. })
    }

    /// The position of the error, if it carries one.
    #[must_use]
    pub const fn position(&self) -> Option<&Position> {
        match self {
            Self::WellFormed { position, .. }
            | Self::ForbiddenReference { position, .. }
            | Self::Validity { position, .. }
            | Self::Fatal { position, .. } => Some(position),
            Self::Resource(_) | Self::Encoding(_) => None,
        }
    }
}

/// Failure to open an external entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The location uses a scheme the resolver cannot open.
    #[error("unsupported scheme '{scheme}' in {location}")]
    UnsupportedScheme {
        /// The offending scheme.
        scheme: String,
        /// The full location.
        location: String,
    },
    /// The resource does not exist (HTTP 404 or missing file).
    #[error("resource not found: {0}")]
    Missing(String),
    /// An HTTP response other than success or 404.
    #[error("unexpected HTTP status {status} for {location}")]
    UnexpectedStatus {
        /// The status code received.
        status: u16,
        /// The requested location.
        location: String,
    },
    /// The transport failed before a response arrived.
    #[error("transport error for {location}: {message}")]
    Transport {
        /// The requested location.
        location: String,
        /// Transport error description.
        message: String,
    },
    /// Reading a local file failed.
    #[error("cannot read {location}: {message}")]
    Io {
        /// The file location.
        location: String,
        /// I/O error description.
        message: String,
    },
    /// A `data:` URL could not be decoded.
    #[error("invalid data URL {location}: {message}")]
    DataUrl {
        /// The data URL, possibly truncated.
        location: String,
        /// Decoder error description.
        message: String,
    },
    /// An external identifier could not be turned into a location.
    #[error("cannot locate external entity: {0}")]
    Unresolvable(String),
}

/// Failure to decode the bytes of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The encoding name is not one this engine can decode.
    #[error("unsupported encoding '{0}'")]
    Unsupported(String),
    /// The bytes are not valid in the encoding.
    #[error("invalid {encoding} data at byte offset {offset}")]
    Malformed {
        /// The encoding in use.
        encoding: Encoding,
        /// Byte offset of the undecodable sequence.
        offset: usize,
    },
    /// The encoding was already committed with `keep_encoding`.
    #[error("cannot change encoding to '{requested}' after committing to {current}")]
    Committed {
        /// The encoding in use.
        current: Encoding,
        /// The encoding that was declared too late.
        requested: String,
    },
}

/// Classes of non-fatal errors collected during a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DiagnosticKind {
    /// [§ 1.2](https://www.w3.org/TR/xml/#dt-valid) a validity constraint.
    Validity,
    /// [§ 1.2](https://www.w3.org/TR/xml/#dt-compat) "for compatibility"
    /// constraints, e.g. deterministic content models.
    Compatibility,
    /// Processing errors a conforming processor may report, e.g. a missing
    /// encoding declaration.
    Processing,
}

/// One recorded non-fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// What kind of constraint was violated.
    pub kind: DiagnosticKind,
    /// Where it was detected.
    pub position: Position,
    /// Description naming the constraint.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error at {}: {}", self.kind, self.position, self.message)
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, XmlError>;
