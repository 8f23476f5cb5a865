//! XML 1.0 parsing engine for Marten, with SGML-style compatibility modes.
//!
//! # Scope
//!
//! This crate implements:
//! - **Character sources** ([§ 4.3.3](https://www.w3.org/TR/xml/#charencoding))
//!   - Encoding detection, one mid-stream switch per entity, end-of-line
//!     normalization and line tracking
//! - **Entities** ([§ 4](https://www.w3.org/TR/xml/#sec-physical-struct))
//!   - The entity stack, per-branch recursion guard and external entity
//!     resolution through a pluggable [`EntityResolver`]
//! - **Grammar** ([§ 2](https://www.w3.org/TR/xml/#sec-documents))
//!   - Recursive-descent productions for the document, prolog, DTD and
//!     content, driven by the current [`ReferenceMode`]
//! - **Validity** ([§ 3](https://www.w3.org/TR/xml/#sec-logical-struct))
//!   - Content models compiled to automata, attribute defaults and
//!     normalization, IDs, notations and standalone checks
//! - **Tag omission**
//!   - Missing start and end tags inferred by negotiating with the
//!     [`ElementBuilder`], guarded against zero-progress loops
//!
//! # Not Yet Implemented
//!
//! - Namespaces
//! - XML 1.1 character classes and line ends
//! - SGML features beyond OMITTAG, SHORTTAG and declared content

/// The contract between the parser and the tree it builds.
pub mod builder;
/// Character classes from the XML 1.0 productions.
pub mod chars;
/// Declarations collected from the document type declaration.
pub mod dtd;
/// Character encodings and byte decoding.
pub mod encoding;
/// Entities and the entity stack.
pub mod entity;
/// Error types.
pub mod error;
/// Content particles and content model automata.
pub mod model;
/// Per-parse configuration.
pub mod options;
/// The recursive-descent parser.
pub mod parser;
/// External entity resolution.
pub mod resolver;
/// Typed attribute tables for application object models.
pub mod schema;
/// Decoding character sources.
pub mod source;
/// [`ElementBuilder`] for the generic DOM tree.
pub mod tree;

pub use builder::{AttributeValueError, ChildClass, ContentKind, DataOutcome, ElementBuilder};
pub use dtd::{Declaration, Dtd, ExternalId};
pub use encoding::Encoding;
pub use error::{
    Diagnostic, DiagnosticKind, EncodingError, Position, ResourceError, Result, XmlError,
};
pub use options::ParserOptions;
pub use parser::{ParseReport, ReferenceMode, XmlParser};
pub use resolver::{DefaultResolver, EntityResolver, Resource};

use marten_dom::DomTree;

/// Parse already decoded `text` into `builder`.
///
/// # Errors
///
/// Returns the first error that stops the parse, see
/// [`XmlParser::parse_document`].
pub fn parse_str<B: ElementBuilder>(
    text: &str,
    builder: &mut B,
    options: ParserOptions,
) -> Result<ParseReport> {
    XmlParser::from_text(text, builder)
        .with_options(options)
        .parse_document()
}

/// Parse raw octets into `builder`, detecting the encoding.
///
/// # Errors
///
/// Returns [`XmlError::Encoding`] if the bytes cannot be decoded, or the
/// first error that stops the parse.
pub fn parse_bytes<B: ElementBuilder>(
    bytes: Vec<u8>,
    builder: &mut B,
    options: ParserOptions,
) -> Result<ParseReport> {
    XmlParser::from_bytes(bytes, None, builder)?
        .with_options(options)
        .parse_document()
}

/// Parse `text` into a new [`DomTree`].
///
/// # Errors
///
/// Returns the first error that stops the parse.
pub fn parse_tree(text: &str, options: ParserOptions) -> Result<(DomTree, ParseReport)> {
    let mut tree = DomTree::new();
    let report = parse_str(text, &mut tree, options)?;
    Ok((tree, report))
}
