//! Common utilities for the Marten parser.
//!
//! This crate provides the collaborators the parsing engine consumes but
//! does not own:
//! - **URI resolution** - absolute/relative reference resolution, canonical
//!   roots and local file path mapping
//! - **Network** - blocking HTTP GET and `data:` URL decoding
//! - **Warning System** - colored, deduplicated terminal output for
//!   recoverable deviations

pub mod net;
pub mod url;
pub mod warning;
