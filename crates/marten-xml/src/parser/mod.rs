//! The XML 1.0 parser.
//!
//! [§ 2 Documents](https://www.w3.org/TR/xml/#sec-documents)
//!
//! [`XmlParser`] is split by grammar area: `prolog` for the document,
//! declaration and misc productions, `declarations` for the DTD subsets,
//! `content` for elements and tag omission, `reference` for character and
//! entity references and `validity` for constraints that look at the whole
//! DTD or document.

mod content;
mod core;
mod declarations;
mod prolog;
mod reference;
mod validity;

pub use self::core::{ParseReport, ReferenceMode, XmlParser};
