//! Parser state, construction, error reporting and the scanning helpers
//! shared by every production.

use std::collections::{BTreeSet, HashSet};

use marten_common::url::Url;
use strum_macros::Display;

use crate::builder::ElementBuilder;
use crate::chars::{is_name_char, is_name_start_char, is_s};
use crate::dtd::{ContentCategory, Declaration, Dtd};
use crate::encoding::Encoding;
use crate::entity::{Entity, EntityId, EntityKind, EntityStack};
use crate::error::{Diagnostic, DiagnosticKind, Position, Result, XmlError};
use crate::model::ModelCursor;
use crate::options::ParserOptions;
use crate::resolver::{DefaultResolver, EntityResolver};
use crate::source::CharacterSource;

/// How `&name;` and `%name;` are treated at the current point of the
/// grammar.
///
/// [§ 4.4 XML Processor Treatment of Entities and References](https://www.w3.org/TR/xml/#entproc)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ReferenceMode {
    /// Outside any construct that recognizes references.
    None,
    /// Element content: general entities are included. The content
    /// scanner reads `%` as character data, so a parameter entity
    /// reference is only parsed here on request, and is then forbidden.
    InContent,
    /// An attribute value: internal general entities are included.
    InAttributeValue,
    /// An attribute value kept verbatim: character references stay as
    /// written and general entity references are forbidden.
    AsAttributeValue,
    /// An entity value: parameter entities are included, general entities
    /// are bypassed.
    InEntityValue,
    /// The DTD: parameter entities are included as PE.
    InDtd,
}

/// Everything the parse produced besides builder calls.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    /// The XML declaration, if the document had one.
    pub declaration: Option<Declaration>,
    /// The document type definition, if the document had one.
    pub dtd: Option<Dtd>,
    /// `Some(false)` if a validity constraint failed, `None` when
    /// validity was not checked.
    pub valid: Option<bool>,
    /// Non-fatal errors in document order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseReport {
    /// True unless validity was checked and failed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid.unwrap_or(true)
    }

    /// The recorded diagnostics of one kind.
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }
}

/// A parsed start tag.
#[derive(Debug, Clone)]
pub(super) struct StartTag {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub empty: bool,
    /// The entity the `<` was read from.
    pub entity: EntityId,
}

/// Input that was read but refused by the current element, waiting to be
/// placed in an ancestor.
#[derive(Debug)]
pub(super) enum Pending {
    Tag(StartTag),
    Data(String),
}

/// An element whose end tag has not been seen.
#[derive(Debug)]
pub(super) struct OpenElement<N, C> {
    pub node: N,
    pub class: C,
    /// The start tag as written, `None` for an implied element.
    pub tag: Option<StartTag>,
    /// Declared content category and whether the declaration was external.
    pub declared: Option<(ContentCategory, bool)>,
    pub cursor: Option<ModelCursor>,
    /// Progress count when an implied element was opened.
    pub implied_at: Option<u64>,
}

/// [§ 2.1 Well-Formed XML Documents](https://www.w3.org/TR/xml/#sec-well-formed)
///
/// A recursive-descent parser over the XML 1.0 productions. Each parser
/// reads one document entity and drives one [`ElementBuilder`].
pub struct XmlParser<'b, B: ElementBuilder> {
    pub(super) options: ParserOptions,
    pub(super) entities: EntityStack,
    pub(super) resolver: Box<dyn EntityResolver>,
    pub(super) ref_mode: ReferenceMode,
    pub(super) declaration: Option<Declaration>,
    pub(super) dtd: Option<Dtd>,
    pub(super) document_entity: EntityId,
    pub(super) valid: Option<bool>,
    pub(super) diagnostics: Vec<Diagnostic>,
    /// ID attribute values seen so far.
    pub(super) ids: HashSet<String>,
    /// IDREF values to resolve at the end of the document.
    pub(super) idrefs: BTreeSet<String>,
    /// Set while parsing a markup declaration of the internal subset.
    pub(super) no_pe_refs: bool,
    pub(super) got_pe_ref: bool,
    /// A parameter entity reference was not read.
    pub(super) unread_pe: bool,
    pub(super) open: Vec<OpenElement<B::Node, B::Class>>,
    pub(super) pending: Option<Pending>,
    /// Counts consumed markup and data, for the implied element guard.
    pub(super) progress: u64,
    pub(super) builder: &'b mut B,
}

impl<'b, B: ElementBuilder> XmlParser<'b, B> {
    /// A parser over already decoded text.
    #[must_use]
    pub fn from_text(text: &str, builder: &'b mut B) -> Self {
        Self::with_document(CharacterSource::from_text(text), None, builder)
    }

    /// A parser over raw octets. With no `encoding` the encoding is
    /// detected and may be changed once by the XML declaration.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Encoding`] if the first character cannot be
    /// decoded.
    pub fn from_bytes(
        bytes: Vec<u8>,
        encoding: Option<Encoding>,
        builder: &'b mut B,
    ) -> Result<Self> {
        let source = CharacterSource::from_bytes(bytes, encoding)?;
        Ok(Self::with_document(source, None, builder))
    }

    /// A parser over the document at `location`, read with the
    /// [`DefaultResolver`]. Relative identifiers in the document resolve
    /// against the location.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Resource`] if the document cannot be read and
    /// [`XmlError::Encoding`] if it cannot be decoded.
    pub fn from_location(location: &Url, builder: &'b mut B) -> Result<Self> {
        let resource = DefaultResolver::new().open(location)?;
        let source = CharacterSource::from_bytes(resource.bytes, resource.encoding)?;
        Ok(Self::with_document(source, Some(resource.location), builder))
    }

    fn with_document(source: CharacterSource, location: Option<Url>, builder: &'b mut B) -> Self {
        let document_entity = EntityStack::first_id();
        let document = Entity::new(document_entity, EntityKind::Document, source, location, true);
        Self {
            options: ParserOptions::default(),
            entities: EntityStack::new(document),
            resolver: Box::new(DefaultResolver::new()),
            ref_mode: ReferenceMode::None,
            declaration: None,
            dtd: None,
            document_entity,
            valid: None,
            diagnostics: Vec::new(),
            ids: HashSet::new(),
            idrefs: BTreeSet::new(),
            no_pe_refs: false,
            got_pe_ref: false,
            unread_pe: false,
            open: Vec::new(),
            pending: None,
            progress: 0,
            builder,
        }
    }

    /// Replace the options. Implied checks are switched on.
    #[must_use]
    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options.normalized();
        self.valid = self.options.check_validity.then_some(true);
        self
    }

    /// Use `resolver` to locate and open external entities.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Box<dyn EntityResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Resolve relative identifiers in the document entity against `base`.
    #[must_use]
    pub fn with_base_url(mut self, base: Url) -> Self {
        self.entities.current_mut().set_location(base);
        self
    }

    /// [1] document: parse the whole document, driving the builder.
    ///
    /// # Errors
    ///
    /// Returns the first well-formedness, fatal, resource or encoding error,
    /// or the first validity error when validity errors are raised.
    pub fn parse_document(mut self) -> Result<ParseReport> {
        self.document()?;
        Ok(self.into_report())
    }

    fn into_report(self) -> ParseReport {
        ParseReport {
            declaration: self.declaration,
            dtd: self.dtd,
            valid: self.valid,
            diagnostics: self.diagnostics,
        }
    }

    pub(super) const fn loose(&self) -> bool {
        self.options.dont_check_wellformedness
    }

    pub(super) const fn validating(&self) -> bool {
        self.options.check_validity
    }

    /// The document was declared `standalone="yes"`.
    pub(super) fn declared_standalone(&self) -> bool {
        self.declaration.as_ref().is_some_and(|d| d.standalone)
    }

    /// [§ 2.9 Standalone Document Declaration](https://www.w3.org/TR/xml/#sec-rmd)
    ///
    /// True if declared, or if there is no external subset and no parameter
    /// entity reference has been seen.
    pub(super) fn standalone(&self) -> bool {
        self.declared_standalone()
            || (self.dtd.as_ref().is_none_or(|dtd| dtd.external_id.is_none()) && !self.got_pe_ref)
    }

    /// True if the construct being read came from outside the document
    /// entity.
    pub(super) fn in_external_markup(&self) -> bool {
        self.entities.current_external().id() != self.document_entity
    }

    /// Fold a name to lower case when names are case-insensitive.
    pub(super) fn fold_name(&self, name: String) -> String {
        if self.options.sgml_namecase_general {
            name.to_lowercase()
        } else {
            name
        }
    }

    pub(super) fn names_match(&self, a: &str, b: &str) -> bool {
        if self.options.sgml_namecase_general {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    pub(super) fn position(&self) -> Position {
        self.entities.position()
    }

    pub(super) fn well_formedness_error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(XmlError::WellFormed {
            position: self.position(),
            message: message.into(),
        })
    }

    pub(super) fn fatal_error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(XmlError::Fatal {
            position: self.position(),
            message: message.into(),
        })
    }

    pub(super) fn forbidden_reference<T>(&self, reference: String) -> Result<T> {
        Err(XmlError::ForbiddenReference {
            position: self.position(),
            reference,
        })
    }

    /// Record a validity error, or raise it if the options say so. Does
    /// nothing unless validity is being checked.
    pub(super) fn validity_error(&mut self, message: impl Into<String>) -> Result<()> {
        if !self.options.check_validity {
            return Ok(());
        }
        self.valid = Some(false);
        let position = self.position();
        let message = message.into();
        if self.options.raise_validity_errors {
            return Err(XmlError::Validity { position, message });
        }
        self.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::Validity,
            position,
            message,
        });
        Ok(())
    }

    /// Record a "for compatibility" error.
    pub(super) fn compatibility_error(&mut self, message: impl Into<String>) {
        if self.options.check_compatibility {
            self.record(DiagnosticKind::Compatibility, message.into());
        }
    }

    /// Record an error a processor may recover from silently.
    pub(super) fn processing_error(&mut self, message: impl Into<String>) {
        if self.options.check_all_errors {
            self.record(DiagnosticKind::Processing, message.into());
        }
    }

    fn record(&mut self, kind: DiagnosticKind, message: String) {
        let position = self.position();
        self.diagnostics.push(Diagnostic {
            kind,
            position,
            message,
        });
    }

    pub(super) fn current(&self) -> Option<char> {
        self.entities.current_char()
    }

    pub(super) fn at(&self, c: char) -> bool {
        self.current() == Some(c)
    }

    pub(super) fn next_char(&mut self) -> Result<()> {
        self.entities.advance()?;
        Ok(())
    }

    /// Consume `literal` if it comes next. A partial match is pushed back.
    /// Keywords match case-insensitively when names are.
    pub(super) fn parse_literal(&mut self, literal: &str) -> Result<bool> {
        let mut matched = String::new();
        for expected in literal.chars() {
            match self.current() {
                Some(c)
                    if c == expected
                        || (self.options.sgml_namecase_general
                            && c.eq_ignore_ascii_case(&expected)) =>
                {
                    matched.push(c);
                    self.next_char()?;
                }
                _ => {
                    if !matched.is_empty() {
                        self.entities.pushback(&matched);
                    }
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    pub(super) fn parse_required_literal(&mut self, literal: &str, production: &str) -> Result<()> {
        if self.parse_literal(literal)? {
            Ok(())
        } else {
            let found = self.describe_current();
            self.well_formedness_error(format!("{production}: expected '{literal}', found {found}"))
        }
    }

    pub(super) fn describe_current(&self) -> String {
        self.current()
            .map_or_else(|| "end of entity".to_string(), |c| format!("{c:?}"))
    }

    /// [3] S. In the DTD a parameter entity reference may stand wherever
    /// white space may; it is expanded and counts as white space.
    pub(super) fn parse_s(&mut self) -> Result<bool> {
        let mut found = false;
        loop {
            match self.current() {
                Some(c) if is_s(c) => {}
                Some('\u{2028}' | '\u{2029}') if self.options.unicode_compatibility => {}
                Some('%') if self.ref_mode == ReferenceMode::InDtd => {
                    let branch = self.entities.branch();
                    self.next_char()?;
                    if !self.current().is_some_and(is_name_start_char) {
                        self.entities.pushback("%");
                        break;
                    }
                    let _ = self.parse_pe_reference(branch)?;
                    found = true;
                    continue;
                }
                _ => break,
            }
            self.next_char()?;
            found = true;
        }
        Ok(found)
    }

    pub(super) fn parse_required_s(&mut self, production: &str) -> Result<()> {
        if self.parse_s()? {
            Ok(())
        } else {
            let found = self.describe_current();
            self.well_formedness_error(format!("{production}: expected white space, found {found}"))
        }
    }

    /// White space without parameter entity recognition.
    pub(super) fn skip_plain_s(&mut self) -> Result<bool> {
        let mut found = false;
        while self.current().is_some_and(is_s) {
            self.next_char()?;
            found = true;
        }
        Ok(found)
    }

    /// [5] Name, `None` if no name starts here.
    pub(super) fn parse_name(&mut self) -> Result<Option<String>> {
        if !self.current().is_some_and(is_name_start_char) {
            return Ok(None);
        }
        let mut name = String::new();
        while let Some(c) = self.current().filter(|&c| is_name_char(c)) {
            name.push(c);
            self.next_char()?;
        }
        Ok(Some(name))
    }

    pub(super) fn parse_required_name(&mut self, production: &str) -> Result<String> {
        match self.parse_name()? {
            Some(name) => Ok(name),
            None => {
                let found = self.describe_current();
                self.well_formedness_error(format!("{production}: expected Name, found {found}"))
            }
        }
    }

    /// [7] Nmtoken, `None` if no name character comes next.
    pub(super) fn parse_nmtoken(&mut self) -> Result<Option<String>> {
        let mut token = String::new();
        while let Some(c) = self.current().filter(|&c| is_name_char(c)) {
            token.push(c);
            self.next_char()?;
        }
        Ok((!token.is_empty()).then_some(token))
    }

    /// [25] Eq
    pub(super) fn parse_eq(&mut self, production: &str) -> Result<()> {
        let _ = self.parse_s()?;
        self.parse_required_literal("=", production)?;
        let _ = self.parse_s()?;
        Ok(())
    }

    /// An opening quote, returned so the caller can match it.
    pub(super) fn parse_quote(&mut self, production: &str) -> Result<char> {
        match self.current() {
            Some(q @ ('"' | '\'')) => {
                self.next_char()?;
                Ok(q)
            }
            _ => {
                let found = self.describe_current();
                self.well_formedness_error(format!("{production}: expected quote, found {found}"))
            }
        }
    }
}
