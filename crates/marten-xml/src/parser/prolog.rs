//! The document production, the prolog and the XML and text declarations.
//!
//! [§ 2.8 Prolog and Document Type Declaration](https://www.w3.org/TR/xml/#sec-prolog-dtd)

use marten_common::warning::warn_once;

use super::content::{Arrival, Placement};
use super::core::{ReferenceMode, XmlParser};
use crate::builder::ElementBuilder;
use crate::chars::{is_enc_name, is_enc_name_start, is_name_start_char, is_s};
use crate::dtd::{Declaration, Dtd, ExternalId, TextDeclaration};
use crate::encoding::Encoding;
use crate::error::{Result, XmlError};

impl<B: ElementBuilder> XmlParser<'_, B> {
    /// [1] document ::= prolog element Misc*
    pub(super) fn document(&mut self) -> Result<()> {
        self.ref_mode = ReferenceMode::None;
        self.prolog()?;
        self.ref_mode = ReferenceMode::InContent;
        self.root_element()?;
        self.ref_mode = ReferenceMode::None;
        self.parse_misc()?;
        if self.pending.take().is_some() {
            if !self.loose() {
                return self.well_formedness_error("[1] document: markup after the root element");
            }
            warn_once("XML", "dropped content after the root element");
        }
        if self.current().is_some() {
            if !self.loose() {
                let found = self.describe_current();
                return self.well_formedness_error(format!(
                    "[1] document: expected end of document, found {found}"
                ));
            }
            warn_once("XML", "ignored text after the root element");
        }
        self.check_idrefs()
    }

    /// [39] element, the root.
    fn root_element(&mut self) -> Result<()> {
        if self.current().is_none() {
            return self.well_formedness_error("[1] document: no root element");
        }
        if self.at('<') {
            let entity = self.entities.current().id();
            self.next_char()?;
            if self.current().is_some_and(is_name_start_char) {
                let tag = self.parse_stag(entity)?;
                if self.place(Arrival::Tag(tag))? == Placement::ContentEnded {
                    return self.well_formedness_error("[1] document: root element refused");
                }
                return self.element_content(0);
            }
            self.entities.pushback("<");
        }
        if self.options.sgml_omittag && self.place(Arrival::Data(None))? == Placement::Placed {
            return self.element_content(0);
        }
        let found = self.describe_current();
        self.well_formedness_error(format!("[39] element: expected start tag, found {found}"))
    }

    /// [22] prolog ::= XMLDecl? Misc* (doctypedecl Misc*)?
    fn prolog(&mut self) -> Result<()> {
        let mut declared = None;
        if self.parse_literal("<?xml")? {
            if self.current().is_some_and(is_s) {
                let declaration = self.xml_decl()?;
                self.builder.declaration(&declaration);
                declared.clone_from(&declaration.encoding);
                self.declaration = Some(declaration);
            } else {
                self.entities.pushback("<?xml");
            }
        }
        self.check_encoding(declared.as_deref());
        self.entities.current_mut().source_mut().keep_encoding();
        self.parse_misc()?;
        if self.parse_literal("<!DOCTYPE")? {
            self.doctype_decl()?;
            self.parse_misc()?;
            if self.validating() {
                self.check_dtd()?;
            }
        } else {
            self.validity_error("Root Element Type: no document type declaration")?;
        }
        Ok(())
    }

    /// [23] XMLDecl ::= '<?xml' VersionInfo EncodingDecl? SDDecl? S? '?>'
    fn xml_decl(&mut self) -> Result<Declaration> {
        const PRODUCTION: &str = "[23] XMLDecl";
        self.required_plain_s(PRODUCTION)?;
        self.parse_required_literal("version", PRODUCTION)?;
        let version = self.version_num(PRODUCTION)?;
        let mut space = self.skip_plain_s()?;
        let mut encoding = None;
        if space && self.parse_literal("encoding")? {
            encoding = Some(self.enc_name(PRODUCTION)?);
            space = self.skip_plain_s()?;
        }
        let mut standalone = false;
        if space && self.parse_literal("standalone")? {
            self.parse_eq(PRODUCTION)?;
            let quote = self.parse_quote(PRODUCTION)?;
            standalone = if self.parse_literal("yes")? {
                true
            } else if self.parse_literal("no")? {
                false
            } else {
                let found = self.describe_current();
                return self.well_formedness_error(format!(
                    "[32] SDDecl: expected 'yes' or 'no', found {found}"
                ));
            };
            self.closing_quote(quote, PRODUCTION)?;
            let _ = self.skip_plain_s()?;
        }
        if let Some(label) = &encoding {
            self.switch_encoding(label)?;
        }
        self.parse_required_literal("?>", PRODUCTION)?;
        Ok(Declaration {
            version,
            encoding,
            standalone,
        })
    }

    /// [77] TextDecl ::= '<?xml' VersionInfo? EncodingDecl S? '?>',
    /// positioned after `<?xml`.
    pub(super) fn parse_text_decl(&mut self) -> Result<TextDeclaration> {
        const PRODUCTION: &str = "[77] TextDecl";
        self.required_plain_s(PRODUCTION)?;
        let mut version = None;
        if self.parse_literal("version")? {
            version = Some(self.version_num(PRODUCTION)?);
            self.required_plain_s(PRODUCTION)?;
        }
        self.parse_required_literal("encoding", PRODUCTION)?;
        let encoding = self.enc_name(PRODUCTION)?;
        let _ = self.skip_plain_s()?;
        self.switch_encoding(&encoding)?;
        self.parse_required_literal("?>", PRODUCTION)?;
        Ok(TextDeclaration {
            version,
            encoding: Some(encoding),
        })
    }

    fn required_plain_s(&mut self, production: &str) -> Result<()> {
        if self.skip_plain_s()? {
            return Ok(());
        }
        let found = self.describe_current();
        self.well_formedness_error(format!("{production}: expected white space, found {found}"))
    }

    pub(super) fn closing_quote(&mut self, quote: char, production: &str) -> Result<()> {
        if self.at(quote) {
            return self.next_char();
        }
        let found = self.describe_current();
        self.well_formedness_error(format!("{production}: expected {quote}, found {found}"))
    }

    /// [24] VersionInfo after the keyword: Eq quote '1.' [0-9]+ quote
    fn version_num(&mut self, production: &str) -> Result<String> {
        self.parse_eq(production)?;
        let quote = self.parse_quote(production)?;
        self.parse_required_literal("1.", "[26] VersionNum")?;
        let mut version = "1.".to_string();
        while let Some(c) = self.current().filter(char::is_ascii_digit) {
            version.push(c);
            self.next_char()?;
        }
        if version.len() == 2 {
            let found = self.describe_current();
            return self.well_formedness_error(format!("[26] VersionNum: expected digit, found {found}"));
        }
        self.closing_quote(quote, production)?;
        Ok(version)
    }

    /// [80] EncodingDecl after the keyword: Eq quote EncName quote
    fn enc_name(&mut self, production: &str) -> Result<String> {
        self.parse_eq(production)?;
        let quote = self.parse_quote(production)?;
        if !self.current().is_some_and(is_enc_name_start) {
            let found = self.describe_current();
            return self.well_formedness_error(format!("[81] EncName: expected letter, found {found}"));
        }
        let mut name = String::new();
        while let Some(c) = self.current().filter(|&c| is_enc_name(c)) {
            name.push(c);
            self.next_char()?;
        }
        self.closing_quote(quote, production)?;
        Ok(name)
    }

    /// Re-decode the current entity from here on in the declared encoding.
    /// Decoded text has no octets to re-decode.
    fn switch_encoding(&mut self, label: &str) -> Result<()> {
        let source = self.entities.current_mut().source_mut();
        if !source.is_text() {
            source.change_encoding(label)?;
        }
        Ok(())
    }

    /// [§ 4.3.3 Character Encoding in Entities](https://www.w3.org/TR/xml/#charencoding)
    ///
    /// "In the absence of information provided by an external transport
    /// protocol ... it is a fatal error for an entity including an encoding
    /// declaration to be presented to the XML processor in an encoding other
    /// than that named in the declaration, or for an entity which begins
    /// with neither a Byte Order Mark nor an encoding declaration to use an
    /// encoding other than UTF-8." Both are reported as processing errors.
    pub(super) fn check_encoding(&mut self, declared: Option<&str>) {
        let source = self.entities.current().source();
        if source.is_text() {
            return;
        }
        let encoding = source.encoding();
        let bom = source.has_bom();
        if declared.is_none() && encoding != Encoding::Utf8 && !encoding.is_utf16() {
            self.processing_error(format!("entity in {encoding} has no encoding declaration"));
        }
        let ucs2 = declared.is_some_and(|label| label.eq_ignore_ascii_case("iso-10646-ucs-2"));
        if encoding.is_utf16() && !bom && !ucs2 {
            self.processing_error("UTF-16 entity does not begin with a byte order mark");
        }
    }

    /// [28] doctypedecl ::= '<!DOCTYPE' S Name (S ExternalID)? S? ('[' intSubset ']' S?)? '>'
    fn doctype_decl(&mut self) -> Result<()> {
        const PRODUCTION: &str = "[28] doctypedecl";
        self.parse_required_s(PRODUCTION)?;
        let name = self.parse_required_name(PRODUCTION)?;
        let name = self.fold_name(name);
        let mut external_id = None;
        if self.parse_s()? && !self.at('[') && !self.at('>') {
            external_id = Some(self.external_id(false)?);
            let _ = self.parse_s()?;
        }
        self.builder.doctype(&name, external_id.as_ref());
        self.dtd = Some(Dtd::new(&name, external_id.clone()));
        if self.at('[') {
            self.next_char()?;
            self.ref_mode = ReferenceMode::InDtd;
            self.int_subset()?;
            self.ref_mode = ReferenceMode::None;
            self.parse_required_literal("]", PRODUCTION)?;
            let _ = self.parse_s()?;
        }
        if let Some(external_id) = &external_id {
            if self.options.open_external_entities {
                self.external_subset(external_id)?;
            }
        }
        self.parse_required_literal(">", PRODUCTION)
    }

    /// [30] extSubset, read as if it followed the internal subset.
    ///
    /// A subset that cannot be opened is skipped with a warning unless
    /// validity is being checked.
    fn external_subset(&mut self, external_id: &ExternalId) -> Result<()> {
        let floor = self.entities.depth() + 1;
        match self.open_external_subset(external_id) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(XmlError::Resource(e)) if !self.validating() => {
                warn_once("XML", &format!("external subset ignored: {e}"));
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        self.ref_mode = ReferenceMode::InDtd;
        self.ext_subset_decl(floor)?;
        self.ref_mode = ReferenceMode::None;
        if self.entities.depth() >= floor {
            let found = self.describe_current();
            return self.well_formedness_error(format!(
                "[31] extSubsetDecl: expected markup declaration, found {found}"
            ));
        }
        Ok(())
    }

    /// [27] Misc ::= Comment | PI | S, outside the root element.
    fn parse_misc(&mut self) -> Result<()> {
        loop {
            if self.skip_plain_s()? {
                continue;
            }
            if self.parse_literal("<!--")? {
                let text = self.parse_comment_body()?;
                let document = self.builder.document();
                self.builder.comment(document, &text);
                continue;
            }
            if self.parse_literal("<?")? {
                let (target, data) = self.parse_pi_body()?;
                let document = self.builder.document();
                self.builder.processing_instruction(document, &target, &data);
                continue;
            }
            return Ok(());
        }
    }
}
