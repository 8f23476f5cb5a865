//! The internal and external DTD subsets and the markup declarations in
//! them.
//!
//! [§ 2.8 Prolog and Document Type Declaration](https://www.w3.org/TR/xml/#sec-prolog-dtd)
//! [§ 3.2 Element Type Declarations](https://www.w3.org/TR/xml/#elemdecls)
//! [§ 3.3 Attribute-List Declarations](https://www.w3.org/TR/xml/#attdecls)
//! [§ 3.4 Conditional Sections](https://www.w3.org/TR/xml/#sec-condition-sect)
//! [§ 4.2 Entity Declarations](https://www.w3.org/TR/xml/#sec-entity-decl)
//! [§ 4.7 Notation Declarations](https://www.w3.org/TR/xml/#Notations)

use marten_common::warning::warn_once;

use super::core::{ReferenceMode, XmlParser};
use crate::builder::ElementBuilder;
use crate::chars::{is_name_start_char, is_pubid_char, is_s, normalize_space};
use crate::dtd::{
    AttributeDefinition, AttributeType, ContentCategory, DeclaredEntity, ElementType,
    EntityDefinition, ExternalId, Notation, Presence,
};
use crate::entity::EntityMark;
use crate::error::Result;
use crate::model::{ContentParticle, Occurrence};

impl<B: ElementBuilder> XmlParser<'_, B> {
    /// [28b] intSubset ::= (markupdecl | DeclSep)*
    pub(super) fn int_subset(&mut self) -> Result<()> {
        loop {
            match self.current() {
                Some('<') => {
                    let mark = self.entities.mark();
                    // Parameter entities referenced between declarations
                    // may carry conditional sections.
                    if mark.id != self.document_entity && self.parse_literal("<![")? {
                        self.conditional_section(mark)?;
                        continue;
                    }
                    self.no_pe_refs = !self.in_external_markup();
                    let result = self.markup_decl();
                    self.no_pe_refs = false;
                    result?;
                }
                Some('%') => self.decl_sep()?,
                Some(c) if is_s(c) => self.decl_sep()?,
                _ => return Ok(()),
            }
        }
    }

    /// [31] extSubsetDecl ::= ( markupdecl | conditionalSect | DeclSep)*
    ///
    /// Reads while the entity stack is at least `floor` entities deep.
    pub(super) fn ext_subset_decl(&mut self, floor: usize) -> Result<()> {
        while self.entities.depth() >= floor {
            match self.current() {
                Some('<') => {
                    let mark = self.entities.mark();
                    if self.parse_literal("<![")? {
                        self.conditional_section(mark)?;
                    } else {
                        self.markup_decl()?;
                    }
                }
                Some('%') => self.decl_sep()?,
                Some(c) if is_s(c) => self.decl_sep()?,
                _ => break,
            }
        }
        Ok(())
    }

    /// [28a] DeclSep ::= PEReference | S
    fn decl_sep(&mut self) -> Result<()> {
        if !self.at('%') {
            let _ = self.skip_plain_s()?;
            return Ok(());
        }
        let branch = self.entities.branch();
        self.next_char()?;
        if !self.current().is_some_and(is_name_start_char) {
            let found = self.describe_current();
            return self.well_formedness_error(format!(
                "[69] PEReference: expected Name after '%', found {found}"
            ));
        }
        let name = self.pe_reference_name()?;
        if self.include_pe(&name, branch)?.is_some() {
            self.entities.flag_decl_sep();
        }
        Ok(())
    }

    /// [29] markupdecl ::= elementdecl | AttlistDecl | EntityDecl | NotationDecl | PI | Comment
    fn markup_decl(&mut self) -> Result<()> {
        let mark = self.entities.mark();
        if self.parse_literal("<?")? {
            let _ = self.parse_pi_body()?;
            return Ok(());
        }
        if self.parse_literal("<!--")? {
            let _ = self.parse_comment_body()?;
            return Ok(());
        }
        if self.parse_literal("<!ELEMENT")? {
            return self.element_decl(mark);
        }
        if self.parse_literal("<!ATTLIST")? {
            return self.attlist_decl(mark);
        }
        if self.parse_literal("<!ENTITY")? {
            return self.entity_decl(mark);
        }
        if self.parse_literal("<!NOTATION")? {
            return self.notation_decl(mark);
        }
        let found = self.describe_current();
        self.well_formedness_error(format!("[29] markupdecl: expected markup declaration, found {found}"))
    }

    /// [VC: Proper Declaration/PE Nesting] and [WFC: PE Between Declarations]
    ///
    /// Called on the closing `>`: the declaration must end in the entity it
    /// started in.
    fn check_declaration_nesting(&mut self, mark: EntityMark) -> Result<()> {
        if self.entities.current().id() == mark.id {
            return Ok(());
        }
        if mark.decl_sep && !self.loose() {
            return self.well_formedness_error(
                "PE Between Declarations: declaration does not end in the entity it started in",
            );
        }
        self.validity_error(
            "Proper Declaration/PE Nesting: declaration does not end in the entity it started in",
        )
    }

    /// [VC: Proper Group/PE Nesting]
    fn check_group_nesting(&mut self, mark: EntityMark) -> Result<()> {
        if self.entities.current().id() == mark.id {
            return Ok(());
        }
        self.validity_error("Proper Group/PE Nesting: group does not end in the entity it started in")
    }

    /// Declarations after an unread parameter entity reference must not be
    /// processed unless the document is standalone.
    fn skip_declarations(&self) -> bool {
        self.unread_pe && !self.declared_standalone()
    }

    /// [45] elementdecl ::= '<!ELEMENT' S Name S contentspec S? '>'
    fn element_decl(&mut self, mark: EntityMark) -> Result<()> {
        const PRODUCTION: &str = "[45] elementdecl";
        let external = self.in_external_markup();
        self.parse_required_s(PRODUCTION)?;
        let name = self.parse_required_name(PRODUCTION)?;
        let name = self.fold_name(name);
        self.parse_required_s(PRODUCTION)?;
        let (category, model) = self.content_spec()?;
        let _ = self.parse_s()?;
        self.check_declaration_nesting(mark)?;
        self.parse_required_literal(">", PRODUCTION)?;

        if self
            .dtd
            .as_ref()
            .is_some_and(|dtd| dtd.element_type(&name).is_some())
        {
            self.validity_error(format!(
                "Unique Element Type Declaration: element type {name} is declared twice"
            ))?;
        }
        let element_type = ElementType::new(&name, category, model, external);
        if category == ContentCategory::ElementContent
            && element_type
                .automaton
                .as_ref()
                .is_some_and(|automaton| !automaton.is_deterministic())
        {
            self.compatibility_error(format!(
                "Deterministic Content Models: content model of {name} is ambiguous"
            ));
        }
        if let Some(dtd) = &mut self.dtd {
            dtd.declare_element_type(element_type);
        }
        Ok(())
    }

    /// [46] contentspec ::= 'EMPTY' | 'ANY' | Mixed | children
    fn content_spec(&mut self) -> Result<(ContentCategory, Option<ContentParticle>)> {
        if self.parse_literal("EMPTY")? {
            return Ok((ContentCategory::Empty, None));
        }
        if self.parse_literal("ANY")? {
            return Ok((ContentCategory::Any, None));
        }
        let mark = self.entities.mark();
        if !self.at('(') {
            let found = self.describe_current();
            return self.well_formedness_error(format!(
                "[46] contentspec: expected EMPTY, ANY or '(', found {found}"
            ));
        }
        self.next_char()?;
        let _ = self.parse_s()?;
        if self.parse_literal("#PCDATA")? {
            let model = self.mixed(mark)?;
            return Ok((ContentCategory::Mixed, Some(model)));
        }
        let model = self.group_body(mark)?;
        Ok((ContentCategory::ElementContent, Some(model)))
    }

    /// [51] Mixed ::= '(' S? '#PCDATA' (S? '|' S? Name)* S? ')*' | '(' S? '#PCDATA' S? ')'
    ///
    /// Compiled as a repeated choice of the named element types.
    fn mixed(&mut self, mark: EntityMark) -> Result<ContentParticle> {
        const PRODUCTION: &str = "[51] Mixed";
        let mut names: Vec<String> = Vec::new();
        loop {
            let _ = self.parse_s()?;
            if !self.at('|') {
                break;
            }
            self.next_char()?;
            let _ = self.parse_s()?;
            let name = self.parse_required_name(PRODUCTION)?;
            let name = self.fold_name(name);
            if names.contains(&name) {
                self.validity_error(format!(
                    "No Duplicate Types: {name} appears twice in mixed content"
                ))?;
            } else {
                names.push(name);
            }
        }
        self.check_group_nesting(mark)?;
        self.parse_required_literal(")", PRODUCTION)?;
        if !self.parse_literal("*")? && !names.is_empty() {
            let found = self.describe_current();
            return self.well_formedness_error(format!(
                "{PRODUCTION}: expected '*' after mixed content with element types, found {found}"
            ));
        }
        let children = names.iter().map(|name| ContentParticle::name(name)).collect();
        Ok(ContentParticle::choice(children).with_occurrence(Occurrence::ZeroOrMore))
    }

    /// [49] choice and [50] seq, after the opening parenthesis.
    fn group_body(&mut self, mark: EntityMark) -> Result<ContentParticle> {
        const PRODUCTION: &str = "[47] children";
        let mut children = vec![self.cp()?];
        let mut separator = None;
        loop {
            let _ = self.parse_s()?;
            let Some(c @ ('|' | ',')) = self.current() else {
                break;
            };
            if separator.is_some_and(|s| s != c) {
                return self.well_formedness_error(format!(
                    "{PRODUCTION}: '|' and ',' mixed in one group"
                ));
            }
            separator = Some(c);
            self.next_char()?;
            let _ = self.parse_s()?;
            children.push(self.cp()?);
        }
        self.check_group_nesting(mark)?;
        self.parse_required_literal(")", PRODUCTION)?;
        let group = if separator == Some('|') {
            ContentParticle::choice(children)
        } else {
            ContentParticle::sequence(children)
        };
        Ok(group.with_occurrence(self.occurrence()?))
    }

    /// [48] cp ::= (Name | choice | seq) ('?' | '*' | '+')?
    fn cp(&mut self) -> Result<ContentParticle> {
        if self.at('(') {
            let mark = self.entities.mark();
            self.next_char()?;
            let _ = self.parse_s()?;
            return self.group_body(mark);
        }
        let name = self.parse_required_name("[48] cp")?;
        let name = self.fold_name(name);
        Ok(ContentParticle::name(&name).with_occurrence(self.occurrence()?))
    }

    fn occurrence(&mut self) -> Result<Occurrence> {
        let occurrence = match self.current() {
            Some('?') => Occurrence::ZeroOrOne,
            Some('*') => Occurrence::ZeroOrMore,
            Some('+') => Occurrence::OneOrMore,
            _ => return Ok(Occurrence::ExactlyOnce),
        };
        self.next_char()?;
        Ok(occurrence)
    }

    /// [52] AttlistDecl ::= '<!ATTLIST' S Name AttDef* S? '>'
    fn attlist_decl(&mut self, mark: EntityMark) -> Result<()> {
        const PRODUCTION: &str = "[52] AttlistDecl";
        let external = self.in_external_markup();
        self.parse_required_s(PRODUCTION)?;
        let element = self.parse_required_name(PRODUCTION)?;
        let element = self.fold_name(element);
        let skip = self.skip_declarations();
        while self.parse_s()? && !self.at('>') {
            let definition = self.att_def(external)?;
            self.check_attribute_definition(&element, &definition)?;
            if skip {
                continue;
            }
            if let Some(dtd) = &mut self.dtd {
                let _ = dtd.declare_attribute(&element, definition);
            }
        }
        if skip {
            warn_once("XML", &format!("attributes of {element} not processed"));
        }
        self.check_declaration_nesting(mark)?;
        self.parse_required_literal(">", PRODUCTION)
    }

    /// [53] AttDef ::= S Name S AttType S DefaultDecl, after the first S.
    fn att_def(&mut self, external_declaration: bool) -> Result<AttributeDefinition> {
        const PRODUCTION: &str = "[53] AttDef";
        let name = self.parse_required_name(PRODUCTION)?;
        let name = self.fold_name(name);
        self.parse_required_s(PRODUCTION)?;
        let attribute_type = self.att_type()?;
        self.parse_required_s(PRODUCTION)?;
        let (presence, default_value) = self.default_decl(&attribute_type)?;
        Ok(AttributeDefinition {
            name,
            attribute_type,
            presence,
            default_value,
            external_declaration,
        })
    }

    /// [54] AttType ::= StringType | TokenizedType | EnumeratedType
    fn att_type(&mut self) -> Result<AttributeType> {
        if self.parse_literal("CDATA")? {
            return Ok(AttributeType::CData);
        }
        if self.parse_literal("ID")? {
            if !self.parse_literal("REF")? {
                return Ok(AttributeType::Id);
            }
            if self.parse_literal("S")? {
                return Ok(AttributeType::IdRefs);
            }
            return Ok(AttributeType::IdRef);
        }
        if self.parse_literal("ENTIT")? {
            if self.parse_literal("Y")? {
                return Ok(AttributeType::Entity);
            }
            if self.parse_literal("IES")? {
                return Ok(AttributeType::Entities);
            }
        } else if self.parse_literal("NMTOKEN")? {
            if self.parse_literal("S")? {
                return Ok(AttributeType::NmTokens);
            }
            return Ok(AttributeType::NmToken);
        } else if self.parse_literal("NOTATION")? {
            self.parse_required_s("[58] NotationType")?;
            return Ok(AttributeType::Notation(self.enumeration(true)?));
        } else if self.at('(') {
            return Ok(AttributeType::Enumeration(self.enumeration(false)?));
        }
        let found = self.describe_current();
        self.well_formedness_error(format!("[54] AttType: expected attribute type, found {found}"))
    }

    /// [58] NotationType and [59] Enumeration, from the opening parenthesis.
    fn enumeration(&mut self, notation: bool) -> Result<Vec<String>> {
        let production = if notation {
            "[58] NotationType"
        } else {
            "[59] Enumeration"
        };
        let mark = self.entities.mark();
        self.parse_required_literal("(", production)?;
        let mut tokens: Vec<String> = Vec::new();
        loop {
            let _ = self.parse_s()?;
            let token = if notation {
                self.parse_required_name(production)?
            } else if let Some(token) = self.parse_nmtoken()? {
                self.fold_name(token)
            } else {
                let found = self.describe_current();
                return self.well_formedness_error(format!(
                    "{production}: expected Nmtoken, found {found}"
                ));
            };
            if tokens.contains(&token) {
                self.validity_error(format!(
                    "No Duplicate Tokens: {token} appears twice in {production}"
                ))?;
            } else {
                tokens.push(token);
            }
            let _ = self.parse_s()?;
            if !self.at('|') {
                break;
            }
            self.next_char()?;
        }
        self.check_group_nesting(mark)?;
        self.parse_required_literal(")", production)?;
        Ok(tokens)
    }

    /// [60] DefaultDecl ::= '#REQUIRED' | '#IMPLIED' | (('#FIXED' S)? AttValue)
    fn default_decl(
        &mut self,
        attribute_type: &AttributeType,
    ) -> Result<(Presence, Option<String>)> {
        if self.parse_literal("#REQUIRED")? {
            return Ok((Presence::Required, None));
        }
        if self.parse_literal("#IMPLIED")? {
            return Ok((Presence::Implied, None));
        }
        let presence = if self.parse_literal("#FIXED")? {
            self.parse_required_s("[60] DefaultDecl")?;
            Presence::Fixed
        } else {
            Presence::Default
        };
        let value = self.parse_att_value()?;
        let value = if attribute_type.is_tokenized() {
            normalize_space(&value)
        } else {
            value
        };
        Ok((presence, Some(value)))
    }

    /// [70] EntityDecl ::= GEDecl | PEDecl
    fn entity_decl(&mut self, mark: EntityMark) -> Result<()> {
        const PRODUCTION: &str = "[70] EntityDecl";
        let external_declaration = self.in_external_markup();
        let base = self.entities.current_external().location().cloned();
        self.parse_required_s(PRODUCTION)?;
        let parameter = self.at('%');
        if parameter {
            self.next_char()?;
            self.parse_required_s("[72] PEDecl")?;
        }
        let name = self.parse_required_name(PRODUCTION)?;
        self.parse_required_s(PRODUCTION)?;
        let (definition, notation) = if matches!(self.current(), Some('"' | '\'')) {
            (EntityDefinition::Internal(self.parse_entity_value()?), None)
        } else {
            let external_id = self.external_id(false)?;
            let mut notation = None;
            if self.parse_s()? && !parameter && self.parse_literal("NDATA")? {
                self.parse_required_s("[76] NDataDecl")?;
                notation = Some(self.parse_required_name("[76] NDataDecl")?);
            }
            (EntityDefinition::External(external_id), notation)
        };
        let _ = self.parse_s()?;
        self.check_declaration_nesting(mark)?;
        self.parse_required_literal(">", PRODUCTION)?;

        if self.skip_declarations() {
            warn_once("XML", &format!("declaration of entity {name} not processed"));
            return Ok(());
        }
        let entity = DeclaredEntity {
            name,
            definition,
            notation,
            base,
            external_declaration,
        };
        if let Some(dtd) = &mut self.dtd {
            if parameter {
                dtd.declare_parameter_entity(entity);
            } else {
                dtd.declare_general_entity(entity);
            }
        }
        Ok(())
    }

    /// [9] EntityValue, with parameter entity and character references
    /// expanded and general entity references bypassed.
    fn parse_entity_value(&mut self) -> Result<String> {
        let saved = self.ref_mode;
        self.ref_mode = ReferenceMode::InEntityValue;
        let value = self.entity_value_body();
        self.ref_mode = saved;
        value
    }

    fn entity_value_body(&mut self) -> Result<String> {
        const PRODUCTION: &str = "[9] EntityValue";
        let quote = self.parse_quote(PRODUCTION)?;
        let entity = self.entities.current().id();
        let mut value = String::new();
        loop {
            match self.current() {
                None => {
                    return self.well_formedness_error(format!("{PRODUCTION}: unterminated literal"));
                }
                Some(c) if c == quote && self.entities.current().id() == entity => {
                    self.next_char()?;
                    return Ok(value);
                }
                Some('&') => value.push_str(&self.parse_reference()?),
                Some('%') => {
                    let branch = self.entities.branch();
                    self.next_char()?;
                    if !self.current().is_some_and(is_name_start_char) {
                        let found = self.describe_current();
                        return self.well_formedness_error(format!(
                            "[69] PEReference: expected Name after '%', found {found}"
                        ));
                    }
                    value.push_str(&self.parse_pe_reference(branch)?);
                }
                Some(c) => {
                    self.check_char(c)?;
                    value.push(c);
                    self.next_char()?;
                }
            }
        }
    }

    /// [75] ExternalID, and with `public_only` also [83] PublicID.
    pub(super) fn external_id(&mut self, public_only: bool) -> Result<ExternalId> {
        const PRODUCTION: &str = "[75] ExternalID";
        if self.parse_literal("SYSTEM")? {
            self.parse_required_s(PRODUCTION)?;
            let system_id = self.parse_system_literal()?;
            return Ok(ExternalId {
                public_id: None,
                system_id: Some(system_id),
            });
        }
        if self.parse_literal("PUBLIC")? {
            self.parse_required_s(PRODUCTION)?;
            let public_id = self.parse_pubid_literal()?;
            let space = self.parse_s()?;
            let system_id = if space && matches!(self.current(), Some('"' | '\'')) {
                Some(self.parse_system_literal()?)
            } else if public_only {
                None
            } else {
                let found = self.describe_current();
                return self.well_formedness_error(format!(
                    "{PRODUCTION}: expected system literal, found {found}"
                ));
            };
            return Ok(ExternalId {
                public_id: Some(public_id),
                system_id,
            });
        }
        let found = self.describe_current();
        self.well_formedness_error(format!("{PRODUCTION}: expected SYSTEM or PUBLIC, found {found}"))
    }

    /// [11] SystemLiteral ::= ('"' [^"]* '"') | ("'" [^']* "'")
    fn parse_system_literal(&mut self) -> Result<String> {
        const PRODUCTION: &str = "[11] SystemLiteral";
        let quote = self.parse_quote(PRODUCTION)?;
        let mut literal = String::new();
        loop {
            match self.current() {
                None => {
                    return self.well_formedness_error(format!("{PRODUCTION}: unterminated literal"));
                }
                Some(c) if c == quote => {
                    self.next_char()?;
                    return Ok(literal);
                }
                Some(c) => {
                    literal.push(c);
                    self.next_char()?;
                }
            }
        }
    }

    /// [12] PubidLiteral, white space normalized.
    fn parse_pubid_literal(&mut self) -> Result<String> {
        const PRODUCTION: &str = "[12] PubidLiteral";
        let quote = self.parse_quote(PRODUCTION)?;
        let mut literal = String::new();
        loop {
            match self.current() {
                None => {
                    return self.well_formedness_error(format!("{PRODUCTION}: unterminated literal"));
                }
                Some(c) if c == quote => {
                    self.next_char()?;
                    return Ok(normalize_space(&literal));
                }
                Some(c) if is_pubid_char(c) => {
                    literal.push(if is_s(c) { ' ' } else { c });
                    self.next_char()?;
                }
                Some(c) => {
                    return self.well_formedness_error(format!(
                        "{PRODUCTION}: {c:?} is not a public identifier character"
                    ));
                }
            }
        }
    }

    /// [82] NotationDecl ::= '<!NOTATION' S Name S (ExternalID | PublicID) S? '>'
    fn notation_decl(&mut self, mark: EntityMark) -> Result<()> {
        const PRODUCTION: &str = "[82] NotationDecl";
        self.parse_required_s(PRODUCTION)?;
        let name = self.parse_required_name(PRODUCTION)?;
        self.parse_required_s(PRODUCTION)?;
        let external_id = self.external_id(true)?;
        let _ = self.parse_s()?;
        self.check_declaration_nesting(mark)?;
        self.parse_required_literal(">", PRODUCTION)?;
        if self.dtd.as_ref().is_some_and(|dtd| dtd.notation(&name).is_some()) {
            self.validity_error(format!("Unique Notation Name: notation {name} is declared twice"))?;
        }
        if let Some(dtd) = &mut self.dtd {
            dtd.declare_notation(Notation { name, external_id });
        }
        Ok(())
    }

    /// [61] conditionalSect ::= includeSect | ignoreSect, after the `<![`.
    fn conditional_section(&mut self, mark: EntityMark) -> Result<()> {
        const PRODUCTION: &str = "[61] conditionalSect";
        let _ = self.parse_s()?;
        if self.parse_literal("INCLUDE")? {
            let _ = self.parse_s()?;
            self.check_section_nesting(mark)?;
            self.parse_required_literal("[", "[62] includeSect")?;
            let floor = self.entities.depth();
            self.ext_subset_decl(floor)?;
        } else if self.parse_literal("IGNORE")? {
            let _ = self.parse_s()?;
            self.check_section_nesting(mark)?;
            self.parse_required_literal("[", "[63] ignoreSect")?;
            self.ignore_contents()?;
        } else {
            let found = self.describe_current();
            return self.well_formedness_error(format!(
                "{PRODUCTION}: expected INCLUDE or IGNORE, found {found}"
            ));
        }
        self.check_section_nesting(mark)?;
        self.parse_required_literal("]]>", PRODUCTION)
    }

    /// [VC: Proper Conditional Section/PE Nesting]
    fn check_section_nesting(&mut self, mark: EntityMark) -> Result<()> {
        if self.entities.current().id() == mark.id {
            return Ok(());
        }
        self.validity_error(
            "Proper Conditional Section/PE Nesting: section does not end in the entity it started in",
        )
    }

    /// [64] ignoreSectContents, up to but not including the final `]]>`.
    /// References are not recognized.
    fn ignore_contents(&mut self) -> Result<()> {
        let floor = self.entities.depth();
        let mut depth = 0_usize;
        loop {
            if self.current().is_none() || self.entities.depth() < floor {
                return self.well_formedness_error("[63] ignoreSect: unterminated section");
            }
            if self.parse_literal("<![")? {
                depth += 1;
            } else if self.parse_literal("]]>")? {
                if depth == 0 {
                    self.entities.pushback("]]>");
                    return Ok(());
                }
                depth -= 1;
            } else {
                self.next_char()?;
            }
        }
    }
}
