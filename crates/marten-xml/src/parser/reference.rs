//! Character and entity references, and opening the entities they name.
//!
//! [§ 4.1 Character and Entity References](https://www.w3.org/TR/xml/#sec-references)

use marten_common::url::{Url, is_local};
use marten_common::warning::warn_once;

use super::core::{ReferenceMode, XmlParser};
use crate::builder::ElementBuilder;
use crate::chars::{is_char, is_s};
use crate::dtd::{DeclaredEntity, EntityDefinition, ExternalId};
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::Result;
use crate::source::CharacterSource;

/// [§ 4.6 Predefined Entities](https://www.w3.org/TR/xml/#sec-predefined-ent)
fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

impl<B: ElementBuilder> XmlParser<'_, B> {
    /// [67] Reference
    ///
    /// Returns the data the reference stands for in the current mode. A
    /// general entity that is included is pushed onto the entity stack and
    /// an empty string returned: its text is read next.
    pub(super) fn parse_reference(&mut self) -> Result<String> {
        let branch = self.entities.branch();
        self.parse_required_literal("&", "[67] Reference")?;
        if self.at('#') {
            self.parse_char_ref()
        } else {
            self.parse_entity_ref(branch)
        }
    }

    /// [66] CharRef, positioned on the `#`.
    fn parse_char_ref(&mut self) -> Result<String> {
        const PRODUCTION: &str = "[66] CharRef";
        self.next_char()?;
        let hex = self.parse_literal("x")?;
        let radix = if hex { 16 } else { 10 };
        let mut digits = String::new();
        while let Some(c) = self.current().filter(|c| c.is_digit(radix)) {
            digits.push(c);
            self.next_char()?;
        }
        if digits.is_empty() {
            let found = self.describe_current();
            return self.well_formedness_error(format!("{PRODUCTION}: expected digits, found {found}"));
        }
        self.parse_required_literal(";", PRODUCTION)?;
        let literal = format!("&#{}{digits};", if hex { "x" } else { "" });
        match self.ref_mode {
            ReferenceMode::InDtd => return self.forbidden_reference(literal),
            ReferenceMode::AsAttributeValue => return Ok(literal),
            _ => {}
        }
        let c = u32::from_str_radix(&digits, radix)
            .ok()
            .and_then(char::from_u32)
            .filter(|&c| is_char(c));
        match c {
            Some(c) => Ok(c.to_string()),
            None if self.options.allow_non_char_references => {
                warn_once("XML", &format!("kept reference to non-character {literal}"));
                Ok(literal)
            }
            None => self.well_formedness_error(format!(
                "Legal Character: {literal} does not match production for Char"
            )),
        }
    }

    /// [68] EntityRef, positioned after the `&`.
    ///
    /// In loose mode a `&` not followed by a name is data and the closing
    /// `;` may be missing.
    fn parse_entity_ref(&mut self, branch: Vec<EntityKind>) -> Result<String> {
        const PRODUCTION: &str = "[68] EntityRef";
        let name = if self.loose() {
            match self.parse_name()? {
                Some(name) => name,
                None => return Ok("&".to_string()),
            }
        } else {
            self.parse_required_name(PRODUCTION)?
        };
        if self.loose() {
            let _ = self.parse_literal(";")?;
        } else {
            self.parse_required_literal(";", PRODUCTION)?;
        }
        match self.ref_mode {
            ReferenceMode::InEntityValue => return Ok(format!("&{name};")),
            ReferenceMode::AsAttributeValue | ReferenceMode::InDtd => {
                return self.forbidden_reference(format!("&{name};"));
            }
            _ => {}
        }
        if let Some(c) = predefined_entity(&name) {
            return Ok(c.to_string());
        }
        let declared = self
            .dtd
            .as_ref()
            .and_then(|dtd| dtd.general_entity(&name))
            .cloned();
        let Some(declared) = declared else {
            if self.standalone() {
                return self.well_formedness_error(format!(
                    "Entity Declared: undeclared general entity {name} in standalone document"
                ));
            }
            self.validity_error(format!("Entity Declared: undeclared general entity {name}"))?;
            if self.loose() {
                return Ok(format!("&{name};"));
            }
            return Ok(String::new());
        };
        if declared.external_declaration && self.declared_standalone() {
            self.validity_error(format!(
                "Standalone Document Declaration: reference to externally declared entity {name}"
            ))?;
        }
        if declared.is_unparsed() {
            return self.well_formedness_error(format!(
                "Parsed Entity: reference to unparsed entity &{name};"
            ));
        }
        if declared.is_external()
            && self.ref_mode == ReferenceMode::InAttributeValue
            && !self.loose()
        {
            return self.well_formedness_error(format!(
                "No External Entity References: &{name}; not allowed in attribute value"
            ));
        }
        let kind = EntityKind::General(name);
        if branch.contains(&kind) {
            return self.well_formedness_error(format!("No Recursion: entity {kind} is already open"));
        }
        let _ = self.open_entity(kind, &declared, branch, false)?;
        Ok(String::new())
    }

    /// [69] PEReference, positioned after the `%`.
    ///
    /// Outside the DTD and entity values the reference is data and is
    /// returned as written, except in content where it is forbidden.
    /// Content itself never calls this: `%p;` there is character data.
    pub(super) fn parse_pe_reference(&mut self, branch: Vec<EntityKind>) -> Result<String> {
        let name = self.pe_reference_name()?;
        match self.ref_mode {
            ReferenceMode::InContent => self.forbidden_reference(format!("%{name};")),
            ReferenceMode::None
            | ReferenceMode::InAttributeValue
            | ReferenceMode::AsAttributeValue => Ok(format!("%{name};")),
            ReferenceMode::InEntityValue | ReferenceMode::InDtd => {
                let _ = self.include_pe(&name, branch)?;
                Ok(String::new())
            }
        }
    }

    /// The name and `;` of a parameter entity reference.
    pub(super) fn pe_reference_name(&mut self) -> Result<String> {
        const PRODUCTION: &str = "[69] PEReference";
        let name = self.parse_required_name(PRODUCTION)?;
        self.parse_required_literal(";", PRODUCTION)?;
        Ok(name)
    }

    /// Include the parameter entity `name`: in the DTD padded with spaces,
    /// in an entity value as is. Returns the id of the opened entity.
    pub(super) fn include_pe(
        &mut self,
        name: &str,
        branch: Vec<EntityKind>,
    ) -> Result<Option<EntityId>> {
        self.got_pe_ref = true;
        if self.no_pe_refs {
            return self.well_formedness_error(format!(
                "PEs in Internal Subset: %{name}; referenced inside a markup declaration"
            ));
        }
        let in_document = !self.in_external_markup();
        let declared = self
            .dtd
            .as_ref()
            .and_then(|dtd| dtd.parameter_entity(name))
            .cloned();
        let Some(declared) = declared else {
            if self.declared_standalone() && in_document {
                return self.well_formedness_error(format!(
                    "Entity Declared: undeclared parameter entity %{name}; in standalone document"
                ));
            }
            self.validity_error(format!("Entity Declared: undeclared parameter entity %{name};"))?;
            return Ok(None);
        };
        if self.declared_standalone() && declared.external_declaration {
            let message = format!(
                "Standalone Document Declaration: parameter entity %{name}; is declared externally"
            );
            if in_document {
                return self.well_formedness_error(message);
            }
            self.validity_error(message)?;
        }
        let kind = EntityKind::Parameter(name.to_string());
        if branch.contains(&kind) {
            return self.well_formedness_error(format!("No Recursion: entity {kind} is already open"));
        }
        let pad = self.ref_mode == ReferenceMode::InDtd;
        let opened = self.open_entity(kind, &declared, branch, pad)?;
        if opened.is_none() && declared.is_external() {
            self.unread_pe = true;
        }
        Ok(opened)
    }

    /// Push a fresh entity for `declared`. External entities are opened
    /// through the resolver; they are skipped (returning `None`) when
    /// external entities are not being read.
    fn open_entity(
        &mut self,
        kind: EntityKind,
        declared: &DeclaredEntity,
        branch: Vec<EntityKind>,
        pad: bool,
    ) -> Result<Option<EntityId>> {
        let id = self.entities.allocate_id();
        let entity = match &declared.definition {
            EntityDefinition::Internal(text) => {
                Entity::new(id, kind, CharacterSource::from_text(text), None, false)
            }
            EntityDefinition::External(external_id) => {
                let Some(location) = self.external_location(external_id, declared.base.as_ref(), &kind)?
                else {
                    return Ok(None);
                };
                let resource = self.resolver.open(&location)?;
                let source = CharacterSource::from_bytes(resource.bytes, resource.encoding)?;
                Entity::new(id, kind, source, Some(resource.location), true)
            }
        };
        let external = entity.is_external();
        let mut entity = entity.with_ancestors(branch);
        if pad {
            entity = entity.with_trailing_space();
        }
        self.entities.push(entity);
        if self.entities.current().id() != id {
            return Ok(None);
        }
        if external {
            self.external_entity_start()?;
        }
        if pad {
            self.entities.pushback(" ");
        }
        Ok(Some(id))
    }

    /// Where the external entity `kind` lives, `None` (with a warning) if
    /// it is not to be read.
    pub(super) fn external_location(
        &mut self,
        external_id: &ExternalId,
        base: Option<&Url>,
        kind: &EntityKind,
    ) -> Result<Option<Url>> {
        if !self.options.open_external_entities {
            warn_once("XML", &format!("external entity {kind} not read"));
            return Ok(None);
        }
        let location = self.resolver.locate(external_id, base)?;
        if !self.options.open_remote_entities && !is_local(&location) {
            warn_once("XML", &format!("remote entity {kind} at {location} not read"));
            return Ok(None);
        }
        Ok(Some(location))
    }

    /// Open the external subset and push it.
    pub(super) fn open_external_subset(&mut self, external_id: &ExternalId) -> Result<bool> {
        let base = self.entities.current_external().location().cloned();
        let Some(location) =
            self.external_location(external_id, base.as_ref(), &EntityKind::ExternalSubset)?
        else {
            return Ok(false);
        };
        let resource = self.resolver.open(&location)?;
        let source = CharacterSource::from_bytes(resource.bytes, resource.encoding)?;
        let id = self.entities.allocate_id();
        let entity = Entity::new(id, EntityKind::ExternalSubset, source, Some(resource.location), true)
            .with_ancestors(self.entities.branch());
        self.entities.push(entity);
        if self.entities.current().id() == id {
            self.external_entity_start()?;
        }
        Ok(true)
    }

    /// [77] TextDecl at the start of a freshly pushed external entity, then
    /// commit to the entity's encoding.
    fn external_entity_start(&mut self) -> Result<()> {
        let mut declared = None;
        if self.parse_literal("<?xml")? {
            if self.current().is_some_and(is_s) {
                declared = self.parse_text_decl()?.encoding;
            } else {
                self.entities.pushback("<?xml");
            }
        }
        self.check_encoding(declared.as_deref());
        self.entities.current_mut().source_mut().keep_encoding();
        Ok(())
    }
}
