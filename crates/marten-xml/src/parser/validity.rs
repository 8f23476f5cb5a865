//! Validity constraints that need the whole DTD or the whole document:
//! attribute values, IDs and references, notations and the root type.
//!
//! [§ 3 Logical Structures](https://www.w3.org/TR/xml/#sec-logical-struct)
//!
//! Attribute defaults and normalization apply to every parse; everything
//! else here only runs when validity is checked.

use super::core::XmlParser;
use crate::builder::ElementBuilder;
use crate::chars::{is_valid_name, is_valid_nmtoken, normalize_space};
use crate::dtd::{AttributeDefinition, AttributeType, ContentCategory, DeclaredEntity, Presence};
use crate::error::Result;

impl<B: ElementBuilder> XmlParser<'_, B> {
    /// [§ 3.3.2 Attribute Defaults](https://www.w3.org/TR/xml/#sec-attr-defaults)
    /// and [§ 3.3.3 Attribute-Value Normalization](https://www.w3.org/TR/xml/#AVNormalize)
    ///
    /// Normalizes the specified attributes of `element`, appends defaults
    /// for declared attributes that were not specified, and checks every
    /// value against its declaration.
    pub(super) fn check_attributes(
        &mut self,
        element: &str,
        specified: Vec<(String, String)>,
    ) -> Result<Vec<(String, String)>> {
        let definitions: Vec<AttributeDefinition> = self
            .dtd
            .as_ref()
            .map(|dtd| dtd.attribute_list(element).to_vec())
            .unwrap_or_default();
        let mut attributes = Vec::with_capacity(specified.len());
        for (name, value) in specified {
            let definition = definitions.iter().find(|definition| definition.name == name);
            let value = match definition {
                Some(definition) if definition.attribute_type.is_tokenized() => {
                    let normalized = normalize_space(&value);
                    if normalized != value
                        && definition.external_declaration
                        && self.declared_standalone()
                    {
                        self.validity_error(format!(
                            "Standalone Document Declaration: value of {name} changed by normalization"
                        ))?;
                    }
                    normalized
                }
                _ => value,
            };
            if self.validating() {
                match definition {
                    Some(definition) => self.check_attribute_value(definition, &value)?,
                    None => self.validity_error(format!(
                        "Attribute Value Type: attribute {name} of <{element}> is not declared"
                    ))?,
                }
            }
            attributes.push((name, value));
        }

        for definition in &definitions {
            if attributes.iter().any(|(name, _)| *name == definition.name) {
                continue;
            }
            if definition.presence == Presence::Required {
                self.validity_error(format!(
                    "Required Attribute: <{element}> has no {} attribute",
                    definition.name
                ))?;
            }
            if let Some(default) = &definition.default_value {
                if definition.external_declaration && self.declared_standalone() {
                    self.validity_error(format!(
                        "Standalone Document Declaration: default of {} is declared externally",
                        definition.name
                    ))?;
                }
                attributes.push((definition.name.clone(), default.clone()));
            }
        }
        Ok(attributes)
    }

    fn check_attribute_value(&mut self, definition: &AttributeDefinition, value: &str) -> Result<()> {
        let name = &definition.name;
        match &definition.attribute_type {
            AttributeType::CData => {}
            AttributeType::Id => {
                if !is_valid_name(value) {
                    self.validity_error(format!("ID: value {value:?} of {name} is not a Name"))?;
                } else if !self.ids.insert(value.to_string()) {
                    self.validity_error(format!("ID: {value} identifies more than one element"))?;
                }
            }
            AttributeType::IdRef | AttributeType::IdRefs => {
                let many = definition.attribute_type == AttributeType::IdRefs;
                if Self::tokens_match(value, many, is_valid_name) {
                    for token in value.split(' ') {
                        let _ = self.idrefs.insert(token.to_string());
                    }
                } else {
                    self.validity_error(format!(
                        "IDREF: value {value:?} of {name} does not match {}",
                        if many { "Names" } else { "Name" }
                    ))?;
                }
            }
            AttributeType::Entity | AttributeType::Entities => {
                let many = definition.attribute_type == AttributeType::Entities;
                let unparsed = |token: &str| {
                    self.dtd
                        .as_ref()
                        .and_then(|dtd| dtd.general_entity(token))
                        .is_some_and(DeclaredEntity::is_unparsed)
                };
                let ok = Self::tokens_match(value, many, is_valid_name)
                    && value.split(' ').all(unparsed);
                if !ok {
                    self.validity_error(format!(
                        "Entity Name: value {value:?} of {name} does not name an unparsed entity"
                    ))?;
                }
            }
            AttributeType::NmToken | AttributeType::NmTokens => {
                let many = definition.attribute_type == AttributeType::NmTokens;
                if !Self::tokens_match(value, many, is_valid_nmtoken) {
                    self.validity_error(format!(
                        "Name Token: value {value:?} of {name} does not match {}",
                        if many { "Nmtokens" } else { "Nmtoken" }
                    ))?;
                }
            }
            AttributeType::Notation(names) => {
                if !names.iter().any(|notation| notation == value) {
                    self.validity_error(format!(
                        "Notation Attributes: {value:?} is not one of the notations of {name}"
                    ))?;
                }
            }
            AttributeType::Enumeration(tokens) => {
                if !tokens.iter().any(|token| token == value) {
                    self.validity_error(format!(
                        "Enumeration: {value:?} is not one of the values of {name}"
                    ))?;
                }
            }
        }
        if definition.presence == Presence::Fixed
            && definition.default_value.as_deref() != Some(value)
        {
            self.validity_error(format!(
                "Fixed Attribute Default: {name} must have the value {:?}",
                definition.default_value.as_deref().unwrap_or_default()
            ))?;
        }
        Ok(())
    }

    /// True if `value` is one token, or with `many` a space separated list
    /// of tokens, each accepted by `valid`.
    fn tokens_match(value: &str, many: bool, valid: fn(&str) -> bool) -> bool {
        if many {
            !value.is_empty() && value.split(' ').all(valid)
        } else {
            valid(value)
        }
    }

    /// [VC: Element Valid] for a child element `name` of the current
    /// element, and [VC: Root Element Type] when there is none.
    pub(super) fn check_child_element(&mut self, name: &str) -> Result<()> {
        if !self.validating() {
            return Ok(());
        }
        let Some(dtd) = &self.dtd else {
            return Ok(());
        };
        let declared = dtd.element_type(name).is_some();
        if self.open.is_empty() {
            if dtd.name != name {
                let root = dtd.name.clone();
                self.validity_error(format!(
                    "Root Element Type: root element <{name}> does not match the document type {root}"
                ))?;
            }
        } else {
            let refused = self
                .open
                .last_mut()
                .and_then(|parent| parent.cursor.as_mut())
                .is_some_and(|cursor| !cursor.next(name));
            if refused {
                let parent = self.open_name();
                let expected = self
                    .open
                    .last()
                    .and_then(|open| open.cursor.as_ref())
                    .map(|cursor| cursor.expected(&parent).join(", "))
                    .unwrap_or_default();
                self.validity_error(format!(
                    "Element Valid: <{name}> not allowed here in <{parent}>, expected {expected}"
                ))?;
            }
        }
        if !declared {
            self.validity_error(format!("Element Valid: element type {name} is not declared"))?;
        }
        Ok(())
    }

    /// [VC: IDREF] every referenced ID exists. Run at the end of the
    /// document.
    pub(super) fn check_idrefs(&mut self) -> Result<()> {
        if !self.validating() {
            return Ok(());
        }
        let missing: Vec<String> = self
            .idrefs
            .iter()
            .filter(|idref| !self.ids.contains(*idref))
            .cloned()
            .collect();
        for idref in missing {
            self.validity_error(format!("IDREF: no element has the ID {idref}"))?;
        }
        Ok(())
    }

    /// Checks on a new attribute definition against those already declared
    /// for `element`.
    pub(super) fn check_attribute_definition(
        &mut self,
        element: &str,
        definition: &AttributeDefinition,
    ) -> Result<()> {
        if !self.validating() {
            return Ok(());
        }
        let existing: Vec<AttributeDefinition> = self
            .dtd
            .as_ref()
            .map(|dtd| dtd.attribute_list(element).to_vec())
            .unwrap_or_default();
        if existing.iter().any(|other| other.name == definition.name) {
            return Ok(());
        }
        let name = &definition.name;
        match &definition.attribute_type {
            AttributeType::Id => {
                if !matches!(definition.presence, Presence::Implied | Presence::Required) {
                    self.validity_error(format!(
                        "ID Attribute Default: ID attribute {name} of {element} must be #IMPLIED or #REQUIRED"
                    ))?;
                }
                if existing.iter().any(|other| other.attribute_type == AttributeType::Id) {
                    self.validity_error(format!(
                        "One ID per Element Type: {element} has more than one ID attribute"
                    ))?;
                }
            }
            AttributeType::Notation(_) => {
                if existing
                    .iter()
                    .any(|other| matches!(other.attribute_type, AttributeType::Notation(_)))
                {
                    self.validity_error(format!(
                        "One Notation Per Element Type: {element} has more than one NOTATION attribute"
                    ))?;
                }
            }
            _ => {}
        }
        if let Some(default) = &definition.default_value {
            self.check_default_syntax(definition, default)?;
        }
        Ok(())
    }

    /// [VC: Attribute Default Value Syntactically Correct]
    fn check_default_syntax(&mut self, definition: &AttributeDefinition, value: &str) -> Result<()> {
        let ok = match &definition.attribute_type {
            AttributeType::CData => true,
            AttributeType::Id | AttributeType::IdRef | AttributeType::Entity => is_valid_name(value),
            AttributeType::IdRefs | AttributeType::Entities => {
                Self::tokens_match(value, true, is_valid_name)
            }
            AttributeType::NmToken => is_valid_nmtoken(value),
            AttributeType::NmTokens => Self::tokens_match(value, true, is_valid_nmtoken),
            AttributeType::Notation(names) | AttributeType::Enumeration(names) => {
                names.iter().any(|token| token == value)
            }
        };
        if ok {
            return Ok(());
        }
        self.validity_error(format!(
            "Attribute Default Value Syntactically Correct: {value:?} is not a valid {} value for {}",
            definition.attribute_type, definition.name
        ))
    }

    /// Constraints checked once the document type declaration is complete:
    /// notations used by attributes and unparsed entities are declared, and
    /// EMPTY elements have no NOTATION attribute.
    pub(super) fn check_dtd(&mut self) -> Result<()> {
        let Some(dtd) = &self.dtd else {
            return Ok(());
        };
        let mut messages = Vec::new();
        for (element, definitions) in dtd.attribute_lists() {
            for definition in definitions {
                let AttributeType::Notation(names) = &definition.attribute_type else {
                    continue;
                };
                if dtd
                    .element_type(element)
                    .is_some_and(|element_type| element_type.category == ContentCategory::Empty)
                {
                    messages.push(format!(
                        "No Notation on Empty Element: EMPTY element type {element} has NOTATION attribute {}",
                        definition.name
                    ));
                }
                for name in names.iter().filter(|name| dtd.notation(name).is_none()) {
                    messages.push(format!(
                        "Notation Attributes: notation {name} of {element}/{} is not declared",
                        definition.name
                    ));
                }
            }
        }
        for entity in dtd.general_entity_names().filter_map(|name| dtd.general_entity(name)) {
            if let Some(notation) = &entity.notation {
                if dtd.notation(notation).is_none() {
                    messages.push(format!(
                        "Notation Declared: notation {notation} of entity {} is not declared",
                        entity.name
                    ));
                }
            }
        }
        messages.sort();
        for message in messages {
            self.validity_error(message)?;
        }
        Ok(())
    }
}
