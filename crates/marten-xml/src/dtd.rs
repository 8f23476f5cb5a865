//! The document type definition built while parsing the DTD subsets.
//!
//! [§ 2.8 Prolog and Document Type Declaration](https://www.w3.org/TR/xml/#sec-prolog-dtd)
//!
//! "The XML document type declaration contains or points to markup
//! declarations that provide a grammar for a class of documents."
//!
//! Every `declare_*` method keeps the first declaration of a name and
//! ignores later ones, matching "If the same entity is declared more than
//! once, the first declaration encountered is binding".

use std::collections::HashMap;
use std::sync::Arc;

use marten_common::url::Url;
use strum_macros::Display;

use crate::model::{Automaton, ContentParticle};

/// [75] ExternalID ::= 'SYSTEM' S SystemLiteral | 'PUBLIC' S PubidLiteral S SystemLiteral
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalId {
    /// The public identifier, whitespace-normalized.
    pub public_id: Option<String>,
    /// The system literal, unresolved.
    pub system_id: Option<String>,
}

impl ExternalId {
    /// An external id with only a system literal.
    #[must_use]
    pub fn system(system_id: &str) -> Self {
        Self {
            public_id: None,
            system_id: Some(system_id.to_string()),
        }
    }
}

/// [23] XMLDecl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// [24] VersionInfo, e.g. `1.0`.
    pub version: String,
    /// [80] EncodingDecl, as written.
    pub encoding: Option<String>,
    /// [32] SDDecl, false when absent.
    pub standalone: bool,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: None,
            standalone: false,
        }
    }
}

/// [77] TextDecl ::= '<?xml' VersionInfo? EncodingDecl S? '?>'
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextDeclaration {
    /// Optional version.
    pub version: Option<String>,
    /// The declared encoding.
    pub encoding: Option<String>,
}

/// The definition of a declared entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityDefinition {
    /// [9] EntityValue, with character and parameter-entity references
    /// already expanded.
    Internal(String),
    /// A reference to an external resource.
    External(ExternalId),
}

/// [70] EntityDecl, general or parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredEntity {
    /// The entity name.
    pub name: String,
    /// Replacement text or external id.
    pub definition: EntityDefinition,
    /// [76] NDataDecl, marks a general entity as unparsed.
    pub notation: Option<String>,
    /// The external entity in which this entity was declared, used to
    /// resolve relative system literals.
    pub base: Option<Url>,
    /// True if declared outside the document entity.
    pub external_declaration: bool,
}

impl DeclaredEntity {
    /// True for an external entity.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self.definition, EntityDefinition::External(_))
    }

    /// True for an unparsed entity, i.e. one with a notation.
    #[must_use]
    pub const fn is_unparsed(&self) -> bool {
        self.notation.is_some()
    }
}

/// [82] NotationDecl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notation {
    /// The notation name.
    pub name: String,
    /// System and/or public identifier.
    pub external_id: ExternalId,
}

/// [46] contentspec ::= 'EMPTY' | 'ANY' | Mixed | children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ContentCategory {
    /// `EMPTY`
    Empty,
    /// `ANY`
    Any,
    /// [51] Mixed
    Mixed,
    /// [47] children
    ElementContent,
}

/// [45] elementdecl
#[derive(Debug, Clone)]
pub struct ElementType {
    /// The element type name.
    pub name: String,
    /// Which kind of content the element has.
    pub category: ContentCategory,
    /// The content model, absent for `EMPTY` and `ANY`.
    pub model: Option<ContentParticle>,
    /// Matching automaton for the content model.
    pub automaton: Option<Arc<Automaton>>,
    /// True if declared outside the document entity.
    pub external_declaration: bool,
}

impl ElementType {
    /// Build an element type, compiling its content model.
    #[must_use]
    pub fn new(
        name: &str,
        category: ContentCategory,
        model: Option<ContentParticle>,
        external_declaration: bool,
    ) -> Self {
        let automaton = model.as_ref().map(|model| Arc::new(Automaton::new(model)));
        Self {
            name: name.to_string(),
            category,
            model,
            automaton,
            external_declaration,
        }
    }
}

/// [54]-[59] AttType
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum AttributeType {
    /// [55] StringType
    #[strum(serialize = "CDATA")]
    CData,
    /// [56] `ID`
    #[strum(serialize = "ID")]
    Id,
    /// [56] `IDREF`
    #[strum(serialize = "IDREF")]
    IdRef,
    /// [56] `IDREFS`
    #[strum(serialize = "IDREFS")]
    IdRefs,
    /// [56] `ENTITY`
    #[strum(serialize = "ENTITY")]
    Entity,
    /// [56] `ENTITIES`
    #[strum(serialize = "ENTITIES")]
    Entities,
    /// [56] `NMTOKEN`
    #[strum(serialize = "NMTOKEN")]
    NmToken,
    /// [56] `NMTOKENS`
    #[strum(serialize = "NMTOKENS")]
    NmTokens,
    /// [58] NotationType
    #[strum(serialize = "NOTATION")]
    Notation(Vec<String>),
    /// [59] Enumeration
    #[strum(serialize = "Enumeration")]
    Enumeration(Vec<String>),
}

impl AttributeType {
    /// True for every type except CDATA, whose values are not
    /// space-normalized.
    #[must_use]
    pub const fn is_tokenized(&self) -> bool {
        !matches!(self, Self::CData)
    }
}

/// [60] DefaultDecl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Presence {
    /// `#REQUIRED`
    Required,
    /// `#IMPLIED`
    Implied,
    /// `#FIXED` with a value.
    Fixed,
    /// A plain default value.
    Default,
}

/// [53] AttDef
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDefinition {
    /// The attribute name.
    pub name: String,
    /// The declared type.
    pub attribute_type: AttributeType,
    /// How the attribute may be omitted.
    pub presence: Presence,
    /// Present iff the presence is `Fixed` or `Default`.
    pub default_value: Option<String>,
    /// True if declared outside the document entity.
    pub external_declaration: bool,
}

/// [28] doctypedecl and everything declared in its subsets.
#[derive(Debug, Clone, Default)]
pub struct Dtd {
    /// The declared root element type name.
    pub name: String,
    /// The external subset, if any.
    pub external_id: Option<ExternalId>,
    general: HashMap<String, DeclaredEntity>,
    parameter: HashMap<String, DeclaredEntity>,
    notations: HashMap<String, Notation>,
    element_types: HashMap<String, ElementType>,
    /// Attribute definitions per element type, in declaration order.
    attribute_lists: HashMap<String, Vec<AttributeDefinition>>,
}

impl Dtd {
    /// An empty DTD for root element `name`.
    #[must_use]
    pub fn new(name: &str, external_id: Option<ExternalId>) -> Self {
        Self {
            name: name.to_string(),
            external_id,
            ..Self::default()
        }
    }

    /// Declare a general entity; the first declaration of a name wins.
    pub fn declare_general_entity(&mut self, entity: DeclaredEntity) {
        let _ = self.general.entry(entity.name.clone()).or_insert(entity);
    }

    /// Declare a parameter entity; the first declaration of a name wins.
    pub fn declare_parameter_entity(&mut self, entity: DeclaredEntity) {
        let _ = self.parameter.entry(entity.name.clone()).or_insert(entity);
    }

    /// Declare a notation; the first declaration of a name wins.
    pub fn declare_notation(&mut self, notation: Notation) {
        let _ = self.notations.entry(notation.name.clone()).or_insert(notation);
    }

    /// Declare an element type; the first declaration of a name wins.
    pub fn declare_element_type(&mut self, element_type: ElementType) {
        let _ = self
            .element_types
            .entry(element_type.name.clone())
            .or_insert(element_type);
    }

    /// Add an attribute definition to `element`'s list.
    ///
    /// "When more than one definition is provided for the same attribute of
    /// a given element type, the first declaration is binding and later
    /// declarations are ignored." Returns `false` if the attribute was
    /// already defined.
    pub fn declare_attribute(&mut self, element: &str, definition: AttributeDefinition) -> bool {
        let list = self.attribute_lists.entry(element.to_string()).or_default();
        if list.iter().any(|existing| existing.name == definition.name) {
            return false;
        }
        list.push(definition);
        true
    }

    /// Look up a general entity.
    #[must_use]
    pub fn general_entity(&self, name: &str) -> Option<&DeclaredEntity> {
        self.general.get(name)
    }

    /// Look up a parameter entity.
    #[must_use]
    pub fn parameter_entity(&self, name: &str) -> Option<&DeclaredEntity> {
        self.parameter.get(name)
    }

    /// Look up a notation.
    #[must_use]
    pub fn notation(&self, name: &str) -> Option<&Notation> {
        self.notations.get(name)
    }

    /// Look up an element type.
    #[must_use]
    pub fn element_type(&self, name: &str) -> Option<&ElementType> {
        self.element_types.get(name)
    }

    /// The attribute definitions of `element`, in declaration order.
    #[must_use]
    pub fn attribute_list(&self, element: &str) -> &[AttributeDefinition] {
        self.attribute_lists
            .get(element)
            .map_or(&[], Vec::as_slice)
    }

    /// One attribute definition of `element`.
    #[must_use]
    pub fn attribute(&self, element: &str, name: &str) -> Option<&AttributeDefinition> {
        self.attribute_list(element)
            .iter()
            .find(|definition| definition.name == name)
    }

    /// Every attribute list, keyed by element type name.
    pub fn attribute_lists(&self) -> impl Iterator<Item = (&str, &[AttributeDefinition])> {
        self.attribute_lists
            .iter()
            .map(|(element, list)| (element.as_str(), list.as_slice()))
    }

    /// Names of all declared general entities, for diagnostics.
    pub fn general_entity_names(&self) -> impl Iterator<Item = &str> {
        self.general.keys().map(String::as_str)
    }

    /// Iterate over declared element types.
    pub fn element_types(&self) -> impl Iterator<Item = &ElementType> {
        self.element_types.values()
    }

    /// Iterate over declared notations.
    pub fn notations(&self) -> impl Iterator<Item = &Notation> {
        self.notations.values()
    }
}
