//! The contract between the parser and the object model it builds.
//!
//! The parser never inspects the output tree; it calls an
//! [`ElementBuilder`] to create children, add data and set attributes. With
//! tag omission enabled it also asks the builder which child it would
//! accept in a given context, so that an HTML-like model can have missing
//! start and end tags inferred.

use std::fmt;

use thiserror::Error;

use crate::dtd::{Declaration, ExternalId};

/// What the parser wants to place in an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildClass<C> {
    /// Bare character data.
    Data,
    /// A child element of the given class.
    Element(C),
}

/// Result of handing character data to the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOutcome {
    /// The data was added to the node.
    Accepted,
    /// The node does not take data here.
    Rejected,
}

/// SGML content types an element class may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentKind {
    /// Elements and data.
    #[default]
    Mixed,
    /// Elements only; data triggers tag-omission negotiation.
    ElementOnly,
    /// No content and no end tag, e.g. `<br>`.
    Empty,
    /// Raw text up to the first `</`, e.g. `<script>`.
    CData,
}

/// An attribute value the builder could not decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bad value {value:?} for attribute {name}: {reason}")]
pub struct AttributeValueError {
    /// The attribute name.
    pub name: String,
    /// The value as parsed.
    pub value: String,
    /// Why it was refused.
    pub reason: String,
}

impl AttributeValueError {
    /// Construct an error for `name="value"`.
    #[must_use]
    pub fn new(name: &str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Callbacks the parser makes while reading a document.
///
/// Only the node and class plumbing is required; the remaining hooks have
/// defaults that ignore the event or accept the proposal.
pub trait ElementBuilder {
    /// Handle to a node of the tree being built.
    type Node: Copy + PartialEq + fmt::Debug;
    /// The type of element the builder will create for a tag.
    type Class: Clone + PartialEq + fmt::Debug;

    /// The document node, parent of the root element.
    fn document(&self) -> Self::Node;

    /// The class a start tag called `name` maps to inside `context`.
    fn element_class(&mut self, context: Self::Node, name: &str) -> Self::Class;

    /// Tag-omission negotiation: what would `context` accept, given that
    /// `proposed` arrived?
    ///
    /// - the proposal itself: accept as-is;
    /// - a different element class: open that class as an implied child
    ///   and reconsider the proposal inside it;
    /// - `None`: `context` is finished, the proposal goes to its parent.
    fn accept_child(
        &mut self,
        context: Self::Node,
        proposed: &ChildClass<Self::Class>,
    ) -> Option<ChildClass<Self::Class>> {
        let _ = context;
        Some(proposed.clone())
    }

    /// Create a child of `context`. `name` is the tag name as written, or
    /// `None` for an element whose start tag was omitted.
    fn create_child(
        &mut self,
        context: Self::Node,
        class: &Self::Class,
        name: Option<&str>,
    ) -> Self::Node;

    /// The tag name of `node`, matched against end tags.
    fn element_name(&self, node: Self::Node) -> Option<String>;

    /// Append character data to `node`.
    fn add_data(&mut self, node: Self::Node, data: &str) -> DataOutcome;

    /// Decode and store one attribute.
    ///
    /// # Errors
    ///
    /// Returns an [`AttributeValueError`] if the value cannot be decoded;
    /// the parser reports it as a validity error.
    fn set_attribute(
        &mut self,
        node: Self::Node,
        name: &str,
        value: &str,
    ) -> Result<(), AttributeValueError>;

    /// A processing instruction inside `node` (or the document).
    fn processing_instruction(&mut self, node: Self::Node, target: &str, data: &str) {
        let _ = (node, target, data);
    }

    /// A comment inside `node` (or the document).
    fn comment(&mut self, node: Self::Node, text: &str) {
        let _ = (node, text);
    }

    /// The SGML content type of elements of `class`, consulted when SGML
    /// content handling is enabled.
    fn content_kind(&self, class: &Self::Class) -> ContentKind {
        let _ = class;
        ContentKind::Mixed
    }

    /// True if `node` takes character data directly. References and CDATA
    /// sections in a node that does not are negotiated before they are
    /// read.
    fn is_mixed(&self, node: Self::Node) -> bool {
        let _ = node;
        true
    }

    /// `node` has received all of its content.
    fn content_finished(&mut self, node: Self::Node) {
        let _ = node;
    }

    /// The XML declaration of the document entity.
    fn declaration(&mut self, declaration: &Declaration) {
        let _ = declaration;
    }

    /// The document type declaration.
    fn doctype(&mut self, name: &str, external_id: Option<&ExternalId>) {
        let _ = (name, external_id);
    }
}
