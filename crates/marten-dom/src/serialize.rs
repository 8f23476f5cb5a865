//! Plain XML serialization of a [`DomTree`].
//!
//! Output is canonical enough for round-trip comparison: attributes in name
//! order, no pretty-printing, character data escaped so that re-parsing
//! yields the same characters.

use std::fmt::Write;

use crate::{DomTree, NodeId, NodeType};

/// Serialize `id` and its descendants.
///
/// Serializing [`NodeId::ROOT`] writes the document's children (no XML
/// declaration is emitted).
#[must_use]
pub fn to_xml(tree: &DomTree, id: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, id, &mut out);
    out
}

fn write_node(tree: &DomTree, id: NodeId, out: &mut String) {
    let Some(node) = tree.get(id) else {
        return;
    };
    match &node.node_type {
        NodeType::Document => {
            for &child in &node.children {
                write_node(tree, child, out);
            }
        }
        NodeType::Element(data) => {
            out.push('<');
            out.push_str(&data.tag_name);
            for (name, value) in &data.attrs {
                let _ = write!(out, " {name}=\"{}\"", escape_attribute_value(value));
            }
            if node.children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for &child in &node.children {
                    write_node(tree, child, out);
                }
                let _ = write!(out, "</{}>", data.tag_name);
            }
        }
        NodeType::Text(text) => out.push_str(&escape_char_data(text)),
        NodeType::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        NodeType::ProcessingInstruction { target, data } => {
            if data.is_empty() {
                let _ = write!(out, "<?{target}?>");
            } else {
                let _ = write!(out, "<?{target} {data}?>");
            }
        }
    }
}

/// Escape character data for element content.
///
/// `&`, `<` and `>` become entity references; carriage returns become
/// `&#xD;` so end-of-line normalization does not alter them on re-parse.
#[must_use]
pub fn escape_char_data(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value for a double-quoted literal.
///
/// White space other than the space character is written as a character
/// reference, otherwise attribute-value normalization would turn it into a
/// space.
#[must_use]
pub fn escape_attribute_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}
