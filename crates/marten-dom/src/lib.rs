//! Generic XML tree for the Marten parser.
//!
//! This crate provides an arena-based tree structure following the
//! [XML Information Set](https://www.w3.org/TR/xml-infoset/): a document
//! item owning elements, character data, comments and processing
//! instructions.
//!
//! # Design
//!
//! The tree uses arena allocation with [`NodeId`] indices for all relationships,
//! providing O(1) access and traversal without borrow checker issues.

use std::collections::BTreeMap;

mod serialize;

pub use serialize::{escape_attribute_value, escape_char_data, to_xml};

/// Map of attribute names to values for an element.
///
/// Ordered by name so serialization is deterministic.
pub type AttributesMap = BTreeMap<String, String>;

/// A type-safe index into the tree.
///
/// NodeId provides O(1) access to any node in the tree without borrowing issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The root document node is always at index 0.
    pub const ROOT: Self = Self(0);
}

/// [§ 2.1 The Document Information Item](https://www.w3.org/TR/xml-infoset/#infoitem.document)
///
/// A node stores indices for parent/child/sibling relationships,
/// enabling O(1) traversal in any direction.
#[derive(Debug, Clone)]
pub struct Node {
    /// What kind of information item this node is.
    pub node_type: NodeType,

    /// "[parent] The document or element information item which contains
    /// this information item in its [children] property."
    pub parent: Option<NodeId>,

    /// "[children] An ordered list of child information items, in document
    /// order."
    pub children: Vec<NodeId>,

    /// The child immediately following this one in its parent's children.
    pub next_sibling: Option<NodeId>,

    /// The child immediately preceding this one in its parent's children.
    pub prev_sibling: Option<NodeId>,
}

/// The information item kinds the parser produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeType {
    /// [§ 2.1 The Document Information Item](https://www.w3.org/TR/xml-infoset/#infoitem.document)
    Document,
    /// [§ 2.2 Element Information Items](https://www.w3.org/TR/xml-infoset/#infoitem.element)
    Element(ElementData),
    /// [§ 2.6 Character Information Items](https://www.w3.org/TR/xml-infoset/#infoitem.character)
    ///
    /// Adjacent characters are stored as a single run.
    Text(String),
    /// [§ 2.7 Comment Information Items](https://www.w3.org/TR/xml-infoset/#infoitem.comment)
    Comment(String),
    /// [§ 2.4 Processing Instruction Information Items](https://www.w3.org/TR/xml-infoset/#infoitem.pi)
    ProcessingInstruction {
        /// "[target] A string representing the target part of the
        /// processing instruction (an XML name)."
        target: String,
        /// "[content] A string representing the content of the processing
        /// instruction, excluding the target and any white space
        /// immediately following it."
        data: String,
    },
}

/// Element-specific data.
///
/// NOTE: Namespaces are not processed; `tag_name` is the qualified name as
/// written in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// The element type name.
    pub tag_name: String,
    /// "[attributes] An unordered set of attribute information items"
    pub attrs: AttributesMap,
}

impl ElementData {
    /// Create element data with no attributes.
    #[must_use]
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            attrs: AttributesMap::new(),
        }
    }

    /// Returns the value of the named attribute, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// Arena-based tree with O(1) node access and traversal.
///
/// This structure stores all nodes in a contiguous vector, using indices
/// for all relationships. This provides:
/// - O(1) access to any node by NodeId
/// - O(1) parent/sibling traversal
/// - No borrowing issues (indices instead of references)
#[derive(Debug, Clone)]
pub struct DomTree {
    /// All nodes in the tree, indexed by NodeId.
    /// The Document node is always at index 0 (NodeId::ROOT).
    nodes: Vec<Node>,
}

impl DomTree {
    /// Create a new tree with just the Document node.
    #[must_use]
    pub fn new() -> Self {
        let document = Node {
            node_type: NodeType::Document,
            parent: None,
            children: Vec::new(),
            next_sibling: None,
            prev_sibling: None,
        };
        Self {
            nodes: vec![document],
        }
    }

    /// Get a node by its ID.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Get a mutable reference to a node by its ID.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Get the number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree is empty (should always have at least the Document).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a new node and return its ID.
    /// The node is not yet attached to the tree.
    pub fn alloc(&mut self, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            node_type,
            parent: None,
            children: Vec::new(),
            next_sibling: None,
            prev_sibling: None,
        });
        id
    }

    /// Appends `child` as the last child of `parent`, updating all relationships.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        // Get the current last child of parent (if any) to set up sibling links
        let prev_last_child = self.nodes[parent.0].children.last().copied();

        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);

        if let Some(prev_id) = prev_last_child {
            self.nodes[prev_id.0].next_sibling = Some(child);
            self.nodes[child.0].prev_sibling = Some(prev_id);
        }
    }

    /// Allocate an element named `tag_name` and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag_name: &str) -> NodeId {
        let id = self.alloc(NodeType::Element(ElementData::new(tag_name)));
        self.append_child(parent, id);
        id
    }

    /// Append character data to `parent`.
    ///
    /// If the last child of `parent` is already a text node the data is
    /// merged into it, so a run of character data is always one node.
    /// Returns the text node that holds the data.
    pub fn append_text(&mut self, parent: NodeId, data: &str) -> NodeId {
        if let Some(last) = self.last_child(parent)
            && let Some(Node {
                node_type: NodeType::Text(text),
                ..
            }) = self.nodes.get_mut(last.0)
        {
            text.push_str(data);
            return last;
        }
        let id = self.alloc(NodeType::Text(data.to_string()));
        self.append_child(parent, id);
        id
    }

    /// Set an attribute on an element. Returns `false` if `id` is not an
    /// element.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        match self.nodes.get_mut(id.0).map(|n| &mut n.node_type) {
            Some(NodeType::Element(data)) => {
                let _ = data.attrs.insert(name.to_string(), value.to_string());
                true
            }
            _ => false,
        }
    }

    /// Get the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Get all children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Get the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.children.last().copied())
    }

    /// Get the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.next_sibling)
    }

    /// Get the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.prev_sibling)
    }

    /// Iterate over all ancestors of a node, from parent to root.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> AncestorIterator<'_> {
        AncestorIterator {
            tree: self,
            current: self.parent(id),
        }
    }

    /// Get element data if this node is an element.
    #[must_use]
    pub fn as_element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(|n| match &n.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        })
    }

    /// Get text content if this node is a text node.
    #[must_use]
    pub fn as_text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.node_type {
            NodeType::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Element children of a node, skipping text, comments and PIs.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.as_element(child).is_some())
    }

    /// The concatenated character data of a node and its descendants.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.get(id).map(|n| &n.node_type) {
            Some(NodeType::Text(text)) => out.push_str(text),
            Some(NodeType::Element(_) | NodeType::Document) => {
                for &child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
            _ => {}
        }
    }

    /// [§ 2.1](https://www.w3.org/TR/xml-infoset/#infoitem.document)
    ///
    /// "[document element] The element information item corresponding to
    /// the document element."
    #[must_use]
    pub fn document_element(&self) -> Option<NodeId> {
        self.child_elements(NodeId::ROOT).next()
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over ancestors of a node.
pub struct AncestorIterator<'a> {
    tree: &'a DomTree,
    current: Option<NodeId>,
}

impl Iterator for AncestorIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.tree.parent(id);
        Some(id)
    }
}
