//! [`ElementBuilder`] for the generic [`DomTree`].
//!
//! Every start tag becomes an element of that name, all data is accepted
//! and comments and processing instructions become nodes. Tag omission has
//! nothing to negotiate with this builder: it accepts every proposal.

use marten_dom::{DomTree, NodeId, NodeType};

use crate::builder::{AttributeValueError, DataOutcome, ElementBuilder};

impl ElementBuilder for DomTree {
    type Node = NodeId;
    type Class = String;

    fn document(&self) -> NodeId {
        NodeId::ROOT
    }

    fn element_class(&mut self, _context: NodeId, name: &str) -> String {
        name.to_string()
    }

    fn create_child(&mut self, context: NodeId, class: &String, name: Option<&str>) -> NodeId {
        self.append_element(context, name.unwrap_or(class))
    }

    fn element_name(&self, node: NodeId) -> Option<String> {
        self.as_element(node).map(|data| data.tag_name.clone())
    }

    fn add_data(&mut self, node: NodeId, data: &str) -> DataOutcome {
        // Character data outside the root element is white space and has
        // no place in the tree.
        if node != NodeId::ROOT {
            let _ = self.append_text(node, data);
        }
        DataOutcome::Accepted
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), AttributeValueError> {
        if DomTree::set_attribute(self, node, name, value) {
            Ok(())
        } else {
            Err(AttributeValueError::new(name, value, "not an element"))
        }
    }

    fn processing_instruction(&mut self, node: NodeId, target: &str, data: &str) {
        let pi = self.alloc(NodeType::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
        self.append_child(node, pi);
    }

    fn comment(&mut self, node: NodeId, text: &str) {
        let comment = self.alloc(NodeType::Comment(text.to_string()));
        self.append_child(node, comment);
    }
}
