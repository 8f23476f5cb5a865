//! Tests for tree construction, text merging and serialization.

use marten_dom::{DomTree, ElementData, NodeId, NodeType, to_xml};

/// Helper to create an element node and return its NodeId.
fn alloc_element(tree: &mut DomTree, tag: &str) -> NodeId {
    tree.alloc(NodeType::Element(ElementData::new(tag)))
}

// ========== append_child ==========

#[test]
fn test_append_child_links_siblings() {
    let mut tree = DomTree::new();
    let parent = alloc_element(&mut tree, "list");
    tree.append_child(NodeId::ROOT, parent);

    let a = alloc_element(&mut tree, "a");
    let b = alloc_element(&mut tree, "b");
    tree.append_child(parent, a);
    tree.append_child(parent, b);

    assert_eq!(tree.children(parent), &[a, b]);
    assert_eq!(tree.next_sibling(a), Some(b));
    assert_eq!(tree.prev_sibling(b), Some(a));
    assert_eq!(tree.parent(b), Some(parent));
    assert_eq!(tree.document_element(), Some(parent));
}

#[test]
fn test_ancestors_walks_to_document() {
    let mut tree = DomTree::new();
    let outer = tree.append_element(NodeId::ROOT, "outer");
    let inner = tree.append_element(outer, "inner");
    let ancestors: Vec<NodeId> = tree.ancestors(inner).collect();
    assert_eq!(ancestors, vec![outer, NodeId::ROOT]);
}

// ========== append_text ==========

#[test]
fn test_append_text_merges_adjacent_runs() {
    let mut tree = DomTree::new();
    let p = tree.append_element(NodeId::ROOT, "p");
    let first = tree.append_text(p, "hi ");
    let second = tree.append_text(p, "& bye");
    assert_eq!(first, second);
    assert_eq!(tree.children(p).len(), 1);
    assert_eq!(tree.as_text(first), Some("hi & bye"));
}

#[test]
fn test_append_text_after_element_starts_new_run() {
    let mut tree = DomTree::new();
    let p = tree.append_element(NodeId::ROOT, "p");
    let _ = tree.append_text(p, "a");
    let _ = tree.append_element(p, "br");
    let _ = tree.append_text(p, "b");
    assert_eq!(tree.children(p).len(), 3);
    assert_eq!(tree.text_content(p), "ab");
}

// ========== attributes ==========

#[test]
fn test_set_attribute_only_on_elements() {
    let mut tree = DomTree::new();
    let e = tree.append_element(NodeId::ROOT, "e");
    let t = tree.append_text(e, "x");
    assert!(tree.set_attribute(e, "id", "e1"));
    assert!(!tree.set_attribute(t, "id", "t1"));
    assert_eq!(tree.as_element(e).unwrap().attribute("id"), Some("e1"));
}

// ========== serialization ==========

#[test]
fn test_to_xml_escapes_and_orders_attributes() {
    let mut tree = DomTree::new();
    let a = tree.append_element(NodeId::ROOT, "a");
    assert!(tree.set_attribute(a, "z", "\"q\"\t"));
    assert!(tree.set_attribute(a, "x", "1 < 2"));
    let _ = tree.append_text(a, "hi & bye\r");
    let _ = tree.append_element(a, "b");
    assert_eq!(
        to_xml(&tree, NodeId::ROOT),
        "<a x=\"1 &lt; 2\" z=\"&quot;q&quot;&#x9;\">hi &amp; bye&#xD;<b/></a>"
    );
}

#[test]
fn test_to_xml_comments_and_processing_instructions() {
    let mut tree = DomTree::new();
    let pi = tree.alloc(NodeType::ProcessingInstruction {
        target: "render".to_string(),
        data: "fast".to_string(),
    });
    tree.append_child(NodeId::ROOT, pi);
    let root = tree.append_element(NodeId::ROOT, "r");
    let comment = tree.alloc(NodeType::Comment(" note ".to_string()));
    tree.append_child(root, comment);
    assert_eq!(to_xml(&tree, NodeId::ROOT), "<?render fast?><r><!-- note --></r>");
}
