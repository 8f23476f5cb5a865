//! Integration tests for documents, content and the compatibility modes.

use marten_dom::{DomTree, NodeId, NodeType, escape_attribute_value, escape_char_data, to_xml};
use marten_xml::chars::is_char;
use marten_xml::{
    DiagnosticKind, Encoding, EncodingError, ParserOptions, XmlError, XmlParser, parse_bytes,
    parse_tree,
};
use quickcheck_macros::quickcheck;

/// Helper to parse a strict document into a tree, panicking on error
fn parse(xml: &str) -> DomTree {
    parse_with(xml, ParserOptions::default())
}

fn parse_with(xml: &str, options: ParserOptions) -> DomTree {
    match parse_tree(xml, options) {
        Ok((tree, _)) => tree,
        Err(e) => panic!("failed to parse {xml:?}: {e}"),
    }
}

/// Helper to get the root element
fn root(tree: &DomTree) -> NodeId {
    tree.document_element().expect("document has no root element")
}

fn tag(tree: &DomTree, id: NodeId) -> &str {
    &tree.as_element(id).expect("not an element").tag_name
}

// ========== documents ==========

#[test]
fn test_declaration_attribute_and_mixed_content() {
    let (tree, report) = parse_tree(
        r#"<?xml version="1.0" encoding="UTF-8"?><a x="1">hi &amp; bye<b/></a>"#,
        ParserOptions::default(),
    )
    .unwrap();

    let a = root(&tree);
    assert_eq!(tag(&tree, a), "a");
    assert_eq!(tree.as_element(a).unwrap().attribute("x"), Some("1"));

    let children = tree.children(a);
    assert_eq!(children.len(), 2);
    assert_eq!(tree.as_text(children[0]), Some("hi & bye"));
    assert_eq!(tag(&tree, children[1]), "b");
    assert!(tree.children(children[1]).is_empty());

    let declaration = report.declaration.unwrap();
    assert_eq!(declaration.version, "1.0");
    assert_eq!(declaration.encoding.as_deref(), Some("UTF-8"));
    assert!(!declaration.standalone);
    assert_eq!(report.valid, None);
}

#[test]
fn test_predefined_entities_are_not_reparsed() {
    let tree = parse("<a>&amp;&lt;</a>");
    let a = root(&tree);
    assert_eq!(tree.children(a).len(), 1);
    assert_eq!(tree.text_content(a), "&<");
}

#[test]
fn test_character_references() {
    let tree = parse("<a>&#65;&#x42;&#x1F600;</a>");
    assert_eq!(tree.text_content(root(&tree)), "AB\u{1F600}");
}

#[test]
fn test_percent_in_content_is_data() {
    let tree = parse("<!DOCTYPE a [<!ENTITY % p 'x'>]><a>%p;</a>");
    assert_eq!(tree.text_content(root(&tree)), "%p;");
}

#[test]
fn test_cdata_section_is_literal() {
    let tree = parse("<a><![CDATA[<b>&amp;</b>]]></a>");
    assert_eq!(tree.text_content(root(&tree)), "<b>&amp;</b>");
}

#[test]
fn test_comments_and_processing_instructions() {
    let tree = parse("<?style sheet?><a><!-- note --><?app do it?></a><!--end-->");
    let top = tree.children(NodeId::ROOT);
    assert_eq!(top.len(), 3);
    assert!(matches!(
        &tree.get(top[0]).unwrap().node_type,
        NodeType::ProcessingInstruction { target, data } if target == "style" && data == "sheet"
    ));
    assert!(matches!(
        &tree.get(top[2]).unwrap().node_type,
        NodeType::Comment(text) if text == "end"
    ));

    let inner = tree.children(top[1]);
    assert!(matches!(
        &tree.get(inner[0]).unwrap().node_type,
        NodeType::Comment(text) if text == " note "
    ));
    assert!(matches!(
        &tree.get(inner[1]).unwrap().node_type,
        NodeType::ProcessingInstruction { target, data } if target == "app" && data == "do it"
    ));
}

#[test]
fn test_attribute_whitespace_becomes_spaces() {
    let tree = parse("<a title=\"one\ttwo\nthree&#10;four\"/>");
    assert_eq!(
        tree.as_element(root(&tree)).unwrap().attribute("title"),
        Some("one two three\nfour")
    );
}

#[test]
fn test_crlf_normalized_in_content() {
    let tree = parse("<a>one\r\ntwo\rthree</a>");
    assert_eq!(tree.text_content(root(&tree)), "one\ntwo\nthree");
}

// ========== well-formedness errors ==========

#[test]
fn test_mismatched_end_tag_is_fatal() {
    let result = parse_tree("<a><b></a></b>", ParserOptions::default());
    assert!(matches!(result, Err(XmlError::WellFormed { ref message, .. })
        if message.starts_with("Element Type Match")));
}

#[test]
fn test_error_position_counts_normalized_lines() {
    let Err(error) = parse_tree("<a>\r\n<b>\r\n</c></a>", ParserOptions::default()) else {
        panic!("mismatched end tag accepted");
    };
    assert_eq!(error.position().map(|p| p.line), Some(3));
}

#[test]
fn test_well_formedness_violations() {
    for xml in [
        "",
        "   ",
        "<a>",
        "<a x=1/>",
        "<a x='1' x='2'/>",
        "<a>]]></a>",
        "<a><!-- a -- b --></a>",
        "<a/><b/>",
        "<a>&unknown;</a>",
        "<a><?xml version='1.0'?></a>",
        "<a>\u{1}</a>",
        "<a x='<'/>",
    ] {
        let result = parse_tree(xml, ParserOptions::default());
        assert!(
            result.as_ref().is_err_and(XmlError::is_well_formedness),
            "{xml:?} gave {:?}",
            result.map(|(tree, _)| to_xml(&tree, NodeId::ROOT))
        );
    }
}

#[test]
fn test_illegal_characters_in_markup() {
    for xml in [
        "<a><!-- \u{1} --></a>",
        "<a x=\"\u{1}\"/>",
        "<a><![CDATA[\u{1}]]></a>",
        "<a><?t \u{1}?></a>",
        "<!DOCTYPE a [<!ENTITY e \"\u{1}\">]><a/>",
    ] {
        let result = parse_tree(xml, ParserOptions::default());
        assert!(
            matches!(result, Err(XmlError::WellFormed { ref message, .. })
                if message.starts_with("[2] Char")),
            "{xml:?} accepted"
        );
        let loose = ParserOptions::default().with_loose_parsing(true);
        assert!(parse_tree(xml, loose).is_ok(), "{xml:?} rejected in loose mode");
    }
}

// ========== compatibility modes ==========

#[test]
fn test_loose_parsing_treats_stray_markup_as_data() {
    let options = ParserOptions::default().with_loose_parsing(true);
    let tree = parse_with("<a>1 < 2 & 3</a>", options);
    assert_eq!(tree.text_content(root(&tree)), "1 < 2 & 3");
}

#[test]
fn test_loose_parsing_keeps_last_duplicate_attribute() {
    let options = ParserOptions::default().with_loose_parsing(true);
    let tree = parse_with("<a x='1' x='2'>t</a>", options);
    assert_eq!(tree.as_element(root(&tree)).unwrap().attribute("x"), Some("2"));
}

#[test]
fn test_sgml_names_fold_and_short_attributes() {
    let tree = parse_with("<TABLE><TD NOWRAP>x</td></table>", ParserOptions::sgml());
    let table = root(&tree);
    assert_eq!(tag(&tree, table), "table");
    let td = tree.children(table)[0];
    assert_eq!(tag(&tree, td), "td");
    assert_eq!(tree.as_element(td).unwrap().attribute("nowrap"), Some("nowrap"));
}

#[test]
fn test_omitted_end_tag_at_end_of_input() {
    let tree = parse_with("<p>unterminated", ParserOptions::sgml());
    assert_eq!(tree.text_content(root(&tree)), "unterminated");
    assert!(parse_tree("<p>unterminated", ParserOptions::default()).is_err());
}

#[test]
fn test_unicode_line_separators() {
    let options = ParserOptions::default().with_unicode_compatibility(true);
    let tree = parse_with("<a>x\u{2028}y\u{2029}z</a>", options);
    assert_eq!(tree.text_content(root(&tree)), "x\ny z");
}

// ========== encodings ==========

#[test]
fn test_declared_latin1_switches_decoding() {
    let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>caf".to_vec();
    bytes.extend_from_slice(&[0xE9]);
    bytes.extend_from_slice(b"</a>");
    let mut tree = DomTree::new();
    let report = parse_bytes(bytes, &mut tree, ParserOptions::default()).unwrap();
    assert_eq!(tree.text_content(root(&tree)), "caf\u{E9}");
    assert_eq!(
        report.declaration.and_then(|d| d.encoding).as_deref(),
        Some("ISO-8859-1")
    );
}

#[test]
fn test_utf16_with_byte_order_mark() {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in "<a>\u{E9}t\u{E9}</a>".encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let mut tree = DomTree::new();
    let _ = parse_bytes(bytes, &mut tree, ParserOptions::default()).unwrap();
    assert_eq!(tree.text_content(root(&tree)), "\u{E9}t\u{E9}");
}

#[test]
fn test_unknown_declared_encoding() {
    let bytes = b"<?xml version=\"1.0\" encoding=\"EBCDIC-US\"?><a/>".to_vec();
    let mut tree = DomTree::new();
    let result = parse_bytes(bytes, &mut tree, ParserOptions::default());
    assert!(matches!(
        result,
        Err(XmlError::Encoding(EncodingError::Unsupported(ref name))) if name == "EBCDIC-US"
    ));
}

#[test]
fn test_missing_declaration_reported_as_processing_error() {
    let bytes = b"<a>caf\xE9</a>".to_vec();
    let mut tree = DomTree::new();
    let report = XmlParser::from_bytes(bytes, Some(Encoding::Latin1), &mut tree)
        .unwrap()
        .with_options(ParserOptions::default().with_all_errors(true))
        .parse_document()
        .unwrap();
    assert!(
        report
            .diagnostics_of(DiagnosticKind::Processing)
            .any(|d| d.message.contains("no encoding declaration"))
    );
}

// ========== options ==========

#[test]
fn test_options_deserialize_with_defaults() {
    let options: ParserOptions =
        serde_json::from_str(r#"{"check_validity": true, "max_depth": 64}"#).unwrap();
    assert!(options.check_validity);
    assert!(!options.sgml_omittag);
    assert_eq!(options.max_depth, 64);

    let json = serde_json::to_string(&ParserOptions::sgml()).unwrap();
    let back: ParserOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ParserOptions::sgml());
}

// ========== round trip ==========

/// Serializing a parsed tree and parsing it again gives the same tree.
#[quickcheck]
fn prop_serialized_tree_reparses_identically(text: String, value: String) -> bool {
    let text: String = text.chars().filter(|&c| is_char(c)).collect();
    let value: String = value.chars().filter(|&c| is_char(c)).collect();
    let xml = format!(
        "<r v=\"{}\">{}<e>{}</e></r>",
        escape_attribute_value(&value),
        escape_char_data(&text),
        escape_char_data(&text)
    );
    let Ok((first, _)) = parse_tree(&xml, ParserOptions::default()) else {
        return false;
    };
    let serialized = to_xml(&first, NodeId::ROOT);
    let Ok((second, _)) = parse_tree(&serialized, ParserOptions::default()) else {
        return false;
    };
    let r = second.document_element();
    to_xml(&second, NodeId::ROOT) == serialized
        && r.and_then(|r| second.as_element(r))
            .and_then(|data| data.attribute("v"))
            == Some(value.as_str())
        && r.is_some_and(|r| second.text_content(r) == format!("{text}{text}"))
}
