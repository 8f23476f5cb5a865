//! Integration tests for tag omission negotiated with a custom builder,
//! the nesting guards and typed attribute decoding.

use marten_dom::{DomTree, NodeId};
use marten_xml::options::DEFAULT_MAX_DEPTH;
use marten_xml::schema::{AttributeSchema, AttributeSlot, decode_integer};
use marten_xml::{
    AttributeValueError, ChildClass, DataOutcome, DiagnosticKind, ElementBuilder, ParseReport,
    ParserOptions, Result, XmlError, XmlParser, parse_str, parse_tree,
};

/// An HTML-like builder over a [`DomTree`]: `BODY` takes no text, so text
/// in it opens an implied `P`, and a `P` ends where the next `P` starts.
#[derive(Default)]
struct HtmlBuilder {
    tree: DomTree,
    /// `P` also refuses text and asks for another `P` around it.
    runaway: bool,
    /// `DIV` in `BODY` asks for a `P`, which then refuses the `DIV`.
    wrap_div: bool,
}

impl HtmlBuilder {
    fn tag(&self, node: NodeId) -> Option<&str> {
        self.tree.as_element(node).map(|data| data.tag_name.as_str())
    }
}

impl ElementBuilder for HtmlBuilder {
    type Node = NodeId;
    type Class = String;

    fn document(&self) -> NodeId {
        NodeId::ROOT
    }

    fn element_class(&mut self, _context: NodeId, name: &str) -> String {
        name.to_ascii_uppercase()
    }

    fn accept_child(
        &mut self,
        context: NodeId,
        proposed: &ChildClass<String>,
    ) -> Option<ChildClass<String>> {
        let p = ChildClass::Element("P".to_string());
        match (self.tag(context), proposed) {
            (Some("BODY"), ChildClass::Data) => Some(p),
            (Some("BODY"), ChildClass::Element(class)) if self.wrap_div && class == "DIV" => Some(p),
            (Some("P"), ChildClass::Element(class)) if class == "P" || class == "DIV" => None,
            (Some("P"), ChildClass::Data) if self.runaway => Some(p),
            _ => Some(proposed.clone()),
        }
    }

    fn create_child(&mut self, context: NodeId, class: &String, _name: Option<&str>) -> NodeId {
        self.tree.append_element(context, class)
    }

    fn element_name(&self, node: NodeId) -> Option<String> {
        self.tag(node).map(str::to_string)
    }

    fn add_data(&mut self, node: NodeId, data: &str) -> DataOutcome {
        let rejected = match self.tag(node) {
            None => return DataOutcome::Accepted,
            Some("BODY") => true,
            Some("P") => self.runaway,
            Some(_) => false,
        };
        if rejected {
            return DataOutcome::Rejected;
        }
        let _ = self.tree.append_text(node, data);
        DataOutcome::Accepted
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> std::result::Result<(), AttributeValueError> {
        let _ = self.tree.set_attribute(node, name, value);
        Ok(())
    }

    fn is_mixed(&self, node: NodeId) -> bool {
        self.tag(node) != Some("BODY")
    }
}

/// Helper to parse with tag omission into an [`HtmlBuilder`]
fn parse_html(xml: &str, builder: &mut HtmlBuilder) -> Result<ParseReport> {
    parse_str(xml, builder, ParserOptions::default().with_omittag(true))
}

fn html(xml: &str) -> HtmlBuilder {
    let mut builder = HtmlBuilder::default();
    if let Err(e) = parse_html(xml, &mut builder) {
        panic!("failed to parse {xml:?}: {e}");
    }
    builder
}

fn child_tags(builder: &HtmlBuilder, node: NodeId) -> Vec<String> {
    builder
        .tree
        .child_elements(node)
        .filter_map(|child| builder.element_name(child))
        .collect()
}

// ========== tag omission ==========

#[test]
fn test_text_in_body_opens_paragraph() {
    let builder = html("<BODY>hello<P>world</P></BODY>");
    let tree = &builder.tree;
    let body = tree.document_element().unwrap();
    assert_eq!(child_tags(&builder, body), ["P", "P"]);

    let paragraphs: Vec<NodeId> = tree.child_elements(body).collect();
    assert_eq!(tree.text_content(paragraphs[0]), "hello");
    assert_eq!(tree.text_content(paragraphs[1]), "world");
}

#[test]
fn test_paragraph_ends_at_next_paragraph() {
    let builder = html("<BODY><P>one<P>two<P>three</BODY>");
    let body = builder.tree.document_element().unwrap();
    let texts: Vec<String> = builder
        .tree
        .child_elements(body)
        .map(|p| builder.tree.text_content(p))
        .collect();
    assert_eq!(texts, ["one", "two", "three"]);
}

#[test]
fn test_end_tag_closes_open_descendants() {
    let builder = html("<BODY><DIV><SPAN>x</BODY>");
    let tree = &builder.tree;
    let body = tree.document_element().unwrap();
    assert_eq!(child_tags(&builder, body), ["DIV"]);
    let div = tree.child_elements(body).next().unwrap();
    assert_eq!(child_tags(&builder, div), ["SPAN"]);
    assert_eq!(tree.text_content(div), "x");
}

#[test]
fn test_reference_in_body_is_negotiated() {
    let builder = html("<BODY>&amp; more</BODY>");
    let tree = &builder.tree;
    let body = tree.document_element().unwrap();
    assert_eq!(child_tags(&builder, body), ["P"]);
    let p = tree.child_elements(body).next().unwrap();
    assert_eq!(tree.text_content(p), "& more");
}

#[test]
fn test_white_space_in_body_is_dropped() {
    let builder = html("<BODY>\n  <P>text</P>\n</BODY>");
    let body = builder.tree.document_element().unwrap();
    assert_eq!(child_tags(&builder, body), ["P"]);
}

#[test]
fn test_without_omission_builder_is_not_asked() {
    let mut builder = HtmlBuilder::default();
    let report = parse_str(
        "<BODY>hello</BODY>",
        &mut builder,
        ParserOptions::default().with_validity(true),
    )
    .unwrap();
    let body = builder.tree.document_element().unwrap();
    assert!(child_tags(&builder, body).is_empty());
    assert!(
        report
            .diagnostics_of(DiagnosticKind::Validity)
            .any(|d| d.message == "character data not allowed in <BODY>")
    );
}

// ========== guards ==========

#[test]
fn test_runaway_implied_elements_are_fatal() {
    let mut builder = HtmlBuilder {
        runaway: true,
        ..HtmlBuilder::default()
    };
    let result = parse_html("<BODY>text</BODY>", &mut builder);
    assert!(matches!(result, Err(XmlError::Fatal { ref message, .. })
        if message.starts_with("tag omission made no progress")));
}

#[test]
fn test_empty_implied_element_is_fatal() {
    let mut builder = HtmlBuilder {
        wrap_div: true,
        ..HtmlBuilder::default()
    };
    let result = parse_html("<BODY><DIV/></BODY>", &mut builder);
    assert!(matches!(result, Err(XmlError::Fatal { ref message, .. })
        if message.contains("closed empty")));
}

#[test]
fn test_nesting_depth_is_bounded() {
    let xml = "<a><b><c><d/></c></b></a>";
    let result = parse_tree(xml, ParserOptions::default().with_max_depth(3));
    assert!(matches!(result, Err(XmlError::Fatal { .. })));
    assert!(parse_tree(xml, ParserOptions::default().with_max_depth(4)).is_ok());
}

#[test]
fn test_default_depth_bound_is_reachable() {
    let nested = |depth: usize| format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
    let result = parse_tree(&nested(DEFAULT_MAX_DEPTH), ParserOptions::default());
    assert!(result.is_ok());
    let result = parse_tree(&nested(DEFAULT_MAX_DEPTH + 1), ParserOptions::default());
    assert!(matches!(result, Err(XmlError::Fatal { ref message, .. })
        if message.starts_with("elements nested deeper than")));
}

// ========== typed attributes ==========

/// An image element with typed attributes.
#[derive(Debug, Default)]
struct Image {
    width: Option<i64>,
    alt: Option<String>,
}

fn decode_width(image: &mut Image, value: &str) -> std::result::Result<(), String> {
    image.width = Some(decode_integer(value)?);
    Ok(())
}

fn encode_width(image: &Image) -> Option<String> {
    image.width.map(|width| width.to_string())
}

fn decode_alt(image: &mut Image, value: &str) -> std::result::Result<(), String> {
    image.alt = Some(value.to_string());
    Ok(())
}

fn encode_alt(image: &Image) -> Option<String> {
    image.alt.clone()
}

static IMAGE_SLOTS: [AttributeSlot<Image>; 2] = [
    AttributeSlot {
        name: "width",
        decode: decode_width,
        encode: encode_width,
        required: false,
    },
    AttributeSlot {
        name: "alt",
        decode: decode_alt,
        encode: encode_alt,
        required: true,
    },
];

static IMAGE_SCHEMA: AttributeSchema<Image> = AttributeSchema::new(&IMAGE_SLOTS);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Document,
    Gallery,
    Image,
}

/// Builder for a gallery of images, stored flat.
struct Gallery {
    kinds: Vec<Kind>,
    images: Vec<Image>,
}

impl Gallery {
    fn new() -> Self {
        Self {
            kinds: vec![Kind::Document],
            images: vec![Image::default()],
        }
    }
}

impl ElementBuilder for Gallery {
    type Node = usize;
    type Class = Kind;

    fn document(&self) -> usize {
        0
    }

    fn element_class(&mut self, _context: usize, name: &str) -> Kind {
        if name == "img" { Kind::Image } else { Kind::Gallery }
    }

    fn create_child(&mut self, _context: usize, class: &Kind, _name: Option<&str>) -> usize {
        self.kinds.push(*class);
        self.images.push(Image::default());
        self.kinds.len() - 1
    }

    fn element_name(&self, node: usize) -> Option<String> {
        match self.kinds.get(node)? {
            Kind::Document => None,
            Kind::Gallery => Some("gallery".to_string()),
            Kind::Image => Some("img".to_string()),
        }
    }

    fn add_data(&mut self, _node: usize, _data: &str) -> DataOutcome {
        DataOutcome::Accepted
    }

    fn set_attribute(
        &mut self,
        node: usize,
        name: &str,
        value: &str,
    ) -> std::result::Result<(), AttributeValueError> {
        if self.kinds.get(node) != Some(&Kind::Image) {
            return Ok(());
        }
        if IMAGE_SCHEMA.set(&mut self.images[node], name, value)? {
            Ok(())
        } else {
            Err(AttributeValueError::new(name, value, "unknown attribute"))
        }
    }
}

#[test]
fn test_typed_attributes_are_decoded() {
    let mut gallery = Gallery::new();
    let report = XmlParser::from_text(
        "<gallery><img width='wide' alt='a'/><img width=' 40 '/><img alt='c' size='3'/></gallery>",
        &mut gallery,
    )
    .with_options(ParserOptions::default().with_validity(true))
    .parse_document()
    .unwrap();

    let messages: Vec<&str> = report
        .diagnostics_of(DiagnosticKind::Validity)
        .map(|d| d.message.as_str())
        .collect();
    assert!(
        messages
            .iter()
            .any(|m| m.starts_with("bad value \"wide\" for attribute width")),
        "{messages:?}"
    );
    assert!(messages.contains(&"bad value \"3\" for attribute size: unknown attribute"));

    let first = &gallery.images[2];
    assert_eq!(first.width, None);
    assert_eq!(IMAGE_SCHEMA.get(first, "alt").as_deref(), Some("a"));

    let second = &gallery.images[3];
    assert_eq!(IMAGE_SCHEMA.get(second, "width").as_deref(), Some("40"));
    assert_eq!(IMAGE_SCHEMA.missing_required(second), ["alt"]);
    assert_eq!(
        IMAGE_SCHEMA.attributes(&gallery.images[4]),
        [("alt", "c".to_string())]
    );
}

#[test]
fn test_typed_attribute_errors_ignored_without_validity() {
    let mut gallery = Gallery::new();
    let report = XmlParser::from_text("<gallery><img width='wide'/></gallery>", &mut gallery)
        .parse_document()
        .unwrap();
    assert!(report.diagnostics.is_empty());
    assert_eq!(gallery.images[2].width, None);
}
