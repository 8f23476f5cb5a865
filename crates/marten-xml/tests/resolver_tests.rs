//! Integration tests for the default entity resolver and remote entity
//! policy, using a fake HTTP transport.

use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::rc::Rc;

use marten_common::net::{FetchError, HttpClient, HttpResponse};
use marten_common::url::{Url, from_file_path};
use marten_dom::DomTree;
use marten_xml::{
    DefaultResolver, Encoding, EntityResolver, ExternalId, ParserOptions, ResourceError, XmlError,
    XmlParser,
};

/// Fake transport answering from a fixed table and counting requests.
struct FakeHttp {
    responses: HashMap<String, Result<HttpResponse, FetchError>>,
    calls: Rc<Cell<usize>>,
}

impl HttpClient for FakeHttp {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.calls.set(self.calls.get() + 1);
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| Ok(response(404, None, None, b"")))
    }
}

fn response(
    status: u16,
    media_type: Option<&str>,
    charset: Option<&str>,
    body: &[u8],
) -> HttpResponse {
    HttpResponse {
        status,
        media_type: media_type.map(str::to_string),
        charset: charset.map(str::to_string),
        body: body.to_vec(),
    }
}

/// Helper to build a resolver over a fake transport, returning the request
/// counter alongside
fn resolver(
    responses: Vec<(&str, Result<HttpResponse, FetchError>)>,
) -> (DefaultResolver, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let http = FakeHttp {
        responses: responses
            .into_iter()
            .map(|(url, result)| (url.to_string(), result))
            .collect(),
        calls: Rc::clone(&calls),
    };
    (DefaultResolver::with_http_client(Box::new(http)), calls)
}

fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

// ========== http ==========

#[test]
fn test_http_status_errors() {
    let (resolver, _) = resolver(vec![(
        "http://example.com/broken.dtd",
        Ok(response(500, None, None, b"")),
    )]);

    assert!(matches!(
        resolver.open(&url("http://example.com/gone.dtd")),
        Err(ResourceError::Missing(_))
    ));
    assert!(matches!(
        resolver.open(&url("http://example.com/broken.dtd")),
        Err(ResourceError::UnexpectedStatus { status: 500, .. })
    ));
}

#[test]
fn test_http_transport_error() {
    let (resolver, _) = resolver(vec![(
        "https://example.com/a.dtd",
        Err(FetchError::Transport("connection refused".to_string())),
    )]);
    let Err(ResourceError::Transport { location, message }) =
        resolver.open(&url("https://example.com/a.dtd"))
    else {
        panic!("expected a transport error");
    };
    assert_eq!(location, "https://example.com/a.dtd");
    assert!(message.contains("connection refused"));
}

#[test]
fn test_http_charset_sets_encoding() {
    let (resolver, _) = resolver(vec![
        (
            "http://example.com/plain.xml",
            Ok(response(200, Some("text/xml"), None, b"<a/>")),
        ),
        (
            "http://example.com/utf8.xml",
            Ok(response(200, Some("text/xml"), Some("UTF-8"), b"<a/>")),
        ),
        (
            "http://example.com/app.xml",
            Ok(response(200, Some("application/xml"), None, b"<a/>")),
        ),
    ]);

    let plain = resolver.open(&url("http://example.com/plain.xml")).unwrap();
    assert_eq!(plain.encoding, Some(Encoding::Latin1));
    assert_eq!(plain.bytes, b"<a/>");

    let utf8 = resolver.open(&url("http://example.com/utf8.xml")).unwrap();
    assert_eq!(utf8.encoding, Some(Encoding::Utf8));

    let app = resolver.open(&url("http://example.com/app.xml")).unwrap();
    assert_eq!(app.encoding, None);
}

// ========== other schemes ==========

#[test]
fn test_unsupported_scheme() {
    let result = DefaultResolver::new().open(&url("ftp://example.com/a.dtd"));
    assert!(matches!(
        result,
        Err(ResourceError::UnsupportedScheme { ref scheme, .. }) if scheme == "ftp"
    ));
}

#[test]
fn test_data_url() {
    let resource = DefaultResolver::new()
        .open(&url("data:text/plain;charset=utf-8;base64,aGk="))
        .unwrap();
    assert_eq!(resource.bytes, b"hi");
    assert_eq!(resource.encoding, Some(Encoding::Utf8));
}

#[test]
fn test_missing_file() {
    let result = DefaultResolver::new().open(&url("file:///nonexistent/marten/none.dtd"));
    assert!(matches!(result, Err(ResourceError::Missing(_))));
}

#[test]
fn test_locate_without_system_literal() {
    let external_id = ExternalId {
        public_id: Some("-//Marten//DTD Test//EN".to_string()),
        system_id: None,
    };
    let result = DefaultResolver::new().locate(&external_id, None);
    assert_eq!(
        result,
        Err(ResourceError::Unresolvable("-//Marten//DTD Test//EN".to_string()))
    );
}

#[test]
fn test_locate_relative_to_base() {
    let base = url("http://example.com/docs/main.xml");
    let located = DefaultResolver::new()
        .locate(&ExternalId::system("../dtd/main.dtd"), Some(&base))
        .unwrap();
    assert_eq!(located.as_str(), "http://example.com/dtd/main.dtd");
}

// ========== remote entity policy ==========

const REMOTE_DOCUMENT: &str =
    r#"<!DOCTYPE a SYSTEM "http://example.com/a.dtd"><a>[&e;]</a>"#;

fn parse_remote(options: ParserOptions) -> (String, usize) {
    let (resolver, calls) = resolver(vec![(
        "http://example.com/a.dtd",
        Ok(response(200, Some("application/xml-dtd"), None, b"<!ENTITY e 'remote'>")),
    )]);
    let mut tree = DomTree::new();
    if let Err(e) = XmlParser::from_text(REMOTE_DOCUMENT, &mut tree)
        .with_options(options)
        .with_resolver(Box::new(resolver))
        .parse_document()
    {
        panic!("parse failed: {e}");
    }
    let text = tree.text_content(tree.document_element().unwrap());
    (text, calls.get())
}

#[test]
fn test_remote_subset_not_fetched_by_default() {
    let options = ParserOptions::default().with_external_entities(true);
    assert_eq!(parse_remote(options), ("[]".to_string(), 0));
}

#[test]
fn test_remote_subset_fetched_when_allowed() {
    let options = ParserOptions::default()
        .with_external_entities(true)
        .with_remote_entities(true);
    assert_eq!(parse_remote(options), ("[remote]".to_string(), 1));
}

#[test]
fn test_remote_entity_decoded_with_transport_charset() {
    let (resolver, _) = resolver(vec![(
        "http://example.com/word.txt",
        Ok(response(200, Some("text/plain"), None, b"caf\xE9")),
    )]);
    let mut tree = DomTree::new();
    let _ = XmlParser::from_text(
        r#"<!DOCTYPE a [<!ENTITY w SYSTEM "http://example.com/word.txt">]><a>&w;</a>"#,
        &mut tree,
    )
    .with_options(
        ParserOptions::default()
            .with_external_entities(true)
            .with_remote_entities(true),
    )
    .with_resolver(Box::new(resolver))
    .parse_document()
    .unwrap();
    assert_eq!(tree.text_content(tree.document_element().unwrap()), "caf\u{E9}");
}

#[test]
fn test_failed_remote_subset_is_a_resource_error_when_validating() {
    let (resolver, calls) = resolver(vec![]);
    let mut tree = DomTree::new();
    let result = XmlParser::from_text(REMOTE_DOCUMENT, &mut tree)
        .with_options(
            ParserOptions::default()
                .with_validity(true)
                .with_external_entities(true)
                .with_remote_entities(true),
        )
        .with_resolver(Box::new(resolver))
        .parse_document();
    assert!(matches!(result, Err(XmlError::Resource(ResourceError::Missing(_)))));
    assert_eq!(calls.get(), 1);
}

// ========== documents on disk ==========

#[test]
fn test_document_from_location_resolves_relative_entities() {
    let dir = std::env::temp_dir().join(format!("marten-resolver-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("main.xml"),
        r#"<!DOCTYPE book [<!ENTITY ch SYSTEM "chapters/one.xml">]><book>&ch;</book>"#,
    )
    .unwrap();
    fs::create_dir_all(dir.join("chapters")).unwrap();
    fs::write(dir.join("chapters/one.xml"), "<chapter>one</chapter>").unwrap();

    let location = from_file_path(&dir.join("main.xml")).unwrap();
    let mut tree = DomTree::new();
    let result = XmlParser::from_location(&location, &mut tree).and_then(|parser| {
        parser
            .with_options(ParserOptions::default().with_external_entities(true))
            .parse_document()
    });
    let _ = fs::remove_dir_all(&dir);

    let _ = result.unwrap();
    let book = tree.document_element().unwrap();
    let chapter = tree.child_elements(book).next().unwrap();
    assert_eq!(tree.as_element(chapter).unwrap().tag_name, "chapter");
    assert_eq!(tree.text_content(book), "one");
}

#[test]
fn test_missing_document_location() {
    let mut tree = DomTree::new();
    let result = XmlParser::from_location(&url("file:///nonexistent/marten/doc.xml"), &mut tree);
    assert!(matches!(result, Err(XmlError::Resource(ResourceError::Missing(_)))));
}
