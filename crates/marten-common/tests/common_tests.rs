//! Integration tests for the shared collaborators: warnings, data URLs and
//! reference resolution.

use base64::Engine;
use marten_common::net::{DataUrl, fetch_bytes_from_data_url};
use marten_common::url::{Url, canonical_root, from_file_path, resolve_reference, to_file_path};
use marten_common::warning::{clear_warnings, warn_once, was_warned};
use quickcheck_macros::quickcheck;

// ========== warnings ==========

#[test]
fn test_warn_once_records_message() {
    warn_once("Test", "entity &chap1; skipped");
    assert!(was_warned("Test", "entity &chap1; skipped"));
    assert!(!was_warned("Other", "entity &chap1; skipped"));
}

#[test]
fn test_clear_warnings_forgets_messages() {
    warn_once("Clear", "external subset ignored");
    clear_warnings();
    assert!(!was_warned("Clear", "external subset ignored"));
}

// ========== data URLs ==========

#[quickcheck]
fn prop_base64_data_url_returns_payload(payload: Vec<u8>) -> bool {
    let encoded = base64::engine::general_purpose::STANDARD.encode(&payload);
    let url = format!("data:application/octet-stream;base64,{encoded}");
    fetch_bytes_from_data_url(&url).is_ok_and(|bytes| bytes == payload)
}

#[test]
fn test_data_url_defaults_to_text_plain() {
    let url = DataUrl::parse("data:,hello").unwrap();
    assert_eq!(url.media_type, "text/plain");
    assert!(!url.base64);
    assert_eq!(url.decode().unwrap(), b"hello");
}

// ========== URLs ==========

#[test]
fn test_file_path_round_trip() {
    let dir = std::env::temp_dir();
    let path = dir.join("marten-common-test.xml");
    let url = from_file_path(&path).unwrap();
    assert_eq!(url.scheme(), "file");
    assert_eq!(to_file_path(&url).unwrap(), path);
    assert_eq!(canonical_root(&url), "file:///");
}

#[test]
fn test_system_literal_resolved_against_entity_location() {
    let base = Url::parse("file:///srv/docs/book.xml").unwrap();
    let url = resolve_reference("dtd/book.dtd", Some(&base)).unwrap();
    assert_eq!(url.as_str(), "file:///srv/docs/dtd/book.dtd");
}
