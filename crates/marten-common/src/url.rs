//! URI reference resolution.
//!
//! [RFC 3986 § 5 Reference Resolution](https://www.rfc-editor.org/rfc/rfc3986#section-5)
//! [URL Standard](https://url.spec.whatwg.org/)
//!
//! External identifiers in a DTD carry system literals that are URI
//! references, usually relative to the entity that declared them.

use std::path::{Path, PathBuf};

pub use ::url::Url;

/// Error returned when a reference cannot be turned into an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot resolve '{reference}': {reason}")]
pub struct UrlError {
    /// The reference as it appeared in the source.
    pub reference: String,
    /// Why resolution failed.
    pub reason: String,
}

/// [RFC 3986 § 5.2 Relative Resolution](https://www.rfc-editor.org/rfc/rfc3986#section-5.2)
///
/// Resolve a potentially relative reference against a base URL.
///
/// # Algorithm
///
/// STEP 1: "If the reference is an absolute URI, return it."
///
/// STEP 2: "Otherwise, merge the reference with the base and remove dot
/// segments."
///
/// # Errors
///
/// Returns [`UrlError`] if `href` is relative and there is no base, or if
/// the combined reference does not parse.
pub fn resolve_reference(href: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    // STEP 1: An absolute reference stands alone.
    if let Ok(url) = Url::parse(href) {
        return Ok(url);
    }

    // STEP 2: Relative references need a base.
    let Some(base) = base else {
        return Err(UrlError {
            reference: href.to_string(),
            reason: "relative reference without a base".to_string(),
        });
    };
    base.join(href).map_err(|e| UrlError {
        reference: href.to_string(),
        reason: e.to_string(),
    })
}

/// [RFC 3986 § 3 Syntax Components](https://www.rfc-editor.org/rfc/rfc3986#section-3)
///
/// The canonical root of a URL: its scheme and authority with an empty path,
/// e.g. `http://example.com:8080/`.
///
/// For URLs without an authority (`data:`, `urn:`) the root is just the
/// scheme followed by `:`.
#[must_use]
pub fn canonical_root(url: &Url) -> String {
    let scheme = url.scheme().to_ascii_lowercase();
    match url.host_str() {
        Some(host) => {
            let host = host.to_ascii_lowercase();
            match url.port() {
                Some(port) => format!("{scheme}://{host}:{port}/"),
                None => format!("{scheme}://{host}/"),
            }
        }
        None if url.scheme() == "file" => "file:///".to_string(),
        None => format!("{scheme}:"),
    }
}

/// Map a `file:` URL to a local path. Returns `None` for other schemes.
#[must_use]
pub fn to_file_path(url: &Url) -> Option<PathBuf> {
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path().ok()
}

/// Map a local path (relative paths are made absolute against the current
/// directory) to a `file:` URL.
#[must_use]
pub fn from_file_path(path: &Path) -> Option<Url> {
    let absolute = std::path::absolute(path).ok()?;
    Url::from_file_path(absolute).ok()
}

/// True for locations that can be opened without network access.
#[must_use]
pub fn is_local(url: &Url) -> bool {
    matches!(url.scheme(), "file" | "data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_against_directory_base() {
        let base = Url::parse("http://example.com/dtds/doc.xml").unwrap();
        let url = resolve_reference("../ent/chapter.ent", Some(&base)).unwrap();
        assert_eq!(url.as_str(), "http://example.com/ent/chapter.ent");
    }

    #[test]
    fn test_absolute_reference_ignores_base() {
        let base = Url::parse("file:///tmp/doc.xml").unwrap();
        let url = resolve_reference("http://www.w3.org/x.dtd", Some(&base)).unwrap();
        assert_eq!(url.as_str(), "http://www.w3.org/x.dtd");
    }

    #[test]
    fn test_relative_without_base_fails() {
        let err = resolve_reference("doc.dtd", None).unwrap_err();
        assert_eq!(err.reference, "doc.dtd");
    }

    #[test]
    fn test_canonical_root() {
        let url = Url::parse("HTTP://Example.COM:8080/a/b?q#f").unwrap();
        assert_eq!(canonical_root(&url), "http://example.com:8080/");
        let data = Url::parse("data:,hello").unwrap();
        assert_eq!(canonical_root(&data), "data:");
    }

    #[test]
    fn test_file_path_only_for_file_scheme() {
        let url = Url::parse("http://example.com/doc.xml").unwrap();
        assert!(to_file_path(&url).is_none());
        assert!(is_local(&Url::parse("file:///tmp/x.xml").unwrap()));
        assert!(!is_local(&url));
    }
}
