//! HTTP fetch utilities for the Marten parser.
//!
//! Provides a blocking HTTP GET behind the [`HttpClient`] trait, used by the
//! entity resolver to open `http`/`https` external entities, and decoding
//! for `data:` URLs.
use base64::Engine;
use std::time::Duration;

/// User-Agent header sent with all requests.
const USER_AGENT: &str = concat!("marten-xml/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
const TIMEOUT: Duration = Duration::from_secs(30);

/// Errors produced while fetching or decoding a resource.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
    /// The request could not be sent or no response arrived.
    #[error("request failed: {0}")]
    Transport(String),
    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
    /// A `data:` URL was malformed.
    #[error("invalid data URL: {0}")]
    DataUrl(String),
}

/// The parts of an HTTP response the parser cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Numeric status code, e.g. 200 or 404.
    pub status: u16,
    /// Media type from `Content-Type`, lower-cased, without parameters.
    pub media_type: Option<String>,
    /// The `charset` parameter of `Content-Type`, if present.
    pub charset: Option<String>,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// True for 2xx responses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// A GET-capable HTTP transport.
///
/// The default [`BlockingHttpClient`] uses `reqwest`; hosts substitute their
/// own transport (or a test double) through this trait.
pub trait HttpClient {
    /// Perform a GET request. Non-2xx statuses are returned, not raised.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if no response could be obtained.
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// [`HttpClient`] backed by `reqwest`'s blocking client.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingHttpClient;

impl HttpClient for BlockingHttpClient {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        let response = client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let (media_type, charset) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or((None, None), parse_content_type);

        let body = response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Body(e.to_string()))?;

        Ok(HttpResponse {
            status,
            media_type,
            charset,
            body,
        })
    }
}

/// Split a `Content-Type` header value into media type and charset.
///
/// `text/xml; charset="ISO-8859-1"` gives `(Some("text/xml"), Some("ISO-8859-1"))`.
#[must_use]
pub fn parse_content_type(value: &str) -> (Option<String>, Option<String>) {
    let mut parts = value.split(';');
    let media_type = parts
        .next()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty());
    let charset = parts.find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    });
    (media_type, charset)
}

/// A parsed `data:` URL that can be decoded into raw bytes.
///
/// [RFC 2397](https://www.rfc-editor.org/rfc/rfc2397)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// Media type, defaults to `text/plain`.
    pub media_type: String,
    /// The `charset` parameter, if any.
    pub charset: Option<String>,
    /// Whether the payload is base64 encoded.
    pub base64: bool,
    /// The undecoded payload following the comma.
    payload: String,
}

impl DataUrl {
    /// Parse a raw `data:` URL string.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::DataUrl`] if the scheme is not `data:` or the
    /// comma separating metadata from the payload is missing.
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let Some(rest) = raw
            .get(..5)
            .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
            .map(|_| &raw[5..])
        else {
            return Err(FetchError::DataUrl("missing data: scheme".to_string()));
        };
        let Some((metadata, payload)) = rest.split_once(',') else {
            return Err(FetchError::DataUrl("missing comma".to_string()));
        };

        let mut params = metadata.split(';');
        let media_type = params
            .next()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("text/plain")
            .to_ascii_lowercase();
        let mut charset = None;
        let mut base64 = false;
        for param in params {
            if param.eq_ignore_ascii_case("base64") {
                base64 = true;
            } else if let Some((name, value)) = param.split_once('=')
                && name.eq_ignore_ascii_case("charset")
            {
                charset = Some(value.to_string());
            }
        }

        Ok(Self {
            media_type,
            charset,
            base64,
            payload: payload.to_string(),
        })
    }

    /// Decode the data URL payload into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::DataUrl`] if base64 decoding fails or a percent
    /// escape is malformed.
    pub fn decode(&self) -> Result<Vec<u8>, FetchError> {
        let bytes = percent_decode(&self.payload)?;
        if self.base64 {
            let compact: Vec<u8> = bytes
                .into_iter()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map_err(|e| FetchError::DataUrl(format!("base64 decode error: {e}")))
        } else {
            Ok(bytes)
        }
    }
}

/// Decode `%XX` escapes.
fn percent_decode(input: &str) -> Result<Vec<u8>, FetchError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input
                .get(i + 1..i + 3)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| FetchError::DataUrl(format!("bad percent escape at {i}")))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Decode a `data:` URL and return its payload as raw bytes.
///
/// # Errors
///
/// Returns [`FetchError::DataUrl`] if the data URL cannot be parsed or
/// decoded.
pub fn fetch_bytes_from_data_url(url: &str) -> Result<Vec<u8>, FetchError> {
    DataUrl::parse(url)?.decode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_type_with_quoted_charset() {
        let (media, charset) = parse_content_type("Text/XML; charset=\"ISO-8859-1\"");
        assert_eq!(media.as_deref(), Some("text/xml"));
        assert_eq!(charset.as_deref(), Some("ISO-8859-1"));
    }

    #[test]
    fn test_parse_content_type_without_charset() {
        let (media, charset) = parse_content_type("application/xml");
        assert_eq!(media.as_deref(), Some("application/xml"));
        assert_eq!(charset, None);
    }

    #[test]
    fn test_data_url_percent_encoded() {
        let bytes = fetch_bytes_from_data_url("data:,%3Ca%2F%3E").unwrap();
        assert_eq!(bytes, b"<a/>");
    }

    #[test]
    fn test_data_url_base64_with_charset() {
        let url = DataUrl::parse("data:text/xml;charset=utf-8;base64,PGEvPg==").unwrap();
        assert_eq!(url.media_type, "text/xml");
        assert_eq!(url.charset.as_deref(), Some("utf-8"));
        assert_eq!(url.decode().unwrap(), b"<a/>");
    }

    #[test]
    fn test_data_url_missing_comma_is_error() {
        assert!(matches!(
            DataUrl::parse("data:text/plain"),
            Err(FetchError::DataUrl(_))
        ));
    }

    #[test]
    fn test_bad_percent_escape_is_error() {
        assert!(fetch_bytes_from_data_url("data:,%zz").is_err());
    }
}
