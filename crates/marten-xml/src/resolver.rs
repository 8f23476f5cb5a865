//! Locating and opening external entities.
//!
//! [§ 4.2.2 External Entities](https://www.w3.org/TR/xml/#sec-external-ent)
//!
//! "The SystemLiteral is called the entity's system identifier. It is meant
//! to be converted to a URI reference ... relative URIs are relative to the
//! location of the resource within which the entity declaration occurs."
//!
//! The parser never fetches anything itself: it asks an [`EntityResolver`]
//! for a location and then for the bytes, so hosts can substitute caching,
//! catalogs or non-blocking transports.

use std::fs;
use std::io::ErrorKind;

use marten_common::net::{BlockingHttpClient, DataUrl, HttpClient};
use marten_common::url::{Url, resolve_reference, to_file_path};
use marten_common::warning::warn_once;

use crate::dtd::ExternalId;
use crate::encoding::Encoding;
use crate::error::ResourceError;

/// The bytes of an opened external entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Where the bytes came from, after any redirection.
    pub location: Url,
    /// The raw entity.
    pub bytes: Vec<u8>,
    /// Encoding given by the transport, overriding detection.
    pub encoding: Option<Encoding>,
}

/// Maps external identifiers to locations and locations to bytes.
pub trait EntityResolver {
    /// Turn an external identifier into a location.
    ///
    /// The default resolves the system literal against `base`, the
    /// location of the entity in which the identifier was declared. Public
    /// identifiers are ignored.
    ///
    /// # Errors
    ///
    /// [`ResourceError::Unresolvable`] if there is no system literal or it
    /// cannot be resolved.
    fn locate(&self, external_id: &ExternalId, base: Option<&Url>) -> Result<Url, ResourceError> {
        let Some(system_id) = &external_id.system_id else {
            return Err(ResourceError::Unresolvable(
                external_id.public_id.clone().unwrap_or_default(),
            ));
        };
        resolve_reference(system_id, base).map_err(|e| ResourceError::Unresolvable(e.to_string()))
    }

    /// Read the entity at `location`.
    ///
    /// # Errors
    ///
    /// A [`ResourceError`] describing why the entity could not be read.
    fn open(&self, location: &Url) -> Result<Resource, ResourceError>;
}

/// Opens `file:`, `data:`, `http:` and `https:` locations.
pub struct DefaultResolver {
    http: Box<dyn HttpClient>,
}

impl DefaultResolver {
    /// A resolver using the blocking `reqwest` client.
    #[must_use]
    pub fn new() -> Self {
        Self::with_http_client(Box::new(BlockingHttpClient))
    }

    /// A resolver using `http` for remote locations.
    #[must_use]
    pub fn with_http_client(http: Box<dyn HttpClient>) -> Self {
        Self { http }
    }

    fn open_file(location: &Url) -> Result<Resource, ResourceError> {
        let path = to_file_path(location)
            .ok_or_else(|| ResourceError::Unresolvable(location.to_string()))?;
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ResourceError::Missing(location.to_string()),
            _ => ResourceError::Io {
                location: location.to_string(),
                message: e.to_string(),
            },
        })?;
        Ok(Resource {
            location: location.clone(),
            bytes,
            encoding: None,
        })
    }

    fn open_data(location: &Url) -> Result<Resource, ResourceError> {
        let error = |message: String| ResourceError::DataUrl {
            location: location.as_str().chars().take(64).collect(),
            message,
        };
        let data = DataUrl::parse(location.as_str()).map_err(|e| error(e.to_string()))?;
        let bytes = data.decode().map_err(|e| error(e.to_string()))?;
        Ok(Resource {
            location: location.clone(),
            bytes,
            encoding: data.charset.as_deref().and_then(charset_encoding),
        })
    }

    fn open_http(&self, location: &Url) -> Result<Resource, ResourceError> {
        let response = self
            .http
            .get(location.as_str())
            .map_err(|e| ResourceError::Transport {
                location: location.to_string(),
                message: e.to_string(),
            })?;
        if response.status == 404 {
            return Err(ResourceError::Missing(location.to_string()));
        }
        if !response.is_success() {
            return Err(ResourceError::UnexpectedStatus {
                status: response.status,
                location: location.to_string(),
            });
        }
        // RFC 2616: text/* without a charset parameter is ISO-8859-1.
        let encoding = match (&response.charset, &response.media_type) {
            (Some(charset), _) => charset_encoding(charset),
            (None, Some(media_type)) if media_type.starts_with("text/") => Some(Encoding::Latin1),
            _ => None,
        };
        Ok(Resource {
            location: location.clone(),
            bytes: response.body,
            encoding,
        })
    }
}

impl Default for DefaultResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityResolver for DefaultResolver {
    fn open(&self, location: &Url) -> Result<Resource, ResourceError> {
        match location.scheme() {
            "file" => Self::open_file(location),
            "data" => Self::open_data(location),
            "http" | "https" => self.open_http(location),
            scheme => Err(ResourceError::UnsupportedScheme {
                scheme: scheme.to_string(),
                location: location.to_string(),
            }),
        }
    }
}

/// The encoding for a transport-level charset, `None` (with a warning) if
/// it is not one the engine decodes.
fn charset_encoding(charset: &str) -> Option<Encoding> {
    let encoding = Encoding::from_label(charset);
    if encoding.is_none() {
        warn_once("Resolver", &format!("ignoring unsupported charset '{charset}'"));
    }
    encoding
}
