//! Intercepted requests and the responses handed back to consumers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::hash::compute_request_key;

/// A request issued by a consumer and routed through the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    method: String,
    url: Url,
}

impl InterceptedRequest {
    /// Build a request from a method and an absolute URL.
    ///
    /// The method is uppercased and the fragment dropped so that equal
    /// requests share one identity.
    pub fn new(method: &str, mut url: Url) -> Result<Self, Error> {
        let method = method.trim().to_ascii_uppercase();
        if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::InvalidInput(format!("invalid method: {method:?}")));
        }
        url.set_fragment(None);
        Ok(Self { method, url })
    }

    /// Shorthand for a GET request to an absolute URL string.
    pub fn get(url: &str) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Self::new("GET", url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the method is read-only.
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Identity of this request inside a cache generation.
    pub fn cache_key(&self) -> String {
        compute_request_key(&self.method, self.url.as_str())
    }
}

/// A complete HTTP response as stored in, or served from, the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// The fixed response served when a static asset is neither cached nor reachable.
    pub fn offline() -> Self {
        Self::new(503, vec![("content-type".into(), "text/plain".into())], Bytes::from_static(b"Offline"))
    }

    /// Only exact 200 responses are ever written to a generation.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServeSource {
    /// Fresh cache hit, no network call made.
    Cache,
    /// Fetched from the network (and stored when cacheable).
    Network,
    /// Revalidation failed; a prior entry was served regardless of age.
    Stale,
    /// Static asset unreachable; the fixed offline response.
    Offline,
    /// Forwarded to the network without touching the cache.
    Passthrough,
}

/// A response together with the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: HttpResponse,
    pub source: ServeSource,
}

impl Served {
    pub fn new(response: HttpResponse, source: ServeSource) -> Self {
        Self { response, source }
    }
}
