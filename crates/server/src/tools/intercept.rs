//! intercept tool implementation.
//!
//! Routes one request through the dispatcher exactly as a consumer's
//! outgoing request would be: tile policy, static policy, or passthrough.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tilegate_client::canonicalize;
use tilegate_core::{Dispatcher, Error, InterceptedRequest, ServeSource, Served};
use url::Url;

use super::json_result;

/// Input parameters for the intercept tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InterceptParams {
    /// Absolute URL, or a path starting with `/` resolved against the app origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the intercept tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InterceptOutput {
    /// HTTP status of the served response.
    pub status: u16,
    /// Response headers as name/value pairs, in upstream order.
    pub headers: Vec<(String, String)>,
    /// Response body, base64 encoded.
    pub body_base64: String,
    /// Which path produced the response.
    pub source: ServeSource,
}

impl From<Served> for InterceptOutput {
    fn from(served: Served) -> Self {
        Self {
            status: served.response.status,
            headers: served.response.headers,
            body_base64: STANDARD.encode(&served.response.body),
            source: served.source,
        }
    }
}

/// Implementation of the intercept tool.
pub async fn intercept_impl(
    dispatcher: &Dispatcher, origin: &Url, params: InterceptParams,
) -> Result<CallToolResult, McpError> {
    let url = canonicalize(&params.url, Some(origin)).map_err(Error::from)?;
    let request = InterceptedRequest::new(&params.method, url)?;

    let served = dispatcher.handle_request(&request).await?;
    tracing::info!(
        method = request.method(),
        url = %request.url(),
        status = served.response.status,
        source = ?served.source,
        "request served"
    );

    Ok(json_result(&InterceptOutput::from(served))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{dispatcher, text};

    fn origin() -> Url {
        Url::parse("http://localhost:8080").unwrap()
    }

    fn params(url: &str, method: &str) -> InterceptParams {
        InterceptParams { url: url.into(), method: method.into() }
    }

    async fn intercept(dispatcher: &Dispatcher, url: &str, method: &str) -> InterceptOutput {
        let result = intercept_impl(dispatcher, &origin(), params(url, method)).await.unwrap();
        serde_json::from_str(&text(&result)).unwrap()
    }

    #[tokio::test]
    async fn test_tile_fetched_then_cached() {
        let (dispatcher, fetcher) = dispatcher();
        let url = "https://api.mapbox.com/v4/mapbox.satellite/1/0/0.png";

        let first = intercept(&dispatcher, url, "GET").await;
        assert_eq!(first.status, 200);
        assert_eq!(first.source, ServeSource::Network);

        let second = intercept(&dispatcher, url, "GET").await;
        assert_eq!(second.source, ServeSource::Cache);
        assert_eq!(second.body_base64, first.body_base64);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_relative_path_resolves_against_origin() {
        let (dispatcher, _) = dispatcher();

        let output = intercept(&dispatcher, "/assets/index.js", "GET").await;

        assert_eq!(output.source, ServeSource::Network);
        assert_eq!(STANDARD.decode(output.body_base64).unwrap(), b"GET /assets/index.js");
        assert!(output.headers.iter().any(|(k, v)| k == "content-type" && v == "text/plain"));
    }

    #[tokio::test]
    async fn test_post_passes_through() {
        let (dispatcher, fetcher) = dispatcher();

        let first = intercept(&dispatcher, "/api/favorites", "post").await;
        let second = intercept(&dispatcher, "/api/favorites", "POST").await;

        assert_eq!(first.source, ServeSource::Passthrough);
        assert_eq!(second.source, ServeSource::Passthrough);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_static_offline_fallback() {
        let (dispatcher, _) = dispatcher();

        let output = intercept(&dispatcher, "https://down.test/app.css", "GET").await;

        assert_eq!(output.status, 503);
        assert_eq!(output.source, ServeSource::Offline);
        assert_eq!(STANDARD.decode(output.body_base64).unwrap(), b"Offline");
    }

    #[tokio::test]
    async fn test_passthrough_failure_is_error() {
        let (dispatcher, _) = dispatcher();

        let result = intercept_impl(&dispatcher, &origin(), params("https://down.test/api/x", "GET")).await;

        let err = result.unwrap_err();
        assert_eq!(err.code.0, -32008);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let (dispatcher, _) = dispatcher();

        let result = intercept_impl(&dispatcher, &origin(), params("ftp://example.com/a", "GET")).await;
        assert_eq!(result.unwrap_err().code.0, -32003);

        let result = intercept_impl(&dispatcher, &origin(), params("   ", "GET")).await;
        assert_eq!(result.unwrap_err().code.0, -32602);
    }

    #[tokio::test]
    async fn test_invalid_method() {
        let (dispatcher, fetcher) = dispatcher();

        let result = intercept_impl(&dispatcher, &origin(), params("/index.html", "GE T")).await;

        assert!(result.is_err());
        assert_eq!(fetcher.calls(), 0);
    }
}
