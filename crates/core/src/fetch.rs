//! Network seam used by the policy engines.

use async_trait::async_trait;

use crate::Error;
use crate::request::{HttpResponse, InterceptedRequest};

/// Issues a request to the network.
///
/// Implementations return `Ok` for any HTTP status that arrived; `Err` means
/// no response was obtained (connection failure, timeout, oversized body).
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<HttpResponse, Error>;
}
