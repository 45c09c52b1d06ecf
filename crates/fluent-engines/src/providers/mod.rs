// crates/fluent-engines/src/providers/mod.rs

//! Provider wire contract: every backend, however it speaks on the wire,
//! implements the same `{chat, close}` capability set and normalizes its
//! response into `fluent_core::types::ApiResponse` at the boundary.

pub mod anthropic;
pub mod local;
pub mod mock;
pub mod openai;

use fluent_core::error::{RouterError, RouterResult};
use fluent_core::types::{ApiResponse, Message, ModelCapability, RequestOptions};

/// Maps an HTTP status code a provider returned into the error taxonomy,
/// for clients whose wire format doesn't hand `reqwest` a typed error
/// (i.e. the request itself succeeded transport-wise but the provider
/// responded with a non-2xx body).
pub fn classify_http_status(provider: &str, status: reqwest::StatusCode, body: &str) -> RouterError {
    match status.as_u16() {
        401 | 403 => RouterError::AuthFailed {
            provider: provider.to_string(),
            message: body.to_string(),
        },
        429 => RouterError::RateLimited {
            provider: provider.to_string(),
            retry_after: None,
        },
        500..=599 => RouterError::TransientNetwork {
            provider: provider.to_string(),
            message: body.to_string(),
        },
        code => RouterError::ProviderError {
            provider: provider.to_string(),
            code: Some(code.to_string()),
            message: body.to_string(),
        },
    }
}

#[async_trait::async_trait]
pub trait ProviderClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        capability: &ModelCapability,
        options: &RequestOptions,
    ) -> RouterResult<ApiResponse>;

    /// Releases any held resources (connection pools, background tasks).
    /// Most HTTP-backed clients have nothing to do here since `reqwest`
    /// clients drop their pool on `Drop`; kept as an explicit lifecycle
    /// hook so the Client Pool's `shutdown()` has somewhere to call into.
    async fn close(&self) {}
}
