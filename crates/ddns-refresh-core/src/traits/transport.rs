// # Update Transport Trait
//
// Defines the single network call the update client needs: send one
// authenticated request to an update URL and hand back status and body.
//
// ## Implementations
//
// - reqwest: `ddns-refresh-http` crate
// - Scripted test doubles: `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use ddns_refresh_core::traits::{UpdateRequest, UpdateTransport};
//
// let request = UpdateRequest::for_endpoint(&endpoint);
// let response = transport.send(&request).await?;
// println!("{} {}", response.status, response.body);
// ```

use async_trait::async_trait;
use std::time::Duration;

use crate::endpoint::{HttpMethod, ProviderEndpoint};

/// One outbound update request
#[derive(Clone)]
pub struct UpdateRequest {
    /// Hostname of the endpoint being refreshed
    pub hostname: String,
    /// Fully resolved URL
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Upper bound for this attempt
    pub timeout: Duration,
    /// Bearer token
    /// ⚠️ NEVER log this value
    auth_token: String,
}

impl UpdateRequest {
    /// Build the request for an endpoint
    pub fn for_endpoint(endpoint: &ProviderEndpoint) -> Self {
        Self {
            hostname: endpoint.hostname().to_string(),
            url: endpoint.resolved_url(),
            method: endpoint.method(),
            timeout: endpoint.timeout(),
            auth_token: endpoint.auth_token().to_string(),
        }
    }

    /// Value for the `Authorization: Bearer` header
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }
}

impl std::fmt::Debug for UpdateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateRequest")
            .field("hostname", &self.hostname)
            .field("url", &self.url)
            .field("method", &self.method)
            .field("timeout", &self.timeout)
            .field("auth_token", &"<REDACTED>")
            .finish()
    }
}

/// Raw response of an update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for the network layer of the update client
///
/// # Contract
///
/// - Perform exactly ONE request per call to `send`
/// - Return `Ok` for every HTTP response, whatever its status; the client
///   classifies statuses
/// - Return [`crate::Error::Timeout`] or [`crate::Error::Network`] when no
///   response was received
/// - No retry, backoff or logging of the auth token: retry policy is owned
///   by [`crate::UpdateClient`]
///
/// Implementations must be thread-safe; the orchestrator shares one
/// transport across concurrent workers.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    /// Send one update request
    async fn send(&self, request: &UpdateRequest) -> Result<TransportResponse, crate::Error>;

    /// Transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}
