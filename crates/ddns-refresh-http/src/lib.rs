// # HTTP Update Transport
//
// `reqwest`-backed implementation of `UpdateTransport`, the only component
// of the refresh runner that touches the network.
//
// ## Behavior
//
// - ONE request per `send` call: GET, or POST with an empty JSON object
// - `Authorization: Bearer <token>` and a fixed `User-Agent` on every request
// - Per-request timeout taken from the endpoint
// - Every HTTP response is returned as `Ok`, whatever its status; the
//   update client decides what a status means
// - NO retry, NO backoff: both are owned by `UpdateClient`
//
// ## Security Requirements
//
// - The auth token NEVER appears in logs or error messages
// - reqwest errors are rendered without their URL

use async_trait::async_trait;
use ddns_refresh_core::traits::{TransportResponse, UpdateRequest, UpdateTransport};
use ddns_refresh_core::{Error, HttpMethod, Result};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tracing::trace;

/// User-Agent sent with every update request
pub const DEFAULT_USER_AGENT: &str = concat!("ddns-refresh/", env!("CARGO_PKG_VERSION"));

/// HTTP transport for provider update endpoints
///
/// The underlying `reqwest::Client` is shared by every request, so one
/// transport can serve all workers of an orchestrator run.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    user_agent: String,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ReqwestTransport {
    /// Create a transport with a default client
    ///
    /// Timeouts are set per request from the endpoint configuration, so the
    /// client itself carries none.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client))
    }

    /// Create a transport over an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Override the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl UpdateTransport for ReqwestTransport {
    async fn send(&self, request: &UpdateRequest) -> Result<TransportResponse> {
        trace!("{} update request for {}", request.method, request.hostname);

        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self
                .client
                .post(&request.url)
                .header(CONTENT_TYPE, "application/json")
                .body("{}"),
        };

        let response = builder
            .bearer_auth(request.auth_token())
            .header(USER_AGENT, self.user_agent.as_str())
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| map_send_error(request, e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(request.timeout)
            } else {
                Error::network(format!(
                    "failed to read response body: {}",
                    e.without_url()
                ))
            }
        })?;

        trace!("{} answered HTTP {}", request.hostname, status);
        Ok(TransportResponse::new(status, body))
    }

    fn transport_name(&self) -> &'static str {
        "reqwest"
    }
}

fn map_send_error(request: &UpdateRequest, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        return Error::timeout(request.timeout);
    }
    if e.is_builder() {
        return Error::config(format!(
            "Invalid update request for {}: {}",
            request.hostname,
            e.without_url()
        ));
    }
    if e.is_connect() {
        return Error::network(format!("connection failed: {}", e.without_url()));
    }
    Error::network(e.without_url().to_string())
}
