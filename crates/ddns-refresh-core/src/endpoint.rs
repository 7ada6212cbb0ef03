// # Provider Endpoints
//
// A `ProviderEndpoint` names one host to refresh and how to reach the
// provider API that refreshes it. Endpoints are validated on construction
// and immutable afterwards.
//
// ## Security
//
// The auth token is sent as a bearer credential and is NEVER logged. The
// `Debug` implementation redacts it.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Placeholder substituted with the endpoint hostname in `update_url`
pub const HOSTNAME_PLACEHOLDER: &str = "{hostname}";

/// Longest hostname accepted (RFC 1035)
const MAX_HOSTNAME_LEN: usize = 253;

/// HTTP method used for the update call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET (what dyndns2-style APIs expect)
    #[default]
    Get,
    /// POST with an empty body
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// One configured host and the update API that refreshes it
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    /// Hostname, unique within a configuration
    hostname: String,

    /// Update URL, may contain [`HOSTNAME_PLACEHOLDER`]
    update_url: String,

    /// Bearer token
    /// ⚠️ NEVER log this value
    auth_token: String,

    /// Upper bound for a single attempt
    timeout: Duration,

    /// HTTP method
    method: HttpMethod,
}

// Custom Debug implementation that hides the auth token
impl std::fmt::Debug for ProviderEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEndpoint")
            .field("hostname", &self.hostname)
            .field("update_url", &self.update_url)
            .field("auth_token", &"<REDACTED>")
            .field("timeout", &self.timeout)
            .field("method", &self.method)
            .finish()
    }
}

impl ProviderEndpoint {
    /// Create a validated endpoint using `GET`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the hostname is empty or too long, the
    /// URL is not an absolute http(s) URL, the token is empty, or the
    /// timeout is zero.
    pub fn new(
        hostname: impl Into<String>,
        update_url: impl Into<String>,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let hostname = hostname.into().trim().to_string();
        let update_url = update_url.into().trim().to_string();
        let auth_token = auth_token.into();

        if hostname.is_empty() {
            return Err(Error::config("Endpoint hostname cannot be empty"));
        }
        if hostname.len() > MAX_HOSTNAME_LEN {
            return Err(Error::config(format!(
                "Endpoint hostname too long: {} chars (max {})",
                hostname.len(),
                MAX_HOSTNAME_LEN
            )));
        }
        validate_update_url(&update_url.replace(HOSTNAME_PLACEHOLDER, &hostname))
            .map_err(|reason| Error::config(format!("Invalid update URL for {hostname}: {reason}")))?;
        if auth_token.trim().is_empty() {
            return Err(Error::config(format!(
                "Auth token for {hostname} cannot be empty"
            )));
        }
        if timeout.is_zero() {
            return Err(Error::config(format!(
                "Timeout for {hostname} must be greater than zero"
            )));
        }

        Ok(Self {
            hostname,
            update_url,
            auth_token,
            timeout,
            method: HttpMethod::Get,
        })
    }

    /// Use a different HTTP method
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The configured URL, placeholder included
    pub fn update_url(&self) -> &str {
        &self.update_url
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The URL to call, with [`HOSTNAME_PLACEHOLDER`] replaced
    pub fn resolved_url(&self) -> String {
        self.update_url.replace(HOSTNAME_PLACEHOLDER, &self.hostname)
    }
}

/// Parse the resolved URL and require an http(s) scheme with a host
fn validate_update_url(url: &str) -> std::result::Result<(), String> {
    if url.is_empty() {
        return Err("URL cannot be empty".to_string());
    }

    let parsed = Url::parse(url).map_err(|e| format!("{e}: {url}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("URL must use the http or https scheme: {url}"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(format!("URL has no host: {url}"));
    }

    Ok(())
}
