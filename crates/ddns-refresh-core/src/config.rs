//! Configuration types for the update orchestrator
//!
//! This module defines all configuration structures used throughout the crate.
//! The core does not mandate a configuration source; [`RefreshConfig`] is
//! serde-enabled so callers can load it from JSON, the environment, or a
//! remote service.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::client::RetryPolicy;
use crate::endpoint::{HttpMethod, ProviderEndpoint};
use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Endpoints to refresh, in report order
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,

    /// Retry settings shared by every endpoint
    #[serde(default)]
    pub retry: RetryConfig,

    /// Orchestrator settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Where reports go
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

impl RefreshConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(format!("Invalid configuration: {e}")))
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    /// Validate the configuration
    ///
    /// An empty endpoint list is valid: the orchestrator reports it as a
    /// warning, not an error.
    pub fn validate(&self) -> Result<()> {
        self.endpoints()?;
        self.retry.policy()?;
        self.orchestrator.validate()?;
        for sink in &self.sinks {
            sink.validate()?;
        }
        Ok(())
    }

    /// Build the validated endpoint list
    pub fn endpoints(&self) -> Result<Vec<ProviderEndpoint>> {
        let endpoints = self
            .endpoints
            .iter()
            .map(EndpointConfig::to_endpoint)
            .collect::<Result<Vec<_>>>()?;
        ensure_unique_hostnames(&endpoints)?;
        Ok(endpoints)
    }
}

/// Reject endpoint lists naming the same hostname twice
pub fn ensure_unique_hostnames(endpoints: &[ProviderEndpoint]) -> Result<()> {
    let mut seen = HashSet::new();
    for endpoint in endpoints {
        if !seen.insert(endpoint.hostname()) {
            return Err(Error::config(format!(
                "Duplicate endpoint hostname: {}",
                endpoint.hostname()
            )));
        }
    }
    Ok(())
}

/// Endpoint configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Hostname to refresh
    pub hostname: String,

    /// Update URL, may contain `{hostname}`
    pub update_url: String,

    /// Bearer token
    /// ⚠️ NEVER log this value
    #[serde(skip_serializing, default)]
    pub auth_token: String,

    /// Per-attempt timeout (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// HTTP method
    #[serde(default)]
    pub method: HttpMethod,
}

// Custom Debug implementation that hides the auth token
impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("hostname", &self.hostname)
            .field("update_url", &self.update_url)
            .field("auth_token", &"<REDACTED>")
            .field("timeout_secs", &self.timeout_secs)
            .field("method", &self.method)
            .finish()
    }
}

impl EndpointConfig {
    /// Create an endpoint configuration with the default timeout
    pub fn new(
        hostname: impl Into<String>,
        update_url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            update_url: update_url.into(),
            auth_token: auth_token.into(),
            timeout_secs: default_timeout_secs(),
            method: HttpMethod::default(),
        }
    }

    /// Set the per-attempt timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the HTTP method
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Build the validated endpoint
    pub fn to_endpoint(&self) -> Result<ProviderEndpoint> {
        ProviderEndpoint::new(
            self.hostname.clone(),
            self.update_url.clone(),
            self.auth_token.clone(),
            Duration::from_secs(self.timeout_secs),
        )
        .map(|endpoint| endpoint.with_method(self.method))
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of requests per endpoint, first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (in milliseconds), doubled on each retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for the retry delay (in milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Build the retry policy
    pub fn policy(&self) -> Result<RetryPolicy> {
        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::config(format!(
                "max_delay_ms ({}) must not be lower than base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(
            RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))?
                .with_max_delay(Duration::from_millis(self.max_delay_ms)),
        )
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of endpoints refreshed at once (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Capacity of the orchestrator event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl OrchestratorConfig {
    /// Validate the orchestrator configuration
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("Orchestrator concurrency must be at least 1"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be at least 1"));
        }
        Ok(())
    }

    /// Set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Report sink configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Append one line per host to a log file
    LogFile {
        /// Path to the log file
        path: String,
    },

    /// Print a summary to stdout
    Stdout,

    /// Emit the report as tracing events
    Tracing,

    /// Write a Prometheus textfile
    MetricsFile {
        /// Path to the `.prom` file
        path: String,
    },

    /// Custom sink
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SinkConfig {
    /// Validate the sink configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            SinkConfig::LogFile { path } | SinkConfig::MetricsFile { path } => {
                if path.trim().is_empty() {
                    return Err(Error::config(format!(
                        "{} sink path cannot be empty",
                        self.type_name()
                    )));
                }
                Ok(())
            }
            SinkConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom sink factory cannot be empty"));
                }
                Ok(())
            }
            SinkConfig::Stdout | SinkConfig::Tracing => Ok(()),
        }
    }

    /// Get the sink type name
    pub fn type_name(&self) -> &str {
        match self {
            SinkConfig::LogFile { .. } => "log_file",
            SinkConfig::Stdout => "stdout",
            SinkConfig::Tracing => "tracing",
            SinkConfig::MetricsFile { .. } => "metrics_file",
            SinkConfig::Custom { factory, .. } => factory,
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    RetryPolicy::DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_concurrency() -> usize {
    1
}

fn default_event_channel_capacity() -> usize {
    100
}
