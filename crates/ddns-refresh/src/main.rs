// # ddns-refresh - One-shot Dynamic DNS Refresh
//
// Refreshes every configured endpoint once, hands the report to the
// configured sinks and exits. Meant to be run from cron or a systemd timer.
//
// This binary is a THIN integration layer:
// 1. Reading configuration from the environment (and optionally a JSON file)
// 2. Initializing logging and the runtime
// 3. Wiring the HTTP transport, the orchestrator and the report sinks
// 4. Mapping the run result to an exit code
//
// All refresh logic lives in ddns-refresh-core.
//
// ## Configuration
//
// ### Endpoints
// - `DDNS_REFRESH_CONFIG`: Path to a JSON `RefreshConfig` file. When set,
//   endpoints, retry, concurrency and sinks come from the file.
// - `DDNS_REFRESH_API_URL`: Update URL for the single-endpoint mode
//   (default: the local panel's `update-all` API)
// - `DDNS_REFRESH_AUTH_TOKEN`: Bearer token for the single-endpoint mode
// - `DDNS_REFRESH_HOSTNAME`: Name reported for the single endpoint
//   (default: `update-all`)
//
// ### Update behavior (override file values when set)
// - `DDNS_REFRESH_CONCURRENCY`: Endpoints refreshed at once (1-64)
// - `DDNS_REFRESH_MAX_ATTEMPTS`: Attempts per endpoint (1-10)
// - `DDNS_REFRESH_BASE_DELAY_MS`: First retry delay in milliseconds
// - `DDNS_REFRESH_TIMEOUT_SECS`: Per-request timeout (single-endpoint mode)
//
// ### Report sinks (added to the configured sinks)
// - `DDNS_REFRESH_LOG_FILE`: Append the classic refresh log to this file
// - `DDNS_REFRESH_METRICS_FILE`: Write a Prometheus textfile here
// - `DDNS_REFRESH_STDOUT`: Print a summary (`true`/`false`)
//
// ### Logging
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export DDNS_REFRESH_AUTH_TOKEN=your_token
// export DDNS_REFRESH_LOG_FILE=/var/log/dynamic-dns.log
//
// ddns-refresh
// ```

use anyhow::{Context, Result};
use ddns_refresh_core::config::{EndpointConfig, RefreshConfig, SinkConfig};
use ddns_refresh_core::{
    CancellationSource, OrchestratorEvent, SinkRegistry, UpdateClient, UpdateOrchestrator,
    UpdateReport,
};
use ddns_refresh_http::ReqwestTransport;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Update URL of the local panel API, used when none is configured
const DEFAULT_API_URL: &str = "http://localhost:3000/network/dynamic-dns/update-all";

/// Hostname reported for the single-endpoint mode
const DEFAULT_HOSTNAME: &str = "update-all";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Every endpoint refreshed
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
/// - 3: Run completed, at least one endpoint failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshExitCode {
    /// Every endpoint refreshed (or none configured)
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
    /// At least one endpoint failed
    UpdateFailed = 3,
}

impl From<RefreshExitCode> for ExitCode {
    fn from(code: RefreshExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl RefreshExitCode {
    fn for_report(report: &UpdateReport) -> Self {
        if report.all_succeeded() {
            RefreshExitCode::Success
        } else {
            RefreshExitCode::UpdateFailed
        }
    }
}

/// Settings read from the environment
#[derive(Clone)]
struct Settings {
    config_path: Option<PathBuf>,
    api_url: String,
    auth_token: Option<String>,
    hostname: String,
    log_file: Option<String>,
    metrics_file: Option<String>,
    stdout: bool,
    concurrency: Option<usize>,
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    timeout_secs: Option<u64>,
    log_level: String,
}

// Custom Debug implementation that hides the auth token
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("config_path", &self.config_path)
            .field("api_url", &self.api_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<REDACTED>"))
            .field("hostname", &self.hostname)
            .field("log_file", &self.log_file)
            .field("metrics_file", &self.metrics_file)
            .field("stdout", &self.stdout)
            .field("concurrency", &self.concurrency)
            .field("max_attempts", &self.max_attempts)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("timeout_secs", &self.timeout_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through a variable lookup
    ///
    /// Empty values are treated as unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Ok(Self {
            config_path: var("DDNS_REFRESH_CONFIG").map(PathBuf::from),
            api_url: var("DDNS_REFRESH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            auth_token: var("DDNS_REFRESH_AUTH_TOKEN"),
            hostname: var("DDNS_REFRESH_HOSTNAME").unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
            log_file: var("DDNS_REFRESH_LOG_FILE"),
            metrics_file: var("DDNS_REFRESH_METRICS_FILE"),
            stdout: parse_flag("DDNS_REFRESH_STDOUT", var("DDNS_REFRESH_STDOUT"))?,
            concurrency: parse_number("DDNS_REFRESH_CONCURRENCY", var("DDNS_REFRESH_CONCURRENCY"))?,
            max_attempts: parse_number(
                "DDNS_REFRESH_MAX_ATTEMPTS",
                var("DDNS_REFRESH_MAX_ATTEMPTS"),
            )?,
            base_delay_ms: parse_number(
                "DDNS_REFRESH_BASE_DELAY_MS",
                var("DDNS_REFRESH_BASE_DELAY_MS"),
            )?,
            timeout_secs: parse_number(
                "DDNS_REFRESH_TIMEOUT_SECS",
                var("DDNS_REFRESH_TIMEOUT_SECS"),
            )?,
            log_level: var("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the settings
    ///
    /// Endpoint-level validation (URL scheme, hostname length, ...) is done
    /// by the core when the endpoints are built.
    fn validate(&self) -> Result<()> {
        if self.config_path.is_none() && self.auth_token.is_none() {
            anyhow::bail!(
                "DDNS_REFRESH_AUTH_TOKEN is required. \
                Set it via: export DDNS_REFRESH_AUTH_TOKEN=your_token \
                (or point DDNS_REFRESH_CONFIG at a JSON config file)"
            );
        }

        // Check for obvious placeholder tokens (common mistake)
        if let Some(token) = &self.auth_token {
            let token_lower = token.to_lowercase();
            if token_lower.contains("your_api_token")
                || token_lower.contains("your_token")
                || token_lower.contains("replace_me")
            {
                anyhow::bail!(
                    "DDNS_REFRESH_AUTH_TOKEN appears to be a placeholder. \
                    Use the actual API token of your panel."
                );
            }
        }

        if let Some(concurrency) = self.concurrency
            && !(1..=64).contains(&concurrency)
        {
            anyhow::bail!(
                "DDNS_REFRESH_CONCURRENCY must be between 1 and 64. Got: {}",
                concurrency
            );
        }

        if let Some(max_attempts) = self.max_attempts
            && !(1..=10).contains(&max_attempts)
        {
            anyhow::bail!(
                "DDNS_REFRESH_MAX_ATTEMPTS must be between 1 and 10. Got: {}",
                max_attempts
            );
        }

        if let Some(base_delay_ms) = self.base_delay_ms
            && !(1..=300_000).contains(&base_delay_ms)
        {
            anyhow::bail!(
                "DDNS_REFRESH_BASE_DELAY_MS must be between 1 and 300000. Got: {}",
                base_delay_ms
            );
        }

        if let Some(timeout_secs) = self.timeout_secs
            && !(1..=300).contains(&timeout_secs)
        {
            anyhow::bail!(
                "DDNS_REFRESH_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                timeout_secs
            );
        }

        // Validate log level
        parse_log_level(&self.log_level)?;

        Ok(())
    }

    /// Build the run configuration
    ///
    /// Starts from the JSON file when one is configured, otherwise from a
    /// single endpoint; environment overrides and sinks are applied on top.
    fn refresh_config(&self) -> Result<RefreshConfig> {
        let mut config = match &self.config_path {
            Some(path) => RefreshConfig::from_file(path)?,
            None => {
                let token = self
                    .auth_token
                    .clone()
                    .context("DDNS_REFRESH_AUTH_TOKEN is required")?;
                let mut endpoint = EndpointConfig::new(&self.hostname, &self.api_url, token);
                if let Some(timeout_secs) = self.timeout_secs {
                    endpoint = endpoint.with_timeout_secs(timeout_secs);
                }
                let mut config = RefreshConfig::new();
                config.endpoints.push(endpoint);
                config
            }
        };

        if let Some(concurrency) = self.concurrency {
            config.orchestrator.concurrency = concurrency;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(base_delay_ms) = self.base_delay_ms {
            config.retry.base_delay_ms = base_delay_ms;
        }

        if config.sinks.is_empty() {
            config.sinks.push(SinkConfig::Tracing);
        }
        if let Some(path) = &self.log_file {
            config.sinks.push(SinkConfig::LogFile { path: path.clone() });
        }
        if let Some(path) = &self.metrics_file {
            config.sinks.push(SinkConfig::MetricsFile { path: path.clone() });
        }
        if self.stdout && !config.sinks.contains(&SinkConfig::Stdout) {
            config.sinks.push(SinkConfig::Stdout);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_number<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} must be a number. Got: '{}' ({})", key, raw, e))
        })
        .transpose()
}

fn parse_flag(key: &str, value: Option<String>) -> Result<bool> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => anyhow::bail!("{} must be true or false. Got: '{}'", key, other),
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DDNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load settings from environment
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return RefreshExitCode::ConfigError.into();
        }
    };

    // Validate settings
    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {}", e);
        return RefreshExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_log_level(&settings.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RefreshExitCode::ConfigError.into();
    }

    let config = match settings.refresh_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return RefreshExitCode::ConfigError.into();
        }
    };

    info!(
        "Starting ddns-refresh: {} endpoint(s), {} sink(s)",
        config.endpoints.len(),
        config.sinks.len()
    );
    debug!("Settings: {:?}", settings);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RefreshExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_refresh(config).await {
            Ok(code) => code,
            Err(RunError::Config(e)) => {
                error!("Configuration error: {:#}", e);
                RefreshExitCode::ConfigError
            }
            Err(RunError::Runtime(e)) => {
                error!("Refresh error: {:#}", e);
                RefreshExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Failure of a refresh run, split by exit code
enum RunError {
    Config(anyhow::Error),
    Runtime(anyhow::Error),
}

/// Run one refresh and deliver the report
async fn run_refresh(config: RefreshConfig) -> std::result::Result<RefreshExitCode, RunError> {
    let endpoints = config
        .endpoints()
        .context("Invalid endpoint configuration")
        .map_err(RunError::Config)?;
    let policy = config
        .retry
        .policy()
        .context("Invalid retry configuration")
        .map_err(RunError::Config)?;

    let registry = SinkRegistry::with_builtin();
    let sink = registry
        .create_sinks(&config.sinks)
        .context("Invalid sink configuration")
        .map_err(RunError::Config)?;

    let transport = ReqwestTransport::new()
        .context("Failed to create HTTP transport")
        .map_err(RunError::Runtime)?;
    let client = UpdateClient::new(Arc::new(transport), policy);
    let (orchestrator, mut events) = UpdateOrchestrator::new(client, &config.orchestrator)
        .context("Invalid orchestrator configuration")
        .map_err(RunError::Config)?;

    // Drain orchestrator events into debug logs
    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                OrchestratorEvent::UpdateFailed {
                    hostname, attempts, ..
                } => debug!("Event: {} failed after {} attempt(s)", hostname, attempts),
                other => debug!("Event: {:?}", other),
            }
        }
    });

    // Ctrl-C / SIGTERM stop retries and skip endpoints not yet started
    let cancel = CancellationSource::new();
    let result = {
        let run = orchestrator.run_and_deliver(&endpoints, cancel.token(), &sink);
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => result,
            signal = wait_for_shutdown_signal() => {
                match signal {
                    Ok(name) => {
                        warn!("Received {}, cancelling refresh", name);
                        cancel.cancel();
                    }
                    Err(e) => warn!("Signal handling unavailable: {:#}", e),
                }
                run.await
            }
        }
    };

    // Closing the event channel ends the logger task
    drop(orchestrator);
    if let Err(e) = event_logger.await {
        warn!("Event logger task failed: {}", e);
    }

    match result {
        Ok(report) => {
            info!(
                "Refresh complete: {}/{} endpoint(s) succeeded",
                report.total_succeeded(),
                report.total_configured()
            );
            Ok(RefreshExitCode::for_report(&report))
        }
        Err(e @ ddns_refresh_core::Error::Config(_)) => Err(RunError::Config(e.into())),
        Err(e) => Err(RunError::Runtime(e.into())),
    }
}

/// Wait for a shutdown signal (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

/// Wait for a shutdown signal (Ctrl-C only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("CTRL-C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_single_endpoint_defaults() {
        let settings = settings(&[("DDNS_REFRESH_AUTH_TOKEN", "abc123")]).unwrap();
        settings.validate().unwrap();

        let config = settings.refresh_config().unwrap();
        assert_eq!(config.endpoints.len(), 1);
        let endpoint = config.endpoints().unwrap().remove(0);
        assert_eq!(endpoint.hostname(), DEFAULT_HOSTNAME);
        assert_eq!(endpoint.update_url(), DEFAULT_API_URL);
        assert_eq!(config.orchestrator.concurrency, 1);
        assert_eq!(config.sinks, vec![SinkConfig::Tracing]);
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let settings = settings(&[("DDNS_REFRESH_API_URL", "https://panel.lan/update")]).unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("DDNS_REFRESH_AUTH_TOKEN is required"));
    }

    #[test]
    fn test_placeholder_token_is_rejected() {
        let settings = settings(&[("DDNS_REFRESH_AUTH_TOKEN", "your_api_token_here")]).unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(settings(&[("DDNS_REFRESH_CONCURRENCY", "many")]).is_err());

        let settings = settings(&[
            ("DDNS_REFRESH_AUTH_TOKEN", "abc123"),
            ("DDNS_REFRESH_MAX_ATTEMPTS", "0"),
        ])
        .unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("DDNS_REFRESH_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_invalid_log_level() {
        let settings = settings(&[
            ("DDNS_REFRESH_AUTH_TOKEN", "abc123"),
            ("DDNS_LOG_LEVEL", "verbose"),
        ])
        .unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_sinks_from_environment() {
        let settings = settings(&[
            ("DDNS_REFRESH_AUTH_TOKEN", "abc123"),
            ("DDNS_REFRESH_LOG_FILE", "/var/log/dynamic-dns.log"),
            ("DDNS_REFRESH_METRICS_FILE", "/var/lib/node_exporter/ddns.prom"),
            ("DDNS_REFRESH_STDOUT", "true"),
        ])
        .unwrap();

        let config = settings.refresh_config().unwrap();
        assert_eq!(
            config.sinks,
            vec![
                SinkConfig::Tracing,
                SinkConfig::LogFile {
                    path: "/var/log/dynamic-dns.log".to_string()
                },
                SinkConfig::MetricsFile {
                    path: "/var/lib/node_exporter/ddns.prom".to_string()
                },
                SinkConfig::Stdout,
            ]
        );
    }

    #[test]
    fn test_config_file_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "endpoints": [
                    {{"hostname": "nas.example.com", "update_url": "https://dyn.example.com/nic/update?hostname={{hostname}}", "auth_token": "t1"}},
                    {{"hostname": "cam.example.com", "update_url": "https://dyn.example.com/nic/update?hostname={{hostname}}", "auth_token": "t2", "method": "POST"}}
                ],
                "orchestrator": {{"concurrency": 2}},
                "sinks": [{{"type": "stdout"}}]
            }}"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let settings = settings(&[
            ("DDNS_REFRESH_CONFIG", path.as_str()),
            ("DDNS_REFRESH_MAX_ATTEMPTS", "5"),
            ("DDNS_REFRESH_STDOUT", "yes"),
        ])
        .unwrap();
        settings.validate().unwrap();

        let config = settings.refresh_config().unwrap();
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.orchestrator.concurrency, 2);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.sinks, vec![SinkConfig::Stdout]);
    }

    #[test]
    fn test_debug_redacts_token() {
        let settings = settings(&[("DDNS_REFRESH_AUTH_TOKEN", "super-secret")]).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn test_exit_code_for_report() {
        use ddns_refresh_core::Outcome;

        let empty = UpdateReport::new(Vec::new(), Vec::new());
        assert_eq!(RefreshExitCode::for_report(&empty), RefreshExitCode::Success);

        let cancelled = UpdateReport::new(vec![Outcome::cancelled("a")], Vec::new());
        assert_eq!(
            RefreshExitCode::for_report(&cancelled),
            RefreshExitCode::UpdateFailed
        );
    }
}
