//! Plugin-based report sink registry
//!
//! The registry maps sink type names to factories, so the set of sinks a
//! run delivers to is decided by configuration rather than by if-else chains
//! in the binary.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_refresh_core::registry::SinkRegistry;
//! use ddns_refresh_core::config::SinkConfig;
//!
//! // Registry with log_file, stdout, tracing and metrics_file
//! let registry = SinkRegistry::with_builtin();
//!
//! // Register a custom sink
//! registry.register_sink("webhook", Box::new(WebhookSinkFactory));
//!
//! let sink = registry.create_sinks(&[
//!     SinkConfig::Tracing,
//!     SinkConfig::Custom { factory: "webhook".into(), config: json!({ ... }) },
//! ])?;
//! ```

use crate::config::SinkConfig;
use crate::error::{Error, Result};
use crate::sink::{
    FanoutSink, LogFileSinkFactory, MetricsFileSinkFactory, StdoutSinkFactory, TracingSinkFactory,
};
use crate::traits::{ReportSink, ReportSinkFactory};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Sink registry for plugin-based sink creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct SinkRegistry {
    /// Registered sink factories
    sinks: RwLock<HashMap<String, Box<dyn ReportSinkFactory>>>,
}

impl SinkRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in sink registered
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_sink("log_file", Box::new(LogFileSinkFactory));
        registry.register_sink("stdout", Box::new(StdoutSinkFactory));
        registry.register_sink("tracing", Box::new(TracingSinkFactory));
        registry.register_sink("metrics_file", Box::new(MetricsFileSinkFactory));
        registry
    }

    /// Register a sink factory
    ///
    /// # Parameters
    ///
    /// - `name`: Sink type name (e.g., "log_file", or the `factory` of a
    ///   `SinkConfig::Custom`)
    /// - `factory`: Factory object for creating sink instances
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register_sink(&self, name: impl Into<String>, factory: Box<dyn ReportSinkFactory>) {
        self.write().insert(name.into(), factory);
    }

    /// Create a sink from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ReportSink>)`: Created sink instance
    /// - `Err(Error)`: If the configuration is invalid, the sink type is not
    ///   registered, or creation fails
    pub fn create_sink(&self, config: &SinkConfig) -> Result<Box<dyn ReportSink>> {
        config.validate()?;

        let sink_type = config.type_name();
        let sinks = self.read();

        let factory = sinks
            .get(sink_type)
            .ok_or_else(|| Error::config(format!("Unknown sink type: {}", sink_type)))?;

        factory.create(config)
    }

    /// Create one sink delivering to every configured sink, in order
    pub fn create_sinks(&self, configs: &[SinkConfig]) -> Result<FanoutSink> {
        let sinks = configs
            .iter()
            .map(|config| self.create_sink(config))
            .collect::<Result<Vec<_>>>()?;

        Ok(FanoutSink::new(sinks))
    }

    /// List all registered sink types
    pub fn list_sinks(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a sink type is registered
    pub fn has_sink(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    // A panicking factory cannot leave the map half-written, so a poisoned
    // lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Box<dyn ReportSinkFactory>>> {
        self.sinks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Box<dyn ReportSinkFactory>>> {
        self.sinks.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("sinks", &self.list_sinks())
            .finish()
    }
}
