// # ddns-refresh-core
//
// Core library for the dynamic-DNS refresh orchestrator.
//
// ## Architecture Overview
//
// This library refreshes a configured list of DNS records through their
// provider update APIs:
// - **ProviderEndpoint**: Validated description of one host and its update API
// - **UpdateTransport**: Trait for sending one update request (HTTP in practice)
// - **UpdateClient**: One endpoint, one call, with timeout and retry
// - **UpdateOrchestrator**: All endpoints, bounded concurrency, ordered report
// - **ReportSink**: Trait for consuming the finished report
// - **SinkRegistry**: Plugin-based registry for report sinks
//
// ## Design Principles
//
// 1. **Failures are data**: every endpoint yields exactly one `Outcome`
// 2. **Configuration order**: the report lists outcomes in input order,
//    whatever the completion order was
// 3. **Library-First**: the binary only wires configuration, transport and sinks
// 4. **Secrets stay secret**: auth tokens are redacted from every `Debug`

pub mod cancel;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod sink;
pub mod traits;

// Re-export core types for convenience
pub use cancel::{CancellationSource, CancellationToken};
pub use client::{RetryPolicy, UpdateClient};
pub use config::{EndpointConfig, OrchestratorConfig, RefreshConfig, RetryConfig, SinkConfig};
pub use endpoint::{HttpMethod, ProviderEndpoint};
pub use error::{Error, FailureKind, Result};
pub use orchestrator::{OrchestratorEvent, UpdateOrchestrator};
pub use registry::SinkRegistry;
pub use report::{HostResult, Outcome, ReportWarning, UpdateReport};
pub use sink::{FanoutSink, LogFileSink, MemorySink, MetricsFileSink, StdoutSink, TracingSink};
pub use traits::{ReportSink, TransportResponse, UpdateRequest, UpdateTransport};
