// # Report Sink Trait
//
// Defines the consumer of a finished `UpdateReport`. The orchestrator
// depends only on this trait, so changing where or how results are written
// never touches orchestration logic.
//
// ## Implementations
//
// - `LogFileSink`, `StdoutSink`, `TracingSink`, `MetricsFileSink`,
//   `MemorySink`, `FanoutSink`: see `crate::sink`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::report::UpdateReport;

/// What a sink does with a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkCapability {
    /// Append entries to a log
    AppendLog,
    /// Print for a human
    Print,
    /// Export as metrics
    ExportMetric,
}

/// Trait for report consumers
///
/// A report is handed to its sink exactly once per run. Implementations must
/// be thread-safe.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Consume a finished report
    async fn consume(&self, report: &UpdateReport) -> Result<(), crate::Error>;

    /// Capabilities this sink provides
    fn capabilities(&self) -> Vec<SinkCapability>;

    /// Sink name (for logging/debugging)
    fn sink_name(&self) -> &'static str;
}

/// Helper trait for constructing sinks from configuration
pub trait ReportSinkFactory: Send + Sync {
    /// Create a ReportSink instance from configuration
    fn create(
        &self,
        config: &crate::config::SinkConfig,
    ) -> Result<Box<dyn ReportSink>, crate::Error>;
}
