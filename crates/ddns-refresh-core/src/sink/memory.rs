// # Memory Sink
//
// Keeps every delivered report in memory.
//
// ## When to Use
//
// - Tests asserting on what a run delivered
// - Embedding the orchestrator in a process that inspects reports itself

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::report::UpdateReport;
use crate::traits::{ReportSink, SinkCapability};
use crate::Error;

/// In-memory report sink
///
/// Clones share the same storage, so a test can hand one clone to the
/// orchestrator and inspect the other afterwards.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_refresh_core::sink::MemorySink;
/// use ddns_refresh_core::traits::ReportSink;
/// use ddns_refresh_core::UpdateReport;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let sink = MemorySink::new();
///     sink.consume(&UpdateReport::new(Vec::new(), Vec::new())).await?;
///     assert_eq!(sink.len().await, 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    reports: Arc<RwLock<Vec<UpdateReport>>>,
}

impl MemorySink {
    /// Create a new empty memory sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports delivered so far, oldest first
    pub async fn reports(&self) -> Vec<UpdateReport> {
        self.reports.read().await.clone()
    }

    /// The most recently delivered report
    pub async fn last(&self) -> Option<UpdateReport> {
        self.reports.read().await.last().cloned()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }

    /// Drop all stored reports
    pub async fn clear(&self) {
        self.reports.write().await.clear();
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn consume(&self, report: &UpdateReport) -> Result<(), Error> {
        self.reports.write().await.push(report.clone());
        Ok(())
    }

    fn capabilities(&self) -> Vec<SinkCapability> {
        Vec::new()
    }

    fn sink_name(&self) -> &'static str {
        "memory"
    }
}
