// # Tracing Sink
//
// Emits a report as `tracing` events, so it lands wherever the process'
// subscriber sends logs (journald, stderr, JSON collectors, ...).

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::SinkConfig;
use crate::report::UpdateReport;
use crate::traits::{ReportSink, ReportSinkFactory, SinkCapability};
use crate::Error;

/// Sink logging reports through `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportSink for TracingSink {
    async fn consume(&self, report: &UpdateReport) -> Result<(), Error> {
        for outcome in report.outcomes() {
            if outcome.success() {
                info!(
                    hostname = outcome.hostname(),
                    attempts = outcome.attempts(),
                    duration_ms = outcome.duration_taken().as_millis() as u64,
                    "SUCCESS - Host: {}, Message: {}",
                    outcome.hostname(),
                    outcome.message()
                );
            } else {
                error!(
                    hostname = outcome.hostname(),
                    attempts = outcome.attempts(),
                    failure = outcome.failure().map(|kind| kind.as_str()).unwrap_or_default(),
                    "FAILED - Host: {}, Message: {}",
                    outcome.hostname(),
                    outcome.message()
                );
            }
        }

        for warning in report.warnings() {
            warn!("{}", warning);
        }

        info!(
            configured = report.total_configured(),
            succeeded = report.total_succeeded(),
            "DNS refresh report"
        );
        Ok(())
    }

    fn capabilities(&self) -> Vec<SinkCapability> {
        vec![SinkCapability::AppendLog]
    }

    fn sink_name(&self) -> &'static str {
        "tracing"
    }
}

/// Factory for creating tracing sinks
pub struct TracingSinkFactory;

impl ReportSinkFactory for TracingSinkFactory {
    fn create(&self, config: &SinkConfig) -> Result<Box<dyn ReportSink>, Error> {
        match config {
            SinkConfig::Tracing => Ok(Box::new(TracingSink::new())),
            _ => Err(Error::config("Invalid config for tracing sink")),
        }
    }
}
