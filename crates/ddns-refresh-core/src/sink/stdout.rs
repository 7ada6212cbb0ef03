// # Stdout Sink
//
// Prints a short human-readable summary of a report, one line per endpoint.

use async_trait::async_trait;
use std::io::Write;

use crate::config::SinkConfig;
use crate::report::UpdateReport;
use crate::traits::{ReportSink, ReportSinkFactory, SinkCapability};
use crate::Error;

/// Sink printing a summary to stdout
#[derive(Debug, Clone, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }

    /// Render the summary printed for a report
    pub fn render(report: &UpdateReport) -> String {
        let mut out = format!(
            "DNS refresh at {}: {}/{} endpoint(s) succeeded\n",
            report.generated_at().to_rfc3339(),
            report.total_succeeded(),
            report.total_configured()
        );

        for outcome in report.outcomes() {
            let status = if outcome.success() { "ok" } else { "FAILED" };
            out.push_str(&format!(
                "  [{status}] {} ({} attempt(s), {} ms): {}\n",
                outcome.hostname(),
                outcome.attempts(),
                outcome.duration_taken().as_millis(),
                outcome.message()
            ));
            for host in outcome.hosts() {
                let mark = if host.success { "+" } else { "-" };
                out.push_str(&format!("      {mark} {}: {}\n", host.hostname, host.message));
            }
        }

        for warning in report.warnings() {
            out.push_str(&format!("  warning: {warning}\n"));
        }

        out
    }
}

#[async_trait]
impl ReportSink for StdoutSink {
    async fn consume(&self, report: &UpdateReport) -> Result<(), Error> {
        let rendered = Self::render(report);
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(rendered.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|e| Error::sink("stdout", e.to_string()))
    }

    fn capabilities(&self) -> Vec<SinkCapability> {
        vec![SinkCapability::Print]
    }

    fn sink_name(&self) -> &'static str {
        "stdout"
    }
}

/// Factory for creating stdout sinks
pub struct StdoutSinkFactory;

impl ReportSinkFactory for StdoutSinkFactory {
    fn create(&self, config: &SinkConfig) -> Result<Box<dyn ReportSink>, Error> {
        match config {
            SinkConfig::Stdout => Ok(Box::new(StdoutSink::new())),
            _ => Err(Error::config("Invalid config for stdout sink")),
        }
    }
}
