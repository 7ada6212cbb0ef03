// # Metrics File Sink
//
// Exports a report as a Prometheus textfile, for node_exporter's textfile
// collector. The file describes the most recent run only and is replaced
// atomically (write-then-rename) so the collector never reads a partial file.
//
// ## File Format
//
// ```text
// # HELP ddns_refresh_endpoints_configured Endpoints configured in the last run.
// # TYPE ddns_refresh_endpoints_configured gauge
// ddns_refresh_endpoints_configured 2
// ...
// ddns_refresh_endpoint_success{hostname="nas.example.com"} 1
// ```

use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::SinkConfig;
use crate::report::{Outcome, UpdateReport};
use crate::traits::{ReportSink, ReportSinkFactory, SinkCapability};
use crate::Error;

/// Sink writing a Prometheus textfile
#[derive(Debug, Clone)]
pub struct MetricsFileSink {
    path: PathBuf,
}

impl MetricsFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the textfile contents for a report
    pub fn render(report: &UpdateReport) -> String {
        let mut out = String::new();

        gauge(
            &mut out,
            "ddns_refresh_endpoints_configured",
            "Endpoints configured in the last run.",
            &[(None, report.total_configured() as f64)],
        );
        gauge(
            &mut out,
            "ddns_refresh_endpoints_succeeded",
            "Endpoints refreshed successfully in the last run.",
            &[(None, report.total_succeeded() as f64)],
        );
        gauge(
            &mut out,
            "ddns_refresh_warnings",
            "Warnings raised in the last run.",
            &[(None, report.warnings().len() as f64)],
        );
        gauge(
            &mut out,
            "ddns_refresh_last_run_timestamp_seconds",
            "Unix time the last report was generated.",
            &[(None, report.generated_at().timestamp() as f64)],
        );

        gauge(
            &mut out,
            "ddns_refresh_endpoint_success",
            "Whether the endpoint was refreshed successfully (1) or not (0).",
            &per_endpoint(report, |o| if o.success() { 1.0 } else { 0.0 }),
        );
        gauge(
            &mut out,
            "ddns_refresh_endpoint_attempts",
            "Requests sent to the endpoint in the last run.",
            &per_endpoint(report, |o| f64::from(o.attempts())),
        );
        gauge(
            &mut out,
            "ddns_refresh_endpoint_duration_seconds",
            "Time spent refreshing the endpoint in the last run.",
            &per_endpoint(report, |o| o.duration_taken().as_secs_f64()),
        );

        out
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        PathBuf::from(temp)
    }
}

/// Append one gauge family; samples without a hostname carry no labels
fn gauge(out: &mut String, name: &str, help: &str, samples: &[(Option<&str>, f64)]) {
    if samples.is_empty() {
        return;
    }
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    for (hostname, value) in samples {
        match hostname {
            Some(hostname) => {
                let _ = writeln!(out, "{name}{{hostname=\"{}\"}} {value}", escape_label(hostname));
            }
            None => {
                let _ = writeln!(out, "{name} {value}");
            }
        }
    }
}

fn per_endpoint(report: &UpdateReport, value: impl Fn(&Outcome) -> f64) -> Vec<(Option<&str>, f64)> {
    report
        .outcomes()
        .iter()
        .map(|outcome| (Some(outcome.hostname()), value(outcome)))
        .collect()
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[async_trait]
impl ReportSink for MetricsFileSink {
    async fn consume(&self, report: &UpdateReport) -> Result<(), Error> {
        let rendered = Self::render(report);
        let temp_path = self.temp_path();

        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::sink(
                    "metrics_file",
                    format!("Failed to create temp file {}: {}", temp_path.display(), e),
                )
            })?;
            file.write_all(rendered.as_bytes()).await.map_err(|e| {
                Error::sink(
                    "metrics_file",
                    format!("Failed to write temp file {}: {}", temp_path.display(), e),
                )
            })?;
            file.flush().await?;
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::sink(
                "metrics_file",
                format!(
                    "Failed to rename {} to {}: {}",
                    temp_path.display(),
                    self.path.display(),
                    e
                ),
            )
        })?;

        tracing::trace!("Metrics written to {}", self.path.display());
        Ok(())
    }

    fn capabilities(&self) -> Vec<SinkCapability> {
        vec![SinkCapability::ExportMetric]
    }

    fn sink_name(&self) -> &'static str {
        "metrics_file"
    }
}

/// Factory for creating metrics file sinks
pub struct MetricsFileSinkFactory;

impl ReportSinkFactory for MetricsFileSinkFactory {
    fn create(&self, config: &SinkConfig) -> Result<Box<dyn ReportSink>, Error> {
        match config {
            SinkConfig::MetricsFile { path } => Ok(Box::new(MetricsFileSink::new(path))),
            _ => Err(Error::config("Invalid config for metrics file sink")),
        }
    }
}
