// # Log File Sink
//
// Appends one line per host result to a plain log file, in the format the
// cron-driven refresh script has always written:
//
// ```text
// 2024-05-01 10:00:00,123 - INFO - SUCCESS - Host: nas.example.com, Message: good 1.2.3.4
// 2024-05-01 10:00:00,123 - INFO - FAILED - Host: cam.example.com, Message: badauth
// 2024-05-01 10:00:00,123 - WARNING - No DNS services configured
// 2024-05-01 10:00:00,123 - ERROR - Update failed: update-all: HTTP 401: Unauthorized
// ```
//
// Rotation is left to logrotate; the sink only ever appends.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::SinkConfig;
use crate::report::{NO_SERVICES_MESSAGE, UpdateReport};
use crate::traits::{ReportSink, ReportSinkFactory, SinkCapability};
use crate::Error;

/// Timestamp format of each line
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Sink appending report lines to a log file
#[derive(Debug, Clone)]
pub struct LogFileSink {
    path: PathBuf,
}

impl LogFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the lines written for a report
    pub fn render(report: &UpdateReport) -> String {
        let timestamp = report.generated_at().format(TIMESTAMP_FORMAT).to_string();
        let mut lines = String::new();
        let mut push = |level: &str, text: String| {
            lines.push_str(&format!("{timestamp} - {level} - {text}\n"));
        };

        if report.is_empty() {
            push("WARNING", NO_SERVICES_MESSAGE.to_string());
            return lines;
        }

        for outcome in report.outcomes() {
            if outcome.reported_no_services() {
                push(
                    "WARNING",
                    format!("{NO_SERVICES_MESSAGE} (endpoint: {})", outcome.hostname()),
                );
                continue;
            }

            if outcome.hosts().is_empty() {
                push(
                    "ERROR",
                    format!("Update failed: {}: {}", outcome.hostname(), outcome.message()),
                );
                continue;
            }

            for host in outcome.hosts() {
                let status = if host.success { "SUCCESS" } else { "FAILED" };
                push(
                    "INFO",
                    format!("{status} - Host: {}, Message: {}", host.hostname, host.message),
                );
            }
        }

        lines
    }
}

#[async_trait]
impl ReportSink for LogFileSink {
    async fn consume(&self, report: &UpdateReport) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::sink(
                    "log_file",
                    format!("Failed to create log directory {}: {}", parent.display(), e),
                )
            })?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                Error::sink(
                    "log_file",
                    format!("Failed to open {}: {}", self.path.display(), e),
                )
            })?;

        file.write_all(Self::render(report).as_bytes())
            .await
            .map_err(|e| {
                Error::sink(
                    "log_file",
                    format!("Failed to write {}: {}", self.path.display(), e),
                )
            })?;
        file.flush().await?;

        tracing::trace!("Report appended to {}", self.path.display());
        Ok(())
    }

    fn capabilities(&self) -> Vec<SinkCapability> {
        vec![SinkCapability::AppendLog]
    }

    fn sink_name(&self) -> &'static str {
        "log_file"
    }
}

/// Factory for creating log file sinks
pub struct LogFileSinkFactory;

impl ReportSinkFactory for LogFileSinkFactory {
    fn create(&self, config: &SinkConfig) -> Result<Box<dyn ReportSink>, Error> {
        match config {
            SinkConfig::LogFile { path } => Ok(Box::new(LogFileSink::new(path))),
            _ => Err(Error::config("Invalid config for log file sink")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::report::{HostResult, Outcome};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tempfile::tempdir;

    fn sample_report() -> UpdateReport {
        let generated_at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        UpdateReport::at(
            generated_at,
            vec![
                Outcome::failed(
                    "update-all",
                    "1 of 2 host(s) failed: cam.example.com: badauth",
                    FailureKind::Application,
                    1,
                    Duration::from_millis(40),
                    vec![
                        HostResult::new("nas.example.com", true, "good 1.2.3.4"),
                        HostResult::new("cam.example.com", false, "badauth"),
                    ],
                ),
                Outcome::failed(
                    "backup.example.com",
                    "HTTP 401: Unauthorized",
                    FailureKind::Permanent,
                    1,
                    Duration::from_millis(5),
                    Vec::new(),
                ),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn test_render_lines() {
        let rendered = LogFileSink::render(&sample_report());
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "2024-05-01 10:00:00,000 - INFO - SUCCESS - Host: nas.example.com, Message: good 1.2.3.4",
                "2024-05-01 10:00:00,000 - INFO - FAILED - Host: cam.example.com, Message: badauth",
                "2024-05-01 10:00:00,000 - ERROR - Update failed: backup.example.com: HTTP 401: Unauthorized",
            ]
        );
    }

    #[test]
    fn test_render_empty_report() {
        let report = UpdateReport::new(Vec::new(), Vec::new());
        assert!(LogFileSink::render(&report).ends_with(" - WARNING - No DNS services configured\n"));
    }

    #[tokio::test]
    async fn test_appends_across_runs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("dynamic-dns.log");
        let sink = LogFileSink::new(&path);

        sink.consume(&sample_report()).await.unwrap();
        sink.consume(&sample_report()).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 6);
    }
}
