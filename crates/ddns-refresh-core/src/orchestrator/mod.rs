//! Update orchestrator
//!
//! The UpdateOrchestrator is responsible for:
//! - Dispatching one update call per configured endpoint
//! - Bounding how many calls run at once
//! - Collecting outcomes back into configuration order
//! - Handing the finished report to a sink
//!
//! ## Architecture
//!
//! ```text
//!   endpoints[0..n]
//!        │
//!        ▼
//! ┌──────────────────────┐   permits   ┌──────────────┐
//! │  UpdateOrchestrator  │────────────►│   workers    │── UpdateClient::update
//! └──────────────────────┘             └──────────────┘
//!        │                                    │
//!        │◄──────── slot[i] = Outcome ────────┘
//!        ▼
//! ┌──────────────┐          ┌──────────────┐
//! │ UpdateReport │─────────►│  ReportSink  │
//! └──────────────┘          └──────────────┘
//! ```
//!
//! ## Failure Isolation
//!
//! One endpoint's failure is recorded in its own outcome and never aborts the
//! run. The only error `run` returns is [`Error::Config`] for an invalid
//! endpoint list.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::client::UpdateClient;
use crate::config::{OrchestratorConfig, ensure_unique_hostnames};
use crate::endpoint::ProviderEndpoint;
use crate::error::{Error, FailureKind, Result};
use crate::report::{Outcome, ReportWarning, UpdateReport};
use crate::traits::ReportSink;

/// Events emitted by the UpdateOrchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    /// Run started
    RunStarted {
        endpoints: usize,
        concurrency: usize,
    },

    /// Run started with an empty endpoint list
    EmptyConfiguration,

    /// Endpoint refreshed
    UpdateSucceeded {
        hostname: String,
        attempts: u32,
    },

    /// Endpoint refresh failed
    UpdateFailed {
        hostname: String,
        message: String,
        attempts: u32,
    },

    /// Endpoint skipped because the run was cancelled before it started
    Cancelled {
        hostname: String,
    },

    /// Run finished, report built
    RunFinished {
        configured: usize,
        succeeded: usize,
    },
}

/// Orchestrates one refresh run over a list of endpoints
///
/// ## Lifecycle
///
/// 1. Create with [`UpdateOrchestrator::new()`]
/// 2. Call [`UpdateOrchestrator::run()`] (or one of its variants) once per
///    scheduled refresh
/// 3. Read lifecycle events from the returned receiver if desired
///
/// ## Concurrency
///
/// With a concurrency limit of 1 endpoints are refreshed one after another.
/// Above 1, every endpoint gets its own spawned task gated by a semaphore;
/// outcomes are still reported in configuration order. A worker that panics
/// is recorded as a failed outcome.
pub struct UpdateOrchestrator {
    /// Client performing the update calls
    client: UpdateClient,

    /// Maximum number of endpoints refreshed at once
    concurrency: usize,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<OrchestratorEvent>,
}

impl UpdateOrchestrator {
    /// Create a new orchestrator
    ///
    /// # Returns
    ///
    /// A tuple of (orchestrator, event_receiver) where event_receiver yields
    /// orchestrator events
    pub fn new(
        client: UpdateClient,
        config: &OrchestratorConfig,
    ) -> Result<(Self, mpsc::Receiver<OrchestratorEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let orchestrator = Self {
            client,
            concurrency: config.concurrency,
            event_tx: tx,
        };

        Ok((orchestrator, rx))
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Refresh every endpoint once
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateReport)`: outcomes in configuration order
    /// - `Err(Error::Config)`: the endpoint list names a hostname twice
    pub async fn run(&self, endpoints: &[ProviderEndpoint]) -> Result<UpdateReport> {
        self.run_with_cancel(endpoints, CancellationToken::never())
            .await
    }

    /// Refresh every endpoint once, stopping early when `cancel` fires
    ///
    /// In-flight calls finish their current attempt and stop retrying;
    /// endpoints not yet started are recorded as cancelled.
    pub async fn run_with_cancel(
        &self,
        endpoints: &[ProviderEndpoint],
        cancel: CancellationToken,
    ) -> Result<UpdateReport> {
        ensure_unique_hostnames(endpoints)?;

        let mut warnings = Vec::new();
        if endpoints.is_empty() {
            warn!("No DNS services configured");
            self.emit_event(OrchestratorEvent::EmptyConfiguration);
            warnings.push(ReportWarning::NoEndpointsConfigured);
            return Ok(self.finish(Vec::new(), warnings));
        }

        let concurrency = self.concurrency.min(endpoints.len());
        info!(
            "Refreshing {} endpoint(s) (concurrency {})",
            endpoints.len(),
            concurrency
        );
        self.emit_event(OrchestratorEvent::RunStarted {
            endpoints: endpoints.len(),
            concurrency,
        });

        let outcomes = if concurrency <= 1 {
            self.dispatch_sequential(endpoints, &cancel).await
        } else {
            self.dispatch_concurrent(endpoints, concurrency, &cancel)
                .await
        };

        for outcome in &outcomes {
            self.record_outcome(outcome);
            if outcome.reported_no_services() {
                warn!("No DNS services configured behind {}", outcome.hostname());
                warnings.push(ReportWarning::NoServicesReported {
                    hostname: outcome.hostname().to_string(),
                });
            }
        }

        Ok(self.finish(outcomes, warnings))
    }

    /// Run once and hand the report to `sink`
    ///
    /// Returns the report once the sink has consumed it. A sink failure is
    /// returned as [`Error::Sink`].
    pub async fn run_and_deliver(
        &self,
        endpoints: &[ProviderEndpoint],
        cancel: CancellationToken,
        sink: &dyn ReportSink,
    ) -> Result<UpdateReport> {
        let report = self.run_with_cancel(endpoints, cancel).await?;
        sink.consume(&report).await.map_err(|e| match e {
            Error::Sink { .. } => e,
            other => Error::sink(sink.sink_name(), other.to_string()),
        })?;
        Ok(report)
    }

    /// Refresh endpoints one after another, one worker at a time
    async fn dispatch_sequential(
        &self,
        endpoints: &[ProviderEndpoint],
        cancel: &CancellationToken,
    ) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if cancel.is_cancelled() {
                outcomes.push(Outcome::cancelled(endpoint.hostname()));
                continue;
            }
            let client = self.client.clone();
            let worker_endpoint = endpoint.clone();
            let worker_cancel = cancel.clone();
            let handle = tokio::spawn(async move {
                client
                    .update_with_cancel(&worker_endpoint, &worker_cancel)
                    .await
            });
            outcomes.push(
                handle
                    .await
                    .unwrap_or_else(|e| worker_failed(endpoint.hostname(), e)),
            );
        }
        outcomes
    }

    /// Refresh endpoints on a bounded pool of spawned workers
    async fn dispatch_concurrent(
        &self,
        endpoints: &[ProviderEndpoint],
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Vec<Outcome> {
        let permits = Arc::new(Semaphore::new(concurrency));
        let mut handles = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let client = self.client.clone();
            let endpoint = endpoint.clone();
            let cancel = cancel.clone();
            let permits = Arc::clone(&permits);

            handles.push(tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = permits.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return Outcome::cancelled(endpoint.hostname());
                };
                if cancel.is_cancelled() {
                    return Outcome::cancelled(endpoint.hostname());
                }
                client.update_with_cancel(&endpoint, &cancel).await
            }));
        }

        // Joining in spawn order puts outcome i in slot i, whatever order
        // the workers finished in
        let mut outcomes = Vec::with_capacity(endpoints.len());
        for (handle, endpoint) in handles.into_iter().zip(endpoints) {
            outcomes.push(
                handle
                    .await
                    .unwrap_or_else(|e| worker_failed(endpoint.hostname(), e)),
            );
        }
        outcomes
    }

    /// Log and emit the event for one finished outcome
    fn record_outcome(&self, outcome: &Outcome) {
        if outcome.success() {
            debug!(
                "Refreshed {} in {} attempt(s): {}",
                outcome.hostname(),
                outcome.attempts(),
                outcome.message()
            );
            self.emit_event(OrchestratorEvent::UpdateSucceeded {
                hostname: outcome.hostname().to_string(),
                attempts: outcome.attempts(),
            });
        } else if outcome.failure() == Some(FailureKind::Cancelled) {
            warn!("{}: {}", outcome.hostname(), outcome.message());
            self.emit_event(OrchestratorEvent::Cancelled {
                hostname: outcome.hostname().to_string(),
            });
        } else {
            warn!(
                "Failed to refresh {} after {} attempt(s): {}",
                outcome.hostname(),
                outcome.attempts(),
                outcome.message()
            );
            self.emit_event(OrchestratorEvent::UpdateFailed {
                hostname: outcome.hostname().to_string(),
                message: outcome.message().to_string(),
                attempts: outcome.attempts(),
            });
        }
    }

    fn finish(&self, outcomes: Vec<Outcome>, warnings: Vec<ReportWarning>) -> UpdateReport {
        let report = UpdateReport::new(outcomes, warnings);
        info!(
            "Refresh finished: {}/{} endpoint(s) succeeded",
            report.total_succeeded(),
            report.total_configured()
        );
        self.emit_event(OrchestratorEvent::RunFinished {
            configured: report.total_configured(),
            succeeded: report.total_succeeded(),
        });
        report
    }

    /// Emit an orchestrator event
    fn emit_event(&self, event: OrchestratorEvent) {
        // Never block a run on a slow event consumer
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Outcome recorded for a worker that panicked or was aborted
fn worker_failed(hostname: &str, e: JoinError) -> Outcome {
    error!("Worker for {} failed: {}", hostname, e);
    Outcome::failed(
        hostname,
        format!("worker failed: {e}"),
        FailureKind::Internal,
        1,
        Duration::ZERO,
        Vec::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RetryPolicy;
    use crate::traits::{TransportResponse, UpdateRequest, UpdateTransport};
    use async_trait::async_trait;

    struct EchoTransport;

    #[async_trait]
    impl UpdateTransport for EchoTransport {
        async fn send(&self, request: &UpdateRequest) -> Result<TransportResponse> {
            Ok(TransportResponse::new(
                200,
                format!(r#"{{"hostname": "{}", "success": true, "message": "good"}}"#, request.hostname),
            ))
        }

        fn transport_name(&self) -> &'static str {
            "echo"
        }
    }

    fn orchestrator(concurrency: usize) -> (UpdateOrchestrator, mpsc::Receiver<OrchestratorEvent>) {
        let client = UpdateClient::new(Arc::new(EchoTransport), RetryPolicy::no_retry());
        UpdateOrchestrator::new(client, &OrchestratorConfig::default().with_concurrency(concurrency))
            .unwrap()
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let client = UpdateClient::new(Arc::new(EchoTransport), RetryPolicy::no_retry());
        let config = OrchestratorConfig::default().with_concurrency(0);
        assert!(UpdateOrchestrator::new(client, &config).is_err());
    }

    #[tokio::test]
    async fn test_events_for_successful_run() {
        let (orchestrator, mut events) = orchestrator(1);
        let endpoint = ProviderEndpoint::new(
            "a.example.com",
            "https://dyn.example.com/update",
            "token",
            std::time::Duration::from_secs(1),
        )
        .unwrap();

        let report = orchestrator.run(&[endpoint]).await.unwrap();
        assert_eq!(report.total_succeeded(), 1);

        assert_eq!(
            events.try_recv().unwrap(),
            OrchestratorEvent::RunStarted {
                endpoints: 1,
                concurrency: 1
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            OrchestratorEvent::UpdateSucceeded {
                hostname: "a.example.com".to_string(),
                attempts: 1
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            OrchestratorEvent::RunFinished {
                configured: 1,
                succeeded: 1
            }
        );
        assert!(events.try_recv().is_err());
    }

    struct PanickingTransport;

    #[async_trait]
    impl UpdateTransport for PanickingTransport {
        async fn send(&self, request: &UpdateRequest) -> Result<TransportResponse> {
            if request.hostname == "boom.example.com" {
                panic!("transport bug");
            }
            EchoTransport.send(request).await
        }

        fn transport_name(&self) -> &'static str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_failed_outcome() {
        for concurrency in [1, 2] {
            let client = UpdateClient::new(Arc::new(PanickingTransport), RetryPolicy::no_retry());
            let (orchestrator, _events) = UpdateOrchestrator::new(
                client,
                &OrchestratorConfig::default().with_concurrency(concurrency),
            )
            .unwrap();
            let endpoints: Vec<ProviderEndpoint> = ["boom.example.com", "ok.example.com"]
                .iter()
                .map(|host| {
                    ProviderEndpoint::new(
                        *host,
                        "https://dyn.example.com/update",
                        "token",
                        std::time::Duration::from_secs(1),
                    )
                    .unwrap()
                })
                .collect();

            let report = orchestrator.run(&endpoints).await.unwrap();

            let boom = report.outcome("boom.example.com").unwrap();
            assert!(!boom.success());
            assert_eq!(boom.failure(), Some(FailureKind::Internal));
            assert!(report.outcome("ok.example.com").unwrap().success());
        }
    }
}
