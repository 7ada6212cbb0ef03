//! Update client
//!
//! The [`UpdateClient`] performs the update call for one endpoint and owns
//! the retry policy:
//!
//! ```text
//! attempt ──► transport.send (bounded by endpoint timeout)
//!    │
//!    ├── 2xx ──► normalize body ──► Outcome (success iff every host succeeded)
//!    ├── timeout / network / 5xx ──► backoff, retry until max_attempts
//!    └── 4xx / malformed / application failure ──► failed Outcome, no retry
//! ```
//!
//! Every failure is returned as data inside an [`Outcome`]; `update` never
//! returns an error.

mod response;
pub mod retry;

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::cancel::CancellationToken;
use crate::endpoint::ProviderEndpoint;
use crate::error::{Error, FailureKind, Result};
use crate::report::{HostResult, NO_SERVICES_MESSAGE, Outcome};
use crate::traits::{UpdateRequest, UpdateTransport};
use response::ProviderReply;
pub use retry::RetryPolicy;

/// Message used when a successful response carries no status text
pub const DEFAULT_SUCCESS_MESSAGE: &str = "OK";

/// Client performing update calls with timeout and retry
#[derive(Clone)]
pub struct UpdateClient {
    transport: Arc<dyn UpdateTransport>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for UpdateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateClient")
            .field("transport", &self.transport.transport_name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl UpdateClient {
    /// Create a client over a transport
    pub fn new(transport: Arc<dyn UpdateTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Refresh one endpoint
    pub async fn update(&self, endpoint: &ProviderEndpoint) -> Outcome {
        self.update_with_cancel(endpoint, &CancellationToken::never())
            .await
    }

    /// Refresh one endpoint, giving up between attempts once `cancel` fires
    ///
    /// An attempt already in flight is allowed to finish; it is bounded by
    /// the endpoint timeout.
    pub async fn update_with_cancel(
        &self,
        endpoint: &ProviderEndpoint,
        cancel: &CancellationToken,
    ) -> Outcome {
        let started = Instant::now();
        let request = UpdateRequest::for_endpoint(endpoint);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            trace!(
                "{} {} (attempt {}/{})",
                request.method,
                request.hostname,
                attempt,
                self.policy.max_attempts()
            );

            let error = match self.attempt(&request).await {
                Ok(reply) => return build_outcome(&request.hostname, reply, attempt, started),
                Err(error) => error,
            };

            let kind = error.failure_kind();
            if kind != FailureKind::Transient || !self.policy.allows_retry_after(attempt) {
                debug!(
                    "Update of {} failed after {} attempt(s) ({}): {}",
                    request.hostname, attempt, kind, error
                );
                return Outcome::failed(
                    &request.hostname,
                    error.to_string(),
                    kind,
                    attempt,
                    started.elapsed(),
                    Vec::new(),
                );
            }

            let delay = self.policy.delay_for(attempt);
            debug!(
                "Update attempt {} for {} failed: {}. Retrying in {:?}",
                attempt, request.hostname, error, delay
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return Outcome::failed(
                        &request.hostname,
                        format!("cancelled after {attempt} attempt(s): {error}"),
                        FailureKind::Cancelled,
                        attempt,
                        started.elapsed(),
                        Vec::new(),
                    );
                }
            }
        }
    }

    /// Perform a single attempt
    async fn attempt(&self, request: &UpdateRequest) -> Result<ProviderReply> {
        let response = tokio::time::timeout(request.timeout, self.transport.send(request))
            .await
            .map_err(|_| Error::timeout(request.timeout))??;

        if !response.is_success() {
            return Err(Error::status(response.status, &response.body));
        }

        response::interpret(&request.hostname, &response.body)
    }
}

fn build_outcome(hostname: &str, reply: ProviderReply, attempts: u32, started: Instant) -> Outcome {
    let elapsed = started.elapsed();
    let failed: Vec<&HostResult> = reply.hosts.iter().filter(|host| !host.success).collect();

    if failed.is_empty() {
        let message = match (&reply.status_text, reply.hosts.as_slice()) {
            (Some(text), _) => text.clone(),
            (None, []) => NO_SERVICES_MESSAGE.to_string(),
            (None, [single]) if !single.message.is_empty() => single.message.clone(),
            (None, _) => DEFAULT_SUCCESS_MESSAGE.to_string(),
        };
        return Outcome::succeeded(hostname, message, attempts, elapsed, reply.hosts);
    }

    let message = if reply.hosts.len() == 1 {
        failed[0].message.clone()
    } else {
        let details = failed
            .iter()
            .map(|host| format!("{}: {}", host.hostname, host.message))
            .collect::<Vec<_>>()
            .join("; ");
        format!("{} of {} host(s) failed: {}", failed.len(), reply.hosts.len(), details)
    };
    Outcome::failed(
        hostname,
        message,
        FailureKind::Application,
        attempts,
        elapsed,
        reply.hosts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TransportResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct QueueTransport {
        responses: Mutex<VecDeque<Result<TransportResponse>>>,
    }

    impl QueueTransport {
        fn new(responses: Vec<Result<TransportResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl UpdateTransport for QueueTransport {
        async fn send(&self, _request: &UpdateRequest) -> Result<TransportResponse> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::network("no scripted response")))
        }

        fn transport_name(&self) -> &'static str {
            "queue"
        }
    }

    fn endpoint() -> ProviderEndpoint {
        ProviderEndpoint::new(
            "home.example.com",
            "https://dyn.example.com/update",
            "token",
            Duration::from_secs(1),
        )
        .unwrap()
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1)).unwrap()
    }

    #[tokio::test]
    async fn test_success_message_defaults_to_ok() {
        let transport = QueueTransport::new(vec![Ok(TransportResponse::new(
            200,
            r#"{"results": [{"hostname": "a", "success": true}, {"hostname": "b", "success": true}]}"#,
        ))]);
        let outcome = UpdateClient::new(transport, fast_policy()).update(&endpoint()).await;
        assert!(outcome.success());
        assert_eq!(outcome.message(), DEFAULT_SUCCESS_MESSAGE);
        assert_eq!(outcome.hosts().len(), 2);
    }

    #[tokio::test]
    async fn test_success_message_from_status_text() {
        let transport = QueueTransport::new(vec![Ok(TransportResponse::new(200, "good 1.2.3.4"))]);
        let outcome = UpdateClient::new(transport, fast_policy()).update(&endpoint()).await;
        assert!(outcome.success());
        assert_eq!(outcome.message(), "good 1.2.3.4");
        assert_eq!(outcome.attempts(), 1);
    }

    #[tokio::test]
    async fn test_partial_host_failure_is_not_retried() {
        let transport = QueueTransport::new(vec![Ok(TransportResponse::new(
            200,
            r#"{"results": [
                {"hostname": "a", "success": true, "message": "good"},
                {"hostname": "b", "success": false, "message": "Provider not configured"}
            ]}"#,
        ))]);
        let outcome = UpdateClient::new(transport, fast_policy()).update(&endpoint()).await;
        assert!(!outcome.success());
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(outcome.failure(), Some(FailureKind::Application));
        assert_eq!(
            outcome.message(),
            "1 of 2 host(s) failed: b: Provider not configured"
        );
    }

    #[tokio::test]
    async fn test_network_errors_exhaust_retries() {
        let transport = QueueTransport::new(vec![
            Err(Error::network("connection refused")),
            Err(Error::network("connection refused")),
            Err(Error::network("connection reset")),
        ]);
        let outcome = UpdateClient::new(transport, fast_policy()).update(&endpoint()).await;
        assert!(!outcome.success());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(outcome.failure(), Some(FailureKind::Transient));
        assert_eq!(outcome.message(), "network error: connection reset");
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let transport = QueueTransport::new(vec![Ok(TransportResponse::new(502, "bad gateway"))]);
        let outcome = UpdateClient::new(transport, RetryPolicy::no_retry())
            .update(&endpoint())
            .await;
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(outcome.message(), "HTTP 502: bad gateway");
    }
}
