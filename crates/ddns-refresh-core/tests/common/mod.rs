//! Test doubles and common utilities for orchestrator contract tests
//!
//! The [`ScriptedTransport`] plays back a per-hostname script of responses,
//! so tests control exactly what each endpoint "answers" on each attempt
//! without any network access.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_refresh_core::error::{Error, Result};
use ddns_refresh_core::traits::{TransportResponse, UpdateRequest, UpdateTransport};
use ddns_refresh_core::{ProviderEndpoint, RetryPolicy};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer immediately
    Respond(u16, String),
    /// Answer after a delay
    Delay(Duration, u16, String),
    /// Never answer within any test timeout
    Hang,
    /// Fail without a response
    Fail(String),
}

impl Step {
    pub fn ok(body: impl Into<String>) -> Self {
        Step::Respond(200, body.into())
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Step::Respond(status, body.into())
    }

    pub fn delayed_ok(delay: Duration, body: impl Into<String>) -> Self {
        Step::Delay(delay, 200, body.into())
    }
}

/// Transport answering from per-hostname scripts
///
/// Hostnames without a script (or with an exhausted one) fail with a
/// network error.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<HashMap<String, usize>>,
    tokens: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the script for `hostname`
    pub fn script(self, hostname: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(hostname.to_string(), steps.into());
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of requests sent for `hostname`
    pub fn calls(&self, hostname: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(hostname)
            .copied()
            .unwrap_or(0)
    }

    /// Total requests sent
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Bearer tokens seen, in request order
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    /// Highest number of requests that were in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, request: &UpdateRequest) -> Option<Step> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.hostname.clone())
            .or_insert(0) += 1;
        self.tokens
            .lock()
            .unwrap()
            .push(request.auth_token().to_string());
        self.scripts
            .lock()
            .unwrap()
            .get_mut(&request.hostname)
            .and_then(|steps| steps.pop_front())
    }
}

#[async_trait]
impl UpdateTransport for ScriptedTransport {
    async fn send(&self, request: &UpdateRequest) -> Result<TransportResponse> {
        let step = self.next_step(request);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        match step {
            Some(Step::Respond(status, body)) => Ok(TransportResponse::new(status, body)),
            Some(Step::Delay(delay, status, body)) => {
                tokio::time::sleep(delay).await;
                Ok(TransportResponse::new(status, body))
            }
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::network("hang step resumed"))
            }
            Some(Step::Fail(message)) => Err(Error::network(message)),
            None => Err(Error::network(format!(
                "no scripted response for {}",
                request.hostname
            ))),
        }
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

/// Decrements the in-flight counter even when the request future is dropped
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Endpoint for `hostname` with a short timeout
pub fn endpoint(hostname: &str) -> ProviderEndpoint {
    endpoint_with_timeout(hostname, Duration::from_millis(200))
}

pub fn endpoint_with_timeout(hostname: &str, timeout: Duration) -> ProviderEndpoint {
    ProviderEndpoint::new(
        hostname,
        "https://dyn.example.com/update?hostname={hostname}",
        format!("token-{hostname}"),
        timeout,
    )
    .unwrap()
}

/// Three attempts with millisecond backoff
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(5)).unwrap()
}

/// Single-host success body in the `{hostname, success, message}` shape
pub fn success_body(hostname: &str, message: &str) -> String {
    format!(r#"{{"hostname": "{hostname}", "success": true, "message": "{message}"}}"#)
}

/// Multi-host body in the `results` list shape
pub fn results_body(hosts: &[(&str, bool, &str)]) -> String {
    let entries = hosts
        .iter()
        .map(|(hostname, success, message)| {
            format!(r#"{{"hostname": "{hostname}", "success": {success}, "message": "{message}"}}"#)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(r#"{{"success": true, "results": [{entries}]}}"#)
}
