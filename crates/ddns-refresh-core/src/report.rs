//! Outcomes and reports
//!
//! An [`Outcome`] is the result of refreshing one endpoint; an
//! [`UpdateReport`] aggregates the outcomes of one orchestrator run.
//! Both are immutable once built. The report totals are computed by its
//! constructor, so `total_configured == outcomes.len()` and
//! `total_succeeded == count(success)` always hold.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::error::FailureKind;

/// Message recorded for endpoints that were never started
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Message recorded when a provider reports an empty `results` list
pub const NO_SERVICES_MESSAGE: &str = "No DNS services configured";

/// One host entry reported by a provider response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostResult {
    pub hostname: String,
    pub success: bool,
    pub message: String,
    /// IP address the provider used, when it reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_used: Option<String>,
}

impl HostResult {
    pub fn new(hostname: impl Into<String>, success: bool, message: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            success,
            message: message.into(),
            ip_used: None,
        }
    }

    pub fn with_ip_used(mut self, ip_used: impl Into<String>) -> Self {
        self.ip_used = Some(ip_used.into());
        self
    }
}

/// Result of attempting to refresh one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    hostname: String,
    success: bool,
    message: String,
    attempts: u32,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    duration_taken: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureKind>,
    hosts: Vec<HostResult>,
}

impl Outcome {
    /// A successful refresh
    pub fn succeeded(
        hostname: impl Into<String>,
        message: impl Into<String>,
        attempts: u32,
        duration_taken: Duration,
        hosts: Vec<HostResult>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            success: true,
            message: message.into(),
            attempts,
            duration_taken,
            failure: None,
            hosts,
        }
    }

    /// A failed refresh
    pub fn failed(
        hostname: impl Into<String>,
        message: impl Into<String>,
        failure: FailureKind,
        attempts: u32,
        duration_taken: Duration,
        hosts: Vec<HostResult>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            success: false,
            message: message.into(),
            attempts,
            duration_taken,
            failure: Some(failure),
            hosts,
        }
    }

    /// An endpoint that was never started because the run was cancelled
    pub fn cancelled(hostname: impl Into<String>) -> Self {
        Self::failed(
            hostname,
            CANCELLED_MESSAGE,
            FailureKind::Cancelled,
            0,
            Duration::ZERO,
            Vec::new(),
        )
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Number of requests sent; zero only for endpoints never started
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn duration_taken(&self) -> Duration {
        self.duration_taken
    }

    /// Why the refresh failed, `None` on success
    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    /// Per-host results reported by the provider
    pub fn hosts(&self) -> &[HostResult] {
        &self.hosts
    }

    /// The provider was reachable but reported no services
    pub fn reported_no_services(&self) -> bool {
        self.success && self.hosts.is_empty()
    }
}

/// Non-fatal conditions observed during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportWarning {
    /// The run was started with an empty endpoint list
    NoEndpointsConfigured,
    /// An endpoint answered with an empty `results` list
    NoServicesReported { hostname: String },
}

impl std::fmt::Display for ReportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportWarning::NoEndpointsConfigured => f.write_str("No update endpoints configured"),
            ReportWarning::NoServicesReported { hostname } => {
                write!(f, "{NO_SERVICES_MESSAGE} (endpoint: {hostname})")
            }
        }
    }
}

/// Aggregated result of one orchestrator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    generated_at: DateTime<Utc>,
    outcomes: Vec<Outcome>,
    total_configured: usize,
    total_succeeded: usize,
    warnings: Vec<ReportWarning>,
}

impl UpdateReport {
    /// Build a report stamped with the current time
    ///
    /// `outcomes` must already be in configuration order.
    pub fn new(outcomes: Vec<Outcome>, warnings: Vec<ReportWarning>) -> Self {
        Self::at(Utc::now(), outcomes, warnings)
    }

    /// Build a report with an explicit timestamp
    pub fn at(
        generated_at: DateTime<Utc>,
        outcomes: Vec<Outcome>,
        warnings: Vec<ReportWarning>,
    ) -> Self {
        let total_configured = outcomes.len();
        let total_succeeded = outcomes.iter().filter(|o| o.success).count();
        Self {
            generated_at,
            outcomes,
            total_configured,
            total_succeeded,
            warnings,
        }
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Outcomes in configuration order
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn total_configured(&self) -> usize {
        self.total_configured
    }

    pub fn total_succeeded(&self) -> usize {
        self.total_succeeded
    }

    pub fn total_failed(&self) -> usize {
        self.total_configured - self.total_succeeded
    }

    pub fn warnings(&self) -> &[ReportWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Every configured endpoint succeeded (vacuously true when empty)
    pub fn all_succeeded(&self) -> bool {
        self.total_succeeded == self.total_configured
    }

    /// Look up the outcome for a hostname
    pub fn outcome(&self, hostname: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.hostname == hostname)
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
