//! Core traits for the update orchestrator
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`UpdateTransport`]: Send one update request to a provider endpoint
//! - [`ReportSink`]: Consume a finished update report

pub mod report_sink;
pub mod transport;

pub use report_sink::{ReportSink, ReportSinkFactory, SinkCapability};
pub use transport::{TransportResponse, UpdateRequest, UpdateTransport};
