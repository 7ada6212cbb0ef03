// # Report Sinks
//
// Built-in implementations of `ReportSink`:
//
// - **LogFileSink**: appends the classic refresh log lines to a file
// - **StdoutSink**: prints a summary for interactive runs
// - **TracingSink**: logs through the process' tracing subscriber
// - **MetricsFileSink**: Prometheus textfile for node_exporter
// - **MemorySink**: keeps reports in memory (tests, embedding)
// - **FanoutSink**: delivers to several sinks at once

pub mod fanout;
pub mod log_file;
pub mod memory;
pub mod metrics;
pub mod stdout;
pub mod tracing_sink;

pub use fanout::FanoutSink;
pub use log_file::{LogFileSink, LogFileSinkFactory};
pub use memory::MemorySink;
pub use metrics::{MetricsFileSink, MetricsFileSinkFactory};
pub use stdout::{StdoutSink, StdoutSinkFactory};
pub use tracing_sink::{TracingSink, TracingSinkFactory};
