// # Fanout Sink
//
// Delivers one report to several sinks in registration order. Every sink is
// offered the report even when an earlier one fails; the first failure is
// returned once all of them have run.

use async_trait::async_trait;
use tracing::warn;

use crate::report::UpdateReport;
use crate::traits::{ReportSink, SinkCapability};
use crate::Error;

/// Sink forwarding a report to a list of sinks
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn ReportSink>>) -> Self {
        Self { sinks }
    }

    /// Append a sink
    pub fn push(&mut self, sink: Box<dyn ReportSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Names of the wrapped sinks, in delivery order
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.sink_name()).collect()
    }
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sink_names())
            .finish()
    }
}

#[async_trait]
impl ReportSink for FanoutSink {
    async fn consume(&self, report: &UpdateReport) -> Result<(), Error> {
        let mut first_error = None;

        for sink in &self.sinks {
            if let Err(e) = sink.consume(report).await {
                warn!("Report sink {} failed: {}", sink.sink_name(), e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn capabilities(&self) -> Vec<SinkCapability> {
        let mut capabilities = Vec::new();
        for capability in self.sinks.iter().flat_map(|sink| sink.capabilities()) {
            if !capabilities.contains(&capability) {
                capabilities.push(capability);
            }
        }
        capabilities
    }

    fn sink_name(&self) -> &'static str {
        "fanout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, TracingSink};

    struct BrokenSink;

    #[async_trait]
    impl ReportSink for BrokenSink {
        async fn consume(&self, _report: &UpdateReport) -> Result<(), Error> {
            Err(Error::sink("broken", "disk full"))
        }

        fn capabilities(&self) -> Vec<SinkCapability> {
            vec![SinkCapability::AppendLog]
        }

        fn sink_name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_delivery() {
        let memory = MemorySink::new();
        let fanout = FanoutSink::new(vec![Box::new(BrokenSink), Box::new(memory.clone())]);

        let result = fanout
            .consume(&UpdateReport::new(Vec::new(), Vec::new()))
            .await;

        assert!(matches!(result, Err(Error::Sink { .. })));
        assert_eq!(memory.len().await, 1);
    }

    #[test]
    fn test_capabilities_are_merged() {
        let fanout = FanoutSink::new(vec![
            Box::new(BrokenSink),
            Box::new(TracingSink::new()),
            Box::new(MemorySink::new()),
        ]);

        assert_eq!(fanout.capabilities(), vec![SinkCapability::AppendLog]);
        assert_eq!(fanout.sink_names(), vec!["broken", "tracing", "memory"]);
    }
}
