use std::fmt::Debug;
use std::sync::Mutex;

/// Destination for the diagnostic records the decoder emits
/// before it touches a payload.
pub trait DiagnosticSink: Send + Sync {
    /// Record a labeled value.
    fn record(&self, label: &str, value: &dyn Debug);
}

/// Sink that writes every record as an INFO event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, label: &str, value: &dyn Debug) {
        tracing::info!(label, "{:?}", value);
    }
}

/// Sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardSink;

impl DiagnosticSink for DiscardSink {
    fn record(&self, _label: &str, _value: &dyn Debug) {}
}

/// Sink that keeps the formatted records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    /// Labeled records in the order they were received.
    pub fn records(&self) -> Vec<(String, String)> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, label: &str, value: &dyn Debug) {
        let record = (label.to_owned(), format!("{value:?}"));
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
