pub mod terminal;

/// Destination for command results.
pub trait ReportSink: Send + Sync {
    fn publish(&self, command: &str, payload: &serde_json::Value);
}
