use crate::report::ReportSink;

/// Writes each result to stdout as pretty-printed JSON.
pub struct TerminalSink;

pub fn render(payload: &serde_json::Value) -> String {
    format!("{payload:#}")
}

impl ReportSink for TerminalSink {
    fn publish(&self, command: &str, payload: &serde_json::Value) {
        tracing::debug!(command, "publishing result");
        println!("{}", render(payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_pretty_json() {
        let payload = serde_json::json!({ "symbol": "AAA", "rsi": 55.5 });
        let text = render(&payload);
        assert!(text.contains('\n'));
        assert!(text.contains("\"symbol\": \"AAA\""));
    }

    #[test]
    fn terminal_sink_does_not_panic() {
        TerminalSink.publish("technical", &serde_json::json!({ "error": "insufficient data" }));
    }
}
