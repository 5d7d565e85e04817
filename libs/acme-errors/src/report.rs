//! Hand-off from a failed unit of work to the top-level handler.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FailureKind;

/// What the top-level handler surfaces to the operator before terminating
/// the unit of work: the message plus auxiliary data under `other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Always `true`; lets consumers of the JSON form tell failures apart
    /// from regular results.
    pub failed: bool,
    pub kind: FailureKind,
    pub msg: String,
    #[serde(default)]
    pub other: Map<String, Value>,
}

impl FailureReport {
    #[must_use]
    pub fn new(kind: FailureKind, msg: impl Into<String>, other: Map<String, Value>) -> Self {
        Self {
            failed: true,
            kind,
            msg: msg.into(),
            other,
        }
    }

    /// Log the report at info level, with the auxiliary data as a JSON field.
    ///
    /// The report itself is the primary output; this only mirrors it into
    /// the log stream for verbose runs.
    pub fn log(&self) {
        let other = serde_json::Value::Object(self.other.clone());
        tracing::info!(kind = %self.kind, other = %other, "{}", self.msg);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct EventCapture {
        events: Arc<Mutex<Vec<(tracing::Level, Vec<(String, String)>)>>>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut visitor = FieldVisitor(Vec::new());
            event.record(&mut visitor);
            self.events
                .lock()
                .unwrap()
                .push((*event.metadata().level(), visitor.0));
        }
    }

    struct FieldVisitor(Vec<(String, String)>);

    impl tracing::field::Visit for FieldVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.push((field.name().to_owned(), format!("{value:?}")));
        }
    }

    #[test]
    fn log_emits_one_info_event_with_fields() {
        let mut other = Map::new();
        other.insert("http_status".to_owned(), json!(400));
        let report = FailureReport::new(FailureKind::Protocol, "ACME request failed", other);

        let capture = EventCapture::default();
        let events = capture.events.clone();
        let subscriber = tracing_subscriber::registry().with(capture);
        tracing::subscriber::with_default(subscriber, || report.log());

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let (level, fields) = &events[0];
        assert_eq!(*level, tracing::Level::INFO);
        let field = |name: &str| {
            fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(field("message"), Some("ACME request failed"));
        assert_eq!(field("kind"), Some("protocol"));
        assert_eq!(field("other"), Some(r#"{"http_status":400}"#));
    }

    #[test]
    fn serializes_in_fail_json_shape() {
        let mut other = Map::new();
        other.insert("http_status".to_owned(), json!(400));
        let report = FailureReport::new(FailureKind::Protocol, "ACME request failed", other);

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "failed": true,
                "kind": "protocol",
                "msg": "ACME request failed",
                "other": {"http_status": 400}
            })
        );
    }

    #[test]
    fn other_defaults_to_empty_on_deserialize() {
        let report: FailureReport =
            serde_json::from_value(json!({"failed": true, "kind": "network", "msg": "timeout"}))
                .unwrap();
        assert_eq!(report.kind, FailureKind::Network);
        assert!(report.other.is_empty());
    }
}
