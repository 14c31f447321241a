//! Tracing layer that forwards runtime events to a channel.
//!
//! Lets a host UI observe thermal transitions, backend selections and
//! generation outcomes without parsing log output.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Targets forwarded by default.
pub const RUNTIME_TARGETS: [&str; 4] = ["thermal", "backend", "inference", "conversation"];

/// One forwarded tracing event.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RuntimeEvent {
    /// Subsystem target, e.g. `thermal`
    pub target: String,
    pub level: String,
    pub message: String,
    /// Structured fields other than `message`
    pub fields: HashMap<String, Value>,
    pub timestamp: String,
}

pub struct RuntimeEventLayer {
    sender: mpsc::UnboundedSender<RuntimeEvent>,
    targets: Vec<String>,
}

impl RuntimeEventLayer {
    /// Forwards events from [`RUNTIME_TARGETS`].
    pub fn new(sender: mpsc::UnboundedSender<RuntimeEvent>) -> Self {
        Self::with_targets(sender, RUNTIME_TARGETS)
    }

    pub fn with_targets<I, T>(sender: mpsc::UnboundedSender<RuntimeEvent>, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            sender,
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    fn accepts(&self, target: &str) -> bool {
        self.targets.iter().any(|t| {
            target == t
                || target
                    .strip_prefix(t.as_str())
                    .is_some_and(|rest| rest.starts_with("::"))
        })
    }
}

impl<S> Layer<S> for RuntimeEventLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !self.accepts(metadata.target()) {
            return;
        }

        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));
        let message = match fields.remove("message") {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        // Receiver gone means nobody is listening; drop the event.
        let _ = self.sender.send(RuntimeEvent {
            target: metadata.target().to_string(),
            level: metadata.level().to_string(),
            message,
            fields,
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, Value>);

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        // `%display` fields arrive here too; keep them unquoted.
        self.0
            .insert(field.name().to_string(), Value::String(format!("{:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_forwards_runtime_targets_only() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscriber = tracing_subscriber::registry().with(RuntimeEventLayer::new(tx));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "thermal", from = "normal", to = "moderate", "Thermal state changed");
            tracing::info!(target: "hyper::proto", "ignored");
            tracing::warn!(target: "inference::engine", tokens = 3u64, "nested target");
        });

        let first = rx.try_recv().unwrap();
        assert_eq!(first.target, "thermal");
        assert_eq!(first.level, "INFO");
        assert_eq!(first.message, "Thermal state changed");
        assert_eq!(first.fields["to"], "moderate");
        assert!(!first.fields.contains_key("message"));

        let second = rx.try_recv().unwrap();
        assert_eq!(second.target, "inference::engine");
        assert_eq!(second.fields["tokens"], 3);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_prefix_must_end_at_module_boundary() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let layer = RuntimeEventLayer::with_targets(tx, ["backend"]);
        assert!(layer.accepts("backend"));
        assert!(layer.accepts("backend::router"));
        assert!(!layer.accepts("backend_extra"));
    }
}
