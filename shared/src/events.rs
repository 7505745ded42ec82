use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// A single fact broadcast to external listeners after a commit (spec §7 —
/// broadcast channel is an out-of-process collaborator; this is its wire
/// shape, not the channel itself).
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub event_type: String,
    pub data: Value,
}

impl DomainEvent {
    pub fn new(event_type: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            event_type: event_type.into(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }
}

/// Fire-and-forget broadcast of domain facts.
///
/// Every call site publishes strictly after its transaction has committed.
/// A publish failure is logged and swallowed — it must never reopen or
/// roll back work that is already durable (spec §7). This is deliberately
/// a single narrow method: no dedup cache, no per-aggregate sequencing, no
/// rate limiting — those concerns belong to whatever sits on the other
/// side of the channel, not to the engine that produced the fact.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent);
}

/// Default publisher used outside of tests: logs the event at `info` and
/// drops it. A real deployment swaps this for a publisher backed by
/// whatever broadcast channel the surrounding system provides.
#[derive(Debug, Default, Clone)]
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: DomainEvent) {
        match serde_json::to_string(&event.data) {
            Ok(data) => tracing::info!(event_type = %event.event_type, data = %data, "domain event"),
            Err(e) => warn!(event_type = %event.event_type, error = %e, "failed to serialize domain event"),
        }
    }
}
