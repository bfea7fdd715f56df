//! Fire-and-forget publication of domain events over NATS.

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

pub const EVENT_SUBJECT_PREFIX: &str = "dulces.events";

#[derive(Clone, Default)]
pub struct EventBus {
    nats: Option<async_nats::Client>,
}

impl EventBus {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// A bus that only logs; used when no NATS server is configured.
    pub fn disabled() -> Self { Self { nats: None } }

    pub fn is_connected(&self) -> bool { self.nats.is_some() }

    pub async fn publish(&self, event: DomainEvent) {
        let subject = format!("{}.{}", EVENT_SUBJECT_PREFIX, event.kind());
        self.publish_json(subject, &event).await;
    }

    /// Serializes and publishes a payload. Failures are logged, never returned:
    /// the request that produced the payload has already committed.
    pub async fn publish_json<T: Serialize>(&self, subject: String, payload: &T) {
        let Some(client) = &self.nats else {
            debug!(%subject, "event bus disabled, skipping publish");
            return;
        };
        let bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%subject, error = %e, "failed to serialize event");
                return;
            }
        };
        if let Err(e) = client.publish(subject.clone(), bytes.into()).await {
            warn!(%subject, error = %e, "failed to publish event");
        }
    }
}
