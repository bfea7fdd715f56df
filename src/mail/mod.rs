//! Outbound email. Messages are rendered here and handed to the external
//! mail relay over NATS; without a bus they are only logged.

pub mod templates;

use serde::Serialize;
use tracing::info;

use crate::events::EventBus;

pub const MAIL_SUBJECT: &str = "dulces.mail.outbound";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Clone)]
pub struct Mailer {
    from: String,
    bus: EventBus,
}

impl Mailer {
    pub fn new(from: impl Into<String>, bus: EventBus) -> Self { Self { from: from.into(), bus } }

    pub async fn send(&self, rendered: templates::Rendered, to: &str) {
        let email = OutgoingEmail { from: self.from.clone(), to: to.to_string(), subject: rendered.subject, html: rendered.html, text: rendered.text };
        info!(to = %email.to, subject = %email.subject, queued = self.bus.is_connected(), "sending email");
        self.bus.publish_json(MAIL_SUBJECT.to_string(), &email).await;
    }
}
