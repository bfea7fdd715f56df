//! Support ticket rules.

use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::domain::text_enum;
use crate::domain::DomainError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory { Order, Product, Payment, Shipping, Account, #[default] Other }
text_enum!(TicketCategory, "ticket category", {
    Order => "order", Product => "product", Payment => "payment",
    Shipping => "shipping", Account => "account", Other => "other",
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority { Low, #[default] Medium, High, Urgent }
text_enum!(TicketPriority, "ticket priority", {
    Low => "low", Medium => "medium", High => "high", Urgent => "urgent",
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus { #[default] Open, InProgress, Resolved, Closed }
text_enum!(TicketStatus, "ticket status", {
    Open => "open", InProgress => "in_progress", Resolved => "resolved", Closed => "closed",
});

impl TicketStatus {
    /// Status after an admin answers. An explicit status wins; otherwise an
    /// open ticket moves to in-progress and any other status is kept.
    pub fn after_response(self, requested: Option<TicketStatus>) -> Result<TicketStatus, DomainError> {
        if self == Self::Closed { return Err(DomainError::TicketClosed); }
        Ok(match requested {
            Some(status) => status,
            None if self == Self::Open => Self::InProgress,
            None => self,
        })
    }
}

pub fn generate_ticket_number<R: Rng>(rng: &mut R) -> String {
    let suffix: String = rng
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("TK-{suffix}")
}
