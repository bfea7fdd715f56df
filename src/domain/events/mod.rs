//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{NotificationKind, OrderStatus, PaymentStatus, TicketStatus};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderCreated { order_id: Uuid, order_number: String, total: Decimal },
    OrderStatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
    PaymentStatusChanged { order_id: Uuid, to: PaymentStatus },
    StockAlert { product_id: Uuid, kind: NotificationKind, stock: u32 },
    TicketOpened { ticket_id: Uuid, ticket_number: String },
    TicketAnswered { ticket_id: Uuid, status: TicketStatus },
    ContactReceived { message_id: Uuid },
    UserRegistered { user_id: Uuid },
}

impl DomainEvent {
    /// Subject suffix the event is published under.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "order.created",
            Self::OrderStatusChanged { .. } => "order.status_changed",
            Self::PaymentStatusChanged { .. } => "order.payment_changed",
            Self::StockAlert { .. } => "product.stock_alert",
            Self::TicketOpened { .. } => "ticket.opened",
            Self::TicketAnswered { .. } => "ticket.answered",
            Self::ContactReceived { .. } => "contact.received",
            Self::UserRegistered { .. } => "user.registered",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let id = Uuid::nil();
        let e = DomainEvent::OrderStatusChanged { order_id: id, from: OrderStatus::Pending, to: OrderStatus::Confirmed };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "order_status_changed");
        assert_eq!(json["to"], "confirmed");
        assert_eq!(e.kind(), "order.status_changed");
    }
}
