//! Admin notifications and the low-stock alert rule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::text_enum;
use crate::domain::value_objects::Quantity;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind { LowStock, OutOfStock, NewOrder, NewTicket, NewContact }
text_enum!(NotificationKind, "notification kind", {
    LowStock => "low_stock", OutOfStock => "out_of_stock", NewOrder => "new_order",
    NewTicket => "new_ticket", NewContact => "new_contact",
});

/// The most recent stock alert already stored for a product.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviousAlert {
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockAlertDecision {
    /// Stock is above the threshold.
    NotLow,
    /// An alert for this product was raised inside the window.
    Suppressed { previous_at: DateTime<Utc> },
    Raise(NotificationKind),
}

/// Rolling-window suppression of duplicate stock alerts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LowStockPolicy {
    pub window: Duration,
}

impl Default for LowStockPolicy {
    fn default() -> Self { Self { window: Duration::hours(24) } }
}

impl LowStockPolicy {
    pub fn new(window: Duration) -> Self { Self { window } }

    pub fn evaluate(&self, stock: Quantity, threshold: u32, previous: Option<PreviousAlert>, now: DateTime<Utc>) -> StockAlertDecision {
        if stock.value() > threshold {
            return StockAlertDecision::NotLow;
        }
        let kind = if stock.is_zero() { NotificationKind::OutOfStock } else { NotificationKind::LowStock };
        match previous {
            Some(prev) if now - prev.created_at < self.window => {
                // running out entirely is always worth a fresh alert
                let escalation = prev.kind == NotificationKind::LowStock && kind == NotificationKind::OutOfStock;
                if escalation { StockAlertDecision::Raise(kind) } else { StockAlertDecision::Suppressed { previous_at: prev.created_at } }
            }
            _ => StockAlertDecision::Raise(kind),
        }
    }
}

/// Title and body of a stock alert.
pub fn stock_alert_text(kind: NotificationKind, product: &str, stock: Quantity, threshold: u32) -> (String, String) {
    match kind {
        NotificationKind::OutOfStock => (
            format!("Agotado: {product}"),
            format!("{product} se quedó sin existencias."),
        ),
        _ => (
            format!("Stock bajo: {product}"),
            format!("Quedan {} unidades de {product} (umbral {threshold}).", stock.value()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() }

    #[test]
    fn test_above_threshold_is_not_low() {
        let d = LowStockPolicy::default().evaluate(Quantity::new(6), 5, None, now());
        assert_eq!(d, StockAlertDecision::NotLow);
    }

    #[test]
    fn test_first_alert_is_raised() {
        let policy = LowStockPolicy::default();
        assert_eq!(policy.evaluate(Quantity::new(5), 5, None, now()), StockAlertDecision::Raise(NotificationKind::LowStock));
        assert_eq!(policy.evaluate(Quantity::new(0), 5, None, now()), StockAlertDecision::Raise(NotificationKind::OutOfStock));
    }

    #[test]
    fn test_duplicate_inside_window_is_suppressed() {
        let previous_at = now() - Duration::hours(23);
        let prev = PreviousAlert { kind: NotificationKind::LowStock, created_at: previous_at };
        let d = LowStockPolicy::default().evaluate(Quantity::new(3), 5, Some(prev), now());
        assert_eq!(d, StockAlertDecision::Suppressed { previous_at });
    }

    #[test]
    fn test_alert_after_window_is_raised() {
        let prev = PreviousAlert { kind: NotificationKind::LowStock, created_at: now() - Duration::hours(24) };
        let d = LowStockPolicy::default().evaluate(Quantity::new(3), 5, Some(prev), now());
        assert_eq!(d, StockAlertDecision::Raise(NotificationKind::LowStock));
    }

    #[test]
    fn test_escalation_to_out_of_stock_bypasses_window() {
        let prev = PreviousAlert { kind: NotificationKind::LowStock, created_at: now() - Duration::minutes(5) };
        let policy = LowStockPolicy::new(Duration::hours(6));
        assert_eq!(policy.evaluate(Quantity::new(0), 5, Some(prev), now()), StockAlertDecision::Raise(NotificationKind::OutOfStock));

        let prev = PreviousAlert { kind: NotificationKind::OutOfStock, created_at: now() - Duration::minutes(5) };
        assert!(matches!(policy.evaluate(Quantity::new(0), 5, Some(prev), now()), StockAlertDecision::Suppressed { .. }));
    }

    #[test]
    fn test_alert_text() {
        let (title, body) = stock_alert_text(NotificationKind::LowStock, "Cocada", Quantity::new(2), 5);
        assert_eq!(title, "Stock bajo: Cocada");
        assert!(body.contains("Quedan 2 unidades"));
    }
}
