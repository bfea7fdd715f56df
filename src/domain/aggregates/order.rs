//! Order Aggregate

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::text_enum;
use crate::domain::value_objects::{Money, Quantity};
use crate::domain::DomainError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Preparing, Shipped, Delivered, Cancelled }
text_enum!(OrderStatus, "order status", {
    Pending => "pending", Confirmed => "confirmed", Preparing => "preparing",
    Shipped => "shipped", Delivered => "delivered", Cancelled => "cancelled",
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded }
text_enum!(PaymentStatus, "payment status", {
    Pending => "pending", Paid => "paid", Failed => "failed", Refunded => "refunded",
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { #[default] CashOnDelivery, BankTransfer, Card }
text_enum!(PaymentMethod, "payment method", {
    CashOnDelivery => "cash_on_delivery", BankTransfer => "bank_transfer", Card => "card",
});

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Pending, Self::Confirmed, Self::Preparing, Self::Shipped, Self::Delivered, Self::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled)
                | (Confirmed, Preparing) | (Confirmed, Cancelled)
                | (Preparing, Shipped) | (Preparing, Cancelled)
                | (Shipped, Delivered)
        )
    }

    pub fn transition(self, next: OrderStatus) -> Result<OrderStatus, DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidTransition { from: self.as_str(), to: next.as_str() });
        }
        Ok(next)
    }

    /// Customers may only withdraw an order nobody has started working on.
    pub fn cancel_by_customer(self) -> Result<OrderStatus, DomainError> {
        if self != Self::Pending { return Err(DomainError::CannotCancel); }
        Ok(Self::Cancelled)
    }
}

/// One priced line of an order, with the price snapshotted at checkout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Money,
    pub quantity: Quantity,
}

impl OrderLine {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity.value()) }
}

/// Flat-rate shipping, waived from an optional subtotal threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub flat_rate: Money,
    pub free_over: Option<Money>,
}

impl ShippingPolicy {
    pub fn cost_for(&self, subtotal: Money) -> Money {
        match self.free_over {
            Some(threshold) if subtotal >= threshold => Money::zero(),
            _ => self.flat_rate,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
}

/// Requested quantities for one product, before pricing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestedItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// Collapses repeated products into one line, keeping first-seen order.
pub fn merge_requested_items(items: &[RequestedItem]) -> Result<Vec<RequestedItem>, DomainError> {
    if items.is_empty() { return Err(DomainError::NoItems); }
    let mut merged: Vec<RequestedItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 { return Err(DomainError::InvalidQuantity); }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => merged.push(*item),
        }
    }
    Ok(merged)
}

pub fn ensure_stock(product: &str, requested: u32, available: Quantity) -> Result<(), DomainError> {
    if available.value() < requested {
        return Err(DomainError::InsufficientStock {
            product: product.to_string(),
            requested,
            available: available.value(),
        });
    }
    Ok(())
}

/// An order being assembled during checkout.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    lines: Vec<OrderLine>,
    shipping: ShippingPolicy,
}

impl OrderDraft {
    pub fn new(shipping: ShippingPolicy) -> Self { Self { lines: vec![], shipping } }

    pub fn lines(&self) -> &[OrderLine] { &self.lines }

    pub fn add_line(&mut self, line: OrderLine) -> Result<(), DomainError> {
        if line.quantity.is_zero() { return Err(DomainError::InvalidQuantity); }
        self.lines.push(line);
        Ok(())
    }

    pub fn totals(&self) -> Result<OrderTotals, DomainError> {
        if self.lines.is_empty() { return Err(DomainError::NoItems); }
        let subtotal: Money = self.lines.iter().map(OrderLine::line_total).sum();
        let shipping = self.shipping.cost_for(subtotal);
        Ok(OrderTotals { subtotal, shipping, total: subtotal.add(shipping) })
    }
}

pub const ORDER_NUMBER_PREFIX: &str = "DC";

/// `DC-YYYYMMDD-XXXXXX`, date in UTC, suffix six uppercase alphanumerics.
pub fn generate_order_number<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = rng
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("{}-{}-{}", ORDER_NUMBER_PREFIX, now.format("%Y%m%d"), suffix)
}
