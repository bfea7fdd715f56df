//! Cart Aggregate

use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{Money, Quantity};
use crate::domain::DomainError;

/// A cart line joined with the live product data it points at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
    pub stock: u32,
    pub available: bool,
}

impl CartLine {
    pub fn new(product_id: Uuid, name: String, slug: String, image_url: Option<String>, unit_price: Money, quantity: u32, stock: u32, is_active: bool) -> Self {
        Self {
            product_id, name, slug, image_url, unit_price, quantity,
            line_total: unit_price.multiply(quantity),
            stock,
            available: is_active && stock >= quantity,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub subtotal: Money,
    pub item_count: u32,
}

impl CartView {
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let subtotal = items.iter().map(|i| i.line_total).sum();
        let item_count = items.iter().map(|i| i.quantity).sum();
        Self { items, subtotal, item_count }
    }
}

/// Quantity a cart line would hold after adding `adding`, checked against stock.
pub fn merged_quantity(product: &str, existing: Option<u32>, adding: u32, stock: Quantity) -> Result<u32, DomainError> {
    if adding == 0 { return Err(DomainError::InvalidQuantity); }
    let wanted = existing.unwrap_or(0).saturating_add(adding);
    crate::domain::aggregates::order::ensure_stock(product, wanted, stock)?;
    Ok(wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(price: i64, qty: u32, stock: u32) -> CartLine {
        CartLine::new(Uuid::new_v4(), "Alegría".into(), "alegria".into(), None, Money::new(Decimal::new(price, 0)), qty, stock, true)
    }

    #[test]
    fn test_cart_view_totals() {
        let view = CartView::from_lines(vec![line(10, 2, 5), line(25, 1, 5)]);
        assert_eq!(view.subtotal.amount(), Decimal::new(45, 0));
        assert_eq!(view.item_count, 3);
        assert!(view.items.iter().all(|i| i.available));
    }

    #[test]
    fn test_line_unavailable_when_stock_short() {
        assert!(!line(10, 4, 3).available);
    }

    #[test]
    fn test_merged_quantity() {
        assert_eq!(merged_quantity("Alegría", Some(2), 1, Quantity::new(5)), Ok(3)); // Merged
        assert_eq!(merged_quantity("Alegría", None, 5, Quantity::new(5)), Ok(5));
        assert!(matches!(merged_quantity("Alegría", Some(4), 2, Quantity::new(5)), Err(DomainError::InsufficientStock { requested: 6, .. })));
        assert_eq!(merged_quantity("Alegría", None, 0, Quantity::new(5)), Err(DomainError::InvalidQuantity));
    }
}
