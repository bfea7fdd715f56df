//! Product Aggregate

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::value_objects::{Money, Quantity};
use crate::domain::DomainError;

/// Store-wide fallback when neither the product nor the site config sets one.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

/// Validated pricing of a catalog item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pricing {
    pub price: Money,
    pub compare_at_price: Option<Money>,
}

impl Pricing {
    pub fn new(price: Decimal, compare_at_price: Option<Decimal>) -> Result<Self, DomainError> {
        let price = Money::positive(price)?;
        let compare_at_price = match compare_at_price {
            Some(c) if Money::new(c) <= price => return Err(DomainError::InvalidCompareAtPrice),
            Some(c) => Some(Money::new(c)),
            None => None,
        };
        Ok(Self { price, compare_at_price })
    }

    /// Whole-number percentage off the compare-at price, if any.
    pub fn discount_percent(&self) -> Option<u32> {
        let compare = self.compare_at_price?.amount();
        let off = (compare - self.price.amount()) / compare * Decimal::ONE_HUNDRED;
        off.round().to_u32()
    }
}

/// Admin stock correction: either an absolute count or a relative change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum StockAdjustment {
    Set(u32),
    Delta(i32),
}

impl StockAdjustment {
    pub fn apply(&self, current: Quantity) -> Result<Quantity, DomainError> {
        let next = match *self {
            Self::Set(value) => Quantity::new(value),
            Self::Delta(delta) if delta >= 0 => current.add(delta as u32),
            Self::Delta(delta) => current.subtract(delta.unsigned_abs()).ok_or(DomainError::NegativeStock)?,
        };
        next.to_db()?;
        Ok(next)
    }
}

/// The product's own threshold wins over the store-wide one.
pub fn effective_threshold(product_threshold: Option<i32>, store_threshold: Option<i32>) -> u32 {
    product_threshold
        .or(store_threshold)
        .map(|t| t.max(0) as u32)
        .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD)
}

pub fn is_low_stock(stock: Quantity, threshold: u32) -> bool { stock.value() <= threshold }
