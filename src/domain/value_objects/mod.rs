//! Value Objects for the storefront

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::DomainError;

/// Money value object. The store runs in a single currency (see site config),
/// so only the amount is carried; it is kept at two decimal places.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
    pub fn zero() -> Self { Self(Decimal::ZERO) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }
    pub fn add(&self, other: Money) -> Money { Money::new(self.0 + other.0) }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.0 * Decimal::from(qty)) }

    /// Prices must be strictly positive.
    pub fn positive(amount: Decimal) -> Result<Self, DomainError> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::InvalidPrice);
        }
        Ok(Self::new(amount))
    }

    /// Fees (shipping, thresholds) may be zero but never negative.
    pub fn non_negative(amount: Decimal) -> Result<Self, DomainError> {
        if amount < Decimal::ZERO {
            return Err(DomainError::NegativeAmount);
        }
        Ok(Self::new(amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "${:.2}", self.0) }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self { iter.fold(Money::zero(), |acc, m| acc.add(m)) }
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }

    /// Converts a database `INTEGER`, which the schema keeps non-negative.
    pub fn from_db(value: i32) -> Self { Self(value.max(0) as u32) }
    /// Fails rather than clamp when the count does not fit an `INTEGER`.
    pub fn to_db(&self) -> Result<i32, DomainError> { i32::try_from(self.0).map_err(|_| DomainError::QuantityTooLarge) }
}

/// URL slug derived from a display name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug(String);

impl Slug {
    pub fn new(value: &str) -> Result<Self, DomainError> {
        let slug = slugify(value);
        if slug.is_empty() { return Err(DomainError::EmptySlug); }
        Ok(Self(slug))
    }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'a',
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        other => other,
    }
}

pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars().map(fold_accent) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() { out.push('-'); }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Lowercased, trimmed email address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn new(value: &str) -> Result<Self, DomainError> {
        let value = value.trim().to_lowercase();
        match value.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') => Ok(Self(value)),
            _ => Err(DomainError::InvalidEmail),
        }
    }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn matches(&self, other: &str) -> bool { self.0 == other.trim().to_lowercase() }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_rounds_to_cents() {
        let m = Money::new(Decimal::new(10005, 3));
        assert_eq!(m.amount(), Decimal::new(1001, 2));
        assert_eq!(m.to_string(), "$10.01");
    }

    #[test]
    fn test_money_add_and_multiply() {
        let a = Money::new(Decimal::new(4550, 2));
        assert_eq!(a.multiply(3).amount(), Decimal::new(13650, 2));
        assert_eq!(a.add(Money::new(Decimal::new(450, 2))).amount(), Decimal::new(50, 0));
        let total: Money = vec![a, a].into_iter().sum();
        assert_eq!(total.amount(), Decimal::new(91, 0));
    }

    #[test]
    fn test_money_guards() {
        assert!(Money::positive(Decimal::ZERO).is_err());
        assert!(Money::non_negative(Decimal::ZERO).is_ok());
        assert!(Money::non_negative(Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn test_quantity() {
        let q = Quantity::new(3);
        assert_eq!(q.subtract(3), Some(Quantity::new(0)));
        assert_eq!(q.subtract(4), None);
        assert_eq!(Quantity::from_db(-2).value(), 0);
        assert_eq!(Quantity::new(i32::MAX as u32).to_db(), Ok(i32::MAX));
        assert_eq!(Quantity::new(i32::MAX as u32 + 1).to_db(), Err(DomainError::QuantityTooLarge));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Cajeta de Leche Quemada"), "cajeta-de-leche-quemada");
        assert_eq!(slugify("  Piñón & Nuez!! "), "pinon-nuez");
        assert_eq!(slugify("Dulce de Calabaza (500g)"), "dulce-de-calabaza-500g");
        assert!(Slug::new("¡¿!?").is_err());
    }

    #[test]
    fn test_email() {
        let e = Email::new("  Ana@Example.COM ").unwrap();
        assert_eq!(e.as_str(), "ana@example.com");
        assert!(e.matches("ANA@example.com"));
        assert!(Email::new("nope").is_err());
        assert!(Email::new("a@b").is_err());
    }
}
