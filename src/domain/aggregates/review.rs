//! Product review rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: i16) -> Result<Self, DomainError> {
        if !(1..=5).contains(&value) { return Err(DomainError::InvalidRating); }
        Ok(Self(value as u8))
    }
    pub fn value(&self) -> i16 { self.0 as i16 }
}

impl TryFrom<i16> for Rating {
    type Error = DomainError;
    fn try_from(value: i16) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Rating> for i16 {
    fn from(r: Rating) -> Self { r.value() }
}

/// Average rating shown next to a product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RatingSummary {
    pub average: Decimal,
    pub count: i64,
}

impl RatingSummary {
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        if ratings.is_empty() { return Self::default(); }
        let sum: i64 = ratings.iter().map(|r| r.value() as i64).sum();
        let count = ratings.len() as i64;
        Self { average: (Decimal::from(sum) / Decimal::from(count)).round_dp(2), count }
    }

    /// Builds from aggregate SQL output (`AVG`, `COUNT`).
    pub fn from_aggregate(average: Option<Decimal>, count: i64) -> Self {
        Self { average: average.unwrap_or_default().round_dp(2), count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(5).unwrap().value(), 5);
        assert!(serde_json::from_str::<Rating>("7").is_err());
    }

    #[test]
    fn test_summary() {
        let ratings: Vec<Rating> = [5, 4, 4].into_iter().map(|v| Rating::new(v).unwrap()).collect();
        let s = RatingSummary::from_ratings(&ratings);
        assert_eq!(s.count, 3);
        assert_eq!(s.average, Decimal::new(433, 2));
        assert_eq!(RatingSummary::from_ratings(&[]).count, 0);
    }
}
