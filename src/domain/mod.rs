//! Business rules of the store, free of I/O.

/// Implements `as_str` / `FromStr` / `Display` for enums stored as TEXT columns.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self { $(Self::$variant => $text),+ }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::domain::DomainError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s { $($text => Ok(Self::$variant),)+ other => Err($crate::domain::DomainError::unknown($kind, other)) }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
        }
    };
}
pub(crate) use text_enum;

pub mod aggregates;
pub mod events;
pub mod value_objects;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Price must be greater than zero")]
    InvalidPrice,

    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Compare-at price must be greater than the price")]
    InvalidCompareAtPrice,

    #[error("Name does not produce a usable slug")]
    EmptySlug,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Stock cannot go below zero")]
    NegativeStock,

    #[error("Quantity is too large")]
    QuantityTooLarge,

    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock { product: String, requested: u32, available: u32 },

    #[error("Order has no items")]
    NoItems,

    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Only pending orders can be cancelled")]
    CannotCancel,

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Rating must be between 1 and 5")]
    InvalidRating,

    #[error("Ticket is closed")]
    TicketClosed,

    #[error("Password must be at least 8 characters and contain a letter and a digit")]
    WeakPassword,

    #[error("Administrators cannot demote or deactivate themselves")]
    SelfLockout,
}

impl DomainError {
    pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
        Self::UnknownVariant { kind, value: value.to_string() }
    }
}
