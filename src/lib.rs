//! Dulces Caseros
//!
//! Storefront and back-office API for a homemade sweets shop.
//!
//! ## Features
//! - Product catalog with categories, stock and media references
//! - Cart and checkout for customers and guests
//! - Order workflow with restocking on cancellation
//! - Reviews, favorites, support tickets and contact messages
//! - Admin notifications with deduplicated low-stock alerts
//! - Store-wide settings and a dashboard

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod mail;
pub mod models;
pub mod pagination;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AppError, AppResult};
