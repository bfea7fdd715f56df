//! Application services: one module per area, each taking the pool or the
//! whole [`AppState`](crate::state::AppState) and returning domain rows.

pub mod cart;
pub mod catalog;
pub mod contact;
pub mod dashboard;
pub mod favorites;
pub mod notifications;
pub mod orders;
pub mod reviews;
pub mod site_config;
pub mod tickets;
pub mod users;
