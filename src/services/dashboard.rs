use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::aggregates::OrderStatus;
use crate::error::AppResult;
use crate::models::Order;
use crate::services::{notifications, orders};

const RECENT_ORDERS: i64 = 5;

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_products: i64,
    pub active_products: i64,
    pub low_stock_products: i64,
    pub total_users: i64,
    pub total_orders: i64,
    pub orders_by_status: BTreeMap<&'static str, i64>,
    pub revenue: Decimal,
    pub open_tickets: i64,
    pub unread_messages: i64,
    pub unread_notifications: i64,
    pub recent_orders: Vec<Order>,
}

/// Every known status is present, zero when no order has it.
fn orders_by_status(rows: &[(String, i64)]) -> BTreeMap<&'static str, i64> {
    OrderStatus::ALL
        .iter()
        .map(|s| {
            let count = rows.iter().find(|(name, _)| name == s.as_str()).map_or(0, |(_, c)| *c);
            (s.as_str(), count)
        })
        .collect()
}

pub async fn stats(db: &PgPool) -> AppResult<DashboardStats> {
    let (total_products, active_products): (i64, i64) =
        sqlx::query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM products")
            .fetch_one(db).await?;
    let low_stock_products: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM products p WHERE p.is_active AND p.stock <= \
         COALESCE(p.low_stock_threshold, (SELECT low_stock_threshold FROM site_config WHERE id = 1), 5)",
    )
    .fetch_one(db).await?;
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(db).await?;

    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status").fetch_all(db).await?;
    let orders_by_status = orders_by_status(&rows);
    let total_orders: i64 = orders_by_status.values().sum();

    let revenue: Option<Decimal> = sqlx::query_scalar(
        "SELECT SUM(total) FROM orders WHERE status <> 'cancelled' AND payment_status = 'paid'",
    )
    .fetch_one(db).await?;
    let open_tickets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM support_tickets WHERE status IN ('open', 'in_progress')")
        .fetch_one(db).await?;
    let unread_messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contact_messages WHERE NOT is_read")
        .fetch_one(db).await?;

    Ok(DashboardStats {
        total_products,
        active_products,
        low_stock_products,
        total_users,
        total_orders,
        orders_by_status,
        revenue: revenue.unwrap_or_default().round_dp(2),
        open_tickets,
        unread_messages,
        unread_notifications: notifications::unread_count(db).await?,
        recent_orders: orders::recent(db, RECENT_ORDERS).await?,
    })
}
