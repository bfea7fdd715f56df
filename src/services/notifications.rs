use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::notification::stock_alert_text;
use crate::domain::aggregates::product::is_low_stock;
use crate::domain::aggregates::{LowStockPolicy, NotificationKind, PreviousAlert, StockAlertDecision};
use crate::domain::value_objects::Quantity;
use crate::error::{AppError, AppResult};
use crate::models::Notification;
use crate::pagination::{Page, PageParams, PaginatedResponse};

const COLUMNS: &str = "id, kind, title, message, product_id, order_id, is_read, created_at";

pub async fn create<'e, E>(executor: E, kind: NotificationKind, title: &str, message: &str, product_id: Option<Uuid>, order_id: Option<Uuid>) -> AppResult<Notification>
where
    E: sqlx::PgExecutor<'e>,
{
    let n = sqlx::query_as::<_, Notification>(&format!(
        "INSERT INTO notifications (id, kind, title, message, product_id, order_id, is_read, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW()) RETURNING {COLUMNS}"
    ))
    .bind(Uuid::now_v7()).bind(kind.as_str()).bind(title).bind(message).bind(product_id).bind(order_id)
    .fetch_one(executor)
    .await?;
    Ok(n)
}

/// Stock alert snapshot for one product after its stock changed.
#[derive(Debug, Clone)]
pub struct StockLevel<'a> {
    pub product_id: Uuid,
    pub name: &'a str,
    pub stock: Quantity,
    pub threshold: u32,
}

/// Applies the low-stock rule and stores an alert unless it is suppressed.
/// Returns the kind raised, if any.
#[tracing::instrument(skip(conn, policy, level), fields(product_id = %level.product_id, stock = level.stock.value()))]
pub async fn check_stock_alert(conn: &mut PgConnection, policy: LowStockPolicy, level: StockLevel<'_>, now: DateTime<Utc>) -> AppResult<Option<NotificationKind>> {
    if !is_low_stock(level.stock, level.threshold) {
        return Ok(None);
    }
    let previous: Option<(String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT kind, created_at FROM notifications WHERE product_id = $1 AND kind IN ('low_stock', 'out_of_stock') \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(level.product_id)
    .fetch_optional(&mut *conn)
    .await?;
    let previous = match previous {
        Some((kind, created_at)) => Some(PreviousAlert { kind: kind.parse()?, created_at }),
        None => None,
    };

    match policy.evaluate(level.stock, level.threshold, previous, now) {
        StockAlertDecision::NotLow => Ok(None),
        StockAlertDecision::Suppressed { previous_at } => {
            info!(%previous_at, "stock alert suppressed");
            Ok(None)
        }
        StockAlertDecision::Raise(kind) => {
            let (title, message) = stock_alert_text(kind, level.name, level.stock, level.threshold);
            create(&mut *conn, kind, &title, &message, Some(level.product_id), None).await?;
            info!(kind = %kind, product = level.name, "stock alert raised");
            Ok(Some(kind))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationFilter {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub unread: Option<bool>,
}

pub async fn list(db: &PgPool, filter: NotificationFilter) -> AppResult<PaginatedResponse<Notification>> {
    let page = Page::from(PageParams { page: filter.page, per_page: filter.per_page });
    let unread_only = filter.unread.unwrap_or(false);
    let data = sqlx::query_as::<_, Notification>(&format!(
        "SELECT {COLUMNS} FROM notifications WHERE ($1 = FALSE OR is_read = FALSE) ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(unread_only).bind(page.limit()).bind(page.offset())
    .fetch_all(db).await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE ($1 = FALSE OR is_read = FALSE)")
        .bind(unread_only).fetch_one(db).await?;
    Ok(PaginatedResponse::new(data, total, page))
}

pub async fn unread_count(db: &PgPool) -> AppResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE is_read = FALSE").fetch_one(db).await?)
}

pub async fn mark_read(db: &PgPool, id: Uuid) -> AppResult<Notification> {
    sqlx::query_as::<_, Notification>(&format!("UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING {COLUMNS}"))
        .bind(id).fetch_optional(db).await?
        .ok_or(AppError::NotFound("Notification"))
}

pub async fn mark_all_read(db: &PgPool) -> AppResult<u64> {
    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE is_read = FALSE").execute(db).await?;
    Ok(result.rows_affected())
}

pub async fn delete(db: &PgPool, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1").bind(id).execute(db).await?;
    if result.rows_affected() == 0 { return Err(AppError::NotFound("Notification")); }
    Ok(())
}
