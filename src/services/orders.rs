use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::order::{ensure_stock, generate_order_number, merge_requested_items};
use crate::domain::aggregates::product::effective_threshold;
use crate::domain::aggregates::{
    NotificationKind, OrderDraft, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, RequestedItem,
};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{Email, Money, Quantity};
use crate::error::{AppError, AppResult};
use crate::mail::templates;
use crate::models::{Order, OrderItem, OrderWithItems, User};
use crate::pagination::{Page, PageParams, PaginatedResponse};
use crate::services::notifications::{self, StockLevel};
use crate::services::{cart, site_config};
use crate::state::AppState;

const ORDER_COLUMNS: &str = "id, order_number, user_id, customer_name, customer_email, customer_phone, shipping_address, status, \
     payment_status, payment_method, subtotal, shipping_cost, total, notes, created_at, updated_at";
const ORDER_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[serde(default)]
    #[validate(length(max = 50))]
    pub items: Vec<OrderItemRequest>,
    /// Take the items from the buyer's cart and empty it afterwards.
    #[serde(default)]
    pub from_cart: bool,
    #[validate(length(min = 1, max = 120))]
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    #[validate(length(max = 30))]
    pub customer_phone: Option<String>,
    #[serde(default = "empty_address", deserialize_with = "address_or_empty")]
    pub shipping_address: serde_json::Value,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn empty_address() -> serde_json::Value { serde_json::json!({}) }

/// The column is `NOT NULL`: an explicit `null` becomes `{}` too.
fn address_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<serde_json::Value, D::Error> {
    Ok(Option::<serde_json::Value>::deserialize(deserializer)?.unwrap_or_else(empty_address))
}

/// Who the order is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
}

/// Guests must give name and email; signed-in users fall back to their profile.
pub fn resolve_customer(user: Option<&User>, name: Option<&str>, email: Option<&str>, phone: Option<&str>) -> AppResult<Customer> {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    let email = email.map(str::trim).filter(|e| !e.is_empty());
    let phone = phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string);
    match user {
        Some(u) => Ok(Customer {
            user_id: Some(u.id),
            name: name.unwrap_or(&u.full_name).to_string(),
            email: Email::new(email.unwrap_or(&u.email))?,
            phone: phone.or_else(|| u.phone.clone()),
        }),
        None => {
            let name = name.ok_or_else(|| AppError::BadRequest("Customer name is required".to_string()))?;
            let email = email.ok_or_else(|| AppError::BadRequest("Customer email is required".to_string()))?;
            Ok(Customer { user_id: None, name: name.to_string(), email: Email::new(email)?, phone })
        }
    }
}

fn new_order_number() -> String { generate_order_number(Utc::now(), &mut rand::thread_rng()) }

async fn unique_order_number(conn: &mut PgConnection) -> AppResult<String> {
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let candidate = new_order_number();
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE order_number = $1)")
            .bind(&candidate).fetch_one(&mut *conn).await?;
        if !taken { return Ok(candidate); }
        warn!(%candidate, "order number collision, retrying");
    }
    Err(AppError::Internal("could not allocate an order number".to_string()))
}

async fn requested_items(conn: &mut PgConnection, user: Option<&User>, req: &CreateOrderRequest) -> AppResult<Vec<RequestedItem>> {
    if !req.items.is_empty() {
        return Ok(req.items.iter().map(|i| RequestedItem { product_id: i.product_id, quantity: i.quantity }).collect());
    }
    match (req.from_cart, user) {
        (true, Some(u)) => {
            let rows: Vec<(Uuid, i32)> = sqlx::query_as("SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY created_at")
                .bind(u.id).fetch_all(&mut *conn).await?;
            Ok(rows.into_iter().map(|(product_id, q)| RequestedItem { product_id, quantity: Quantity::from_db(q).value() }).collect())
        }
        (true, None) => Err(AppError::Unauthorized),
        (false, _) => Ok(vec![]),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LockedProduct {
    id: Uuid,
    name: String,
    price: Decimal,
    stock: i32,
    low_stock_threshold: Option<i32>,
    is_active: bool,
}

/// Places an order: validates stock, prices the lines, reserves stock and
/// raises the follow-up notifications, all inside one transaction.
#[tracing::instrument(skip(state, user, req), fields(user_id = ?user.map(|u| u.id)))]
pub async fn create_order(state: &AppState, user: Option<&User>, req: CreateOrderRequest) -> AppResult<OrderWithItems> {
    req.validate()?;
    for item in &req.items { item.validate()?; }
    let customer = resolve_customer(user, req.customer_name.as_deref(), req.customer_email.as_deref(), req.customer_phone.as_deref())?;

    let mut tx = state.db.begin().await?;
    let config = site_config::get(&mut *tx).await?;
    config.ensure_open()?;

    let requested = requested_items(&mut *tx, user, &req).await?;
    let merged = merge_requested_items(&requested)?;

    let ids: Vec<Uuid> = merged.iter().map(|i| i.product_id).collect();
    let locked = sqlx::query_as::<_, LockedProduct>(
        "SELECT id, name, price, stock, low_stock_threshold, is_active FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(&mut *tx)
    .await?;

    let mut draft = OrderDraft::new(config.shipping_policy());
    let mut levels = Vec::with_capacity(merged.len());
    for item in &merged {
        let product = locked.iter().find(|p| p.id == item.product_id).ok_or(AppError::NotFound("Product"))?;
        if !product.is_active {
            return Err(AppError::BadRequest(format!("{} is no longer available", product.name)));
        }
        let stock = Quantity::from_db(product.stock);
        ensure_stock(&product.name, item.quantity, stock)?;
        draft.add_line(OrderLine {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: Money::new(product.price),
            quantity: Quantity::new(item.quantity),
        })?;
        levels.push((product, stock.subtract(item.quantity).unwrap_or_default()));
    }
    let totals = draft.totals()?;

    let order_number = unique_order_number(&mut *tx).await?;
    let order = sqlx::query_as::<_, Order>(&format!(
        "INSERT INTO orders (id, order_number, user_id, customer_name, customer_email, customer_phone, shipping_address, status, \
         payment_status, payment_method, subtotal, shipping_cost, total, notes, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', 'pending', $8, $9, $10, $11, $12, NOW(), NOW()) RETURNING {ORDER_COLUMNS}"
    ))
    .bind(Uuid::now_v7()).bind(&order_number).bind(customer.user_id).bind(&customer.name).bind(customer.email.as_str())
    .bind(&customer.phone).bind(&req.shipping_address).bind(req.payment_method.as_str())
    .bind(totals.subtotal.amount()).bind(totals.shipping.amount()).bind(totals.total.amount()).bind(&req.notes)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(draft.lines().len());
    for line in draft.lines() {
        let item = sqlx::query_as::<_, OrderItem>(
            "INSERT INTO order_items (id, order_id, product_id, product_name, unit_price, quantity, total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id, order_id, product_id, product_name, unit_price, quantity, total",
        )
        .bind(Uuid::now_v7()).bind(order.id).bind(line.product_id).bind(&line.name)
        .bind(line.unit_price.amount()).bind(line.quantity.to_db()?).bind(line.line_total().amount())
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1")
            .bind(line.product_id).bind(line.quantity.to_db()?)
            .execute(&mut *tx).await?;
        items.push(item);
    }

    let policy = state.low_stock_policy();
    let now = Utc::now();
    let mut alerts = Vec::new();
    for (product, remaining) in &levels {
        let threshold = effective_threshold(product.low_stock_threshold, Some(config.low_stock_threshold));
        let level = StockLevel { product_id: product.id, name: &product.name, stock: *remaining, threshold };
        if let Some(kind) = notifications::check_stock_alert(&mut *tx, policy, level, now).await? {
            alerts.push((product.id, kind, remaining.value()));
        }
    }

    notifications::create(
        &mut *tx, NotificationKind::NewOrder,
        &format!("Nuevo pedido {}", order.order_number),
        &format!("{} realizó un pedido por {}", order.customer_name, totals.total),
        None, Some(order.id),
    ).await?;

    if req.from_cart {
        if let Some(user_id) = customer.user_id {
            cart::clear(&mut *tx, user_id).await?;
        }
    }
    tx.commit().await?;
    info!(order_number = %order.order_number, total = %totals.total, lines = items.len(), "order placed");

    state.events.publish(DomainEvent::OrderCreated { order_id: order.id, order_number: order.order_number.clone(), total: order.total }).await;
    for (product_id, kind, stock) in alerts {
        state.events.publish(DomainEvent::StockAlert { product_id, kind, stock }).await;
    }
    let brand = templates::Brand::from(&config);
    state.mailer.send(templates::order_confirmation(&brand, &order, &items), &order.customer_email).await;

    Ok(OrderWithItems { order, items })
}

async fn items_of<'e>(executor: impl sqlx::PgExecutor<'e>, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, product_name, unit_price, quantity, total FROM order_items WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;
    Ok(items)
}

async fn with_items(db: &PgPool, order: Option<Order>) -> AppResult<OrderWithItems> {
    let order = order.ok_or(AppError::NotFound("Order"))?;
    let items = items_of(db, order.id).await?;
    Ok(OrderWithItems { order, items })
}

pub async fn get_for_user(db: &PgPool, user_id: Uuid, order_id: Uuid) -> AppResult<OrderWithItems> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"))
        .bind(order_id).bind(user_id).fetch_optional(db).await?;
    with_items(db, order).await
}

pub async fn get_any(db: &PgPool, order_id: Uuid) -> AppResult<OrderWithItems> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(order_id).fetch_optional(db).await?;
    with_items(db, order).await
}

/// Lookup for guests: the email must match the one on the order.
pub async fn track(db: &PgPool, order_number: &str, email: &str) -> AppResult<OrderWithItems> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1 AND LOWER(customer_email) = LOWER($2)"
    ))
    .bind(order_number.trim().to_uppercase()).bind(email.trim())
    .fetch_optional(db).await?;
    with_items(db, order).await
}

pub async fn list_for_user(db: &PgPool, user_id: Uuid, params: PageParams) -> AppResult<PaginatedResponse<Order>> {
    let page = Page::from(params);
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id).bind(page.limit()).bind(page.offset())
    .fetch_all(db).await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1").bind(user_id).fetch_one(db).await?;
    Ok(PaginatedResponse::new(orders, total, page))
}

pub async fn recent(db: &PgPool, limit: i64) -> AppResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT $1"))
        .bind(limit).fetch_all(db).await?;
    Ok(orders)
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
}

pub async fn list_all(db: &PgPool, filter: OrderFilter) -> AppResult<PaginatedResponse<Order>> {
    let page = Page::from(PageParams { page: filter.page, per_page: filter.per_page });
    let status = filter.status.map(|s| s.as_str());
    let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    const WHERE: &str = "($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR order_number ILIKE '%' || $2 || '%' \
         OR customer_email ILIKE '%' || $2 || '%' OR customer_name ILIKE '%' || $2 || '%')";
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE {WHERE} ORDER BY created_at DESC LIMIT $3 OFFSET $4"
    ))
    .bind(status).bind(search).bind(page.limit()).bind(page.offset())
    .fetch_all(db).await?;
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders WHERE {WHERE}"))
        .bind(status).bind(search).fetch_one(db).await?;
    Ok(PaginatedResponse::new(orders, total, page))
}

async fn lock_order(conn: &mut PgConnection, order_id: Uuid, owner: Option<Uuid>) -> AppResult<Order> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2) FOR UPDATE"
    ))
    .bind(order_id).bind(owner)
    .fetch_optional(&mut *conn).await?
    .ok_or(AppError::NotFound("Order"))
}

async fn set_status(conn: &mut PgConnection, order_id: Uuid, status: OrderStatus) -> AppResult<Order> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order_id).bind(status.as_str())
    .fetch_one(&mut *conn).await?;
    Ok(order)
}

/// Returns the order's quantities to the shelf.
async fn restock(conn: &mut PgConnection, order_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE products p SET stock = p.stock + oi.quantity, updated_at = NOW() \
         FROM order_items oi WHERE oi.order_id = $1 AND oi.product_id = p.id",
    )
    .bind(order_id)
    .execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

#[tracing::instrument(skip(state))]
pub async fn cancel_by_customer(state: &AppState, user_id: Uuid, order_id: Uuid) -> AppResult<OrderWithItems> {
    let mut tx = state.db.begin().await?;
    let current = lock_order(&mut *tx, order_id, Some(user_id)).await?;
    let from = current.status()?;
    let to = from.cancel_by_customer()?;
    let order = set_status(&mut *tx, order_id, to).await?;
    let restocked = restock(&mut *tx, order_id).await?;
    tx.commit().await?;
    info!(order_number = %order.order_number, restocked, "order cancelled by customer");

    state.events.publish(DomainEvent::OrderStatusChanged { order_id, from, to }).await;
    with_items(&state.db, Some(order)).await
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[tracing::instrument(skip(state))]
pub async fn update_status(state: &AppState, order_id: Uuid, next: OrderStatus) -> AppResult<OrderWithItems> {
    let mut tx = state.db.begin().await?;
    let current = lock_order(&mut *tx, order_id, None).await?;
    let from = current.status()?;
    let to = from.transition(next)?;
    let order = set_status(&mut *tx, order_id, to).await?;
    if to == OrderStatus::Cancelled {
        restock(&mut *tx, order_id).await?;
    }
    let brand = site_config::brand(&mut *tx).await?;
    tx.commit().await?;
    info!(order_number = %order.order_number, %from, %to, "order status updated");

    state.events.publish(DomainEvent::OrderStatusChanged { order_id, from, to }).await;
    state.mailer.send(templates::order_status_update(&brand, &order, to), &order.customer_email).await;
    with_items(&state.db, Some(order)).await
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
}

#[tracing::instrument(skip(state))]
pub async fn update_payment(state: &AppState, order_id: Uuid, status: PaymentStatus) -> AppResult<OrderWithItems> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order_id).bind(status.as_str())
    .fetch_optional(&state.db).await?
    .ok_or(AppError::NotFound("Order"))?;
    info!(order_number = %order.order_number, payment = %status, "payment status updated");
    state.events.publish(DomainEvent::PaymentStatusChanged { order_id, to: status }).await;
    with_items(&state.db, Some(order)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn user() -> User {
        User {
            id: Uuid::new_v4(), email: "ana@example.com".into(), password_hash: String::new(), full_name: "Ana López".into(),
            phone: Some("5551234567".into()), role: "customer".into(), is_active: true, created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_customer_from_profile() {
        let u = user();
        let c = resolve_customer(Some(&u), None, Some("  "), None).unwrap();
        assert_eq!(c.user_id, Some(u.id));
        assert_eq!(c.name, "Ana López");
        assert_eq!(c.email.as_str(), "ana@example.com");
        assert_eq!(c.phone.as_deref(), Some("5551234567"));
    }

    #[test]
    fn test_customer_overrides() {
        let c = resolve_customer(Some(&user()), Some("Regalo para Luis"), Some("Luis@Example.com"), Some("555")).unwrap();
        assert_eq!(c.name, "Regalo para Luis");
        assert_eq!(c.email.as_str(), "luis@example.com");
        assert_eq!(c.phone.as_deref(), Some("555"));
    }

    #[test]
    fn test_guest_requires_name_and_email() {
        assert!(matches!(resolve_customer(None, None, Some("a@b.co"), None), Err(AppError::BadRequest(_))));
        assert!(matches!(resolve_customer(None, Some("Ana"), None, None), Err(AppError::BadRequest(_))));
        assert!(resolve_customer(None, Some("Ana"), Some("bad"), None).is_err());
        let c = resolve_customer(None, Some("Ana"), Some("ana@example.com"), None).unwrap();
        assert_eq!(c.user_id, None);
    }

    #[test]
    fn test_request_parsing() {
        let req: CreateOrderRequest = serde_json::from_str(
            r#"{"items":[{"product_id":"00000000-0000-0000-0000-000000000000","quantity":2}],"payment_method":"bank_transfer"}"#,
        ).unwrap();
        assert_eq!(req.payment_method, PaymentMethod::BankTransfer);
        assert!(!req.from_cart);
        assert!(req.validate().is_ok());
        let req: CreateOrderRequest = serde_json::from_str(r#"{"from_cart":true}"#).unwrap();
        assert!(req.items.is_empty());
        assert_eq!(req.payment_method, PaymentMethod::CashOnDelivery);
    }

    #[test]
    fn test_item_count_limit() {
        let item = OrderItemRequest { product_id: Uuid::nil(), quantity: 1 };
        let body = |n: usize| serde_json::json!({ "items": vec![item; n] });
        let req: CreateOrderRequest = serde_json::from_value(body(50)).unwrap();
        assert!(req.validate().is_ok());
        let req: CreateOrderRequest = serde_json::from_value(body(51)).unwrap();
        assert!(req.validate().unwrap_err().field_errors().contains_key("items"));
    }

    #[test]
    fn test_shipping_address_defaults_to_empty_object() {
        let req: CreateOrderRequest = serde_json::from_str(r#"{"from_cart":true}"#).unwrap();
        assert_eq!(req.shipping_address, serde_json::json!({}));
        let req: CreateOrderRequest = serde_json::from_str(r#"{"from_cart":true,"shipping_address":null}"#).unwrap();
        assert_eq!(req.shipping_address, serde_json::json!({}));
        let req: CreateOrderRequest = serde_json::from_str(r#"{"shipping_address":{"city":"Puebla"}}"#).unwrap();
        assert_eq!(req.shipping_address["city"], "Puebla");
    }

    #[test]
    fn test_order_number_shape() {
        let n = new_order_number();
        assert!(n.starts_with("DC-"));
        assert_eq!(n.len(), "DC-20240101-ABCDEF".len());
    }

    #[tokio::test]
    async fn test_update_status() {
        let Some(t) = test_support::database().await else { return };
        let id = t.order("pending").await;
        let order = update_status(&t.state, id, OrderStatus::Confirmed).await.unwrap();
        assert_eq!(order.order.status, "confirmed");
        let err = update_status(&t.state, id, OrderStatus::Pending).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_update_is_all_or_nothing() {
        let Some(t) = test_support::database().await else { return };
        let id = t.order("pending").await;
        let config = t.take_config().await;
        let result = update_status(&t.state, id, OrderStatus::Confirmed).await;
        t.restore_config(config).await;
        assert!(result.is_err());
        assert_eq!(t.order_status(id).await, "pending");
    }
}
