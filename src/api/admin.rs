//! Back-office handlers. Every route here takes an [`AdminUser`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::extract::AdminUser;
use crate::domain::aggregates::{Role, StockAdjustment};
use crate::error::AppResult;
use crate::models::{Category, ContactMessage, Notification, Order, OrderWithItems, Product, Review, ReviewView, SiteConfig, SupportTicket, UserProfile};
use crate::pagination::PaginatedResponse;
use crate::services::catalog::{self, CategoryInput, ProductFilter, ProductInput};
use crate::services::contact::{self, ContactFilter};
use crate::services::dashboard::{self, DashboardStats};
use crate::services::notifications::{self, NotificationFilter};
use crate::services::orders::{self, OrderFilter, UpdatePaymentRequest, UpdateStatusRequest};
use crate::services::reviews::{self, ApprovalRequest, ReviewFilter};
use crate::services::site_config::{self, UpdateSiteConfig};
use crate::services::tickets::{self, RespondRequest, TicketFilter, UpdateTicketRequest};
use crate::services::users::{self, UserFilter};
use crate::state::AppState;

pub async fn dashboard(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<DashboardStats>> {
    Ok(Json(dashboard::stats(&s.db).await?))
}

// Users

#[derive(Debug, Deserialize)]
pub struct RoleRequest { pub role: Role }

#[derive(Debug, Deserialize)]
pub struct ActiveRequest { pub is_active: bool }

pub async fn list_users(State(s): State<AppState>, _: AdminUser, Query(f): Query<UserFilter>) -> AppResult<Json<PaginatedResponse<UserProfile>>> {
    Ok(Json(users::list(&s.db, f).await?))
}

pub async fn set_user_role(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<RoleRequest>) -> AppResult<Json<UserProfile>> {
    Ok(Json(users::set_role(&s.db, admin.id, id, r.role).await?))
}

pub async fn set_user_active(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<ActiveRequest>) -> AppResult<Json<UserProfile>> {
    Ok(Json(users::set_active(&s.db, admin.id, id, r.is_active).await?))
}

// Catalog

pub async fn list_categories(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(catalog::list_categories(&s.db, true).await?))
}

pub async fn create_category(State(s): State<AppState>, _: AdminUser, Json(r): Json<CategoryInput>) -> AppResult<(StatusCode, Json<Category>)> {
    Ok((StatusCode::CREATED, Json(catalog::create_category(&s.db, r).await?)))
}

pub async fn update_category(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>, Json(r): Json<CategoryInput>) -> AppResult<Json<Category>> {
    Ok(Json(catalog::update_category(&s.db, id, r).await?))
}

pub async fn delete_category(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    catalog::delete_category(&s.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_products(State(s): State<AppState>, _: AdminUser, Query(f): Query<ProductFilter>) -> AppResult<Json<PaginatedResponse<Product>>> {
    Ok(Json(catalog::list_products(&s.db, f, true).await?))
}

pub async fn get_product(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<Product>> {
    Ok(Json(catalog::find_product(&s.db, id).await?))
}

pub async fn create_product(State(s): State<AppState>, _: AdminUser, Json(r): Json<ProductInput>) -> AppResult<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(catalog::create_product(&s.db, r).await?)))
}

pub async fn update_product(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>, Json(r): Json<ProductInput>) -> AppResult<Json<Product>> {
    Ok(Json(catalog::update_product(&s.db, s.low_stock_policy(), id, r).await?))
}

pub async fn delete_product(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    catalog::delete_product(&s.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn adjust_stock(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>, Json(r): Json<StockAdjustment>) -> AppResult<Json<Product>> {
    Ok(Json(catalog::adjust_stock(&s.db, s.low_stock_policy(), id, r).await?))
}

// Orders

pub async fn list_orders(State(s): State<AppState>, _: AdminUser, Query(f): Query<OrderFilter>) -> AppResult<Json<PaginatedResponse<Order>>> {
    Ok(Json(orders::list_all(&s.db, f).await?))
}

pub async fn get_order(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<OrderWithItems>> {
    Ok(Json(orders::get_any(&s.db, id).await?))
}

pub async fn update_order_status(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>, Json(r): Json<UpdateStatusRequest>) -> AppResult<Json<OrderWithItems>> {
    Ok(Json(orders::update_status(&s, id, r.status).await?))
}

pub async fn update_order_payment(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>, Json(r): Json<UpdatePaymentRequest>) -> AppResult<Json<OrderWithItems>> {
    Ok(Json(orders::update_payment(&s, id, r.payment_status).await?))
}

// Reviews

pub async fn list_reviews(State(s): State<AppState>, _: AdminUser, Query(f): Query<ReviewFilter>) -> AppResult<Json<PaginatedResponse<ReviewView>>> {
    Ok(Json(reviews::list_all(&s.db, f).await?))
}

pub async fn set_review_approval(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>, Json(r): Json<ApprovalRequest>) -> AppResult<Json<Review>> {
    Ok(Json(reviews::set_approval(&s.db, id, r.approved).await?))
}

pub async fn delete_review(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    reviews::delete(&s.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Support

pub async fn list_tickets(State(s): State<AppState>, _: AdminUser, Query(f): Query<TicketFilter>) -> AppResult<Json<PaginatedResponse<SupportTicket>>> {
    Ok(Json(tickets::list_all(&s.db, f).await?))
}

pub async fn respond_ticket(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>, Json(r): Json<RespondRequest>) -> AppResult<Json<SupportTicket>> {
    Ok(Json(tickets::respond(&s, id, r).await?))
}

pub async fn update_ticket(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>, Json(r): Json<UpdateTicketRequest>) -> AppResult<Json<SupportTicket>> {
    Ok(Json(tickets::update(&s.db, id, r).await?))
}

pub async fn list_contact(State(s): State<AppState>, _: AdminUser, Query(f): Query<ContactFilter>) -> AppResult<Json<PaginatedResponse<ContactMessage>>> {
    Ok(Json(contact::list(&s.db, f).await?))
}

pub async fn mark_contact_read(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<ContactMessage>> {
    Ok(Json(contact::mark_read(&s.db, id).await?))
}

pub async fn delete_contact(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    contact::delete(&s.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Notifications

#[derive(Debug, Serialize)]
pub struct Count { pub count: i64 }

#[derive(Debug, Serialize)]
pub struct Updated { pub updated: u64 }

pub async fn list_notifications(State(s): State<AppState>, _: AdminUser, Query(f): Query<NotificationFilter>) -> AppResult<Json<PaginatedResponse<Notification>>> {
    Ok(Json(notifications::list(&s.db, f).await?))
}

pub async fn unread_notifications(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<Count>> {
    Ok(Json(Count { count: notifications::unread_count(&s.db).await? }))
}

pub async fn mark_notification_read(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<Json<Notification>> {
    Ok(Json(notifications::mark_read(&s.db, id).await?))
}

pub async fn mark_all_notifications_read(State(s): State<AppState>, _: AdminUser) -> AppResult<Json<Updated>> {
    Ok(Json(Updated { updated: notifications::mark_all_read(&s.db).await? }))
}

pub async fn delete_notification(State(s): State<AppState>, _: AdminUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    notifications::delete(&s.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Site config

pub async fn update_site_config(State(s): State<AppState>, _: AdminUser, Json(r): Json<UpdateSiteConfig>) -> AppResult<Json<SiteConfig>> {
    Ok(Json(site_config::update(&s.db, r).await?))
}
