//! Storefront handlers: catalog, cart, checkout and the customer's own
//! orders, reviews, favorites and tickets.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract::{AuthUser, MaybeUser};
use crate::domain::aggregates::CartView;
use crate::error::AppResult;
use crate::models::{Category, ContactMessage, Favorite, Order, OrderWithItems, Product, Review, ReviewView, SiteConfig, SupportTicket};
use crate::pagination::{PageParams, PaginatedResponse};
use crate::services::catalog::{self, ProductDetail, ProductFilter};
use crate::services::favorites::{self, FavoriteStatus};
use crate::services::{cart, contact, orders, reviews, site_config, tickets};
use crate::state::AppState;

// Catalog

pub async fn list_categories(State(s): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(catalog::list_categories(&s.db, false).await?))
}

pub async fn list_products(State(s): State<AppState>, Query(f): Query<ProductFilter>) -> AppResult<Json<PaginatedResponse<Product>>> {
    Ok(Json(catalog::list_products(&s.db, f, false).await?))
}

pub async fn get_product(State(s): State<AppState>, Path(id_or_slug): Path<String>) -> AppResult<Json<ProductDetail>> {
    Ok(Json(catalog::get_product(&s.db, &id_or_slug).await?))
}

pub async fn get_site_config(State(s): State<AppState>) -> AppResult<Json<SiteConfig>> {
    Ok(Json(site_config::get(&s.db).await?))
}

// Reviews

pub async fn product_reviews(State(s): State<AppState>, Path(id): Path<Uuid>, Query(p): Query<PageParams>) -> AppResult<Json<PaginatedResponse<ReviewView>>> {
    Ok(Json(reviews::list_for_product(&s.db, id, p).await?))
}

pub async fn create_review(State(s): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>, Json(r): Json<reviews::ReviewInput>) -> AppResult<(StatusCode, Json<Review>)> {
    Ok((StatusCode::CREATED, Json(reviews::create(&s.db, auth.user.id, id, r).await?)))
}

pub async fn update_review(State(s): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>, Json(r): Json<reviews::ReviewInput>) -> AppResult<Json<Review>> {
    Ok(Json(reviews::update_own(&s.db, auth.user.id, id, r).await?))
}

pub async fn delete_review(State(s): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    reviews::delete_own(&s.db, auth.user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Cart

pub async fn get_cart(State(s): State<AppState>, auth: AuthUser) -> AppResult<Json<CartView>> {
    Ok(Json(cart::get(&s.db, auth.user.id).await?))
}

pub async fn add_to_cart(State(s): State<AppState>, auth: AuthUser, Json(r): Json<cart::AddToCartRequest>) -> AppResult<(StatusCode, Json<CartView>)> {
    Ok((StatusCode::CREATED, Json(cart::add_item(&s.db, auth.user.id, r).await?)))
}

pub async fn set_cart_quantity(State(s): State<AppState>, auth: AuthUser, Path(product_id): Path<Uuid>, Json(r): Json<cart::SetQuantityRequest>) -> AppResult<Json<CartView>> {
    Ok(Json(cart::set_quantity(&s.db, auth.user.id, product_id, r).await?))
}

pub async fn remove_from_cart(State(s): State<AppState>, auth: AuthUser, Path(product_id): Path<Uuid>) -> AppResult<Json<CartView>> {
    Ok(Json(cart::remove_item(&s.db, auth.user.id, product_id).await?))
}

pub async fn clear_cart(State(s): State<AppState>, auth: AuthUser) -> AppResult<StatusCode> {
    cart::clear(&s.db, auth.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Orders

pub async fn create_order(State(s): State<AppState>, MaybeUser(user): MaybeUser, Json(r): Json<orders::CreateOrderRequest>) -> AppResult<(StatusCode, Json<OrderWithItems>)> {
    Ok((StatusCode::CREATED, Json(orders::create_order(&s, user.as_ref(), r).await?)))
}

pub async fn list_orders(State(s): State<AppState>, auth: AuthUser, Query(p): Query<PageParams>) -> AppResult<Json<PaginatedResponse<Order>>> {
    Ok(Json(orders::list_for_user(&s.db, auth.user.id, p).await?))
}

pub async fn get_order(State(s): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<OrderWithItems>> {
    Ok(Json(orders::get_for_user(&s.db, auth.user.id, id).await?))
}

pub async fn cancel_order(State(s): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<OrderWithItems>> {
    Ok(Json(orders::cancel_by_customer(&s, auth.user.id, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct TrackParams {
    pub email: String,
}

pub async fn track_order(State(s): State<AppState>, Path(number): Path<String>, Query(q): Query<TrackParams>) -> AppResult<Json<OrderWithItems>> {
    Ok(Json(orders::track(&s.db, &number, &q.email).await?))
}

// Favorites

pub async fn list_favorites(State(s): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Favorite>>> {
    Ok(Json(favorites::list(&s.db, auth.user.id).await?))
}

pub async fn add_favorite(State(s): State<AppState>, auth: AuthUser, Path(product_id): Path<Uuid>) -> AppResult<Json<FavoriteStatus>> {
    Ok(Json(favorites::add(&s.db, auth.user.id, product_id).await?))
}

pub async fn remove_favorite(State(s): State<AppState>, auth: AuthUser, Path(product_id): Path<Uuid>) -> AppResult<Json<FavoriteStatus>> {
    Ok(Json(favorites::remove(&s.db, auth.user.id, product_id).await?))
}

pub async fn check_favorite(State(s): State<AppState>, auth: AuthUser, Path(product_id): Path<Uuid>) -> AppResult<Json<FavoriteStatus>> {
    Ok(Json(favorites::check(&s.db, auth.user.id, product_id).await?))
}

// Support

pub async fn create_ticket(State(s): State<AppState>, MaybeUser(user): MaybeUser, Json(r): Json<tickets::CreateTicketRequest>) -> AppResult<(StatusCode, Json<SupportTicket>)> {
    Ok((StatusCode::CREATED, Json(tickets::create(&s, user.as_ref(), r).await?)))
}

pub async fn list_tickets(State(s): State<AppState>, auth: AuthUser, Query(p): Query<PageParams>) -> AppResult<Json<PaginatedResponse<SupportTicket>>> {
    Ok(Json(tickets::list_for_user(&s.db, auth.user.id, p).await?))
}

pub async fn get_ticket(State(s): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<SupportTicket>> {
    Ok(Json(tickets::get_for_user(&s.db, auth.user.id, id).await?))
}

pub async fn submit_contact(State(s): State<AppState>, Json(r): Json<contact::ContactRequest>) -> AppResult<(StatusCode, Json<ContactMessage>)> {
    Ok((StatusCode::CREATED, Json(contact::submit(&s, r).await?)))
}
