use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::Rating;
use crate::error::{AppError, AppResult};
use crate::models::{Review, ReviewView};
use crate::pagination::{Page, PageParams, PaginatedResponse};

const REVIEW_COLUMNS: &str = "id, product_id, user_id, rating, comment, verified_purchase, is_approved, created_at, updated_at";
const VIEW_SELECT: &str = "SELECT r.id, r.product_id, p.name AS product_name, r.user_id, u.full_name AS author_name, \
     r.rating, r.comment, r.verified_purchase, r.is_approved, r.created_at \
     FROM reviews r JOIN products p ON p.id = r.product_id JOIN users u ON u.id = r.user_id";

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewInput {
    pub rating: Rating,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

fn clean_comment(comment: Option<&str>) -> Option<String> {
    comment.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string)
}

pub async fn list_for_product(db: &PgPool, product_id: Uuid, params: PageParams) -> AppResult<PaginatedResponse<ReviewView>> {
    let page = Page::from(params);
    let data = sqlx::query_as::<_, ReviewView>(&format!(
        "{VIEW_SELECT} WHERE r.product_id = $1 AND r.is_approved ORDER BY r.created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(product_id).bind(page.limit()).bind(page.offset())
    .fetch_all(db).await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE product_id = $1 AND is_approved")
        .bind(product_id).fetch_one(db).await?;
    Ok(PaginatedResponse::new(data, total, page))
}

/// A purchase counts once an order holding the product has been delivered.
async fn has_delivered_purchase(db: &PgPool, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
    Ok(sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM orders o JOIN order_items oi ON oi.order_id = o.id \
         WHERE o.user_id = $1 AND oi.product_id = $2 AND o.status = 'delivered')",
    )
    .bind(user_id).bind(product_id)
    .fetch_one(db).await?)
}

#[tracing::instrument(skip(db, input))]
pub async fn create(db: &PgPool, user_id: Uuid, product_id: Uuid, input: ReviewInput) -> AppResult<Review> {
    input.validate()?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND is_active)")
        .bind(product_id).fetch_one(db).await?;
    if !exists { return Err(AppError::NotFound("Product")); }
    let verified = has_delivered_purchase(db, user_id, product_id).await?;

    let review = sqlx::query_as::<_, Review>(&format!(
        "INSERT INTO reviews (id, product_id, user_id, rating, comment, verified_purchase, is_approved, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW(), NOW()) RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(Uuid::now_v7()).bind(product_id).bind(user_id).bind(input.rating.value())
    .bind(clean_comment(input.comment.as_deref())).bind(verified)
    .fetch_one(db)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("You have already reviewed this product".to_string()),
        other => other,
    })?;
    info!(review_id = %review.id, verified, "review submitted");
    Ok(review)
}

/// Edits go back to moderation.
pub async fn update_own(db: &PgPool, user_id: Uuid, review_id: Uuid, input: ReviewInput) -> AppResult<Review> {
    input.validate()?;
    sqlx::query_as::<_, Review>(&format!(
        "UPDATE reviews SET rating = $3, comment = $4, is_approved = FALSE, updated_at = NOW() \
         WHERE id = $1 AND user_id = $2 RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(review_id).bind(user_id).bind(input.rating.value()).bind(clean_comment(input.comment.as_deref()))
    .fetch_optional(db).await?
    .ok_or(AppError::NotFound("Review"))
}

pub async fn delete_own(db: &PgPool, user_id: Uuid, review_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND user_id = $2")
        .bind(review_id).bind(user_id).execute(db).await?;
    if result.rows_affected() == 0 { return Err(AppError::NotFound("Review")); }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewFilter {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub approved: Option<bool>,
    pub product_id: Option<Uuid>,
}

pub async fn list_all(db: &PgPool, filter: ReviewFilter) -> AppResult<PaginatedResponse<ReviewView>> {
    let page = Page::from(PageParams { page: filter.page, per_page: filter.per_page });
    const WHERE: &str = "($1::boolean IS NULL OR r.is_approved = $1) AND ($2::uuid IS NULL OR r.product_id = $2)";
    let data = sqlx::query_as::<_, ReviewView>(&format!(
        "{VIEW_SELECT} WHERE {WHERE} ORDER BY r.created_at DESC LIMIT $3 OFFSET $4"
    ))
    .bind(filter.approved).bind(filter.product_id).bind(page.limit()).bind(page.offset())
    .fetch_all(db).await?;
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM reviews r WHERE {WHERE}"))
        .bind(filter.approved).bind(filter.product_id).fetch_one(db).await?;
    Ok(PaginatedResponse::new(data, total, page))
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approved: bool,
}

#[tracing::instrument(skip(db))]
pub async fn set_approval(db: &PgPool, review_id: Uuid, approved: bool) -> AppResult<Review> {
    let review = sqlx::query_as::<_, Review>(&format!(
        "UPDATE reviews SET is_approved = $2, updated_at = NOW() WHERE id = $1 RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(review_id).bind(approved)
    .fetch_optional(db).await?
    .ok_or(AppError::NotFound("Review"))?;
    info!("review moderated");
    Ok(review)
}

pub async fn delete(db: &PgPool, review_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = $1").bind(review_id).execute(db).await?;
    if result.rows_affected() == 0 { return Err(AppError::NotFound("Review")); }
    Ok(())
}
