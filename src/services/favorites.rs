use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Favorite;

#[derive(Debug, Serialize)]
pub struct FavoriteStatus {
    pub product_id: Uuid,
    pub is_favorite: bool,
}

pub async fn list(db: &PgPool, user_id: Uuid) -> AppResult<Vec<Favorite>> {
    let favorites = sqlx::query_as::<_, Favorite>(
        "SELECT f.product_id, p.name, p.slug, p.price, p.image_url, p.stock, p.is_active, f.created_at \
         FROM favorites f JOIN products p ON p.id = f.product_id WHERE f.user_id = $1 ORDER BY f.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(favorites)
}

/// Adding twice is a no-op.
pub async fn add(db: &PgPool, user_id: Uuid, product_id: Uuid) -> AppResult<FavoriteStatus> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND is_active)")
        .bind(product_id).fetch_one(db).await?;
    if !exists { return Err(AppError::NotFound("Product")); }
    sqlx::query("INSERT INTO favorites (user_id, product_id, created_at) VALUES ($1, $2, NOW()) ON CONFLICT DO NOTHING")
        .bind(user_id).bind(product_id).execute(db).await?;
    Ok(FavoriteStatus { product_id, is_favorite: true })
}

pub async fn remove(db: &PgPool, user_id: Uuid, product_id: Uuid) -> AppResult<FavoriteStatus> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
        .bind(user_id).bind(product_id).execute(db).await?;
    if result.rows_affected() == 0 { return Err(AppError::NotFound("Favorite")); }
    Ok(FavoriteStatus { product_id, is_favorite: false })
}

pub async fn check(db: &PgPool, user_id: Uuid, product_id: Uuid) -> AppResult<FavoriteStatus> {
    let is_favorite: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM favorites WHERE user_id = $1 AND product_id = $2)")
        .bind(user_id).bind(product_id).fetch_one(db).await?;
    Ok(FavoriteStatus { product_id, is_favorite })
}
