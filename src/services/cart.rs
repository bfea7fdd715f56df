use serde::Deserialize;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::cart::merged_quantity;
use crate::domain::aggregates::{CartLine, CartView};
use crate::domain::value_objects::{Money, Quantity};
use crate::error::{AppError, AppResult};
use crate::models::CartRow;

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetQuantityRequest {
    #[validate(range(max = 999))]
    pub quantity: u32,
}

pub async fn get(db: &PgPool, user_id: Uuid) -> AppResult<CartView> {
    let rows = sqlx::query_as::<_, CartRow>(
        "SELECT c.product_id, c.quantity, p.name, p.slug, p.image_url, p.price, p.stock, p.is_active \
         FROM cart_items c JOIN products p ON p.id = c.product_id WHERE c.user_id = $1 ORDER BY c.created_at",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    let lines = rows
        .into_iter()
        .map(|r| CartLine::new(
            r.product_id, r.name, r.slug, r.image_url, Money::new(r.price),
            Quantity::from_db(r.quantity).value(), Quantity::from_db(r.stock).value(), r.is_active,
        ))
        .collect();
    Ok(CartView::from_lines(lines))
}

async fn purchasable_stock<'e>(executor: impl PgExecutor<'e>, product_id: Uuid) -> AppResult<(String, Quantity)> {
    let row: Option<(String, i32, bool)> = sqlx::query_as("SELECT name, stock, is_active FROM products WHERE id = $1")
        .bind(product_id).fetch_optional(executor).await?;
    match row {
        Some((name, stock, true)) => Ok((name, Quantity::from_db(stock))),
        _ => Err(AppError::NotFound("Product")),
    }
}

#[tracing::instrument(skip(db))]
pub async fn add_item(db: &PgPool, user_id: Uuid, input: AddToCartRequest) -> AppResult<CartView> {
    input.validate()?;
    let (name, stock) = purchasable_stock(db, input.product_id).await?;
    let existing: Option<i32> = sqlx::query_scalar("SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id).bind(input.product_id).fetch_optional(db).await?;
    let quantity = merged_quantity(&name, existing.map(|q| Quantity::from_db(q).value()), input.quantity, stock)?;

    sqlx::query(
        "INSERT INTO cart_items (id, user_id, product_id, quantity, created_at) VALUES ($1, $2, $3, $4, NOW()) \
         ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
    )
    .bind(Uuid::now_v7()).bind(user_id).bind(input.product_id).bind(Quantity::new(quantity).to_db()?)
    .execute(db)
    .await?;
    get(db, user_id).await
}

/// Quantity zero removes the line.
#[tracing::instrument(skip(db))]
pub async fn set_quantity(db: &PgPool, user_id: Uuid, product_id: Uuid, input: SetQuantityRequest) -> AppResult<CartView> {
    input.validate()?;
    if input.quantity == 0 {
        return remove_item(db, user_id, product_id).await;
    }
    let (name, stock) = purchasable_stock(db, product_id).await?;
    crate::domain::aggregates::order::ensure_stock(&name, input.quantity, stock)?;
    let result = sqlx::query("UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2")
        .bind(user_id).bind(product_id).bind(Quantity::new(input.quantity).to_db()?)
        .execute(db).await?;
    if result.rows_affected() == 0 { return Err(AppError::NotFound("Cart item")); }
    get(db, user_id).await
}

pub async fn remove_item(db: &PgPool, user_id: Uuid, product_id: Uuid) -> AppResult<CartView> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id).bind(product_id).execute(db).await?;
    if result.rows_affected() == 0 { return Err(AppError::NotFound("Cart item")); }
    get(db, user_id).await
}

pub async fn clear<'e>(executor: impl PgExecutor<'e>, user_id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(user_id).execute(executor).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        assert!(AddToCartRequest { product_id: Uuid::nil(), quantity: 0 }.validate().is_err());
        assert!(AddToCartRequest { product_id: Uuid::nil(), quantity: 2 }.validate().is_ok());
        assert!(SetQuantityRequest { quantity: 0 }.validate().is_ok());
        assert!(SetQuantityRequest { quantity: 1000 }.validate().is_err());
    }
}
