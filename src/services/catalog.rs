use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::product::effective_threshold;
use crate::domain::aggregates::{LowStockPolicy, Pricing, RatingSummary, StockAdjustment};
use crate::domain::value_objects::{Quantity, Slug};
use crate::error::{AppError, AppResult};
use crate::models::{Category, Product};
use crate::pagination::{Page, PageParams, PaginatedResponse};
use crate::services::{notifications, site_config};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, image_url, is_active, created_at";
const PRODUCT_COLUMNS: &str = "id, name, slug, description, price, compare_at_price, stock, low_stock_threshold, category_id, \
     image_url, gallery, video_url, is_active, is_featured, created_at, updated_at";

// =============================================================================
// Categories
// =============================================================================

pub async fn list_categories(db: &PgPool, include_inactive: bool) -> AppResult<Vec<Category>> {
    let cats = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE ($1 OR is_active) ORDER BY name"
    ))
    .bind(include_inactive)
    .fetch_all(db)
    .await?;
    Ok(cats)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

fn slug_for(explicit: Option<&str>, name: &str) -> AppResult<String> {
    let source = explicit.filter(|s| !s.trim().is_empty()).unwrap_or(name);
    Ok(Slug::new(source)?.into_inner())
}

#[tracing::instrument(skip(db, input), fields(name = %input.name))]
pub async fn create_category(db: &PgPool, input: CategoryInput) -> AppResult<Category> {
    input.validate()?;
    let slug = slug_for(input.slug.as_deref(), &input.name)?;
    let c = sqlx::query_as::<_, Category>(&format!(
        "INSERT INTO categories (id, name, slug, description, image_url, is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, NOW()) RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(Uuid::now_v7()).bind(input.name.trim()).bind(&slug).bind(&input.description).bind(&input.image_url)
    .bind(input.is_active.unwrap_or(true))
    .fetch_one(db)
    .await?;
    Ok(c)
}

pub async fn update_category(db: &PgPool, id: Uuid, input: CategoryInput) -> AppResult<Category> {
    input.validate()?;
    let slug = slug_for(input.slug.as_deref(), &input.name)?;
    sqlx::query_as::<_, Category>(&format!(
        "UPDATE categories SET name = $2, slug = $3, description = $4, image_url = $5, is_active = COALESCE($6, is_active) \
         WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(id).bind(input.name.trim()).bind(&slug).bind(&input.description).bind(&input.image_url).bind(input.is_active)
    .fetch_optional(db)
    .await?
    .ok_or(AppError::NotFound("Category"))
}

pub async fn delete_category(db: &PgPool, id: Uuid) -> AppResult<()> {
    let in_use: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = $1").bind(id).fetch_one(db).await?;
    if in_use > 0 {
        return Err(AppError::Conflict(format!("Category still has {in_use} products")));
    }
    let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(db).await?;
    if result.rows_affected() == 0 { return Err(AppError::NotFound("Category")); }
    Ok(())
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort { #[default] Newest, PriceAsc, PriceDesc, Name }

impl ProductSort {
    fn order_by(&self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC",
            Self::PriceAsc => "price ASC, created_at DESC",
            Self::PriceDesc => "price DESC, created_at DESC",
            Self::Name => "name ASC",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<Uuid>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
}

const PRODUCT_FILTER: &str = "($1::uuid IS NULL OR category_id = $1) AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%') \
     AND ($3::bool IS NULL OR is_featured = $3) AND ($4::numeric IS NULL OR price >= $4) AND ($5::numeric IS NULL OR price <= $5)";

pub async fn list_products(db: &PgPool, filter: ProductFilter, include_inactive: bool) -> AppResult<PaginatedResponse<Product>> {
    let page = Page::from(PageParams { page: filter.page, per_page: filter.per_page });
    let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let active = if include_inactive { "TRUE" } else { "is_active" };

    let data = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE {active} AND {PRODUCT_FILTER} ORDER BY {} LIMIT $6 OFFSET $7",
        filter.sort.order_by()
    ))
    .bind(filter.category).bind(search).bind(filter.featured).bind(filter.min_price).bind(filter.max_price)
    .bind(page.limit()).bind(page.offset())
    .fetch_all(db)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products WHERE {active} AND {PRODUCT_FILTER}"))
        .bind(filter.category).bind(search).bind(filter.featured).bind(filter.min_price).bind(filter.max_price)
        .fetch_one(db)
        .await?;
    Ok(PaginatedResponse::new(data, total, page))
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub rating: RatingSummary,
    pub discount_percent: Option<u32>,
}

pub async fn find_product(db: &PgPool, id: Uuid) -> AppResult<Product> {
    sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
        .bind(id).fetch_optional(db).await?
        .ok_or(AppError::NotFound("Product"))
}

/// Public lookup by UUID or slug; inactive products are hidden.
pub async fn get_product(db: &PgPool, id_or_slug: &str) -> AppResult<ProductDetail> {
    let product = match Uuid::parse_str(id_or_slug) {
        Ok(id) => sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND is_active"))
            .bind(id).fetch_optional(db).await?,
        Err(_) => sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1 AND is_active"))
            .bind(id_or_slug).fetch_optional(db).await?,
    }
    .ok_or(AppError::NotFound("Product"))?;

    let category = match product.category_id {
        Some(cid) => sqlx::query_as::<_, Category>(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"))
            .bind(cid).fetch_optional(db).await?,
        None => None,
    };
    let rating = rating_summary(db, product.id).await?;
    let discount_percent = Pricing::new(product.price, product.compare_at_price).ok().and_then(|p| p.discount_percent());
    Ok(ProductDetail { product, category, rating, discount_percent })
}

pub async fn rating_summary(db: &PgPool, product_id: Uuid) -> AppResult<RatingSummary> {
    let (avg, count): (Option<Decimal>, i64) = sqlx::query_as(
        "SELECT AVG(rating)::numeric, COUNT(*) FROM reviews WHERE product_id = $1 AND is_approved",
    )
    .bind(product_id)
    .fetch_one(db)
    .await?;
    Ok(RatingSummary::from_aggregate(avg, count))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i32>,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub gallery: Vec<String>,
    pub video_url: Option<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

#[tracing::instrument(skip(db, input), fields(name = %input.name))]
pub async fn create_product(db: &PgPool, input: ProductInput) -> AppResult<Product> {
    input.validate()?;
    let pricing = Pricing::new(input.price, input.compare_at_price)?;
    let slug = slug_for(input.slug.as_deref(), &input.name)?;
    let p = sqlx::query_as::<_, Product>(&format!(
        "INSERT INTO products (id, name, slug, description, price, compare_at_price, stock, low_stock_threshold, category_id, \
         image_url, gallery, video_url, is_active, is_featured, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW(), NOW()) RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(Uuid::now_v7()).bind(input.name.trim()).bind(&slug).bind(&input.description)
    .bind(pricing.price.amount()).bind(pricing.compare_at_price.map(|m| m.amount()))
    .bind(input.stock.unwrap_or(0)).bind(input.low_stock_threshold).bind(input.category_id)
    .bind(&input.image_url).bind(&input.gallery).bind(&input.video_url)
    .bind(input.is_active.unwrap_or(true)).bind(input.is_featured.unwrap_or(false))
    .fetch_one(db)
    .await?;
    info!(product_id = %p.id, "product created");
    Ok(p)
}

/// A stock or threshold change here goes through the same low-stock rule as
/// [`adjust_stock`].
#[tracing::instrument(skip(db, policy, input), fields(name = %input.name))]
pub async fn update_product(db: &PgPool, policy: LowStockPolicy, id: Uuid, input: ProductInput) -> AppResult<Product> {
    input.validate()?;
    let pricing = Pricing::new(input.price, input.compare_at_price)?;
    let slug = slug_for(input.slug.as_deref(), &input.name)?;
    let mut tx = db.begin().await?;
    let product = sqlx::query_as::<_, Product>(&format!(
        "UPDATE products SET name = $2, slug = $3, description = $4, price = $5, compare_at_price = $6, \
         stock = COALESCE($7, stock), low_stock_threshold = $8, category_id = $9, image_url = $10, gallery = $11, video_url = $12, \
         is_active = COALESCE($13, is_active), is_featured = COALESCE($14, is_featured), updated_at = NOW() \
         WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(id).bind(input.name.trim()).bind(&slug).bind(&input.description)
    .bind(pricing.price.amount()).bind(pricing.compare_at_price.map(|m| m.amount()))
    .bind(input.stock).bind(input.low_stock_threshold).bind(input.category_id)
    .bind(&input.image_url).bind(&input.gallery).bind(&input.video_url)
    .bind(input.is_active).bind(input.is_featured)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Product"))?;

    let config = site_config::get(&mut *tx).await?;
    let threshold = effective_threshold(product.low_stock_threshold, Some(config.low_stock_threshold));
    let level = notifications::StockLevel { product_id: id, name: &product.name, stock: Quantity::from_db(product.stock), threshold };
    notifications::check_stock_alert(&mut *tx, policy, level, Utc::now()).await?;
    tx.commit().await?;
    Ok(product)
}

/// Soft delete: order history keeps pointing at the row.
pub async fn delete_product(db: &PgPool, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("UPDATE products SET is_active = FALSE, is_featured = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(id).execute(db).await?;
    if result.rows_affected() == 0 { return Err(AppError::NotFound("Product")); }
    Ok(())
}

#[tracing::instrument(skip(db, policy))]
pub async fn adjust_stock(db: &PgPool, policy: LowStockPolicy, id: Uuid, adjustment: StockAdjustment) -> AppResult<Product> {
    let mut tx = db.begin().await?;
    let current: Option<(i32, Option<i32>, String)> =
        sqlx::query_as("SELECT stock, low_stock_threshold, name FROM products WHERE id = $1 FOR UPDATE")
            .bind(id).fetch_optional(&mut *tx).await?;
    let (stock, product_threshold, name) = current.ok_or(AppError::NotFound("Product"))?;

    let new_stock = adjustment.apply(Quantity::from_db(stock))?;
    let product = sqlx::query_as::<_, Product>(&format!(
        "UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(id).bind(new_stock.to_db()?)
    .fetch_one(&mut *tx)
    .await?;

    let config = site_config::get(&mut *tx).await?;
    let threshold = effective_threshold(product_threshold, Some(config.low_stock_threshold));
    let level = notifications::StockLevel { product_id: id, name: &name, stock: new_stock, threshold };
    notifications::check_stock_alert(&mut *tx, policy, level, Utc::now()).await?;
    tx.commit().await?;
    info!(from = stock, to = new_stock.value(), "stock adjusted");
    Ok(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_slug_for() {
        assert_eq!(slug_for(None, "Dulce de Leche").unwrap(), "dulce-de-leche");
        assert_eq!(slug_for(Some("  "), "Dulce de Leche").unwrap(), "dulce-de-leche");
        assert_eq!(slug_for(Some("Cajeta Especial"), "Dulce de Leche").unwrap(), "cajeta-especial");
        assert!(slug_for(None, "!!!").is_err());
    }

    #[test]
    fn test_sort_parsing() {
        let f: ProductFilter = serde_json::from_str(r#"{"sort":"price_desc","featured":true}"#).unwrap();
        assert_eq!(f.sort, ProductSort::PriceDesc);
        assert_eq!(f.sort.order_by(), "price DESC, created_at DESC");
        let f: ProductFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(f.sort, ProductSort::Newest);
    }

    #[test]
    fn test_product_input_validation() {
        let input: ProductInput = serde_json::from_str(r#"{"name":"","price":"10"}"#).unwrap();
        assert!(input.validate().is_err());
        let input: ProductInput = serde_json::from_str(r#"{"name":"Cocada","price":"10","stock":-1}"#).unwrap();
        assert!(input.validate().is_err());
        let input: ProductInput = serde_json::from_str(r#"{"name":"Cocada","price":"10","stock":4}"#).unwrap();
        assert!(input.validate().is_ok());
    }

    fn edit(id: Uuid, stock: i32) -> ProductInput {
        serde_json::from_value(serde_json::json!({
            "name": "Cajeta envinada", "slug": format!("cajeta-envinada-{id}"), "price": "120",
            "stock": stock, "low_stock_threshold": 5,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_update_product_stock_raises_alerts() {
        let Some(t) = test_support::database().await else { return };
        let id = t.product(20, Some(5)).await;

        let product = update_product(&t.state.db, t.state.low_stock_policy(), id, edit(id, 2)).await.unwrap();
        assert_eq!(product.stock, 2);
        assert_eq!(t.alerts_for(id).await, ["low_stock"]);

        // Inside the window: suppressed until stock runs out.
        update_product(&t.state.db, t.state.low_stock_policy(), id, edit(id, 1)).await.unwrap();
        assert_eq!(t.alerts_for(id).await, ["low_stock"]);
        update_product(&t.state.db, t.state.low_stock_policy(), id, edit(id, 0)).await.unwrap();
        assert_eq!(t.alerts_for(id).await, ["low_stock", "out_of_stock"]);
    }

    #[tokio::test]
    async fn test_update_product_with_plenty_of_stock_stays_quiet() {
        let Some(t) = test_support::database().await else { return };
        let id = t.product(3, Some(5)).await;
        update_product(&t.state.db, t.state.low_stock_policy(), id, edit(id, 40)).await.unwrap();
        assert!(t.alerts_for(id).await.is_empty());
    }

    #[tokio::test]
    async fn test_adjust_stock_rejects_unstorable_counts() {
        let Some(t) = test_support::database().await else { return };
        let id = t.product(10, None).await;
        let err = adjust_stock(&t.state.db, t.state.low_stock_policy(), id, StockAdjustment::Set(4_000_000_000)).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        let stock: i32 = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1").bind(id).fetch_one(&t.state.db).await.unwrap();
        assert_eq!(stock, 10);
    }
}
