//! Rows as stored in PostgreSQL. Status-like columns stay `String` here and
//! are parsed into domain enums where rules need them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{OrderStatus, Role, TicketStatus};
use crate::domain::DomainError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid, pub email: String, pub password_hash: String, pub full_name: String, pub phone: Option<String>,
    pub role: String, pub is_active: bool, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Result<Role, DomainError> { self.role.parse() }
}

/// The public face of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid, pub email: String, pub full_name: String, pub phone: Option<String>,
    pub role: String, pub is_active: bool, pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self { id: u.id, email: u.email, full_name: u.full_name, phone: u.phone, role: u.role, is_active: u.is_active, created_at: u.created_at }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid, pub name: String, pub slug: String, pub description: Option<String>,
    pub image_url: Option<String>, pub is_active: bool, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid, pub name: String, pub slug: String, pub description: Option<String>,
    pub price: Decimal, pub compare_at_price: Option<Decimal>, pub stock: i32, pub low_stock_threshold: Option<i32>,
    pub category_id: Option<Uuid>, pub image_url: Option<String>, pub gallery: Vec<String>, pub video_url: Option<String>,
    pub is_active: bool, pub is_featured: bool, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductSummary {
    pub id: Uuid, pub name: String, pub slug: String, pub price: Decimal, pub compare_at_price: Option<Decimal>,
    pub image_url: Option<String>, pub stock: i32, pub is_active: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartRow {
    pub product_id: Uuid, pub quantity: i32, pub name: String, pub slug: String, pub image_url: Option<String>,
    pub price: Decimal, pub stock: i32, pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid, pub order_number: String, pub user_id: Option<Uuid>, pub customer_name: String, pub customer_email: String,
    pub customer_phone: Option<String>, pub shipping_address: serde_json::Value, pub status: String, pub payment_status: String,
    pub payment_method: String, pub subtotal: Decimal, pub shipping_cost: Decimal, pub total: Decimal, pub notes: Option<String>,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn status(&self) -> Result<OrderStatus, DomainError> { self.status.parse() }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid, pub order_id: Uuid, pub product_id: Option<Uuid>, pub product_name: String,
    pub unit_price: Decimal, pub quantity: i32, pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid, pub product_id: Uuid, pub user_id: Uuid, pub rating: i16, pub comment: Option<String>,
    pub verified_purchase: bool, pub is_approved: bool, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

/// Review joined with author and product names for listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewView {
    pub id: Uuid, pub product_id: Uuid, pub product_name: String, pub user_id: Uuid, pub author_name: String,
    pub rating: i16, pub comment: Option<String>, pub verified_purchase: bool, pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Favorite {
    pub product_id: Uuid, pub name: String, pub slug: String, pub price: Decimal, pub image_url: Option<String>,
    pub stock: i32, pub is_active: bool, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SupportTicket {
    pub id: Uuid, pub ticket_number: String, pub user_id: Option<Uuid>, pub name: String, pub email: String,
    pub subject: String, pub message: String, pub category: String, pub priority: String, pub status: String,
    pub admin_response: Option<String>, pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

impl SupportTicket {
    pub fn status(&self) -> Result<TicketStatus, DomainError> { self.status.parse() }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContactMessage {
    pub id: Uuid, pub name: String, pub email: String, pub phone: Option<String>, pub subject: String,
    pub message: String, pub is_read: bool, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid, pub kind: String, pub title: String, pub message: String, pub product_id: Option<Uuid>,
    pub order_id: Option<Uuid>, pub is_read: bool, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SiteConfig {
    pub store_name: String, pub contact_email: Option<String>, pub contact_phone: Option<String>, pub address: Option<String>,
    pub whatsapp_number: Option<String>, pub maintenance_mode: bool, pub maintenance_message: Option<String>,
    pub logo_url: Option<String>, pub favicon_url: Option<String>, pub banner_url: Option<String>, pub currency: String,
    pub shipping_cost: Decimal, pub free_shipping_threshold: Option<Decimal>, pub low_stock_threshold: i32,
    pub updated_at: DateTime<Utc>,
}
