//! Fixtures for tests that run against a live PostgreSQL.
//!
//! Set `TEST_DATABASE_URL` (or `DATABASE_URL`) to run them; without it they
//! return early. Tests holding a [`TestDb`] run one at a time since some of
//! them rewrite the `site_config` singleton.

use sqlx::postgres::PgPoolOptions;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::config::Config;
use crate::events::EventBus;
use crate::models::SiteConfig;
use crate::services::{site_config, users};
use crate::state::AppState;

static DB_LOCK: Mutex<()> = Mutex::const_new(());

pub struct TestDb {
    pub state: AppState,
    _guard: MutexGuard<'static, ()>,
}

pub async fn database() -> Option<TestDb> {
    let Some(url) = std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")).ok() else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return None;
    };
    let guard = DB_LOCK.lock().await;
    let db = PgPoolOptions::new().max_connections(5).connect(&url).await.expect("connect to test database");
    sqlx::migrate!("./migrations").run(&db).await.expect("run migrations");
    let config = Config::from_lookup(|key| (key == "DATABASE_URL").then(|| url.clone())).expect("test config");
    Some(TestDb { state: AppState::new(db, config, EventBus::disabled()), _guard: guard })
}

impl TestDb {
    /// A fresh, active product with its own slug.
    pub async fn product(&self, stock: i32, threshold: Option<i32>) -> Uuid {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO products (id, name, slug, price, stock, low_stock_threshold, gallery, is_active, is_featured, created_at, updated_at) \
             VALUES ($1, $2, $3, 120.00, $4, $5, '{}', TRUE, FALSE, NOW(), NOW())",
        )
        .bind(id).bind(format!("Cajeta {id}")).bind(format!("cajeta-{id}")).bind(stock).bind(threshold)
        .execute(&self.state.db).await.expect("insert product");
        id
    }

    /// A cash-on-delivery guest order with no lines.
    pub async fn order(&self, status: &str) -> Uuid {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO orders (id, order_number, customer_name, customer_email, status, payment_method, subtotal, shipping_cost, total, created_at, updated_at) \
             VALUES ($1, $2, 'Ana', 'ana@example.com', $3, 'cash_on_delivery', 120.00, 80.00, 200.00, NOW(), NOW())",
        )
        .bind(id).bind(format!("DC-T-{id}")).bind(status)
        .execute(&self.state.db).await.expect("insert order");
        id
    }

    pub async fn order_status(&self, id: Uuid) -> String {
        sqlx::query_scalar("SELECT status FROM orders WHERE id = $1").bind(id).fetch_one(&self.state.db).await.expect("select order")
    }

    /// A customer account with a live session token.
    pub async fn customer(&self) -> String {
        let input = users::RegisterRequest {
            email: format!("cliente-{}@example.com", Uuid::now_v7().simple()),
            password: "dulce2024".into(),
            full_name: "Cliente de Prueba".into(),
            phone: None,
        };
        users::register(&self.state, input).await.expect("register customer").token
    }

    pub async fn alerts_for(&self, product_id: Uuid) -> Vec<String> {
        sqlx::query_scalar("SELECT kind FROM notifications WHERE product_id = $1 ORDER BY created_at")
            .bind(product_id).fetch_all(&self.state.db).await.expect("select notifications")
    }

    pub async fn set_maintenance(&self, on: bool) {
        sqlx::query("UPDATE site_config SET maintenance_mode = $1 WHERE id = 1")
            .bind(on).execute(&self.state.db).await.expect("toggle maintenance");
    }

    /// Deletes the singleton and hands back what it held, for [`TestDb::restore_config`].
    pub async fn take_config(&self) -> SiteConfig {
        let config = site_config::get(&self.state.db).await.expect("site config");
        sqlx::query("DELETE FROM site_config WHERE id = 1").execute(&self.state.db).await.expect("delete site config");
        config
    }

    pub async fn restore_config(&self, c: SiteConfig) {
        sqlx::query(
            "INSERT INTO site_config (id, store_name, contact_email, contact_phone, address, whatsapp_number, maintenance_mode, \
             maintenance_message, logo_url, favicon_url, banner_url, currency, shipping_cost, free_shipping_threshold, \
             low_stock_threshold, updated_at) VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW())",
        )
        .bind(&c.store_name).bind(&c.contact_email).bind(&c.contact_phone).bind(&c.address).bind(&c.whatsapp_number)
        .bind(c.maintenance_mode).bind(&c.maintenance_message).bind(&c.logo_url).bind(&c.favicon_url).bind(&c.banner_url)
        .bind(&c.currency).bind(c.shipping_cost).bind(c.free_shipping_threshold).bind(c.low_stock_threshold)
        .execute(&self.state.db).await.expect("restore site config");
    }
}
