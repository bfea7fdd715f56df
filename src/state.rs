use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::{config::Config, domain::aggregates::LowStockPolicy, events::EventBus, mail::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub events: EventBus,
    pub mailer: Mailer,
}

impl AppState {
    pub async fn connect(config: Config) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&db).await?;
        info!("Database ready");

        let nats = match &config.nats_url {
            Some(url) => match async_nats::connect(url.as_str()).await {
                Ok(client) => {
                    info!(%url, "Connected to NATS");
                    Some(client)
                }
                Err(e) => {
                    warn!(%url, error = %e, "NATS unavailable, events will only be logged");
                    None
                }
            },
            None => None,
        };

        Ok(Self::new(db, config, EventBus::new(nats)))
    }

    pub fn new(db: PgPool, config: Config, events: EventBus) -> Self {
        let mailer = Mailer::new(config.mail_from.clone(), events.clone());
        Self { db, config: Arc::new(config), events, mailer }
    }

    pub fn low_stock_policy(&self) -> LowStockPolicy { LowStockPolicy::new(self.config.low_stock_window) }
}
