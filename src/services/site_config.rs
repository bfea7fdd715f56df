use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::domain::aggregates::ShippingPolicy;
use crate::domain::value_objects::Money;
use crate::error::{AppError, AppResult};
use crate::mail::templates::Brand;
use crate::models::SiteConfig;

const SELECT_CONFIG: &str = "SELECT store_name, contact_email, contact_phone, address, whatsapp_number, maintenance_mode, \
     maintenance_message, logo_url, favicon_url, banner_url, currency, shipping_cost, free_shipping_threshold, \
     low_stock_threshold, updated_at FROM site_config WHERE id = 1";

pub async fn get<'e, E>(executor: E) -> AppResult<SiteConfig>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, SiteConfig>(SELECT_CONFIG)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Site config"))
}

/// Mail branding. Callers load it before committing so a missing config
/// cannot fail a request whose writes already landed.
pub async fn brand<'e, E>(executor: E) -> AppResult<Brand>
where
    E: sqlx::PgExecutor<'e>,
{
    Ok(Brand::from(&get(executor).await?))
}

impl SiteConfig {
    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy { flat_rate: Money::new(self.shipping_cost), free_over: self.free_shipping_threshold.map(Money::new) }
    }

    pub fn ensure_open(&self) -> AppResult<()> {
        if self.maintenance_mode {
            let message = self.maintenance_message.clone().unwrap_or_else(|| "La tienda está en mantenimiento".to_string());
            return Err(AppError::Maintenance(message));
        }
        Ok(())
    }
}

/// Partial update; absent fields stay unchanged. Nullable text fields are
/// cleared by sending an empty string.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateSiteConfig {
    #[validate(length(min = 1, max = 120))]
    pub store_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub whatsapp_number: Option<String>,
    pub maintenance_mode: Option<bool>,
    pub maintenance_message: Option<String>,
    pub logo_url: Option<String>,
    pub favicon_url: Option<String>,
    pub banner_url: Option<String>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub shipping_cost: Option<Decimal>,
    pub free_shipping_threshold: Option<Decimal>,
    pub clear_free_shipping_threshold: Option<bool>,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i32>,
}

impl UpdateSiteConfig {
    fn check(&self) -> AppResult<()> {
        if let Some(email) = self.contact_email.as_deref().filter(|e| !e.trim().is_empty()) {
            crate::domain::value_objects::Email::new(email)?;
        }
        if let Some(cost) = self.shipping_cost { Money::non_negative(cost)?; }
        if let Some(threshold) = self.free_shipping_threshold { Money::non_negative(threshold)?; }
        Ok(())
    }
}

/// `None` keeps the column; `Some("")` clears it.
fn nullable(value: &Option<String>) -> (bool, Option<String>) {
    match value {
        None => (false, None),
        Some(v) if v.trim().is_empty() => (true, None),
        Some(v) => (true, Some(v.trim().to_string())),
    }
}

#[tracing::instrument(skip(db, input))]
pub async fn update(db: &PgPool, input: UpdateSiteConfig) -> AppResult<SiteConfig> {
    input.validate()?;
    input.check()?;

    let mut tx = db.begin().await?;
    let current = get(&mut *tx).await?;

    let pick = |field: &Option<String>, current: &Option<String>| {
        let (set, value) = nullable(field);
        if set { value } else { current.clone() }
    };
    let free_shipping_threshold = if input.clear_free_shipping_threshold.unwrap_or(false) {
        None
    } else {
        input.free_shipping_threshold.or(current.free_shipping_threshold)
    };

    sqlx::query(
        "UPDATE site_config SET store_name = $1, contact_email = $2, contact_phone = $3, address = $4, whatsapp_number = $5, \
         maintenance_mode = $6, maintenance_message = $7, logo_url = $8, favicon_url = $9, banner_url = $10, currency = $11, \
         shipping_cost = $12, free_shipping_threshold = $13, low_stock_threshold = $14, updated_at = NOW() WHERE id = 1",
    )
    .bind(input.store_name.clone().unwrap_or(current.store_name.clone()))
    .bind(pick(&input.contact_email, &current.contact_email))
    .bind(pick(&input.contact_phone, &current.contact_phone))
    .bind(pick(&input.address, &current.address))
    .bind(pick(&input.whatsapp_number, &current.whatsapp_number))
    .bind(input.maintenance_mode.unwrap_or(current.maintenance_mode))
    .bind(pick(&input.maintenance_message, &current.maintenance_message))
    .bind(pick(&input.logo_url, &current.logo_url))
    .bind(pick(&input.favicon_url, &current.favicon_url))
    .bind(pick(&input.banner_url, &current.banner_url))
    .bind(input.currency.as_deref().map(str::to_uppercase).unwrap_or(current.currency.clone()))
    .bind(input.shipping_cost.map(|c| Money::new(c).amount()).unwrap_or(current.shipping_cost))
    .bind(free_shipping_threshold)
    .bind(input.low_stock_threshold.unwrap_or(current.low_stock_threshold))
    .execute(&mut *tx)
    .await?;

    let updated = get(&mut *tx).await?;
    tx.commit().await?;
    tracing::info!(maintenance = updated.maintenance_mode, "site config updated");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config() -> SiteConfig {
        SiteConfig {
            store_name: "Dulces Caseros".into(), contact_email: None, contact_phone: None, address: None, whatsapp_number: None,
            maintenance_mode: false, maintenance_message: None, logo_url: None, favicon_url: None, banner_url: None,
            currency: "MXN".into(), shipping_cost: Decimal::new(80, 0), free_shipping_threshold: Some(Decimal::new(600, 0)),
            low_stock_threshold: 5, updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_shipping_policy_from_config() {
        let policy = config().shipping_policy();
        assert_eq!(policy.flat_rate.amount(), Decimal::new(80, 0));
        assert!(policy.cost_for(Money::new(Decimal::new(650, 0))).is_zero());
    }

    #[test]
    fn test_maintenance_blocks() {
        let mut c = config();
        assert!(c.ensure_open().is_ok());
        c.maintenance_mode = true;
        c.maintenance_message = Some("Volvemos el lunes".into());
        match c.ensure_open() {
            Err(AppError::Maintenance(m)) => assert_eq!(m, "Volvemos el lunes"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_update_validation() {
        let bad = UpdateSiteConfig { shipping_cost: Some(Decimal::new(-1, 0)), ..Default::default() };
        assert!(bad.check().is_err());
        let bad = UpdateSiteConfig { contact_email: Some("nope".into()), ..Default::default() };
        assert!(bad.check().is_err());
        let clearing = UpdateSiteConfig { contact_email: Some("".into()), ..Default::default() };
        assert!(clearing.check().is_ok());
        let bad = UpdateSiteConfig { currency: Some("PESOS".into()), ..Default::default() };
        assert!(bad.validate().is_err());
        assert_eq!(nullable(&Some("  ".into())), (true, None));
        assert_eq!(nullable(&None), (false, None));
    }
}
