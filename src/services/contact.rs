use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::NotificationKind;
use crate::domain::events::DomainEvent;
use crate::error::{AppError, AppResult};
use crate::mail::templates;
use crate::models::ContactMessage;
use crate::pagination::{Page, PageParams, PaginatedResponse};
use crate::services::{notifications, site_config};
use crate::state::AppState;

const COLUMNS: &str = "id, name, email, phone, subject, message, is_read, created_at";

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

#[tracing::instrument(skip(state, input))]
pub async fn submit(state: &AppState, input: ContactRequest) -> AppResult<ContactMessage> {
    input.validate()?;
    let mut tx = state.db.begin().await?;
    let message = sqlx::query_as::<_, ContactMessage>(&format!(
        "INSERT INTO contact_messages (id, name, email, phone, subject, message, is_read, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW()) RETURNING {COLUMNS}"
    ))
    .bind(Uuid::now_v7()).bind(input.name.trim()).bind(input.email.trim().to_lowercase())
    .bind(&input.phone).bind(input.subject.trim()).bind(input.message.trim())
    .fetch_one(&mut *tx)
    .await?;
    notifications::create(
        &mut *tx, NotificationKind::NewContact,
        &format!("Mensaje de {}", message.name),
        &message.subject,
        None, None,
    ).await?;
    let brand = site_config::brand(&mut *tx).await?;
    tx.commit().await?;
    info!(message_id = %message.id, "contact message received");

    state.events.publish(DomainEvent::ContactReceived { message_id: message.id }).await;
    state.mailer.send(templates::contact_acknowledgement(&brand, &message), &message.email).await;
    Ok(message)
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactFilter {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub unread: Option<bool>,
}

pub async fn list(db: &PgPool, filter: ContactFilter) -> AppResult<PaginatedResponse<ContactMessage>> {
    let page = Page::from(PageParams { page: filter.page, per_page: filter.per_page });
    let unread_only = filter.unread.unwrap_or(false);
    let data = sqlx::query_as::<_, ContactMessage>(&format!(
        "SELECT {COLUMNS} FROM contact_messages WHERE ($1 = FALSE OR is_read = FALSE) ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(unread_only).bind(page.limit()).bind(page.offset())
    .fetch_all(db).await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contact_messages WHERE ($1 = FALSE OR is_read = FALSE)")
        .bind(unread_only).fetch_one(db).await?;
    Ok(PaginatedResponse::new(data, total, page))
}

pub async fn mark_read(db: &PgPool, id: Uuid) -> AppResult<ContactMessage> {
    sqlx::query_as::<_, ContactMessage>(&format!("UPDATE contact_messages SET is_read = TRUE WHERE id = $1 RETURNING {COLUMNS}"))
        .bind(id).fetch_optional(db).await?
        .ok_or(AppError::NotFound("Message"))
}

pub async fn delete(db: &PgPool, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM contact_messages WHERE id = $1").bind(id).execute(db).await?;
    if result.rows_affected() == 0 { return Err(AppError::NotFound("Message")); }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_contact_validation() {
        let ok = ContactRequest {
            name: "Marta".into(), email: "marta@example.com".into(), phone: None,
            subject: "Pedido para boda".into(), message: "¿Hacen mesas de dulces?".into(),
        };
        assert!(ok.validate().is_ok());
        let bad = ContactRequest { email: "marta".into(), message: String::new(), ..ok };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("message"));
    }

    #[tokio::test]
    async fn test_submit_is_all_or_nothing() {
        let Some(t) = test_support::database().await else { return };
        let subject = format!("Cotización {}", Uuid::now_v7());
        let input = ContactRequest {
            name: "Marta".into(), email: "marta@example.com".into(), phone: None,
            subject: subject.clone(), message: "¿Hacen mesas de dulces?".into(),
        };
        let config = t.take_config().await;
        let result = submit(&t.state, input).await;
        t.restore_config(config).await;
        assert!(result.is_err());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contact_messages WHERE subject = $1")
            .bind(&subject).fetch_one(&t.state.db).await.unwrap();
        assert_eq!(count, 0);
    }
}
