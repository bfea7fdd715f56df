use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::ticket::generate_ticket_number;
use crate::domain::aggregates::{NotificationKind, TicketCategory, TicketPriority, TicketStatus};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Email;
use crate::error::{AppError, AppResult};
use crate::mail::templates;
use crate::models::{SupportTicket, User};
use crate::pagination::{Page, PageParams, PaginatedResponse};
use crate::services::{notifications, site_config};
use crate::state::AppState;

const TICKET_COLUMNS: &str = "id, ticket_number, user_id, name, email, subject, message, category, priority, status, \
     admin_response, responded_at, created_at, updated_at";
const TICKET_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub email: Option<String>,
    #[validate(length(min = 3, max = 200))]
    pub subject: String,
    #[validate(length(min = 10, max = 5000))]
    pub message: String,
    #[serde(default)]
    pub category: TicketCategory,
    #[serde(default)]
    pub priority: TicketPriority,
}

/// Requester identity; a signed-in user may omit both fields.
fn requester(user: Option<&User>, name: Option<&str>, email: Option<&str>) -> AppResult<(Option<Uuid>, String, Email)> {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    let email = email.map(str::trim).filter(|e| !e.is_empty());
    match user {
        Some(u) => Ok((Some(u.id), name.unwrap_or(&u.full_name).to_string(), Email::new(email.unwrap_or(&u.email))?)),
        None => match (name, email) {
            (Some(name), Some(email)) => Ok((None, name.to_string(), Email::new(email)?)),
            _ => Err(AppError::BadRequest("Name and email are required".to_string())),
        },
    }
}

fn new_ticket_number() -> String { generate_ticket_number(&mut rand::thread_rng()) }

async fn unique_ticket_number(conn: &mut PgConnection) -> AppResult<String> {
    for _ in 0..TICKET_NUMBER_ATTEMPTS {
        let candidate = new_ticket_number();
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM support_tickets WHERE ticket_number = $1)")
            .bind(&candidate).fetch_one(&mut *conn).await?;
        if !taken { return Ok(candidate); }
        warn!(%candidate, "ticket number collision, retrying");
    }
    Err(AppError::Internal("could not allocate a ticket number".to_string()))
}

#[tracing::instrument(skip(state, user, input), fields(user_id = ?user.map(|u| u.id)))]
pub async fn create(state: &AppState, user: Option<&User>, input: CreateTicketRequest) -> AppResult<SupportTicket> {
    input.validate()?;
    let (user_id, name, email) = requester(user, input.name.as_deref(), input.email.as_deref())?;

    let mut tx = state.db.begin().await?;
    let number = unique_ticket_number(&mut *tx).await?;
    let ticket = sqlx::query_as::<_, SupportTicket>(&format!(
        "INSERT INTO support_tickets (id, ticket_number, user_id, name, email, subject, message, category, priority, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'open', NOW(), NOW()) RETURNING {TICKET_COLUMNS}"
    ))
    .bind(Uuid::now_v7()).bind(&number).bind(user_id).bind(&name).bind(email.as_str())
    .bind(input.subject.trim()).bind(input.message.trim()).bind(input.category.as_str()).bind(input.priority.as_str())
    .fetch_one(&mut *tx)
    .await?;
    notifications::create(
        &mut *tx, NotificationKind::NewTicket,
        &format!("Nuevo ticket {}", ticket.ticket_number),
        &format!("{}: {}", ticket.name, ticket.subject),
        None, None,
    ).await?;
    tx.commit().await?;
    info!(ticket_number = %ticket.ticket_number, priority = %input.priority, "ticket opened");

    state.events.publish(DomainEvent::TicketOpened { ticket_id: ticket.id, ticket_number: ticket.ticket_number.clone() }).await;
    Ok(ticket)
}

pub async fn list_for_user(db: &PgPool, user_id: Uuid, params: PageParams) -> AppResult<PaginatedResponse<SupportTicket>> {
    let page = Page::from(params);
    let data = sqlx::query_as::<_, SupportTicket>(&format!(
        "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id).bind(page.limit()).bind(page.offset())
    .fetch_all(db).await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM support_tickets WHERE user_id = $1")
        .bind(user_id).fetch_one(db).await?;
    Ok(PaginatedResponse::new(data, total, page))
}

pub async fn get_for_user(db: &PgPool, user_id: Uuid, ticket_id: Uuid) -> AppResult<SupportTicket> {
    sqlx::query_as::<_, SupportTicket>(&format!("SELECT {TICKET_COLUMNS} FROM support_tickets WHERE id = $1 AND user_id = $2"))
        .bind(ticket_id).bind(user_id).fetch_optional(db).await?
        .ok_or(AppError::NotFound("Ticket"))
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketFilter {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

pub async fn list_all(db: &PgPool, filter: TicketFilter) -> AppResult<PaginatedResponse<SupportTicket>> {
    let page = Page::from(PageParams { page: filter.page, per_page: filter.per_page });
    let status = filter.status.map(|s| s.as_str());
    let priority = filter.priority.map(|p| p.as_str());
    const WHERE: &str = "($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR priority = $2)";
    let data = sqlx::query_as::<_, SupportTicket>(&format!(
        "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE {WHERE} ORDER BY created_at DESC LIMIT $3 OFFSET $4"
    ))
    .bind(status).bind(priority).bind(page.limit()).bind(page.offset())
    .fetch_all(db).await?;
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM support_tickets WHERE {WHERE}"))
        .bind(status).bind(priority).fetch_one(db).await?;
    Ok(PaginatedResponse::new(data, total, page))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RespondRequest {
    #[validate(length(min = 1, max = 5000))]
    pub response: String,
    pub status: Option<TicketStatus>,
}

#[tracing::instrument(skip(state, input))]
pub async fn respond(state: &AppState, ticket_id: Uuid, input: RespondRequest) -> AppResult<SupportTicket> {
    input.validate()?;
    let mut tx = state.db.begin().await?;
    let current = sqlx::query_as::<_, SupportTicket>(&format!(
        "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE id = $1 FOR UPDATE"
    ))
    .bind(ticket_id)
    .fetch_optional(&mut *tx).await?
    .ok_or(AppError::NotFound("Ticket"))?;
    let status = current.status()?.after_response(input.status)?;

    let response = input.response.trim();
    let ticket = sqlx::query_as::<_, SupportTicket>(&format!(
        "UPDATE support_tickets SET admin_response = $2, responded_at = NOW(), status = $3, updated_at = NOW() \
         WHERE id = $1 RETURNING {TICKET_COLUMNS}"
    ))
    .bind(ticket_id).bind(response).bind(status.as_str())
    .fetch_one(&mut *tx).await?;
    let brand = site_config::brand(&mut *tx).await?;
    tx.commit().await?;
    info!(ticket_number = %ticket.ticket_number, %status, "ticket answered");

    state.events.publish(DomainEvent::TicketAnswered { ticket_id, status }).await;
    state.mailer.send(templates::ticket_response(&brand, &ticket, response), &ticket.email).await;
    Ok(ticket)
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

pub async fn update(db: &PgPool, ticket_id: Uuid, input: UpdateTicketRequest) -> AppResult<SupportTicket> {
    if input.status.is_none() && input.priority.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }
    sqlx::query_as::<_, SupportTicket>(&format!(
        "UPDATE support_tickets SET status = COALESCE($2, status), priority = COALESCE($3, priority), updated_at = NOW() \
         WHERE id = $1 RETURNING {TICKET_COLUMNS}"
    ))
    .bind(ticket_id).bind(input.status.map(|s| s.as_str())).bind(input.priority.map(|p| p.as_str()))
    .fetch_optional(db).await?
    .ok_or(AppError::NotFound("Ticket"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request(name: Option<&str>, email: Option<&str>) -> CreateTicketRequest {
        CreateTicketRequest {
            name: name.map(Into::into), email: email.map(Into::into),
            subject: "Pedido incompleto".into(), message: "Me faltó una caja de cocadas.".into(),
            category: TicketCategory::Order, priority: TicketPriority::High,
        }
    }

    #[test]
    fn test_guest_needs_name_and_email() {
        assert!(matches!(requester(None, Some("Ana"), None), Err(AppError::BadRequest(_))));
        let (user_id, name, email) = requester(None, Some(" Ana "), Some("ANA@example.com")).unwrap();
        assert_eq!((user_id, name.as_str(), email.as_str()), (None, "Ana", "ana@example.com"));
    }

    #[test]
    fn test_user_defaults_to_profile() {
        let now = Utc::now();
        let u = User {
            id: Uuid::new_v4(), email: "luis@example.com".into(), password_hash: String::new(), full_name: "Luis".into(),
            phone: None, role: "customer".into(), is_active: true, created_at: now, updated_at: now,
        };
        let (user_id, name, email) = requester(Some(&u), None, None).unwrap();
        assert_eq!(user_id, Some(u.id));
        assert_eq!(name, "Luis");
        assert_eq!(email.as_str(), "luis@example.com");
    }

    #[test]
    fn test_request_validation() {
        assert!(request(None, None).validate().is_ok());
        let short = CreateTicketRequest { message: "hola".into(), ..request(None, None) };
        assert!(short.validate().is_err());
        let defaults: CreateTicketRequest = serde_json::from_str(
            r#"{"subject":"Duda","message":"¿Hacen envíos a Puebla?","name":"Eva","email":"eva@example.com"}"#,
        ).unwrap();
        assert_eq!((defaults.category, defaults.priority), (TicketCategory::Other, TicketPriority::Medium));
    }
}
