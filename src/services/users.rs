use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{generate_session_token, hash_password, session_expiry, verify_password};
use crate::domain::aggregates::user::{ensure_not_self_lockout, validate_password};
use crate::domain::aggregates::Role;
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Email;
use crate::error::{AppError, AppResult};
use crate::mail::templates;
use crate::models::{User, UserProfile};
use crate::pagination::{Page, PageParams, PaginatedResponse};
use crate::services::site_config;
use crate::state::AppState;

const USER_COLUMNS: &str = "id, email, password_hash, full_name, phone, role, is_active, created_at, updated_at";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
    pub user: UserProfile,
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> AppResult<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id).fetch_optional(db).await?
        .ok_or(AppError::NotFound("User"))
}

/// Resolves a bearer token to an active user.
pub async fn find_by_session(db: &PgPool, token: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT u.id, u.email, u.password_hash, u.full_name, u.phone, u.role, u.is_active, u.created_at, u.updated_at \
         FROM sessions s JOIN users u ON u.id = s.user_id WHERE s.token = $1 AND s.expires_at > NOW() AND u.is_active",
    )
    .bind(token)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

async fn open_session<'e, E>(executor: E, user_id: Uuid, ttl: Duration) -> AppResult<(String, chrono::DateTime<Utc>)>
where
    E: sqlx::PgExecutor<'e>,
{
    let token = generate_session_token();
    let expires_at = session_expiry(Utc::now(), ttl);
    sqlx::query("INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES ($1, $2, $3, NOW())")
        .bind(&token).bind(user_id).bind(expires_at)
        .execute(executor).await?;
    Ok((token, expires_at))
}

#[tracing::instrument(skip(state, input), fields(email = %input.email))]
pub async fn register(state: &AppState, input: RegisterRequest) -> AppResult<AuthResponse> {
    input.validate()?;
    validate_password(&input.password)?;
    let email = Email::new(&input.email)?;
    let password_hash = hash_password(&input.password)?;

    let mut tx = state.db.begin().await?;
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, email, password_hash, full_name, phone, role, is_active, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, 'customer', TRUE, NOW(), NOW()) RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::now_v7()).bind(email.as_str()).bind(&password_hash).bind(input.full_name.trim()).bind(&input.phone)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("Email is already registered".to_string()),
        other => other,
    })?;

    let (token, expires_at) = open_session(&mut *tx, user.id, state.config.session_ttl).await?;
    let brand = site_config::brand(&mut *tx).await?;
    tx.commit().await?;
    info!(user_id = %user.id, "user registered");

    state.events.publish(DomainEvent::UserRegistered { user_id: user.id }).await;
    state.mailer.send(templates::welcome(&brand, &user.full_name), &user.email).await;

    Ok(AuthResponse { token, expires_at, user: user.into() })
}

#[tracing::instrument(skip(state, input), fields(email = %input.email))]
pub async fn login(state: &AppState, input: LoginRequest) -> AppResult<AuthResponse> {
    input.validate()?;
    let email = input.email.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(&email).fetch_optional(&state.db).await?
        .ok_or(AppError::InvalidCredentials)?;

    if !user.is_active || !verify_password(&input.password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }

    let (token, expires_at) = open_session(&state.db, user.id, state.config.session_ttl).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(AuthResponse { token, expires_at, user: user.into() })
}

pub async fn logout(db: &PgPool, token: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM sessions WHERE token = $1").bind(token).execute(db).await?;
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

pub async fn update_profile(db: &PgPool, user_id: Uuid, input: UpdateProfile) -> AppResult<UserProfile> {
    input.validate()?;
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET full_name = COALESCE($2, full_name), phone = COALESCE($3, phone), updated_at = NOW() \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id).bind(input.full_name.as_deref().map(str::trim)).bind(&input.phone)
    .fetch_optional(db).await?
    .ok_or(AppError::NotFound("User"))?;
    Ok(user.into())
}

#[derive(Debug, Deserialize)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

/// Changes the password and revokes every other session of the user.
pub async fn change_password(db: &PgPool, user: &User, current_token: &str, input: ChangePassword) -> AppResult<()> {
    if !verify_password(&input.current_password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }
    validate_password(&input.new_password)?;
    let hash = hash_password(&input.new_password)?;

    let mut tx = db.begin().await?;
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(user.id).bind(&hash).execute(&mut *tx).await?;
    let revoked = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND token <> $2")
        .bind(user.id).bind(current_token).execute(&mut *tx).await?;
    tx.commit().await?;
    info!(user_id = %user.id, revoked = revoked.rows_affected(), "password changed");
    Ok(())
}

// =============================================================================
// Admin
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

pub async fn list(db: &PgPool, filter: UserFilter) -> AppResult<PaginatedResponse<UserProfile>> {
    let page = Page::from(PageParams { page: filter.page, per_page: filter.per_page });
    let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    const WHERE: &str = "($1::text IS NULL OR email ILIKE '%' || $1 || '%' OR full_name ILIKE '%' || $1 || '%')";
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {WHERE} ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(search).bind(page.limit()).bind(page.offset())
    .fetch_all(db).await?;
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {WHERE}"))
        .bind(search).fetch_one(db).await?;
    Ok(PaginatedResponse::new(users.into_iter().map(UserProfile::from).collect(), total, page))
}

#[tracing::instrument(skip(db))]
pub async fn set_role(db: &PgPool, actor: Uuid, target: Uuid, role: Role) -> AppResult<UserProfile> {
    ensure_not_self_lockout(actor, target, Some(role), None)?;
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(target).bind(role.as_str())
    .fetch_optional(db).await?
    .ok_or(AppError::NotFound("User"))?;
    info!("role changed");
    Ok(user.into())
}

/// Deactivating a user also ends all of their sessions.
#[tracing::instrument(skip(db))]
pub async fn set_active(db: &PgPool, actor: Uuid, target: Uuid, active: bool) -> AppResult<UserProfile> {
    ensure_not_self_lockout(actor, target, None, Some(active))?;
    let mut tx = db.begin().await?;
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(target).bind(active)
    .fetch_optional(&mut *tx).await?
    .ok_or(AppError::NotFound("User"))?;
    if !active {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1").bind(target).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!("active flag changed");
    Ok(user.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_register_validation() {
        let ok = RegisterRequest { email: "ana@example.com".into(), password: "dulce2024".into(), full_name: "Ana".into(), phone: None };
        assert!(ok.validate().is_ok());
        let bad = RegisterRequest { email: "not-an-email".into(), ..ok };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_login_requires_fields() {
        let bad = LoginRequest { email: "".into(), password: "".into() };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("password"));
    }

    #[tokio::test]
    async fn test_register_is_all_or_nothing() {
        let Some(t) = test_support::database().await else { return };
        let email = format!("sin-config-{}@example.com", Uuid::now_v7().simple());
        let input = RegisterRequest { email: email.clone(), password: "dulce2024".into(), full_name: "Ana".into(), phone: None };
        let config = t.take_config().await;
        let result = register(&t.state, input).await;
        t.restore_config(config).await;
        assert!(result.is_err());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1").bind(&email).fetch_one(&t.state.db).await.unwrap();
        assert_eq!(count, 0);
    }
}
