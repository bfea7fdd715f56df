//! Session extractors. A request authenticates with
//! `Authorization: Bearer <token>`, the token being a row in `sessions`.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use crate::auth::parse_bearer;
use crate::domain::aggregates::Role;
use crate::error::AppError;
use crate::models::User;
use crate::services::users;
use crate::state::AppState;

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_bearer)
        .map(str::to_string)
}

/// A signed-in, active user.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let user = users::find_by_session(&state.db, &token).await?.ok_or(AppError::Unauthorized)?;
        Ok(Self { user, token })
    }
}

pub struct AdminUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;
        Ok(Self(require_role(user, Role::Admin)?))
    }
}

fn require_role(user: User, required: Role) -> Result<User, AppError> {
    if !user.role()?.satisfies(required) {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

/// Guest-friendly routes: no header means a guest, but a token that names no
/// live session is still a 401.
pub struct MaybeUser(pub Option<User>);

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else { return Ok(Self(None)) };
        let user = users::find_by_session(&state.db, &token).await?.ok_or(AppError::Unauthorized)?;
        Ok(Self(Some(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: &str) -> User {
        User {
            id: Uuid::now_v7(), email: "ana@example.com".into(), password_hash: String::new(), full_name: "Ana".into(),
            phone: None, role: role.into(), is_active: true, created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_require_role() {
        assert!(require_role(user("admin"), Role::Admin).is_ok());
        assert!(require_role(user("admin"), Role::Customer).is_ok());
        assert!(require_role(user("customer"), Role::Customer).is_ok());
        assert!(matches!(require_role(user("customer"), Role::Admin), Err(AppError::Forbidden)));
        assert!(matches!(require_role(user("root"), Role::Admin), Err(AppError::Domain(_))));
    }
}
