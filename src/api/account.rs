//! Registration, sessions and the caller's own profile.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::extract::AuthUser;
use crate::error::AppResult;
use crate::models::UserProfile;
use crate::services::users::{self, AuthResponse, ChangePassword, LoginRequest, RegisterRequest, UpdateProfile};
use crate::state::AppState;

pub async fn register(State(s): State<AppState>, Json(r): Json<RegisterRequest>) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    Ok((StatusCode::CREATED, Json(users::register(&s, r).await?)))
}

pub async fn login(State(s): State<AppState>, Json(r): Json<LoginRequest>) -> AppResult<Json<AuthResponse>> {
    Ok(Json(users::login(&s, r).await?))
}

pub async fn logout(State(s): State<AppState>, auth: AuthUser) -> AppResult<StatusCode> {
    users::logout(&s.db, &auth.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(auth: AuthUser) -> Json<UserProfile> { Json(auth.user.into()) }

pub async fn update_me(State(s): State<AppState>, auth: AuthUser, Json(r): Json<UpdateProfile>) -> AppResult<Json<UserProfile>> {
    Ok(Json(users::update_profile(&s.db, auth.user.id, r).await?))
}

pub async fn change_password(State(s): State<AppState>, auth: AuthUser, Json(r): Json<ChangePassword>) -> AppResult<StatusCode> {
    users::change_password(&s.db, &auth.user, &auth.token, r).await?;
    Ok(StatusCode::NO_CONTENT)
}
