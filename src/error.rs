use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::domain::DomainError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Maintenance(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record"),
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict("Record already exists".to_string()),
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::Conflict("Record is referenced by other data".to_string()),
            _ => AppError::Database(err),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Maintenance(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Domain(e) => match e {
                DomainError::InsufficientStock { .. } | DomainError::TicketClosed => StatusCode::CONFLICT,
                DomainError::SelfLockout => StatusCode::FORBIDDEN,
                _ => StatusCode::BAD_REQUEST,
            },
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("Order").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Maintenance("closed".into()).status(), StatusCode::SERVICE_UNAVAILABLE);
        let stock = DomainError::InsufficientStock { product: "Cocada".into(), requested: 2, available: 1 };
        assert_eq!(AppError::from(stock).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(DomainError::InvalidRating).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::from(DomainError::QuantityTooLarge).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_messages() {
        assert_eq!(AppError::NotFound("Product").to_string(), "Product not found");
        assert_eq!(AppError::from(DomainError::NoItems).to_string(), "Order has no items");
    }

    #[tokio::test]
    async fn test_internal_errors_are_masked() {
        let response = AppError::Internal("pool exhausted".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }
}
