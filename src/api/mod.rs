//! HTTP surface. Everything except `/health` lives under `/api/v1`.

pub mod account;
pub mod admin;
pub mod extract;
pub mod store;

use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::state::AppState;

async fn health(State(s): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "dulces-caseros",
        "events": if s.events.is_connected() { "nats" } else { "log" },
    }))
}

fn cors(config: &Config) -> CorsLayer {
    let Some(origin) = config.cors_origin.as_deref() else { return CorsLayer::permissive() };
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, AUTHORIZATION]),
        Err(e) => {
            warn!(%origin, error = %e, "invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
        }
    }
}

fn storefront() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(account::register))
        .route("/auth/login", post(account::login))
        .route("/auth/logout", post(account::logout))
        .route("/auth/me", get(account::me).put(account::update_me))
        .route("/auth/password", put(account::change_password))
        .route("/categories", get(store::list_categories))
        .route("/products", get(store::list_products))
        .route("/products/:id", get(store::get_product))
        .route("/products/:id/reviews", get(store::product_reviews).post(store::create_review))
        .route("/reviews/:id", put(store::update_review).delete(store::delete_review))
        .route("/cart", get(store::get_cart).delete(store::clear_cart))
        .route("/cart/items", post(store::add_to_cart))
        .route("/cart/items/:product_id", put(store::set_cart_quantity).delete(store::remove_from_cart))
        .route("/orders", get(store::list_orders).post(store::create_order))
        .route("/orders/track/:order_number", get(store::track_order))
        .route("/orders/:id", get(store::get_order))
        .route("/orders/:id/cancel", post(store::cancel_order))
        .route("/favorites", get(store::list_favorites))
        .route("/favorites/:product_id", get(store::check_favorite).post(store::add_favorite).delete(store::remove_favorite))
        .route("/tickets", get(store::list_tickets).post(store::create_ticket))
        .route("/tickets/:id", get(store::get_ticket))
        .route("/contact", post(store::submit_contact))
        .route("/site-config", get(store::get_site_config))
}

fn back_office() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/users", get(admin::list_users))
        .route("/users/:id/role", put(admin::set_user_role))
        .route("/users/:id/active", put(admin::set_user_active))
        .route("/categories", get(admin::list_categories).post(admin::create_category))
        .route("/categories/:id", put(admin::update_category).delete(admin::delete_category))
        .route("/products", get(admin::list_products).post(admin::create_product))
        .route("/products/:id", get(admin::get_product).put(admin::update_product).delete(admin::delete_product))
        .route("/products/:id/stock", put(admin::adjust_stock))
        .route("/orders", get(admin::list_orders))
        .route("/orders/:id", get(admin::get_order))
        .route("/orders/:id/status", put(admin::update_order_status))
        .route("/orders/:id/payment", put(admin::update_order_payment))
        .route("/reviews", get(admin::list_reviews))
        .route("/reviews/:id", axum::routing::delete(admin::delete_review))
        .route("/reviews/:id/approval", put(admin::set_review_approval))
        .route("/tickets", get(admin::list_tickets))
        .route("/tickets/:id", put(admin::update_ticket))
        .route("/tickets/:id/response", post(admin::respond_ticket))
        .route("/contact", get(admin::list_contact))
        .route("/contact/:id", axum::routing::delete(admin::delete_contact))
        .route("/contact/:id/read", put(admin::mark_contact_read))
        .route("/notifications", get(admin::list_notifications))
        .route("/notifications/unread-count", get(admin::unread_notifications))
        .route("/notifications/read-all", put(admin::mark_all_notifications_read))
        .route("/notifications/:id", axum::routing::delete(admin::delete_notification))
        .route("/notifications/:id/read", put(admin::mark_notification_read))
        .route("/site-config", put(admin::update_site_config))
}

pub fn router(state: AppState) -> Router {
    let cors = cors(&state.config);
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", storefront().nest("/admin", back_office()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::events::EventBus;
    use crate::test_support;

    // The pool never connects: these requests are all answered before any query runs.
    fn app() -> Router {
        let config = Config::from_lookup(|key| (key == "DATABASE_URL").then(|| "postgres://localhost/dulces_test".to_string())).unwrap();
        let db = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
        router(AppState::new(db, config, EventBus::disabled()))
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        send_to(app(), request).await
    }

    async fn send_to(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    fn json(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["events"], "log");
    }

    #[tokio::test]
    async fn test_protected_routes_require_a_session() {
        for uri in ["/api/v1/cart", "/api/v1/orders", "/api/v1/auth/me", "/api/v1/admin/dashboard", "/api/v1/admin/notifications"] {
            let (status, body) = send(Request::get(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "Authentication required");
        }
    }

    #[tokio::test]
    async fn test_malformed_authorization_header() {
        let request = Request::get("/api/v1/favorites").header(AUTHORIZATION, "Basic abc").body(Body::empty()).unwrap();
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_guest_checkout_requires_contact_details() {
        let body = serde_json::json!({ "items": [{ "product_id": uuid::Uuid::nil(), "quantity": 1 }] });
        let (status, body) = send(json("POST", "/api/v1/orders", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Customer name is required");
    }

    #[tokio::test]
    async fn test_contact_validation() {
        let body = serde_json::json!({ "name": "Ana", "email": "no-es-correo", "subject": "Hola", "message": "Quiero cotizar" });
        let (status, body) = send(json("POST", "/api/v1/contact", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Validation failed"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = send(Request::get("/api/v1/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    fn guest_checkout() -> serde_json::Value {
        serde_json::json!({
            "items": [{ "product_id": uuid::Uuid::nil(), "quantity": 1 }],
            "customer_name": "Ana", "customer_email": "ana@example.com",
        })
    }

    fn with_bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
        request.headers_mut().insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        request
    }

    #[tokio::test]
    async fn test_checkout_with_unknown_token_is_rejected() {
        let Some(t) = test_support::database().await else { return };
        let request = with_bearer(json("POST", "/api/v1/orders", guest_checkout()), "bogus-token");
        let (status, body) = send_to(router(t.state.clone()), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");
    }

    #[tokio::test]
    async fn test_checkout_without_token_is_a_guest() {
        let Some(t) = test_support::database().await else { return };
        let (status, body) = send_to(router(t.state.clone()), json("POST", "/api/v1/orders", guest_checkout())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Product not found");
    }

    #[tokio::test]
    async fn test_checkout_during_maintenance() {
        let Some(t) = test_support::database().await else { return };
        t.set_maintenance(true).await;
        let (status, _) = send_to(router(t.state.clone()), json("POST", "/api/v1/orders", guest_checkout())).await;
        t.set_maintenance(false).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_customer_cannot_reach_admin_routes() {
        let Some(t) = test_support::database().await else { return };
        let token = t.customer().await;
        for uri in ["/api/v1/admin/dashboard", "/api/v1/admin/notifications"] {
            let request = with_bearer(Request::get(uri).body(Body::empty()).unwrap(), &token);
            let (status, _) = send_to(router(t.state.clone()), request).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        }
        let request = with_bearer(Request::get("/api/v1/auth/me").body(Body::empty()).unwrap(), &token);
        let (status, body) = send_to(router(t.state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "customer");
    }
}
