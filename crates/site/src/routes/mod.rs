//! HTTP route handlers for the site.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Health check
//!
//! # Waitlist
//! GET  /api/waitlist               - Count, connectivity and advisory
//! POST /api/waitlist               - Sign up (JSON or form `email`)
//! POST /api/waitlist/sync          - Push queued signups
//!
//! # Admin
//! GET  /admin/waitlist             - Entries and aggregates
//! GET  /admin/waitlist/export.csv  - CSV download
//! ```

pub mod admin;
pub mod waitlist;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the waitlist API router.
pub fn waitlist_routes() -> Router<AppState> {
    Router::new()
        .route("/api/waitlist", get(waitlist::snapshot).post(waitlist::signup))
        .route("/api/waitlist/sync", post(waitlist::sync))
}

/// Create the admin router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/waitlist", get(admin::dashboard))
        .route("/admin/waitlist/export.csv", get(admin::export_csv))
}

/// The full application, without the Sentry layers the binary adds.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(waitlist_routes())
        .merge(admin_routes())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::config::SiteConfig;
    use crate::services::waitlist::{LocalStore, MemoryStore};

    fn app() -> (Arc<MemoryStore>, Router) {
        let config = SiteConfig::from_lookup(|key| {
            (key == "FIRESTORE_PROJECT_ID").then(|| "test".to_string())
        })
        .unwrap();
        let remote = Arc::new(MemoryStore::new());
        let state = AppState::new(config, remote.clone(), LocalStore::in_memory());
        (remote, router(state))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_, app) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_signup_json() {
        let (remote, app) = app();
        let response = app
            .oneshot(
                Request::post("/api/waitlist")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::USER_AGENT, "test-agent/1.0")
                    .body(Body::from(r#"{"email":"Fan@Example.com"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["outcome"]["kind"], "stored");

        let entries = remote.entries();
        assert_eq!(entries[0].email.as_str(), "fan@example.com");
        assert_eq!(entries[0].user_agent.as_deref(), Some("test-agent/1.0"));
    }

    #[tokio::test]
    async fn test_signup_form_invalid_email() {
        let (remote, app) = app();
        let response = app
            .oneshot(
                Request::post("/api/waitlist")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("email=not-an-email"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(remote.entries().is_empty());
    }

    #[tokio::test]
    async fn test_signup_malformed_body() {
        let (_, app) = app();
        let response = app
            .oneshot(
                Request::post("/api/waitlist")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let (_, app) = app();
        let response = app
            .oneshot(Request::get("/api/waitlist").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["count"], 12_847);
        assert_eq!(body["isOnline"], true);
        assert_eq!(body["queued"], 0);
        assert!(body["advisory"].is_null());
    }

    #[tokio::test]
    async fn test_export_csv_headers() {
        let (_, app) = app();
        let response = app
            .oneshot(
                Request::get("/admin/waitlist/export.csv")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap();
        assert!(disposition.starts_with("attachment; filename=\"zynvo-waitlist-"));
    }
}
