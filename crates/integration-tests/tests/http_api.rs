//! Integration tests for the HTTP surface.
//!
//! Requests go through the full router, including the request-id
//! middleware, against an in-process remote store.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use tower::ServiceExt;
use zynvo_integration_tests::{TestHarness, day, entry};
use zynvo_site::middleware::REQUEST_ID_HEADER;
use zynvo_site::services::waitlist::{Failure, Operation};

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn signup_request(email: &str) -> Request<Body> {
    Request::post("/api/waitlist")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "email": email }).to_string()))
        .unwrap()
}

// =============================================================================
// Signup
// =============================================================================

#[tokio::test]
async fn test_offline_signup_returns_accepted_with_advisory() {
    let harness = TestHarness::new();
    harness.go_offline();

    let response = harness
        .router()
        .oneshot(signup_request("offline@example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["outcome"]["kind"], "queued");
    assert_eq!(body["outcome"]["reason"], "offline");

    let snapshot = harness
        .router()
        .oneshot(Request::get("/api/waitlist").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(snapshot).await;
    assert_eq!(body["queued"], 1);
}

#[tokio::test]
async fn test_failed_signup_returns_service_unavailable() {
    let harness = TestHarness::new();
    harness.remote.fail(Operation::AddEntry, Failure::Network);

    let response = harness
        .router()
        .oneshot(signup_request("flaky@example.com"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["outcome"]["kind"], "transient_failure");
}

#[tokio::test]
async fn test_sync_endpoint_reports_pass() {
    let harness = TestHarness::new();
    harness.go_offline();
    harness
        .state
        .repository()
        .add_to_waitlist("later@example.com")
        .await;
    harness.go_online();

    let response = harness
        .router()
        .oneshot(
            Request::post("/api/waitlist/sync")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["synced"], 1);
    assert_eq!(harness.remote.entries().len(), 1);
}

// =============================================================================
// Admin
// =============================================================================

#[tokio::test]
async fn test_admin_dashboard_aggregates() {
    let harness = TestHarness::new();
    harness.remote.insert(entry("old@example.com", day(2024, 2, 1)));
    harness.remote.insert(entry("new@example.com", Utc::now()));

    let response = harness
        .router()
        .oneshot(Request::get("/admin/waitlist").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["email"], "new@example.com");
    assert_eq!(body["todayCount"], 1);
    assert_eq!(body["pendingCount"], 2);
}

#[tokio::test]
async fn test_admin_export_csv_rows() {
    let harness = TestHarness::new();
    harness
        .remote
        .insert(entry("export@example.com", day(2024, 3, 9)));

    let response = harness
        .router()
        .oneshot(
            Request::get("/admin/waitlist/export.csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Email,Date,Status,Source");
    assert_eq!(lines[1], "export@example.com,3/9/2024,pending,website");
}

// =============================================================================
// Middleware
// =============================================================================

#[tokio::test]
async fn test_request_id_is_echoed() {
    let harness = TestHarness::new();

    let response = harness
        .router()
        .oneshot(
            Request::get("/health")
                .header(REQUEST_ID_HEADER, "edge-abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "edge-abc-123");
}
