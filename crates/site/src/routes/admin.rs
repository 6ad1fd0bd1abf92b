//! Admin waitlist route handlers.

use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use tracing::instrument;

use crate::error::Result;
use crate::services::waitlist::AdminDashboard;
use crate::state::AppState;

/// Entries, count and aggregates.
#[instrument(skip(state))]
pub async fn dashboard(State(state): State<AppState>) -> Json<AdminDashboard> {
    Json(AdminDashboard::load(state.repository()).await)
}

/// Entries as a CSV download.
///
/// Requests are stateless, so the download loads its own snapshot: one list
/// call per export. Serializing a loaded [`AdminDashboard`] makes no further
/// remote calls.
#[instrument(skip(state))]
pub async fn export_csv(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let dashboard = AdminDashboard::load(state.repository()).await;
    let body = dashboard.to_csv()?;
    let disposition = format!("attachment; filename=\"{}\"", dashboard.export_filename());

    tracing::info!(rows = dashboard.entries.len(), "Exported waitlist");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
