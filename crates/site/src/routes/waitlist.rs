//! Public waitlist route handlers.
//!
//! Signups are accepted as JSON or as a urlencoded form, so the landing page
//! works with and without JavaScript.

use axum::{
    Form, Json,
    extract::{FromRequest, Request, State},
    http::{HeaderMap, StatusCode, header},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use zynvo_core::{SignupOutcome, SignupResult};

use crate::error::AppError;
use crate::services::waitlist::{Advisory, SyncReport, WaitlistState};
use crate::state::AppState;

/// Signup request body.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub email: String,
}

/// [`SignupForm`] decoded from JSON or a form, by `Content-Type`.
#[derive(Debug)]
pub struct SignupPayload(pub SignupForm);

impl<S: Send + Sync> FromRequest<S> for SignupPayload {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let form = if is_json {
            Json::<SignupForm>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?
                .0
        } else {
            Form::<SignupForm>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?
                .0
        };

        Ok(Self(form))
    }
}

/// What the landing page renders.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistSnapshot {
    #[serde(flatten)]
    pub state: WaitlistState,
    pub advisory: Option<Advisory>,
    pub advisory_message: Option<&'static str>,
    pub queued: usize,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Current count and connectivity.
pub async fn snapshot(State(state): State<AppState>) -> Json<WaitlistSnapshot> {
    let view_model = state.view_model();
    let advisory = view_model.advisory();

    Json(WaitlistSnapshot {
        state: view_model.snapshot(),
        advisory,
        advisory_message: advisory.map(Advisory::message),
        queued: state.repository().queue_len(),
        last_sync: state.repository().last_sync(),
    })
}

/// Join the waitlist.
///
/// Always answers with a [`SignupResult`]; the status code mirrors the
/// outcome.
#[instrument(skip(state, headers, payload), fields(email = %payload.0.email))]
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: SignupPayload,
) -> (StatusCode, Json<SignupResult>) {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let result = state
        .view_model()
        .add_email(&payload.0.email, user_agent)
        .await;

    let status = match result.outcome {
        SignupOutcome::Stored => StatusCode::CREATED,
        SignupOutcome::Queued(_) => StatusCode::ACCEPTED,
        SignupOutcome::InvalidEmail => StatusCode::UNPROCESSABLE_ENTITY,
        SignupOutcome::TransientFailure | SignupOutcome::AuthorizationFailure => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    (status, Json(result))
}

/// Push queued signups now.
#[instrument(skip(state))]
pub async fn sync(State(state): State<AppState>) -> Json<SyncReport> {
    Json(state.view_model().sync().await)
}
