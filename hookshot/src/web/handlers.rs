//! Endpoint handlers.
//!
//! Includes the default collaborators the router falls back to when a delivery
//! has no route or fails signature verification, plus the handlers the
//! `hookshot` binary registers for incoming events.

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::web::{HEADER_DELIVERY, HEADER_EVENT, HEADER_SIGNATURE};

/// Body of the default 403 response.
pub const UNAUTHORIZED_MESSAGE: &str =
    "The provided signature in the X-Hub-Signature header does not match.";

/// Body of the default 404 response.
pub const NOT_FOUND_MESSAGE: &str = "404 page not found";

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Default Collaborators
// =============================================================================

/// Default handler for deliveries whose event has no registered route.
pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
}

/// Default handler for deliveries that fail signature verification.
pub async fn unauthorized() -> (StatusCode, &'static str) {
    (StatusCode::FORBIDDEN, UNAUTHORIZED_MESSAGE)
}

// =============================================================================
// Event Handlers
// =============================================================================

/// Answers GitHub's `ping` event, sent when a webhook is first configured.
pub async fn ping() -> &'static str {
    "Pong"
}

/// Receipt returned for accepted deliveries.
#[derive(Debug, Serialize)]
pub struct EventReceipt {
    pub status: &'static str,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<String>,
    pub bytes: usize,
}

/// Accept an authenticated delivery and log it.
///
/// Business logic for specific events lives outside this crate; this handler
/// only acknowledges receipt.
pub async fn accept_event(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let event = header_str(&headers, HEADER_EVENT).unwrap_or_default().to_string();
    let delivery = header_str(&headers, HEADER_DELIVERY).map(str::to_string);

    info!(
        event = %event,
        delivery = ?delivery,
        signed = headers.contains_key(HEADER_SIGNATURE),
        body_length = body.len(),
        "webhook_event_accepted"
    );

    (
        StatusCode::ACCEPTED,
        Json(EventReceipt {
            status: "accepted",
            event,
            delivery,
            bytes: body.len(),
        }),
    )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
