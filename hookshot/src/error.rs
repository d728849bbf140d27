//! Dispatch failure taxonomy.

use axum::http::StatusCode;
use thiserror::Error;

/// Reasons a webhook delivery is not handed to its route handler.
///
/// None of these are fatal: each one ends the current request with an
/// immediate response and nothing is retried.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No route is registered for the event in `X-GitHub-Event`.
    #[error("no route registered for event {event:?}")]
    RouteNotFound { event: String },

    /// The request body could not be buffered. Treated as unauthorized.
    #[error("failed to read request body: {0}")]
    BodyRead(#[from] axum::Error),

    /// The `X-Hub-Signature` header does not match the calculated signature.
    #[error("signature mismatch for event {event:?}")]
    SignatureMismatch { event: String },
}

impl DispatchError {
    /// Status code the default collaborators answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::BodyRead(_) | DispatchError::SignatureMismatch { .. } => {
                StatusCode::FORBIDDEN
            }
        }
    }
}
