//! Bearer token gate and whole-request deadline

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Reject requests without the configured `Authorization: Bearer` token
///
/// Installed as a route layer, so unmatched paths never reach it.
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match state.bearer.verify_header(header) {
        Ok(()) => {
            debug!(uri = %request.uri(), "Token authentication successful");
            next.run(request).await
        }
        Err(e) => {
            warn!(uri = %request.uri(), "Bearer authentication rejected: {}", e);
            ApiError::from(e).into_response()
        }
    }
}

/// Bound the whole request, body transfer included, by `deadline`
///
/// An overrun answers with the same envelope as every other failure.
pub async fn enforce_deadline(
    State(deadline): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let uri = request.uri().clone();
    match tokio::time::timeout(deadline, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%uri, ?deadline, "Request exceeded its deadline");
            ApiError::Timeout.into_response()
        }
    }
}
