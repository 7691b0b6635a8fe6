//! HTTP routes and handlers
//!
//! | Method | Path                   | Action                        |
//! |--------|------------------------|-------------------------------|
//! | GET    | `/api/v1/code/{udid}`  | issue a verification code     |
//! | POST   | `/api/v1/erase/{udid}` | verified EraseDevice          |
//! | POST   | `/api/v1/swupd/{udid}` | verified managed OS update    |
//!
//! Every other path answers a bare 403 without touching the auth gate.

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cmdod_core::{RequestError, Udid};
use cmdod_jamf::{SoftwareUpdateConfig, SoftwareUpdateRequest};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::debug;

use crate::error::{ApiError, ServiceResponse};
use crate::middleware::{enforce_deadline, require_bearer};
use crate::state::AppState;
use crate::verify::Action;

/// Outer bound on a whole request, including body transfer
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    create_router_with_timeout(state, REQUEST_TIMEOUT)
}

/// Create the router with a custom whole-request timeout
pub fn create_router_with_timeout(state: Arc<AppState>, timeout: Duration) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        // Code issuance
        .route("/api/v1/code/:udid", get(code_handler))
        .route("/api/v1/code/", get(code_handler))
        // Verified commands
        .route("/api/v1/erase/:udid", post(erase_handler))
        .route("/api/v1/erase/", post(erase_handler))
        .route("/api/v1/swupd/:udid", post(software_update_handler))
        .route("/api/v1/swupd/", post(software_update_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ))
        .fallback(forbidden_handler)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }))
                .layer(middleware::from_fn_with_state(timeout, enforce_deadline)),
        )
        .with_state(state)
}

/// Unknown paths get no hint about what exists
async fn forbidden_handler() -> StatusCode {
    StatusCode::FORBIDDEN
}

fn parse_udid(udid: Option<Path<String>>) -> Result<Udid, ApiError> {
    Ok(Udid::from_path(udid.as_ref().map(|p| p.as_str()))?)
}

#[derive(Debug, Serialize)]
struct CodeResponse<'a> {
    code: &'a str,
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| {
            accept
                .split(',')
                .any(|media| media.trim().starts_with("application/json"))
        })
}

/// Issue a code for a device
///
/// Plain text by default, `{"code": "..."}` when the client accepts JSON.
async fn code_handler(
    State(state): State<Arc<AppState>>,
    udid: Option<Path<String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let udid = parse_udid(udid)?;
    let code = state.codes().issue(&udid).await?;

    if wants_json(&headers) {
        Ok(Json(CodeResponse { code: code.value() }).into_response())
    } else {
        Ok(code.value().to_string().into_response())
    }
}

/// Wipe a device once its code checks out
async fn erase_handler(
    State(state): State<Arc<AppState>>,
    udid: Option<Path<String>>,
) -> Result<ServiceResponse, ApiError> {
    let udid = parse_udid(udid)?;
    state.verifier.execute(&udid, Action::Erase).await?;

    Ok(ServiceResponse::success(
        StatusCode::CREATED,
        "EraseDevice command sent. Prepare thyself!",
    ))
}

/// Push a managed OS update once the device's code checks out
///
/// An empty body means the force-install-latest preset. The body is
/// validated before the code is looked at, so a bad body costs no code.
async fn software_update_handler(
    State(state): State<Arc<AppState>>,
    udid: Option<Path<String>>,
    body: Bytes,
) -> Result<ServiceResponse, ApiError> {
    let udid = parse_udid(udid)?;
    let config = update_config(&body)?;
    debug!(udid = %udid, ?config, "Software update requested");

    state
        .verifier
        .execute(&udid, Action::SoftwareUpdate(config))
        .await?;

    Ok(ServiceResponse::success(
        StatusCode::CREATED,
        "Software Update command sent",
    ))
}

fn update_config(body: &[u8]) -> Result<SoftwareUpdateConfig, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SoftwareUpdateConfig::force_install_latest());
    }

    let request: SoftwareUpdateRequest = serde_json::from_slice(body)
        .map_err(|e| RequestError::InvalidBody(format!("invalid update config: {e}")))?;
    Ok(request.validate()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdod_jamf::{CommandError, UpdateAction};

    #[test]
    fn test_empty_body_is_preset() {
        assert_eq!(
            update_config(b"").unwrap(),
            SoftwareUpdateConfig::force_install_latest()
        );
        assert_eq!(
            update_config(b" \n").unwrap(),
            SoftwareUpdateConfig::force_install_latest()
        );
    }

    #[test]
    fn test_body_overrides() {
        let config = update_config(br#"{"updateAction":"DOWNLOAD_ONLY"}"#).unwrap();
        assert_eq!(config.update_action(), UpdateAction::DownloadOnly);
    }

    #[test]
    fn test_bad_bodies() {
        assert!(matches!(
            update_config(b"{not json"),
            Err(ApiError::Request(RequestError::InvalidBody(_)))
        ));
        assert!(matches!(
            update_config(br#"{"targetVersion":"14.04"}"#),
            Err(ApiError::Command(CommandError::NotSemver))
        ));
    }

    #[test]
    fn test_accept_negotiation() {
        let mut headers = HeaderMap::new();
        assert!(!wants_json(&headers));

        headers.insert(header::ACCEPT, "text/plain".parse().unwrap());
        assert!(!wants_json(&headers));

        headers.insert(
            header::ACCEPT,
            "text/html, application/json;q=0.9".parse().unwrap(),
        );
        assert!(wants_json(&headers));
    }
}
