//! Uniform response envelope and the server's error type

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cmdod_auth::{BearerError, CodeError};
use cmdod_core::{Classify, ErrorOrigin, RequestError};
use cmdod_jamf::{CommandError, JamfError};
use serde::Serialize;
use std::error::Error as _;
use thiserror::Error;
use tracing::{debug, warn};

/// Body of every non-code response
#[derive(Debug, Clone, Serialize)]
pub struct ServiceResponse {
    pub status: u16,
    pub message: String,
    pub error: bool,
    #[serde(rename = "errorOrigin", skip_serializing_if = "Option::is_none")]
    pub error_origin: Option<ErrorOrigin>,
}

impl ServiceResponse {
    pub fn success(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            error: false,
            error_origin: None,
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>, origin: ErrorOrigin) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            error: true,
            error_origin: Some(origin),
        }
    }
}

impl IntoResponse for ServiceResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Anything a handler can fail with
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Bearer(#[from] BearerError),

    #[error(transparent)]
    Code(#[from] CodeError),

    #[error(transparent)]
    Jamf(#[from] JamfError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("request timed out")]
    Timeout,
}

impl Classify for ApiError {
    fn status(&self) -> u16 {
        match self {
            ApiError::Request(e) => e.status(),
            ApiError::Bearer(e) => e.status(),
            ApiError::Code(e) => e.status(),
            ApiError::Jamf(e) => e.status(),
            ApiError::Command(e) => e.status(),
            ApiError::Timeout => 500,
        }
    }

    fn origin(&self) -> ErrorOrigin {
        match self {
            ApiError::Request(e) => e.origin(),
            ApiError::Bearer(e) => e.origin(),
            ApiError::Code(e) => e.origin(),
            ApiError::Jamf(e) => e.origin(),
            ApiError::Command(e) => e.origin(),
            ApiError::Timeout => ErrorOrigin::Service,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Request(e) => e.public_message(),
            ApiError::Bearer(e) => e.public_message(),
            ApiError::Code(e) => e.public_message(),
            ApiError::Jamf(e) => e.public_message(),
            ApiError::Command(e) => e.public_message(),
            ApiError::Timeout => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let origin = self.origin();

        warn!(status = status.as_u16(), origin = %origin, "Request failed: {}", self);
        if let Some(cause) = self.source() {
            debug!(origin = %origin, "Underlying cause: {}", cause);
        }

        ServiceResponse::failure(status, self.public_message(), origin).into_response()
    }
}
