//! Error classification shared by every cmdod crate
//!
//! Each crate keeps its own `thiserror` enum; implementing [`Classify`] is
//! what lets the server turn any of them into the uniform response envelope.

use serde::Serialize;
use thiserror::Error;

/// Where an error came from, as reported to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorOrigin {
    /// Problem with the inbound request (identifier, token, code)
    Request,
    /// Jamf rejected or failed the call
    Backend,
    /// Local failure inside this service
    Service,
}

impl ErrorOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorOrigin::Request => "request",
            ErrorOrigin::Backend => "backend",
            ErrorOrigin::Service => "service",
        }
    }
}

impl std::fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an error onto an HTTP status, an origin and a client-safe message
pub trait Classify: std::error::Error {
    /// HTTP status code to answer with
    fn status(&self) -> u16;

    /// Origin tag for the response envelope
    fn origin(&self) -> ErrorOrigin;

    /// Message safe to show to API clients
    fn public_message(&self) -> String {
        self.to_string()
    }
}

/// Malformed inbound request details
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("UDID not specified")]
    IdentifierMissing,
    #[error("UDID invalid")]
    IdentifierInvalid,
    #[error("{0}")]
    InvalidBody(String),
}

impl Classify for RequestError {
    fn status(&self) -> u16 {
        400
    }

    fn origin(&self) -> ErrorOrigin {
        ErrorOrigin::Request
    }
}
