//! Jamf client and command error types

use cmdod_core::{Classify, ErrorOrigin};
use thiserror::Error;

/// Errors talking to the Jamf API
#[derive(Debug, Error)]
pub enum JamfError {
    #[error("not authorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("bad request")]
    BadRequest,

    #[error("not found")]
    NotFound,

    #[error("unhandled Jamf error ({status}): {message}")]
    Unhandled { status: u16, message: String },

    #[error("HTTP error {status} when getting Jamf API token")]
    TokenRefused { status: u16 },

    #[error("failed to send request")]
    Transport(#[source] reqwest::Error),

    #[error("failed to decode response body")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to create request")]
    Encode(#[source] serde_json::Error),
}

pub type JamfResult<T> = Result<T, JamfError>;

impl Classify for JamfError {
    fn status(&self) -> u16 {
        match self {
            JamfError::Unauthorized => 401,
            JamfError::Forbidden => 403,
            JamfError::BadRequest => 400,
            JamfError::NotFound => 404,
            JamfError::Unhandled { status, .. } if (400..=599).contains(status) => *status,
            JamfError::Unhandled { .. } => 502,
            JamfError::TokenRefused { .. } => 502,
            JamfError::Transport(_) | JamfError::Decode(_) | JamfError::Encode(_) => 500,
        }
    }

    fn origin(&self) -> ErrorOrigin {
        match self {
            JamfError::Transport(_) | JamfError::Decode(_) | JamfError::Encode(_) => {
                ErrorOrigin::Service
            }
            _ => ErrorOrigin::Backend,
        }
    }

    fn public_message(&self) -> String {
        match self {
            JamfError::Unhandled { message, .. } => message.clone(),
            JamfError::TokenRefused { .. } => "failed to acquire Jamf API token".to_string(),
            other => other.to_string(),
        }
    }
}

/// Errors building a device command
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("updateAction value not recognised")]
    BadUpdateAction,

    #[error("updatePriority value not recognised")]
    BadPriority,

    #[error("maxDeferrals cannot be negative")]
    NegativeDeferrals,

    #[error("maxDeferrals out of range")]
    DeferralsOutOfRange,

    #[error("not a valid macOS version format")]
    BadVersionFormat,

    #[error("version does not conform to semver")]
    NotSemver,

    #[error("passcode must be exactly six digits")]
    BadPasscode,

    #[error("device record carries no usable id")]
    MissingDeviceIdentity,
}

impl Classify for CommandError {
    fn status(&self) -> u16 {
        match self {
            CommandError::MissingDeviceIdentity => 502,
            _ => 400,
        }
    }

    fn origin(&self) -> ErrorOrigin {
        match self {
            CommandError::MissingDeviceIdentity => ErrorOrigin::Backend,
            _ => ErrorOrigin::Request,
        }
    }
}
