//! Jamf API session token lifecycle
//!
//! ```text
//! Unset ──acquire──▶ Valid ──time──▶ NearExpiry ──keep-alive──▶ Valid
//!                      ▲                  │
//!                      └──acquire── Expired ◀──time──┘
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Refresh with keep-alive once fewer than this many seconds remain
pub const NEAR_EXPIRY_SECONDS: i64 = 120;

/// A bearer token issued by `/api/v1/auth/token` or `/api/v1/auth/keep-alive`
#[derive(Clone, Deserialize)]
pub struct Token {
    #[serde(rename = "token")]
    value: String,
    expires: DateTime<Utc>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("expires", &self.expires)
            .finish()
    }
}

impl Token {
    pub fn new(value: impl Into<String>, expires: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    /// Whole seconds until expiry at `now`, never negative
    pub fn seconds_until(&self, now: DateTime<Utc>) -> i64 {
        (self.expires - now).num_seconds().max(0)
    }
}

/// Where a (possibly absent) token sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No token has been acquired yet
    Unset,
    /// Usable without refreshing
    Valid,
    /// Usable, but should be extended through keep-alive
    NearExpiry,
    /// Must be re-acquired with basic auth
    Expired,
}

impl TokenState {
    pub fn of(token: Option<&Token>, now: DateTime<Utc>) -> Self {
        let Some(token) = token else {
            return TokenState::Unset;
        };

        match token.seconds_until(now) {
            0 => TokenState::Expired,
            s if s < NEAR_EXPIRY_SECONDS => TokenState::NearExpiry,
            _ => TokenState::Valid,
        }
    }

    /// True when no usable token exists
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenState::Unset | TokenState::Expired)
    }

    /// True when the token has under two minutes left (or none at all)
    pub fn is_near_expiry(&self) -> bool {
        !matches!(self, TokenState::Valid)
    }
}
