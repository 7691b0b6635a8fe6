//! Shared bearer token authentication
//!
//! Tokens are compared as SHA-256 digests with a constant-time equality
//! check, so neither the position of the first differing byte nor the
//! length of the presented token changes how long a rejection takes.

use cmdod_core::{Classify, ErrorOrigin};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Bearer authentication errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BearerError {
    #[error("malformed or missing token")]
    Malformed,
    #[error("invalid token")]
    Invalid,
}

impl Classify for BearerError {
    fn status(&self) -> u16 {
        match self {
            BearerError::Malformed => 400,
            BearerError::Invalid => 401,
        }
    }

    fn origin(&self) -> ErrorOrigin {
        ErrorOrigin::Request
    }
}

/// The configured service token, held only as a digest
#[derive(Clone)]
pub struct BearerToken {
    digest: [u8; 32],
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

impl BearerToken {
    pub fn new(token: &str) -> Self {
        Self {
            digest: digest(token),
        }
    }

    /// Constant-time check of a presented token
    pub fn matches(&self, presented: &str) -> bool {
        self.digest[..].ct_eq(&digest(presented)[..]).into()
    }

    /// Validate a raw `Authorization` header value
    pub fn verify_header(&self, header: Option<&str>) -> Result<(), BearerError> {
        let presented = extract_bearer(header)?;
        if self.matches(presented) {
            Ok(())
        } else {
            Err(BearerError::Invalid)
        }
    }
}

/// Pull the token out of a `Bearer <token>` header value
pub fn extract_bearer(header: Option<&str>) -> Result<&str, BearerError> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(BearerError::Malformed)
}

fn digest(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}
