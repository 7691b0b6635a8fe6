//! Device identifiers

use crate::error::RequestError;
use uuid::Uuid;

/// A validated device UDID
///
/// Rendered as upper-case hyphenated text, which is how Jamf reports UDIDs,
/// so the same device always maps to the same code store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Udid(Uuid);

impl Udid {
    /// Parse a UDID taken from a request path
    pub fn parse(raw: &str) -> Result<Self, RequestError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RequestError::IdentifierMissing);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| RequestError::IdentifierInvalid)
    }

    /// Parse an optional path segment
    pub fn from_path(raw: Option<&str>) -> Result<Self, RequestError> {
        raw.ok_or(RequestError::IdentifierMissing).and_then(Self::parse)
    }
}

impl std::fmt::Display for Udid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buf = Uuid::encode_buffer();
        f.write_str(self.0.hyphenated().encode_upper(&mut buf))
    }
}

impl std::str::FromStr for Udid {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
