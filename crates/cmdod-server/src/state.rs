//! Shared application state

use crate::verify::Verifier;
use cmdod_auth::{BearerToken, CodeStore};
use std::sync::Arc;

/// State handed to every handler
pub struct AppState {
    /// Code verification and command dispatch
    pub verifier: Verifier,
    /// Token guarding the API
    pub bearer: BearerToken,
}

impl AppState {
    /// Create a new application state
    pub fn new(verifier: Verifier, bearer: BearerToken) -> Self {
        Self { verifier, bearer }
    }

    /// Store holding issued codes
    pub fn codes(&self) -> &Arc<CodeStore> {
        self.verifier.codes()
    }
}
