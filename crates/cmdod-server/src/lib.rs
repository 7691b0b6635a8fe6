//! cmdod Server - Axum-based HTTP API
//!
//! This crate wires the code store, the bearer gate and the Jamf backend
//! into the public `/api/v1` routes.

pub mod error;
pub mod http;
pub mod middleware;
pub mod state;
pub mod verify;

pub use error::{ApiError, ServiceResponse};
pub use http::{create_router, create_router_with_timeout, REQUEST_TIMEOUT};
pub use state::AppState;
pub use verify::{Action, Verifier, VERIFY_DEADLINE};
