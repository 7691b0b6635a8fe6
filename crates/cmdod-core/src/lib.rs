//! cmdod Core - Shared configuration, identifiers and error classification
//!
//! This crate provides the foundational types used across all cmdod components.

pub mod config;
pub mod error;
pub mod udid;

pub use config::{ConfigError, Credentials, Settings, DEFAULT_ENV_PREFIX};
pub use error::{Classify, ErrorOrigin, RequestError};
pub use udid::Udid;
