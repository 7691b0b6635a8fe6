//! cmdod Auth - Single-use verification codes and bearer authentication
//!
//! # Verification Flow
//!
//! 1. Operator requests a code for a device UDID via `GET /api/v1/code/{udid}`
//! 2. The code is written to the device's proof extension attribute out-of-band
//! 3. A wipe or update request reads the record back and compares values
//! 4. The code is burned on that first comparison, whatever the result
//!
//! # Example
//!
//! ```no_run
//! use cmdod_auth::CodeStore;
//! use cmdod_core::Udid;
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let store = Arc::new(CodeStore::new());
//!     let sweeper = store.spawn_sweeper(cmdod_auth::DEFAULT_SWEEP_INTERVAL);
//!
//!     let udid = Udid::parse("5E6C8F2A-1B3D-4C5E-9F70-A1B2C3D4E5F6").unwrap();
//!     let code = store.issue(&udid).await.unwrap();
//!     println!("Write this to the device: {}", code.value());
//!
//!     // Later, when the operator asks for the wipe
//!     let stored = store.peek_and_consume(&udid).await;
//!     println!("stored code present: {}", stored.is_ok());
//!
//!     sweeper.stop().await;
//! }
//! ```

pub mod bearer;
pub mod codes;

pub use bearer::{extract_bearer, BearerError, BearerToken};
pub use codes::{
    Code, CodeError, CodeResult, CodeStore, Sweeper, CODE_ENTROPY_BYTES, CODE_VALIDITY,
    DEFAULT_SWEEP_INTERVAL,
};
