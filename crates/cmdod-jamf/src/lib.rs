//! cmdod Jamf - Jamf Pro API client and device commands
//!
//! The client talks to two API surfaces on the same host:
//!
//! - **Classic** (`/JSSResource`): computer lookup by UDID and the XML
//!   `EraseDevice` command
//! - **Pro** (`/api`): session tokens and managed software updates
//!
//! A single session token is shared by every request. It is acquired with
//! basic auth on first use, extended through keep-alive once it nears
//! expiry, and re-acquired after it lapses.

pub mod client;
pub mod command;
pub mod computer;
pub mod erase;
pub mod error;
pub mod software_update;
pub mod token;

pub use client::{DeviceBackend, JamfClient, REQUEST_TIMEOUT};
pub use command::{ApiSurface, Command, WireBody};
pub use computer::{Computer, ExtensionAttribute, General};
pub use erase::{EraseDevice, ERASE_DEVICE_PASSCODE};
pub use error::{CommandError, JamfError, JamfResult};
pub use software_update::{
    validate_version, SoftwareUpdate, SoftwareUpdateConfig, SoftwareUpdateRequest, UpdateAction,
    UpdatePriority,
};
pub use token::{Token, TokenState, NEAR_EXPIRY_SECONDS};
