//! Device commands and how each one travels over the wire

use crate::erase::EraseDevice;
use crate::error::{JamfError, JamfResult};
use crate::software_update::SoftwareUpdate;

/// Which Jamf API a command is sent through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiSurface {
    /// `/JSSResource/...`, XML bodies
    Classic,
    /// `/api/...`, JSON bodies
    Pro,
}

/// An encoded request body plus its media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireBody {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// A command ready to be dispatched to a single computer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    EraseDevice(EraseDevice),
    SoftwareUpdate(SoftwareUpdate),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::EraseDevice(_) => "EraseDevice",
            Command::SoftwareUpdate(_) => "SoftwareUpdate",
        }
    }

    pub fn surface(&self) -> ApiSurface {
        match self {
            Command::EraseDevice(_) => ApiSurface::Classic,
            Command::SoftwareUpdate(_) => ApiSurface::Pro,
        }
    }

    /// Path below the surface's command root
    pub fn relative_path(&self) -> &'static str {
        match self {
            Command::EraseDevice(_) => "EraseDevice",
            Command::SoftwareUpdate(_) => "v1/macos-managed-software-updates/send-updates",
        }
    }

    /// Jamf id of the targeted computer
    pub fn device_id(&self) -> i64 {
        match self {
            Command::EraseDevice(cmd) => cmd.computer_id(),
            Command::SoftwareUpdate(cmd) => cmd.computer_id(),
        }
    }

    pub fn body(&self) -> JamfResult<WireBody> {
        match self {
            Command::EraseDevice(cmd) => Ok(WireBody {
                content_type: "application/xml",
                bytes: cmd.to_xml().into_bytes(),
            }),
            Command::SoftwareUpdate(cmd) => Ok(WireBody {
                content_type: "application/json",
                bytes: cmd.to_json().map_err(JamfError::Encode)?,
            }),
        }
    }
}

impl From<EraseDevice> for Command {
    fn from(cmd: EraseDevice) -> Self {
        Command::EraseDevice(cmd)
    }
}

impl From<SoftwareUpdate> for Command {
    fn from(cmd: SoftwareUpdate) -> Self {
        Command::SoftwareUpdate(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computer::{Computer, General};
    use crate::erase::ERASE_DEVICE_PASSCODE;
    use crate::software_update::SoftwareUpdateConfig;

    fn computer() -> Computer {
        Computer {
            general: General {
                id: 9,
                udid: "5E6C8F2A-1B3D-4C5E-9F70-A1B2C3D4E5F6".to_string(),
                name: String::new(),
                serial_number: String::new(),
            },
            extension_attributes: Vec::new(),
        }
    }

    #[test]
    fn test_erase_routing() {
        let cmd: Command = EraseDevice::new(&computer(), ERASE_DEVICE_PASSCODE)
            .unwrap()
            .into();
        assert_eq!(cmd.surface(), ApiSurface::Classic);
        assert_eq!(cmd.relative_path(), "EraseDevice");
        assert_eq!(cmd.device_id(), 9);
        assert_eq!(cmd.body().unwrap().content_type, "application/xml");
    }

    #[test]
    fn test_software_update_routing() {
        let cmd: Command = SoftwareUpdate::new(&computer(), SoftwareUpdateConfig::default())
            .unwrap()
            .into();
        assert_eq!(cmd.name(), "SoftwareUpdate");
        assert_eq!(cmd.surface(), ApiSurface::Pro);
        assert_eq!(
            cmd.relative_path(),
            "v1/macos-managed-software-updates/send-updates"
        );

        let body = cmd.body().unwrap();
        assert_eq!(body.content_type, "application/json");
        assert!(String::from_utf8(body.bytes).unwrap().contains("\"deviceIds\":[\"9\"]"));
    }
}
