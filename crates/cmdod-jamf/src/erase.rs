//! EraseDevice command (Classic API, XML body)

use crate::computer::Computer;
use crate::error::CommandError;

/// Passcode sent with every wipe
///
/// Not a secret: the code challenge already gated the request.
pub const ERASE_DEVICE_PASSCODE: &str = "000000";

/// Wipe a computer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EraseDevice {
    computer_id: i64,
    passcode: String,
}

impl EraseDevice {
    /// Build a wipe for `computer` with a six-digit passcode
    pub fn new(computer: &Computer, passcode: &str) -> Result<Self, CommandError> {
        if computer.general.id <= 0 {
            return Err(CommandError::MissingDeviceIdentity);
        }
        if passcode.len() != 6 || !passcode.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CommandError::BadPasscode);
        }

        Ok(Self {
            computer_id: computer.general.id,
            passcode: passcode.to_string(),
        })
    }

    pub fn computer_id(&self) -> i64 {
        self.computer_id
    }

    /// Render the `computer_command` document expected by
    /// `POST /JSSResource/computercommands/command/EraseDevice`
    ///
    /// Every interpolated value is digits only, so nothing needs escaping.
    pub fn to_xml(&self) -> String {
        format!(
            "<computer_command>\
             <general><command>EraseDevice</command><passcode>{}</passcode></general>\
             <computers><computer><id>{}</id></computer></computers>\
             </computer_command>",
            self.passcode, self.computer_id
        )
    }
}
