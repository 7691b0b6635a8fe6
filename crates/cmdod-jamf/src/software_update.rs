//! Managed software update command (Jamf Pro API, JSON body)

use crate::computer::Computer;
use crate::error::CommandError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Dotted numeric macOS version, e.g. `14`, `14.4` or `14.4.1`
static VERSION_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)*$").unwrap());

/// What the device should do with the update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateAction {
    DownloadOnly,
    DownloadAndInstall,
}

impl std::str::FromStr for UpdateAction {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DOWNLOAD_ONLY" => Ok(Self::DownloadOnly),
            "DOWNLOAD_AND_INSTALL" => Ok(Self::DownloadAndInstall),
            _ => Err(CommandError::BadUpdateAction),
        }
    }
}

/// MDM command priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdatePriority {
    High,
    Low,
}

impl std::str::FromStr for UpdatePriority {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIGH" => Ok(Self::High),
            "LOW" => Ok(Self::Low),
            _ => Err(CommandError::BadPriority),
        }
    }
}

/// Validated parameters for a software update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareUpdateConfig {
    target_version: Option<String>,
    skip_verify: bool,
    update_action: UpdateAction,
    max_deferrals: u32,
    force_restart: bool,
    apply_major_update: bool,
    priority: UpdatePriority,
}

impl Default for SoftwareUpdateConfig {
    fn default() -> Self {
        Self::force_install_latest()
    }
}

impl SoftwareUpdateConfig {
    /// Install the newest available release right away, major upgrades
    /// included, restarting without offering deferrals
    pub fn force_install_latest() -> Self {
        Self {
            target_version: None,
            skip_verify: true,
            update_action: UpdateAction::DownloadAndInstall,
            max_deferrals: 0,
            force_restart: true,
            apply_major_update: true,
            priority: UpdatePriority::High,
        }
    }

    pub fn target_version(&self) -> Option<&str> {
        self.target_version.as_deref()
    }

    pub fn update_action(&self) -> UpdateAction {
        self.update_action
    }

    pub fn priority(&self) -> UpdatePriority {
        self.priority
    }

    pub fn max_deferrals(&self) -> u32 {
        self.max_deferrals
    }
}

/// Caller-supplied update parameters, as accepted on the wire
///
/// Every field is optional; missing ones fall back to the
/// [`SoftwareUpdateConfig::force_install_latest`] preset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareUpdateRequest {
    #[serde(default)]
    pub target_version: Option<String>,
    #[serde(default)]
    pub skip_version_verification: Option<bool>,
    #[serde(default)]
    pub update_action: Option<String>,
    #[serde(default)]
    pub max_deferrals: Option<i64>,
    #[serde(default)]
    pub force_restart: Option<bool>,
    #[serde(default)]
    pub apply_major_update: Option<bool>,
    #[serde(default)]
    pub priority: Option<String>,
}

impl SoftwareUpdateRequest {
    /// Validate into a config, checked in the order action, priority,
    /// deferrals, version
    pub fn validate(self) -> Result<SoftwareUpdateConfig, CommandError> {
        let preset = SoftwareUpdateConfig::force_install_latest();

        let update_action = match self.update_action.as_deref() {
            Some(action) => action.parse()?,
            None => preset.update_action,
        };

        let priority = match self.priority.as_deref() {
            Some(priority) => priority.parse()?,
            None => preset.priority,
        };

        let max_deferrals = match self.max_deferrals {
            Some(n) if n < 0 => return Err(CommandError::NegativeDeferrals),
            Some(n) => u32::try_from(n).map_err(|_| CommandError::DeferralsOutOfRange)?,
            None => preset.max_deferrals,
        };

        let target_version = match self.target_version.filter(|v| !v.is_empty()) {
            Some(version) => {
                validate_version(&version)?;
                Some(version)
            }
            None => None,
        };

        Ok(SoftwareUpdateConfig {
            target_version,
            skip_verify: self.skip_version_verification.unwrap_or(preset.skip_verify),
            update_action,
            max_deferrals,
            force_restart: self.force_restart.unwrap_or(preset.force_restart),
            apply_major_update: self.apply_major_update.unwrap_or(preset.apply_major_update),
            priority,
        })
    }
}

/// Check a dotted version: digits-and-dots format first, then semantic
/// version rules (at most three components, no leading zeros)
pub fn validate_version(version: &str) -> Result<(), CommandError> {
    if !VERSION_FORMAT.is_match(version) {
        return Err(CommandError::BadVersionFormat);
    }

    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() > 3 {
        return Err(CommandError::NotSemver);
    }
    if parts.iter().any(|p| p.len() > 1 && p.starts_with('0')) {
        return Err(CommandError::NotSemver);
    }

    Ok(())
}

/// Send a managed software update to one computer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareUpdate {
    computer_id: i64,
    config: SoftwareUpdateConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SoftwareUpdateBody<'a> {
    device_ids: Vec<String>,
    skip_version_verification: bool,
    apply_major_update: bool,
    force_restart: bool,
    priority: UpdatePriority,
    update_action: UpdateAction,
    max_deferrals: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
}

impl SoftwareUpdate {
    pub fn new(computer: &Computer, config: SoftwareUpdateConfig) -> Result<Self, CommandError> {
        if computer.general.id <= 0 {
            return Err(CommandError::MissingDeviceIdentity);
        }

        Ok(Self {
            computer_id: computer.general.id,
            config,
        })
    }

    pub fn computer_id(&self) -> i64 {
        self.computer_id
    }

    pub fn config(&self) -> &SoftwareUpdateConfig {
        &self.config
    }

    /// Render the body for `POST /api/v1/macos-managed-software-updates/send-updates`
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        let c = &self.config;
        serde_json::to_vec(&SoftwareUpdateBody {
            device_ids: vec![self.computer_id.to_string()],
            skip_version_verification: c.skip_verify,
            apply_major_update: c.apply_major_update,
            force_restart: c.force_restart,
            priority: c.priority,
            update_action: c.update_action,
            max_deferrals: c.max_deferrals,
            version: c.target_version.as_deref(),
        })
    }
}
