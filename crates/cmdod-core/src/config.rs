//! Environment-sourced configuration for cmdod
//!
//! All keys are read with a namespace prefix (default `CMDOD_`) which is
//! stripped before lookup, so `CMDOD_JAMF_FQDN` becomes `JAMF_FQDN`.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;
use tracing::debug;

/// Default namespace for environment variables
pub const DEFAULT_ENV_PREFIX: &str = "CMDOD_";

/// Default listen port when none (or an invalid one) is configured
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

pub const ENV_JAMF_FQDN: &str = "JAMF_FQDN";
pub const ENV_JAMF_API_USER: &str = "JAMF_API_USER";
pub const ENV_JAMF_API_PASSWORD: &str = "JAMF_API_PASSWORD";
pub const ENV_SERVER_BEARER_TOKEN: &str = "SERVER_BEARER_TOKEN";
pub const ENV_CODE_PROOF_EA_NAME: &str = "CODE_PROOF_EA_NAME";
pub const ENV_SERVER_LISTEN_INTERFACE: &str = "SERVER_LISTEN_INTERFACE";
pub const ENV_SERVER_LISTEN_PORT: &str = "SERVER_LISTEN_PORT";

const REQUIRED: [&str; 5] = [
    ENV_JAMF_FQDN,
    ENV_JAMF_API_USER,
    ENV_JAMF_API_PASSWORD,
    ENV_SERVER_BEARER_TOKEN,
    ENV_CODE_PROOF_EA_NAME,
];

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env variable: {0}")]
    Missing(String),
    #[error("cannot have empty value for required variable: {0}")]
    Empty(String),
}

/// Service account credentials for the Jamf API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Main configuration for cmdod
#[derive(Clone)]
pub struct Settings {
    /// Jamf base URL, always carrying a scheme
    pub jamf_url: String,
    /// Jamf API service account
    pub credentials: Credentials,
    /// Shared bearer token guarding this service's own API
    pub bearer_token: String,
    /// Name of the extension attribute that must echo the issued code
    pub proof_attribute: String,
    /// Interface to listen on
    pub listen_interface: IpAddr,
    /// Port to listen on
    pub listen_port: u16,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("jamf_url", &self.jamf_url)
            .field("credentials", &self.credentials)
            .field("bearer_token", &"<redacted>")
            .field("proof_attribute", &self.proof_attribute)
            .field("listen_interface", &self.listen_interface)
            .field("listen_port", &self.listen_port)
            .finish()
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars(), prefix)
    }

    /// Load settings from an arbitrary set of key/value pairs
    ///
    /// Only keys starting with `prefix` are considered.
    pub fn from_vars<I, K, V>(vars: I, prefix: &str) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let env: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(k, v)| {
                k.as_ref()
                    .strip_prefix(prefix)
                    .map(|key| (key.to_string(), v.into()))
            })
            .collect();

        for key in REQUIRED {
            match env.get(key) {
                None => return Err(ConfigError::Missing(format!("{prefix}{key}"))),
                Some(v) if v.is_empty() => return Err(ConfigError::Empty(format!("{prefix}{key}"))),
                Some(_) => {}
            }
        }

        let listen_interface = env
            .get(ENV_SERVER_LISTEN_INTERFACE)
            .and_then(|v| v.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let listen_port = env
            .get(ENV_SERVER_LISTEN_PORT)
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_LISTEN_PORT);

        let settings = Self {
            jamf_url: jamf_base_url(&env[ENV_JAMF_FQDN]),
            credentials: Credentials {
                username: env[ENV_JAMF_API_USER].clone(),
                password: env[ENV_JAMF_API_PASSWORD].clone(),
            },
            bearer_token: env[ENV_SERVER_BEARER_TOKEN].clone(),
            proof_attribute: env[ENV_CODE_PROOF_EA_NAME].clone(),
            listen_interface,
            listen_port,
        };

        debug!(?settings, "Loaded configuration");
        Ok(settings)
    }

    /// Builder pattern: set listen interface
    pub fn with_listen_interface(mut self, interface: IpAddr) -> Self {
        self.listen_interface = interface;
        self
    }

    /// Builder pattern: set listen port
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    /// Socket address to bind the HTTP server to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_interface, self.listen_port)
    }
}

/// Turn a bare FQDN into an https base URL; values that already carry a
/// scheme are kept as-is.
fn jamf_base_url(fqdn: &str) -> String {
    let trimmed = fqdn.trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}
