//! HTTP client for the Jamf Classic and Pro APIs

use crate::command::{ApiSurface, Command};
use crate::computer::{Computer, ComputerEnvelope};
use crate::error::{JamfError, JamfResult};
use crate::token::{Token, TokenState};
use async_trait::async_trait;
use chrono::Utc;
use cmdod_core::{Credentials, Udid};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Per-call timeout on every outbound request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What the verifier needs from a device management backend
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    /// Look up a computer record by UDID
    async fn fetch_device(&self, udid: &Udid) -> JamfResult<Computer>;

    /// Send a command to the computer it was built for
    async fn dispatch(&self, command: &Command) -> JamfResult<()>;
}

/// Error body Jamf returns for some failures
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    http_status: u16,
    errors: Vec<serde_json::Value>,
}

/// Jamf API client holding the session token
pub struct JamfClient {
    base_url: String,
    credentials: Credentials,
    http: reqwest::Client,
    token: Mutex<Option<Token>>,
}

impl JamfClient {
    /// Create a client for `base_url` (scheme included)
    ///
    /// No token is fetched here; the first request acquires one.
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> JamfResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(JamfError::Transport)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            http,
            token: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current lifecycle state of the session token
    pub async fn token_state(&self) -> TokenState {
        TokenState::of(self.token.lock().await.as_ref(), Utc::now())
    }

    /// Return a usable token value, acquiring or extending it first if needed
    ///
    /// The token lock is held across the refresh, so concurrent callers
    /// wait for one refresh instead of each starting their own.
    pub async fn ensure_fresh(&self) -> JamfResult<String> {
        let mut slot = self.token.lock().await;

        let state = TokenState::of(slot.as_ref(), Utc::now());
        let token = match slot.as_ref() {
            Some(current) if !state.is_near_expiry() => return Ok(current.value().to_string()),
            Some(current) if !state.is_expired() => {
                debug!("Jamf token nearing expiry, refreshing with keep-alive");
                self.keep_alive(current.value()).await?
            }
            _ => {
                debug!("Jamf token absent or expired, acquiring with basic auth");
                self.acquire().await?
            }
        };

        info!(expires = %token.expires(), "Acquired Jamf API token");
        let value = token.value().to_string();
        *slot = Some(token);
        Ok(value)
    }

    async fn acquire(&self) -> JamfResult<Token> {
        let request = self
            .http
            .post(format!("{}/api/v1/auth/token", self.base_url))
            .basic_auth(&self.credentials.username, Some(&self.credentials.password));
        request_token(request).await
    }

    async fn keep_alive(&self, current: &str) -> JamfResult<Token> {
        let request = self
            .http
            .post(format!("{}/api/v1/auth/keep-alive", self.base_url))
            .bearer_auth(current);
        request_token(request).await
    }

    /// Authenticate and send a request, turning non-success into a `JamfError`
    async fn send(&self, request: RequestBuilder) -> JamfResult<Response> {
        let token = self.ensure_fresh().await?;

        let response = request
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                error!("Jamf request failed: {}", e);
                JamfError::Transport(e)
            })?;

        let status = response.status();
        if matches!(status, StatusCode::OK | StatusCode::CREATED) {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.bytes().await.unwrap_or_default();
        let err = classify_failure(status.as_u16(), &body);
        error!(status = status.as_u16(), url = %url, "Jamf API error: {}", err);
        Err(err)
    }
}

#[async_trait]
impl DeviceBackend for JamfClient {
    async fn fetch_device(&self, udid: &Udid) -> JamfResult<Computer> {
        let url = format!("{}/JSSResource/computers/udid/{}", self.base_url, udid);
        let response = self.send(self.http.get(url)).await?;

        let envelope: ComputerEnvelope = response
            .json()
            .await
            .map_err(|e| JamfError::Decode(Box::new(e)))?;

        debug!(udid = %udid, id = envelope.computer.general.id, "Fetched computer record");
        Ok(envelope.computer)
    }

    async fn dispatch(&self, command: &Command) -> JamfResult<()> {
        let body = command.body()?;
        let url = match command.surface() {
            ApiSurface::Classic => format!(
                "{}/JSSResource/computercommands/command/{}",
                self.base_url,
                command.relative_path()
            ),
            ApiSurface::Pro => format!("{}/api/{}", self.base_url, command.relative_path()),
        };

        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, body.content_type)
            .body(body.bytes);
        self.send(request).await?;

        info!(
            command = command.name(),
            device_id = command.device_id(),
            "Command sent to Jamf"
        );
        Ok(())
    }
}

async fn request_token(request: RequestBuilder) -> JamfResult<Token> {
    let response = request
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(JamfError::Transport)?;

    let status = response.status();
    if status != StatusCode::OK {
        error!(status = status.as_u16(), "Jamf refused token request");
        return Err(JamfError::TokenRefused {
            status: status.as_u16(),
        });
    }

    response
        .json::<Token>()
        .await
        .map_err(|e| JamfError::Decode(Box::new(e)))
}

/// Map a failed response onto a `JamfError`
///
/// A decodable Jamf error body wins over the bare status code.
fn classify_failure(status: u16, body: &[u8]) -> JamfError {
    if let Ok(api_error) = serde_json::from_slice::<ApiErrorBody>(body) {
        let errors: Vec<String> = api_error
            .errors
            .iter()
            .map(|e| match e {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        return JamfError::Unhandled {
            status: api_error.http_status,
            message: format!("errors: [{}]", errors.join(", ")),
        };
    }

    match status {
        401 => JamfError::Unauthorized,
        403 => JamfError::Forbidden,
        400 => JamfError::BadRequest,
        404 => JamfError::NotFound,
        _ => JamfError::Unhandled {
            status,
            message: "unexpected error".to_string(),
        },
    }
}
