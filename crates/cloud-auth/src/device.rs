//! OAuth 2.0 device authorization grant (RFC 8628)
//!
//! Used for headless logins: the IdP hands out a user code and a
//! verification URL, the user completes login on any device, and the client
//! polls the token endpoint until the IdP reports completion.

use serde::Deserialize;
use tracing::debug;

use crate::constants::{DEVICE_CODE_GRANT_TYPE, DEVICE_CODE_PATH, SCOPES, TOKEN_PATH, endpoint_url};
use crate::error::{Error, Result};
use crate::token::{TokenResponse, read_error_body};

fn default_interval() -> u64 {
    5
}

/// Response from the device authorization endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Verification URL with the user code pre-filled, when the IdP offers one
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    /// Seconds until `device_code` stops being accepted
    pub expires_in: u64,
    /// Minimum seconds between polls
    #[serde(default = "default_interval")]
    pub interval: u64,
}

impl DeviceAuthorization {
    /// URL to show or open for the user, preferring the pre-filled variant.
    pub fn browser_url(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .unwrap_or(&self.verification_uri)
    }
}

/// Outcome of one poll of the token endpoint.
#[derive(Debug)]
pub enum DevicePoll {
    /// User has not finished yet
    Pending,
    /// Polling too fast; the interval must grow by 5 seconds
    SlowDown,
    Complete(TokenResponse),
}

/// Start a device login.
pub async fn request_device_code(
    client: &reqwest::Client,
    auth_url: &str,
    client_id: &str,
) -> Result<DeviceAuthorization> {
    let url = endpoint_url(auth_url, DEVICE_CODE_PATH);
    debug!(%url, "requesting device code");
    let response = client
        .post(&url)
        .form(&[("client_id", client_id), ("scope", SCOPES)])
        .send()
        .await
        .map_err(|e| Error::Http(format!("device authorization request failed: {e}")))?;

    if !response.status().is_success() {
        let (status, body, parsed) = read_error_body(response).await;
        let detail = parsed.map(|e| e.to_string()).unwrap_or(body);
        return Err(Error::TokenExchange(format!(
            "device authorization returned {status}: {detail}"
        )));
    }

    response
        .json::<DeviceAuthorization>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid device authorization response: {e}")))
}

/// Poll the token endpoint once for a pending device login.
///
/// Pending states come back as 4xx with an OAuth error body, so the body is
/// parsed on non-success statuses too.
pub async fn poll_device_token(
    client: &reqwest::Client,
    auth_url: &str,
    client_id: &str,
    device_code: &str,
) -> Result<DevicePoll> {
    let url = endpoint_url(auth_url, TOKEN_PATH);
    let response = client
        .post(&url)
        .form(&[
            ("grant_type", DEVICE_CODE_GRANT_TYPE),
            ("client_id", client_id),
            ("device_code", device_code),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("device token poll failed: {e}")))?;

    if response.status().is_success() {
        return response
            .json::<TokenResponse>()
            .await
            .map(DevicePoll::Complete)
            .map_err(|e| Error::TokenExchange(format!("invalid device token response: {e}")));
    }

    let (status, body, parsed) = read_error_body(response).await;
    match parsed {
        Some(e) if e.error == "authorization_pending" => Ok(DevicePoll::Pending),
        Some(e) if e.error == "slow_down" => Ok(DevicePoll::SlowDown),
        Some(e) if e.error == "expired_token" => Err(Error::DeviceCodeExpired),
        Some(e) if e.error == "access_denied" => Err(Error::AuthorizationDenied(e.to_string())),
        Some(e) => Err(Error::TokenExchange(format!(
            "device token poll returned {status}: {e}"
        ))),
        None => Err(Error::TokenExchange(format!(
            "device token poll returned {status}: {body}"
        ))),
    }
}
