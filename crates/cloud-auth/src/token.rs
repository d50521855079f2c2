//! IdP token endpoint: authorization code exchange and refresh
//!
//! Both operations POST a form to `{auth_url}/oauth/token` with different
//! grant types. Device-code polling hits the same endpoint and lives in
//! `device`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{TOKEN_PATH, endpoint_url};
use crate::error::{Error, Result};

/// Successful token endpoint response.
///
/// `expires_in` is a delta in seconds from the response time. The caller
/// turns it into an absolute timestamp. `refresh_token` is absent when the
/// IdP does not rotate it on refresh.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// RFC 6749 section 5.2 error body.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl std::fmt::Display for OAuthErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => f.write_str(&self.error),
        }
    }
}

/// Exchange an authorization code for tokens (browser login completion).
pub async fn exchange_code(
    client: &reqwest::Client,
    auth_url: &str,
    client_id: &str,
    code: &str,
    verifier: &str,
    redirect_uri: &str,
) -> Result<TokenResponse> {
    let url = endpoint_url(auth_url, TOKEN_PATH);
    debug!(%url, "exchanging authorization code");
    let response = client
        .post(&url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(rejection(response, "authorization code exchange").await);
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
}

/// Obtain a new access token with a refresh token.
pub async fn refresh_token(
    client: &reqwest::Client,
    auth_url: &str,
    client_id: &str,
    refresh: &str,
) -> Result<TokenResponse> {
    let url = endpoint_url(auth_url, TOKEN_PATH);
    debug!(%url, "refreshing IdP access token");
    let response = client
        .post(&url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("refresh_token", refresh),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(rejection(response, "token refresh").await);
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
}

/// Read the body of a non-success token endpoint response.
pub(crate) async fn read_error_body(
    response: reqwest::Response,
) -> (reqwest::StatusCode, String, Option<OAuthErrorBody>) {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));
    let parsed = serde_json::from_str::<OAuthErrorBody>(&body).ok();
    (status, body, parsed)
}

/// Classify a rejected code exchange or refresh.
///
/// 401/403 and `invalid_grant` mean the grant itself is dead (expired,
/// revoked or already used); everything else is reported as an exchange
/// failure.
async fn rejection(response: reqwest::Response, operation: &str) -> Error {
    let (status, body, parsed) = read_error_body(response).await;
    let revoked = status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
        || parsed.as_ref().is_some_and(|e| e.error == "invalid_grant");
    let detail = parsed.map(|e| e.to_string()).unwrap_or(body);
    if revoked {
        Error::InvalidCredentials(format!("{operation} rejected ({status}): {detail}"))
    } else {
        Error::TokenExchange(format!("{operation} returned {status}: {detail}"))
    }
}
