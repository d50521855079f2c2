//! Backend JWT issuance
//!
//! The backend accepts the IdP access token as a bearer credential and
//! returns its own short-lived JWT.

use serde::Deserialize;
use tracing::debug;

use crate::constants::{JWT_EXCHANGE_PATH, endpoint_url};
use crate::error::{Error, Result};
use crate::jwt::is_jwt_shaped;

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(alias = "jwt")]
    token: String,
}

/// Trade `idp_access_token` for a backend JWT at `{api_host}/v1/jwt`.
///
/// The returned string is guaranteed to have JWT shape; expiry is left to
/// the caller.
pub async fn exchange_for_jwt(
    client: &reqwest::Client,
    api_host: &str,
    idp_access_token: &str,
) -> Result<String> {
    let url = endpoint_url(api_host, JWT_EXCHANGE_PATH);
    debug!(%url, "requesting backend JWT");
    let response = client
        .post(&url)
        .bearer_auth(idp_access_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("JWT exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::InvalidCredentials(format!(
                "backend rejected IdP token ({status}): {body}"
            )));
        }
        return Err(Error::TokenExchange(format!(
            "JWT exchange returned {status}: {body}"
        )));
    }

    let exchanged = response
        .json::<ExchangeResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid JWT exchange response: {e}")))?;

    if !is_jwt_shaped(&exchanged.token) {
        return Err(Error::MalformedToken(
            "backend returned a value that is not a JWT".into(),
        ));
    }
    Ok(exchanged.token)
}
