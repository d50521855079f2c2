//! PKCE (Proof Key for Code Exchange) per RFC 7636
//!
//! The browser login keeps the verifier in memory and sends only the S256
//! challenge in the authorization URL. The loopback callback hands back a
//! code that is useless without the verifier.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::constants::{AUTHORIZE_PATH, SCOPES, endpoint_url};
use crate::error::{Error, Result};

/// Generate a cryptographically random PKCE code verifier.
///
/// 64 random bytes encoded as URL-safe base64 without padding (86 chars),
/// inside the 43-128 character range RFC 7636 allows.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the IdP authorization URL for the code + PKCE login.
///
/// `state` is echoed back on the redirect and must be compared by the caller.
pub fn build_authorization_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    challenge: &str,
) -> Result<String> {
    let base = endpoint_url(auth_url, AUTHORIZE_PATH);
    let url = reqwest::Url::parse_with_params(
        &base,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", SCOPES),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
            ("state", state),
        ],
    )
    .map_err(|e| Error::Http(format!("invalid authorization URL {base}: {e}")))?;
    Ok(url.into())
}
