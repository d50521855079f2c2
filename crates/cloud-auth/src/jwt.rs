//! JWT payload inspection without signature verification
//!
//! The backend verifies signatures; the client only needs the `exp` claim to
//! decide when to fetch a new token. Anything that cannot be read yields
//! `0`, which every caller treats as "already expired".

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{Error, Result};

/// Whether `token` has the compact JWS shape: three non-empty base64url segments.
pub fn is_jwt_shaped(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3
        && segments.iter().all(|s| {
            !s.is_empty()
                && s.trim_end_matches('=')
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}

/// Decode the claims object of a compact JWT.
pub fn decode_claims(token: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(Error::MalformedToken("expected three segments".into())),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::MalformedToken(format!("payload is not base64url: {e}")))?;

    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(serde_json::Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(Error::MalformedToken("payload is not a JSON object".into())),
        Err(e) => Err(Error::MalformedToken(format!("payload is not JSON: {e}"))),
    }
}

/// Absolute expiry of `token` in unix milliseconds, or `0` when the `exp`
/// claim is missing, non-numeric, non-positive or the token is undecodable.
pub fn jwt_expiry(token: &str) -> u64 {
    let Ok(claims) = decode_claims(token) else {
        return 0;
    };
    let Some(exp) = claims.get("exp") else {
        return 0;
    };
    if let Some(secs) = exp.as_u64() {
        return secs.saturating_mul(1000);
    }
    match exp.as_f64() {
        Some(secs) if secs.is_finite() && secs > 0.0 => (secs * 1000.0) as u64,
        _ => 0,
    }
}
