//! Error types for the credential lifecycle
//!
//! These never cross `JwtProvider::get_jwt`; they are rendered into the
//! error console line and the logs before the call collapses to an empty
//! string.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] cloud_auth::Error),

    #[error("login did not complete within {}s", .0.as_secs())]
    LoginTimeout(Duration),

    #[error("login callback carried an unexpected state parameter")]
    StateMismatch,

    #[error("login callback failed: {0}")]
    Callback(String),

    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("IdP access token has no usable expiry")]
    MissingExpiry,

    #[error("backend JWT is expired or has no expiry claim")]
    JwtExpired,
}

pub type Result<T> = std::result::Result<T, Error>;
