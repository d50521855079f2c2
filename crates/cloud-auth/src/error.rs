//! Error types for IdP and backend protocol operations

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure or a request that could not be built
    #[error("network error: {0}")]
    Http(String),

    /// Non-success status or an unreadable body from a token endpoint
    #[error("token endpoint error: {0}")]
    TokenExchange(String),

    /// The grant (refresh token, authorization code, IdP token) was rejected
    #[error("credentials rejected: {0}")]
    InvalidCredentials(String),

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("device code expired before login completed")]
    DeviceCodeExpired,

    #[error("malformed token: {0}")]
    MalformedToken(String),
}

pub type Result<T> = std::result::Result<T, Error>;
