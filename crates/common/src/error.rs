//! Configuration error types shared by the login binary and libraries

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid URL for {field}: {value}")]
    InvalidUrl { field: String, value: String },
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Reject URLs that lack an http(s) scheme.
pub fn require_http_url(field: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::InvalidUrl {
            field: field.to_owned(),
            value: value.to_owned(),
        })
    }
}
