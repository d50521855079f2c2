//! HTTPS session construction for the login, refresh and exchange calls

use std::time::Duration;

use crate::error::{Error, Result};

/// Transport settings shared by every outbound auth request.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Per-request timeout (connect + response)
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("cloud-auth/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Build the rustls-backed client used for all flows of one provider.
pub fn build_client(settings: &HttpSettings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(settings.timeout)
        .connect_timeout(settings.timeout)
        .user_agent(settings.user_agent.as_str())
        .build()
        .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))
}
