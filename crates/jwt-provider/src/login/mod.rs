//! Initial IdP login variants
//!
//! The provider holds exactly one of these, chosen by the factory. Both end
//! with a token endpoint response; turning that into session state is the
//! provider's job.

mod browser;
mod device;

pub use browser::BrowserLogin;
pub use device::DeviceLogin;

use std::time::Duration;

use cloud_auth::TokenResponse;

use crate::browser::Browser;
use crate::console::Console;
use crate::error::Result;

/// How the provider obtains its first IdP session.
#[derive(Debug, Clone)]
pub enum LoginFlow {
    /// Authorization code + PKCE with a loopback redirect
    Browser(BrowserLogin),
    /// Device authorization grant, for headless environments
    Device(DeviceLogin),
}

impl LoginFlow {
    pub fn id(&self) -> &'static str {
        match self {
            LoginFlow::Browser(_) => "browser",
            LoginFlow::Device(_) => "device",
        }
    }

    pub(crate) async fn run(&self, ctx: LoginContext<'_>) -> Result<TokenResponse> {
        match self {
            LoginFlow::Browser(login) => login.run(ctx).await,
            LoginFlow::Device(login) => login.run(ctx).await,
        }
    }
}

/// Everything a login variant borrows from its provider for one attempt.
pub(crate) struct LoginContext<'a> {
    pub client: &'a reqwest::Client,
    pub auth_url: &'a str,
    pub client_id: &'a str,
    /// Upper bound on waiting for the user
    pub timeout: Duration,
    pub console: &'a mut Console,
    pub browser: &'a dyn Browser,
}
