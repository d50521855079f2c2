//! Provider construction from a target host
//!
//! Picks the IdP and API host (explicit settings first, then the endpoint
//! table) and the login variant appropriate for the environment.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cloud_auth::{AuthEndpoints, EndpointResolver, HttpSettings, build_client};
use serde::Deserialize;
use tracing::info;

use crate::JwtProvider;
use crate::browser::{Browser, NoBrowser, SystemBrowser};
use crate::clock::{Clock, SystemClock};
use crate::console::Console;
use crate::error::Result;
use crate::login::{BrowserLogin, DeviceLogin, LoginFlow};
use crate::provider::{CloudJwtProvider, DEFAULT_LOGIN_TIMEOUT};

/// Requested login variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMode {
    /// Browser when a desktop session is available, device code otherwise
    #[default]
    Auto,
    Browser,
    Device,
}

impl FromStr for LoginMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(LoginMode::Auto),
            "browser" => Ok(LoginMode::Browser),
            "device" => Ok(LoginMode::Device),
            other => Err(format!(
                "unknown login mode {other:?} (expected auto, browser or device)"
            )),
        }
    }
}

impl LoginMode {
    /// Collapse `Auto` into a concrete variant using the environment lookup `env`.
    pub fn resolve(self, env: impl Fn(&str) -> Option<String>) -> LoginMode {
        match self {
            LoginMode::Auto if is_headless(&env) => LoginMode::Device,
            LoginMode::Auto => LoginMode::Browser,
            explicit => explicit,
        }
    }
}

/// Remote shells and display-less Unix sessions cannot complete a loopback
/// browser redirect on this machine.
fn is_headless(env: &impl Fn(&str) -> Option<String>) -> bool {
    let set = |key: &str| env(key).is_some_and(|v| !v.is_empty());
    if set("SSH_CONNECTION") || set("SSH_TTY") {
        return true;
    }
    if cfg!(any(target_os = "macos", target_os = "windows")) {
        return false;
    }
    !set("DISPLAY") && !set("WAYLAND_DISPLAY")
}

/// Construction knobs beyond the endpoint choice.
#[derive(Clone)]
pub struct ProviderOptions {
    pub login_mode: LoginMode,
    pub login_timeout: Duration,
    /// Loopback port for the browser variant; `0` picks a free one
    pub callback_port: u16,
    pub http: HttpSettings,
    pub resolver: EndpointResolver,
    /// Overrides the browser collaborator; `None` means the system browser
    /// for the browser variant and no browser for the device variant
    pub browser: Option<Arc<dyn Browser>>,
    pub clock: Arc<dyn Clock>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            login_mode: LoginMode::Auto,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            callback_port: 0,
            http: HttpSettings::default(),
            resolver: EndpointResolver::builtin().clone(),
            browser: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOptions")
            .field("login_mode", &self.login_mode)
            .field("login_timeout", &self.login_timeout)
            .field("callback_port", &self.callback_port)
            .field("http", &self.http)
            .field("resolver_entries", &self.resolver.len())
            .finish_non_exhaustive()
    }
}

/// Work out the endpoints for `host`.
///
/// Non-empty `auth_url` / `client_id` override the table entry field by
/// field. The API host always comes from the table, or `https://{host}` when
/// the host is not listed. `None` means no managed authentication applies.
pub fn resolve_endpoints(
    auth_url: &str,
    client_id: &str,
    host: &str,
    resolver: &EndpointResolver,
) -> Option<AuthEndpoints> {
    let listed = resolver.resolve(host);
    let pick = |explicit: &str, listed: Option<&String>| {
        if explicit.is_empty() {
            listed.cloned()
        } else {
            Some(explicit.to_owned())
        }
    };

    let auth_url = pick(auth_url, listed.map(|e| &e.auth_url))?;
    let client_id = pick(client_id, listed.map(|e| &e.client_id))?;
    let api_host = listed
        .map(|e| e.api_host.clone())
        .unwrap_or_else(|| format!("https://{host}"));

    Some(AuthEndpoints {
        auth_url,
        client_id,
        api_host,
    })
}

/// Provider for `host` with default options and the system environment.
pub fn create_jwt_provider(
    auth_url: &str,
    client_id: &str,
    host: &str,
    console: Console,
) -> Result<Option<Box<dyn JwtProvider>>> {
    create_jwt_provider_with(auth_url, client_id, host, ProviderOptions::default(), console)
}

/// Provider for `host`, or `None` when the host has no managed authentication.
pub fn create_jwt_provider_with(
    auth_url: &str,
    client_id: &str,
    host: &str,
    options: ProviderOptions,
    console: Console,
) -> Result<Option<Box<dyn JwtProvider>>> {
    let Some(endpoints) = resolve_endpoints(auth_url, client_id, host, &options.resolver) else {
        info!(host, "no managed authentication for host");
        return Ok(None);
    };

    let mode = options.login_mode.resolve(|key| std::env::var(key).ok());
    let (login, browser): (LoginFlow, Arc<dyn Browser>) = match (mode, options.browser) {
        // An explicitly supplied browser is offered the verification page too.
        (LoginMode::Device, Some(browser)) => (LoginFlow::Device(DeviceLogin::new(true)), browser),
        (LoginMode::Device, None) => (
            LoginFlow::Device(DeviceLogin::new(false)),
            Arc::new(NoBrowser),
        ),
        (_, browser) => (
            LoginFlow::Browser(BrowserLogin::new(options.callback_port)),
            browser.unwrap_or_else(|| Arc::new(SystemBrowser)),
        ),
    };

    info!(
        host,
        auth_url = %endpoints.auth_url,
        api_host = %endpoints.api_host,
        login = login.id(),
        "created JWT provider"
    );

    let client = build_client(&options.http)?;
    let provider = CloudJwtProvider::with_http_client(endpoints, login, console, client)
        .with_browser(browser)
        .with_clock(options.clock)
        .with_login_timeout(options.login_timeout);
    Ok(Some(Box::new(provider)))
}
