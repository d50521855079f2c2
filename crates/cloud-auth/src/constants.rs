//! IdP and backend protocol constants
//!
//! Paths are appended to the configured `auth_url` (an Auth0-style tenant
//! root) and `api_host`. None of these are secrets.

/// Authorization endpoint for the browser (authorization code) login
pub const AUTHORIZE_PATH: &str = "/authorize";

/// Token endpoint for code exchange, device-code polling and refresh
pub const TOKEN_PATH: &str = "/oauth/token";

/// Device authorization endpoint for headless login
pub const DEVICE_CODE_PATH: &str = "/oauth/device/code";

/// Backend endpoint that issues the service JWT for an IdP access token
pub const JWT_EXCHANGE_PATH: &str = "/v1/jwt";

/// Grant type used while polling the token endpoint during device login
pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Requested scopes. `offline_access` is what makes the IdP issue a refresh token.
pub const SCOPES: &str = "openid profile email offline_access";

/// Path served by the loopback listener during browser login
pub const CALLBACK_PATH: &str = "/callback";

/// Join an endpoint base URL and a path without doubling the slash.
pub fn endpoint_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
