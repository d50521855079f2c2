//! Wire protocol for managed-service authentication
//!
//! Stateless building blocks used by the JWT provider: endpoint resolution,
//! PKCE, the IdP token endpoint (authorization code exchange and refresh),
//! the device authorization grant, the backend JWT exchange, and JWT expiry
//! parsing. Nothing here holds token state between calls.
//!
//! Credential flow:
//! 1. `endpoints::get_auth_endpoints()` picks the IdP and API host for a target host
//! 2. Login via `pkce` + `token::exchange_code()`, or
//!    `device::request_device_code()` + `device::poll_device_token()`
//! 3. `token::refresh_token()` renews the IdP access token
//! 4. `exchange::exchange_for_jwt()` trades the IdP access token for a backend JWT
//! 5. `jwt::jwt_expiry()` reads the JWT `exp` claim for cache bookkeeping

pub mod constants;
pub mod device;
pub mod endpoints;
pub mod error;
pub mod exchange;
pub mod http;
pub mod jwt;
pub mod pkce;
pub mod token;

pub use constants::*;
pub use device::{DeviceAuthorization, DevicePoll, poll_device_token, request_device_code};
pub use endpoints::{AuthEndpoints, EndpointResolver, get_auth_endpoints};
pub use error::{Error, Result};
pub use exchange::exchange_for_jwt;
pub use http::{HttpSettings, build_client};
pub use jwt::{is_jwt_shaped, jwt_expiry};
pub use pkce::{build_authorization_url, compute_challenge, generate_verifier};
pub use token::{OAuthErrorBody, TokenResponse, exchange_code, refresh_token};
