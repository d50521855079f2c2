//! Backend JWT provider for managed-service connections
//!
//! A provider owns the credential lifecycle for one connection context: it
//! logs the user in against the IdP, keeps the IdP session alive with the
//! refresh token, and trades the IdP access token for the backend JWT.
//! Callers only ever see `get_jwt()`, which yields a valid JWT or an empty
//! string.
//!
//! Per-call state machine:
//! 1. Cached JWT still valid → return it
//! 2. No IdP session → login (browser or device variant)
//! 3. IdP access token expired → refresh, falling back to login
//! 4. Exchange the IdP access token for a JWT, cache it, return it
//! 5. Any failure → empty string, state reset to uninitialized

pub mod browser;
pub mod clock;
pub mod console;
pub mod error;
pub mod factory;
pub mod login;
pub mod metrics;
pub mod provider;
pub mod state;

#[cfg(test)]
mod test_support;

pub use browser::{Browser, NoBrowser, SystemBrowser};
pub use clock::{Clock, ManualClock, SystemClock};
pub use console::Console;
pub use error::{Error, Result};
pub use factory::{
    LoginMode, ProviderOptions, create_jwt_provider, create_jwt_provider_with, resolve_endpoints,
};
pub use login::{BrowserLogin, DeviceLogin, LoginFlow};
pub use provider::CloudJwtProvider;
pub use state::{CachedJwt, IdpTokens, Phase, TokenState};

use std::future::Future;
use std::pin::Pin;

/// Source of backend JWTs for one connection context.
///
/// Implementations handle the whole lifecycle, including initial login and
/// later refreshes. Boxed futures keep the trait dyn-compatible so the
/// factory can hand out `Box<dyn JwtProvider>`.
pub trait JwtProvider: Send {
    /// Identifier for logging (e.g. "browser", "device")
    fn id(&self) -> &str;

    /// A currently valid backend JWT, or an empty string when authentication
    /// is unavailable right now. Never fails past this boundary.
    fn get_jwt(&mut self) -> Pin<Box<dyn Future<Output = String> + Send + '_>>;
}
