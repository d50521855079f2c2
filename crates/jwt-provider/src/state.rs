//! Token state record and its transitions
//!
//! All mutable credential data of a provider lives in one `TokenState`.
//! Flows never write to it directly: they produce an `IdpTokens` value and
//! the state applies it in a single transition, so a failed flow cannot
//! leave a half-written session behind.

use cloud_auth::{TokenResponse, jwt_expiry};
use common::Secret;

use crate::error::{Error, Result};

/// Lifecycle phase of the IdP session at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No IdP tokens at all
    Uninitialized,
    /// Access token present and not yet expired
    IdpAuthenticated,
    /// Access token missing or past its expiry, refresh token may still work
    IdpExpired,
}

/// Backend JWT together with its `exp`-derived expiry (unix millis).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedJwt {
    token: Secret<String>,
    expires_at: u64,
}

impl CachedJwt {
    pub fn token(&self) -> &str {
        self.token.expose()
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }
}

/// IdP tokens obtained by a successful login or refresh, not yet applied.
#[derive(Debug, Clone)]
pub struct IdpTokens {
    access_token: Secret<String>,
    refresh_token: Option<Secret<String>>,
    expires_at: u64,
}

impl IdpTokens {
    /// Validate a token endpoint response issued at `issued_at` (unix millis).
    ///
    /// The expiry comes from `expires_in` when the IdP sends it, otherwise
    /// from the access token's own `exp` claim. A response that yields no
    /// expiry after `issued_at` is rejected.
    pub fn from_response(response: TokenResponse, issued_at: u64) -> Result<Self> {
        if response.access_token.is_empty() {
            return Err(cloud_auth::Error::MalformedToken("empty access token".into()).into());
        }

        let expires_at = match response.expires_in {
            Some(secs) if secs > 0 => issued_at.saturating_add(secs.saturating_mul(1000)),
            _ => jwt_expiry(&response.access_token),
        };
        if expires_at <= issued_at {
            return Err(Error::MissingExpiry);
        }

        Ok(Self {
            refresh_token: response
                .refresh_token
                .filter(|t| !t.is_empty())
                .map(Secret::new),
            access_token: Secret::new(response.access_token),
            expires_at,
        })
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenState {
    idp_access_token: Secret<String>,
    idp_refresh_token: Secret<String>,
    /// Unix millis; `0` = unknown/expired
    idp_access_token_expires_at: u64,
    jwt: Option<CachedJwt>,
}

impl TokenState {
    pub fn phase(&self, now: u64) -> Phase {
        if self.idp_access_token.is_empty() && self.idp_refresh_token.is_empty() {
            Phase::Uninitialized
        } else if !self.idp_access_token.is_empty() && now < self.idp_access_token_expires_at {
            Phase::IdpAuthenticated
        } else {
            Phase::IdpExpired
        }
    }

    /// The cached JWT if it is still valid at `now`.
    pub fn valid_jwt(&self, now: u64) -> Option<&str> {
        self.jwt
            .as_ref()
            .filter(|jwt| now < jwt.expires_at)
            .map(CachedJwt::token)
    }

    /// Replace the whole IdP session with a fresh login result.
    ///
    /// A login without a refresh token leaves the session without one; the
    /// cached JWT belongs to the old session and is dropped.
    pub fn apply_login(&mut self, tokens: IdpTokens) {
        self.idp_access_token = tokens.access_token;
        self.idp_refresh_token = tokens.refresh_token.unwrap_or_default();
        self.idp_access_token_expires_at = tokens.expires_at;
        self.jwt = None;
    }

    /// Apply a refresh result. The refresh token is replaced only when the
    /// IdP rotated it.
    pub fn apply_refresh(&mut self, tokens: IdpTokens) {
        self.idp_access_token = tokens.access_token;
        if let Some(rotated) = tokens.refresh_token {
            self.idp_refresh_token = rotated;
        }
        self.idp_access_token_expires_at = tokens.expires_at;
    }

    pub fn cache_jwt(&mut self, token: String, expires_at: u64) {
        self.jwt = Some(CachedJwt {
            token: Secret::new(token),
            expires_at,
        });
    }

    /// Back to `Uninitialized`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn idp_access_token(&self) -> &str {
        self.idp_access_token.expose()
    }

    pub fn idp_refresh_token(&self) -> &str {
        self.idp_refresh_token.expose()
    }

    pub fn idp_access_token_expires_at(&self) -> u64 {
        self.idp_access_token_expires_at
    }

    pub fn jwt(&self) -> Option<&CachedJwt> {
        self.jwt.as_ref()
    }
}
