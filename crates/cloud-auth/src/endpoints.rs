//! Endpoint resolution by target host suffix
//!
//! Maps a managed-service host name to the IdP tenant, IdP client ID and
//! backend API host that issue its credentials. The built-in table lives for
//! the whole process and is never mutated; callers that need extra entries
//! (from config) build their own resolver on top of it.

use std::sync::LazyLock;

use serde::Deserialize;

/// IdP and backend endpoints for one managed-service domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthEndpoints {
    /// IdP tenant root, e.g. `https://ch-local-dev.us.auth0.com`
    pub auth_url: String,
    /// Public OAuth client ID registered with the IdP
    pub client_id: String,
    /// Backend API root that exchanges IdP tokens for JWTs
    pub api_host: String,
}

/// Suffix table lookup.
///
/// Matching is a case-sensitive trailing substring test. When several
/// suffixes match, the entry registered first wins, so a more specific
/// suffix must be registered before a broader one.
#[derive(Debug, Clone, Default)]
pub struct EndpointResolver {
    entries: Vec<(String, AuthEndpoints)>,
}

static BUILTIN: LazyLock<EndpointResolver> = LazyLock::new(|| EndpointResolver {
    entries: vec![(
        ".clickhouse-dev.com".to_owned(),
        AuthEndpoints {
            auth_url: "https://ch-local-dev.us.auth0.com".to_owned(),
            client_id: "HxCYHJpfUCQtX6Y8EzFWImHLVFbVNahh".to_owned(),
            api_host: "https://console-api.clickhouse-dev.com".to_owned(),
        },
    )],
});

impl EndpointResolver {
    /// The process-wide built-in table.
    pub fn builtin() -> &'static EndpointResolver {
        &BUILTIN
    }

    /// An empty resolver (matches nothing).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Copy of this resolver with additional entries appended.
    ///
    /// Appended entries lose ties against existing ones.
    pub fn with_entries<I>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, AuthEndpoints)>,
    {
        let mut resolver = self.clone();
        resolver.entries.extend(entries);
        resolver
    }

    /// Find the endpoints for `host`, or `None` when no managed auth applies.
    pub fn resolve(&self, host: &str) -> Option<&AuthEndpoints> {
        self.entries
            .iter()
            .find(|(suffix, _)| host.ends_with(suffix.as_str()))
            .map(|(_, endpoints)| endpoints)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve `host` against the built-in table.
pub fn get_auth_endpoints(host: &str) -> Option<&'static AuthEndpoints> {
    EndpointResolver::builtin().resolve(host)
}
