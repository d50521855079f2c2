//! Configuration types and loading
//!
//! Precedence: CLI flags > env vars > config file > defaults.
//! The config file is optional unless its path was given explicitly.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use cloud_auth::AuthEndpoints;
use common::require_http_url;
use jwt_provider::LoginMode;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "cloud-login.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    /// Extra endpoint table entries, consulted after the built-in ones
    #[serde(default)]
    pub endpoints: Vec<EndpointEntry>,
}

/// Which host to authenticate against and how
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub host: String,
    /// Overrides the table's IdP base URL when non-empty
    #[serde(default)]
    pub auth_url: String,
    /// Overrides the table's client id when non-empty
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub login_mode: LoginMode,
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,
    #[serde(default)]
    pub callback_port: u16,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            auth_url: String::new(),
            client_id: String::new(),
            login_mode: LoginMode::default(),
            login_timeout_secs: default_login_timeout(),
            callback_port: 0,
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl AuthConfig {
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// One `[[endpoints]]` table entry
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointEntry {
    /// Hostname suffix, e.g. `.staging.example.com`
    pub suffix: String,
    pub auth_url: String,
    pub client_id: String,
    pub api_host: String,
}

impl From<EndpointEntry> for (String, AuthEndpoints) {
    fn from(entry: EndpointEntry) -> Self {
        (
            entry.suffix,
            AuthEndpoints {
                auth_url: entry.auth_url,
                client_id: entry.client_id,
                api_host: entry.api_host,
            },
        )
    }
}

fn default_login_timeout() -> u64 {
    300
}

fn default_http_timeout() -> u64 {
    30
}

/// Config file location and whether the user named it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPath {
    pub path: PathBuf,
    pub explicit: bool,
}

impl Config {
    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> ConfigPath {
        if let Some(p) = cli_path {
            return ConfigPath {
                path: PathBuf::from(p),
                explicit: true,
            };
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return ConfigPath {
                path: PathBuf::from(p),
                explicit: true,
            };
        }
        ConfigPath {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            explicit: false,
        }
    }

    /// Load the file (if any), then overlay env vars and CLI flags and validate.
    pub fn load(source: &ConfigPath, args: &[String]) -> common::Result<Self> {
        let mut config = if source.explicit || source.path.exists() {
            Self::from_file(&source.path)?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_cli(args)?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> common::Result<()> {
        if let Some(host) = env("CLOUD_HOST") {
            self.auth.host = host;
        }
        if let Some(url) = env("CLOUD_AUTH_URL") {
            self.auth.auth_url = url;
        }
        if let Some(id) = env("CLOUD_AUTH_CLIENT_ID") {
            self.auth.client_id = id;
        }
        if let Some(mode) = env("CLOUD_LOGIN_MODE") {
            self.auth.login_mode = parse_mode(&mode)?;
        }
        Ok(())
    }

    fn apply_cli(&mut self, args: &[String]) -> common::Result<()> {
        if let Some(host) = flag_value(args, "--host") {
            self.auth.host = host.to_owned();
        }
        if let Some(url) = flag_value(args, "--auth-url") {
            self.auth.auth_url = url.to_owned();
        }
        if let Some(id) = flag_value(args, "--client-id") {
            self.auth.client_id = id.to_owned();
        }
        if let Some(mode) = flag_value(args, "--login-mode") {
            self.auth.login_mode = parse_mode(mode)?;
        }
        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        if !self.auth.auth_url.is_empty() {
            require_http_url("auth.auth_url", &self.auth.auth_url)?;
        }
        if self.auth.login_timeout_secs == 0 {
            return Err(common::Error::Config(
                "login_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.auth.http_timeout_secs == 0 {
            return Err(common::Error::Config(
                "http_timeout_secs must be greater than 0".into(),
            ));
        }
        for entry in &self.endpoints {
            if entry.suffix.is_empty() {
                return Err(common::Error::Config(
                    "endpoints entry with an empty suffix".into(),
                ));
            }
            require_http_url("endpoints.auth_url", &entry.auth_url)?;
            require_http_url("endpoints.api_host", &entry.api_host)?;
        }
        Ok(())
    }

    /// Endpoint entries in the shape the resolver takes.
    pub fn endpoint_entries(&self) -> impl Iterator<Item = (String, AuthEndpoints)> + '_ {
        self.endpoints.iter().cloned().map(Into::into)
    }
}

fn parse_mode(value: &str) -> common::Result<LoginMode> {
    LoginMode::from_str(value).map_err(common::Error::Config)
}

/// Value following `flag` in `args`, if any.
pub fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
