//! cloud-login
//!
//! Obtains a backend JWT for a managed-service host and prints it to stdout:
//! 1. Loads config (file, env, CLI flags)
//! 2. Resolves the host's IdP endpoints
//! 3. Logs in through the browser or device flow
//! 4. Exchanges the IdP token for the JWT

mod config;

use anyhow::{Context, Result, bail};
use cloud_auth::{EndpointResolver, HttpSettings};
use jwt_provider::{Console, JwtProvider, ProviderOptions, create_jwt_provider_with};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, flag_value};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    // stdout carries only the JWT
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let source = Config::resolve_path(flag_value(&args, "--config"));
    info!(path = %source.path.display(), explicit = source.explicit, "loading configuration");

    let config = Config::load(&source, &args)
        .with_context(|| format!("failed to load config from {}", source.path.display()))?;
    let auth = &config.auth;
    if auth.host.is_empty() {
        bail!("no host configured; pass --host or set CLOUD_HOST");
    }

    info!(
        host = %auth.host,
        login_mode = ?auth.login_mode,
        extra_endpoints = config.endpoints.len(),
        "configuration loaded"
    );

    let options = ProviderOptions {
        login_mode: auth.login_mode,
        login_timeout: auth.login_timeout(),
        callback_port: auth.callback_port,
        http: HttpSettings {
            timeout: auth.http_timeout(),
            ..HttpSettings::default()
        },
        resolver: EndpointResolver::builtin().with_entries(config.endpoint_entries()),
        ..ProviderOptions::default()
    };

    let provider = create_jwt_provider_with(
        &auth.auth_url,
        &auth.client_id,
        &auth.host,
        options,
        Console::stderr(),
    )
    .context("failed to set up the JWT provider")?;
    let Some(mut provider) = provider else {
        bail!("host {} does not use managed authentication", auth.host);
    };

    info!(flow = provider.id(), "requesting JWT");
    let jwt = provider.get_jwt().await;
    if jwt.is_empty() {
        bail!("could not obtain a JWT for {}", auth.host);
    }

    println!("{jwt}");
    Ok(())
}
