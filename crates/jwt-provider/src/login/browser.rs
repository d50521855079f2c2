//! Interactive login: authorization code + PKCE with a loopback redirect
//!
//! A short-lived axum listener on 127.0.0.1 receives the IdP redirect. The
//! first callback ends the wait, whatever it carries; the listener is shut
//! down before the code is exchanged.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use cloud_auth::{
    CALLBACK_PATH, TokenResponse, build_authorization_url, compute_challenge, exchange_code,
    generate_verifier,
};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::LoginContext;
use crate::error::{Error, Result};

const SUCCESS_PAGE: &str =
    "<html><body><h3>Login complete.</h3><p>You can close this window.</p></body></html>";
const FAILURE_PAGE: &str =
    "<html><body><h3>Login failed.</h3><p>Return to the terminal for details.</p></body></html>";

/// How long to wait for the callback listener to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct BrowserLogin {
    /// Loopback port for the redirect; `0` picks a free one
    pub callback_port: u16,
}

impl BrowserLogin {
    pub fn new(callback_port: u16) -> Self {
        Self { callback_port }
    }

    pub(crate) async fn run(&self, ctx: LoginContext<'_>) -> Result<TokenResponse> {
        let listener =
            TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, self.callback_port)))
                .await
                .map_err(|e| Error::Callback(format!("cannot listen on loopback: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| Error::Callback(format!("cannot read listener address: {e}")))?
            .port();
        // Literal loopback address: the listener is IPv4 only.
        let redirect_uri = format!("http://{}:{port}{CALLBACK_PATH}", Ipv4Addr::LOCALHOST);

        let verifier = generate_verifier();
        let challenge = compute_challenge(&verifier);
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = build_authorization_url(
            ctx.auth_url,
            ctx.client_id,
            &redirect_uri,
            &state,
            &challenge,
        )?;

        let (callback_tx, mut callback_rx) = mpsc::channel::<HashMap<String, String>>(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = Router::new()
            .route(CALLBACK_PATH, get(callback_handler))
            .with_state(callback_tx);
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        info!(port, "login callback listener started");

        ctx.console.progress(format!("To log in, open: {url}"));
        if ctx.browser.open(&url) {
            ctx.console.progress("Opened the login page in your browser.");
        } else {
            ctx.console.progress("Could not open a browser; open the URL above to continue.");
        }

        let received = tokio::time::timeout(ctx.timeout, callback_rx.recv()).await;

        let _ = shutdown_tx.send(());
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
            debug!("callback listener did not stop in time, aborting");
            server.abort();
        }

        let params = match received {
            Ok(Some(params)) => params,
            Ok(None) => return Err(Error::Callback("listener closed before redirect".into())),
            Err(_) => return Err(Error::LoginTimeout(ctx.timeout)),
        };

        // A denial is only trusted from a redirect that carries our state.
        if params.get("state") != Some(&state) {
            warn!("login callback state mismatch");
            return Err(Error::StateMismatch);
        }
        if let Some(error) = params.get("error") {
            let detail = match params.get("error_description") {
                Some(description) => format!("{error}: {description}"),
                None => error.clone(),
            };
            return Err(cloud_auth::Error::AuthorizationDenied(detail).into());
        }
        let code = params
            .get("code")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Callback("redirect carried no authorization code".into()))?;

        Ok(exchange_code(
            ctx.client,
            ctx.auth_url,
            ctx.client_id,
            code,
            &verifier,
            &redirect_uri,
        )
        .await?)
    }
}

async fn callback_handler(
    State(callback_tx): State<mpsc::Sender<HashMap<String, String>>>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    let page = if params.contains_key("error") || !params.contains_key("code") {
        FAILURE_PAGE
    } else {
        SUCCESS_PAGE
    };
    // Later callbacks find the channel full or closed; only the first counts.
    let _ = callback_tx.try_send(params);
    Html(page)
}
