//! Managed-service JWT provider and its lifecycle state machine

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use cloud_auth::{AuthEndpoints, exchange_for_jwt, jwt_expiry};
use tracing::{debug, info, warn};

use crate::JwtProvider;
use crate::browser::{Browser, SystemBrowser};
use crate::clock::{Clock, SystemClock};
use crate::console::Console;
use crate::error::{Error, Result};
use crate::login::{LoginContext, LoginFlow};
use crate::metrics::{EXCHANGE, LOGIN, REFRESH, record_flow};
use crate::state::{IdpTokens, Phase, TokenState};

/// Default bound on waiting for the user to finish logging in.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

/// JWT provider for one connection context.
///
/// Not meant for concurrent use: `get_jwt` takes `&mut self` and may block
/// on the network and on the user for up to the login timeout.
pub struct CloudJwtProvider {
    endpoints: AuthEndpoints,
    login: LoginFlow,
    login_timeout: Duration,
    client: reqwest::Client,
    browser: Arc<dyn Browser>,
    clock: Arc<dyn Clock>,
    console: Console,
    state: TokenState,
}

impl CloudJwtProvider {
    pub fn with_http_client(
        endpoints: AuthEndpoints,
        login: LoginFlow,
        console: Console,
        client: reqwest::Client,
    ) -> Self {
        Self {
            endpoints,
            login,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            client,
            browser: Arc::new(SystemBrowser),
            clock: Arc::new(SystemClock),
            console,
            state: TokenState::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_browser(mut self, browser: Arc<dyn Browser>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn token_state(&self) -> &TokenState {
        &self.state
    }

    /// Run the interactive login. On failure the token state is untouched
    /// and the reason goes to the error console.
    pub async fn initial_login(&mut self) -> bool {
        match self.login_session().await {
            Ok(()) => true,
            Err(e) => {
                self.console.error(format!("Login failed: {e}"));
                false
            }
        }
    }

    /// Renew the IdP access token with the stored refresh token. On failure
    /// the token state is untouched.
    pub async fn refresh_idp_access_token(&mut self) -> bool {
        match self.refresh_session().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "refresh failed");
                false
            }
        }
    }

    /// Valid JWT or empty string; see the crate docs for the state machine.
    pub async fn get_jwt(&mut self) -> String {
        match self.current_jwt().await {
            Ok(jwt) => jwt,
            Err(e) => {
                warn!(provider = self.login.id(), error = %e, "could not obtain backend JWT");
                self.console.error(format!("Authentication failed: {e}"));
                self.state.reset();
                String::new()
            }
        }
    }

    async fn current_jwt(&mut self) -> Result<String> {
        if let Some(jwt) = self.state.valid_jwt(self.clock.now_millis()) {
            debug!("using cached backend JWT");
            return Ok(jwt.to_owned());
        }

        self.ensure_idp_session().await?;

        let outcome = exchange_for_jwt(
            &self.client,
            &self.endpoints.api_host,
            self.state.idp_access_token(),
        )
        .await
        .map_err(Error::from)
        .and_then(|jwt| {
            let expires_at = jwt_expiry(&jwt);
            if expires_at <= self.clock.now_millis() {
                Err(Error::JwtExpired)
            } else {
                Ok((jwt, expires_at))
            }
        });
        record_flow(EXCHANGE, outcome.is_ok());
        let (jwt, expires_at) = outcome?;

        info!(expires_at, "obtained backend JWT");
        self.state.cache_jwt(jwt.clone(), expires_at);
        Ok(jwt)
    }

    async fn ensure_idp_session(&mut self) -> Result<()> {
        match self.state.phase(self.clock.now_millis()) {
            Phase::IdpAuthenticated => Ok(()),
            Phase::Uninitialized => self.login_session().await,
            Phase::IdpExpired => match self.refresh_session().await {
                Ok(()) => Ok(()),
                Err(e) => {
                    warn!(error = %e, "IdP session refresh failed, falling back to login");
                    self.console.progress("Your session has expired; starting a new login.");
                    self.login_session().await
                }
            },
        }
    }

    async fn login_session(&mut self) -> Result<()> {
        let ctx = LoginContext {
            client: &self.client,
            auth_url: &self.endpoints.auth_url,
            client_id: &self.endpoints.client_id,
            timeout: self.login_timeout,
            console: &mut self.console,
            browser: self.browser.as_ref(),
        };
        // `expires_in` counts from issuance, which is after the user's wait.
        let outcome = match self.login.run(ctx).await {
            Ok(response) => IdpTokens::from_response(response, self.clock.now_millis()),
            Err(e) => Err(e),
        };
        record_flow(LOGIN, outcome.is_ok());

        let tokens = outcome?;
        info!(
            provider = self.login.id(),
            expires_at = tokens.expires_at(),
            "IdP login succeeded"
        );
        self.state.apply_login(tokens);
        Ok(())
    }

    async fn refresh_session(&mut self) -> Result<()> {
        if self.state.idp_refresh_token().is_empty() {
            return Err(Error::MissingRefreshToken);
        }

        let outcome = match cloud_auth::refresh_token(
            &self.client,
            &self.endpoints.auth_url,
            &self.endpoints.client_id,
            self.state.idp_refresh_token(),
        )
        .await
        {
            Ok(response) => IdpTokens::from_response(response, self.clock.now_millis()),
            Err(e) => Err(e.into()),
        };
        record_flow(REFRESH, outcome.is_ok());

        let tokens = outcome?;
        info!(expires_at = tokens.expires_at(), "IdP access token refreshed");
        self.state.apply_refresh(tokens);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn with_state(mut self, state: TokenState) -> Self {
        self.state = state;
        self
    }
}

impl JwtProvider for CloudJwtProvider {
    fn id(&self) -> &str {
        self.login.id()
    }

    fn get_jwt(&mut self) -> Pin<Box<dyn Future<Output = String> + Send + '_>> {
        Box::pin(CloudJwtProvider::get_jwt(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::login::{BrowserLogin, DeviceLogin};
    use crate::test_support::{
        RecordingBrowser, RedirectingBrowser, SharedBuffer, SlowUserBrowser, capture_console,
        make_jwt,
    };
    use cloud_auth::{DEVICE_CODE_GRANT_TYPE, TokenResponse};
    use mockito::{Matcher, Mock, ServerGuard};

    /// Scenario epoch (unix millis).
    const T0: u64 = 1_700_000_000_000;

    fn secs(millis: u64) -> u64 {
        millis / 1000
    }

    struct Harness {
        server: ServerGuard,
        clock: Arc<ManualClock>,
        out: SharedBuffer,
        err: SharedBuffer,
    }

    impl Harness {
        async fn new() -> Self {
            Self {
                server: mockito::Server::new_async().await,
                clock: Arc::new(ManualClock::new(T0)),
                out: SharedBuffer::default(),
                err: SharedBuffer::default(),
            }
        }

        fn provider(&mut self, login: LoginFlow) -> CloudJwtProvider {
            let (console, out, err) = capture_console();
            self.out = out;
            self.err = err;
            let endpoints = AuthEndpoints {
                auth_url: self.server.url(),
                client_id: "client-test".into(),
                api_host: self.server.url(),
            };
            CloudJwtProvider::with_http_client(endpoints, login, console, reqwest::Client::new())
                .with_clock(self.clock.clone())
                .with_browser(Arc::new(RecordingBrowser::default()))
                .with_login_timeout(Duration::from_secs(5))
        }

        fn device_provider(&mut self) -> CloudJwtProvider {
            self.provider(LoginFlow::Device(
                DeviceLogin::new(false).with_min_interval(Duration::ZERO),
            ))
        }

        async fn mock_device_code(&mut self, hits: usize) -> Mock {
            self.server
                .mock("POST", "/oauth/device/code")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"device_code":"dc-1","user_code":"WDJB-MJHT","verification_uri":"https://idp.example/activate","expires_in":900,"interval":0}"#)
                .expect(hits)
                .create_async()
                .await
        }

        async fn mock_device_grant(&mut self, access: &str, refresh: &str, hits: usize) -> Mock {
            self.server
                .mock("POST", "/oauth/token")
                .match_body(Matcher::UrlEncoded(
                    "grant_type".into(),
                    DEVICE_CODE_GRANT_TYPE.into(),
                ))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(format!(
                    r#"{{"access_token":"{access}","refresh_token":"{refresh}","expires_in":3600}}"#
                ))
                .expect(hits)
                .create_async()
                .await
        }

        async fn mock_refresh(
            &mut self,
            refresh: &str,
            status: usize,
            body: &str,
            hits: usize,
        ) -> Mock {
            self.server
                .mock("POST", "/oauth/token")
                .match_body(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                    Matcher::UrlEncoded("refresh_token".into(), refresh.into()),
                ]))
                .with_status(status)
                .with_header("content-type", "application/json")
                .with_body(body)
                .expect(hits)
                .create_async()
                .await
        }

        async fn mock_exchange(&mut self, access: &str, jwt: &str, hits: usize) -> Mock {
            self.server
                .mock("POST", "/v1/jwt")
                .match_header("authorization", format!("Bearer {access}").as_str())
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(format!(r#"{{"token":"{jwt}"}}"#))
                .expect(hits)
                .create_async()
                .await
        }
    }

    /// Session with access token `at_old` that expired at T0 and refresh token `rt_old`.
    fn expired_session() -> TokenState {
        let mut state = TokenState::default();
        let tokens = IdpTokens::from_response(
            TokenResponse {
                access_token: "at_old".into(),
                refresh_token: Some("rt_old".into()),
                expires_in: Some(3600),
                token_type: None,
            },
            T0 - 3_600_000,
        )
        .unwrap();
        state.apply_login(tokens);
        state
    }

    fn valid_session(access: &str, expires_at: u64) -> TokenState {
        let mut state = TokenState::default();
        let tokens = IdpTokens::from_response(
            TokenResponse {
                access_token: access.into(),
                refresh_token: None,
                expires_in: Some((expires_at - T0) / 1000),
                token_type: None,
            },
            T0,
        )
        .unwrap();
        state.apply_login(tokens);
        state
    }

    #[tokio::test]
    async fn login_then_cache_then_exchange_only() {
        let mut h = Harness::new().await;
        let device_code = h.mock_device_code(1).await;
        let device_grant = h.mock_device_grant("at_1", "rt_1", 1).await;
        let j1 = make_jwt(Some(secs(T0) + 300), "j1");
        let first_exchange = h.mock_exchange("at_1", &j1, 1).await;
        let mut provider = h.device_provider();

        // t=0: login + exchange
        assert_eq!(provider.get_jwt().await, j1);
        assert_eq!(
            provider.token_state().idp_access_token_expires_at(),
            T0 + 3_600_000
        );

        // t=100s: served from cache
        h.clock.advance(Duration::from_secs(100));
        assert_eq!(provider.get_jwt().await, j1);
        first_exchange.assert_async().await;
        first_exchange.remove_async().await;

        // t=400s: JWT expired, IdP token still valid → exchange only
        let j2 = make_jwt(Some(secs(T0) + 700), "j2");
        let second_exchange = h.mock_exchange("at_1", &j2, 1).await;
        h.clock.set(T0 + 400_000);
        let jwt = provider.get_jwt().await;
        assert_eq!(jwt, j2);
        assert_ne!(jwt, j1);

        second_exchange.assert_async().await;
        device_code.assert_async().await;
        device_grant.assert_async().await;
        assert!(h.out.contents().contains("WDJB-MJHT"));
        assert!(h.err.contents().is_empty(), "got: {}", h.err.contents());
    }

    #[tokio::test]
    async fn valid_idp_token_goes_straight_to_exchange() {
        let mut h = Harness::new().await;
        let device_code = h.mock_device_code(0).await;
        let any_token_call = h
            .server
            .mock("POST", "/oauth/token")
            .expect(0)
            .create_async()
            .await;
        let jwt = make_jwt(Some(secs(T0) + 300), "j");
        let exchange = h.mock_exchange("at_live", &jwt, 1).await;
        let mut provider = h
            .device_provider()
            .with_state(valid_session("at_live", T0 + 1_000_000));

        assert_eq!(provider.get_jwt().await, jwt);
        exchange.assert_async().await;
        device_code.assert_async().await;
        any_token_call.assert_async().await;
    }

    #[tokio::test]
    async fn expired_idp_token_is_refreshed_not_relogged() {
        let mut h = Harness::new().await;
        let device_code = h.mock_device_code(0).await;
        let refresh = h
            .mock_refresh(
                "rt_old",
                200,
                r#"{"access_token":"at_new","expires_in":3600}"#,
                1,
            )
            .await;
        h.clock.set(T0 + 100_000);
        let jwt = make_jwt(Some(secs(T0) + 400), "j");
        let exchange = h.mock_exchange("at_new", &jwt, 1).await;
        let mut provider = h.device_provider().with_state(expired_session());

        assert_eq!(provider.get_jwt().await, jwt);
        refresh.assert_async().await;
        exchange.assert_async().await;
        device_code.assert_async().await;

        let state = provider.token_state();
        assert_eq!(state.idp_access_token(), "at_new");
        assert_eq!(state.idp_refresh_token(), "rt_old", "unrotated refresh token kept");
        assert!(state.idp_access_token_expires_at() > T0 + 100_000);
    }

    #[tokio::test]
    async fn idp_expiry_at_3700s_refreshes_then_exchanges() {
        let mut h = Harness::new().await;
        let device_code = h.mock_device_code(1).await;
        let _m = h.mock_device_grant("at_1", "rt_1", 1).await;
        let j1 = make_jwt(Some(secs(T0) + 300), "j1");
        let _m = h.mock_exchange("at_1", &j1, 1).await;
        let mut provider = h.device_provider();
        assert_eq!(provider.get_jwt().await, j1);

        h.clock.set(T0 + 3_700_000);
        let refresh = h
            .mock_refresh(
                "rt_1",
                200,
                r#"{"access_token":"at_2","refresh_token":"rt_2","expires_in":3600}"#,
                1,
            )
            .await;
        let j2 = make_jwt(Some(secs(T0) + 4_000), "j2");
        let exchange = h.mock_exchange("at_2", &j2, 1).await;

        assert_eq!(provider.get_jwt().await, j2);
        refresh.assert_async().await;
        exchange.assert_async().await;
        device_code.assert_async().await;
        assert_eq!(provider.token_state().idp_refresh_token(), "rt_2");
    }

    #[tokio::test]
    async fn invalid_grant_falls_back_to_login_in_same_call() {
        let mut h = Harness::new().await;
        let refresh = h
            .mock_refresh(
                "rt_old",
                400,
                r#"{"error":"invalid_grant","error_description":"Unknown or invalid refresh token."}"#,
                1,
            )
            .await;
        let device_code = h.mock_device_code(1).await;
        let device_grant = h.mock_device_grant("at_fresh", "rt_fresh", 1).await;
        let jwt = make_jwt(Some(secs(T0) + 300), "j");
        let exchange = h.mock_exchange("at_fresh", &jwt, 1).await;
        let mut provider = h.device_provider().with_state(expired_session());

        assert_eq!(provider.get_jwt().await, jwt);
        refresh.assert_async().await;
        device_code.assert_async().await;
        device_grant.assert_async().await;
        exchange.assert_async().await;
        assert!(h.out.contents().contains("starting a new login"));
        assert_eq!(provider.token_state().idp_refresh_token(), "rt_fresh");
    }

    #[tokio::test]
    async fn failed_login_leaves_prior_state_untouched() {
        let mut h = Harness::new().await;
        let _m = h
            .server
            .mock("POST", "/oauth/device/code")
            .with_status(500)
            .with_body("idp down")
            .create_async()
            .await;
        let before = expired_session();
        let mut provider = h.device_provider().with_state(before.clone());

        assert!(!provider.initial_login().await);
        assert_eq!(provider.token_state(), &before);
        assert!(h.err.contents().starts_with("Login failed:"));
    }

    #[tokio::test]
    async fn login_with_unusable_expiry_fails_without_writing() {
        let mut h = Harness::new().await;
        let _m = h.mock_device_code(1).await;
        let _m = h
            .server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"opaque","refresh_token":"rt"}"#)
            .create_async()
            .await;
        let mut provider = h.device_provider();

        assert!(!provider.initial_login().await);
        assert_eq!(provider.token_state(), &TokenState::default());
    }

    #[tokio::test]
    async fn failed_refresh_leaves_state_untouched() {
        let mut h = Harness::new().await;
        let _m = h.mock_refresh("rt_old", 503, r#"{"error":"temporarily_unavailable"}"#, 1)
            .await;
        let before = expired_session();
        let mut provider = h.device_provider().with_state(before.clone());

        assert!(!provider.refresh_idp_access_token().await);
        assert_eq!(provider.token_state(), &before);
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_skips_network() {
        let mut h = Harness::new().await;
        let token_calls = h
            .server
            .mock("POST", "/oauth/token")
            .expect(0)
            .create_async()
            .await;
        let mut provider = h.device_provider();

        assert!(!provider.refresh_idp_access_token().await);
        token_calls.assert_async().await;
    }

    #[tokio::test]
    async fn failure_returns_empty_and_resets() {
        let mut h = Harness::new().await;
        let _m = h.mock_refresh("rt_old", 401, r#"{"error":"invalid_grant"}"#, 1)
            .await;
        let _m = h
            .server
            .mock("POST", "/oauth/device/code")
            .with_status(500)
            .create_async()
            .await;
        let mut provider = h.device_provider().with_state(expired_session());

        assert_eq!(provider.get_jwt().await, "");
        assert_eq!(provider.token_state().phase(T0), Phase::Uninitialized);
        assert!(
            h.err.contents().starts_with("Authentication failed:"),
            "got: {}",
            h.err.contents()
        );
    }

    #[tokio::test]
    async fn next_call_after_failure_starts_from_scratch() {
        let mut h = Harness::new().await;
        let broken = h
            .server
            .mock("POST", "/v1/jwt")
            .with_status(502)
            .expect(1)
            .create_async()
            .await;
        let mut provider = h
            .device_provider()
            .with_state(valid_session("at_live", T0 + 1_000_000));
        assert_eq!(provider.get_jwt().await, "");
        broken.assert_async().await;
        broken.remove_async().await;

        let device_code = h.mock_device_code(1).await;
        let _m = h.mock_device_grant("at_again", "rt_again", 1).await;
        let jwt = make_jwt(Some(secs(T0) + 300), "j");
        let _m = h.mock_exchange("at_again", &jwt, 1).await;

        assert_eq!(provider.get_jwt().await, jwt);
        device_code.assert_async().await;
    }

    #[tokio::test]
    async fn expired_backend_jwt_is_never_returned() {
        let mut h = Harness::new().await;
        let stale = make_jwt(Some(secs(T0) - 10), "stale");
        let _m = h.mock_exchange("at_live", &stale, 1).await;
        let mut provider = h
            .device_provider()
            .with_state(valid_session("at_live", T0 + 1_000_000));

        assert_eq!(provider.get_jwt().await, "");
        assert!(provider.token_state().jwt().is_none());
    }

    #[tokio::test]
    async fn backend_jwt_without_exp_is_never_returned() {
        let mut h = Harness::new().await;
        let unbounded = make_jwt(None, "forever");
        let _m = h.mock_exchange("at_live", &unbounded, 1).await;
        let mut provider = h
            .device_provider()
            .with_state(valid_session("at_live", T0 + 1_000_000));

        assert_eq!(provider.get_jwt().await, "");
    }

    #[tokio::test]
    async fn device_login_gives_up_at_timeout() {
        let mut h = Harness::new().await;
        let _m = h
            .server
            .mock("POST", "/oauth/device/code")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"device_code":"dc","user_code":"UC","verification_uri":"https://idp.example/activate","expires_in":900,"interval":1}"#)
            .create_async()
            .await;
        let _m = h
            .server
            .mock("POST", "/oauth/token")
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"authorization_pending"}"#)
            .create_async()
            .await;
        let mut provider = h
            .device_provider()
            .with_login_timeout(Duration::from_secs(2));

        let started = std::time::Instant::now();
        assert!(!provider.initial_login().await);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(h.err.contents().contains("did not complete within 2s"));
    }

    #[tokio::test]
    async fn browser_login_completes_through_loopback_redirect() {
        let mut h = Harness::new().await;
        let code_exchange = h
            .server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "code-42".into()),
                Matcher::UrlEncoded("client_id".into(), "client-test".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"at_browser","refresh_token":"rt_browser","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;
        let mut provider = h
            .provider(LoginFlow::Browser(BrowserLogin::new(0)))
            .with_browser(Arc::new(RedirectingBrowser::approving("code-42")));

        assert!(provider.initial_login().await);
        code_exchange.assert_async().await;
        assert_eq!(provider.token_state().idp_access_token(), "at_browser");
        assert_eq!(provider.token_state().idp_refresh_token(), "rt_browser");
        assert!(h.out.contents().contains("/authorize?"));
    }

    #[tokio::test]
    async fn browser_login_rejects_forged_state() {
        let mut h = Harness::new().await;
        let code_exchange = h
            .server
            .mock("POST", "/oauth/token")
            .expect(0)
            .create_async()
            .await;
        let mut provider = h
            .provider(LoginFlow::Browser(BrowserLogin::new(0)))
            .with_browser(Arc::new(
                RedirectingBrowser::approving("code-42").with_state("attacker"),
            ));

        assert!(!provider.initial_login().await);
        code_exchange.assert_async().await;
        assert_eq!(provider.token_state(), &TokenState::default());
        assert!(h.err.contents().contains("unexpected state"));
    }

    #[tokio::test]
    async fn browser_launch_failure_still_prints_url_and_times_out() {
        let mut h = Harness::new().await;
        let browser = Arc::new(RecordingBrowser {
            opened: Default::default(),
            succeeds: false,
        });
        let mut provider = h
            .provider(LoginFlow::Browser(BrowserLogin::new(0)))
            .with_browser(browser.clone())
            .with_login_timeout(Duration::from_millis(300));

        assert!(!provider.initial_login().await);
        let opened = browser.opened.lock().unwrap().clone();
        assert_eq!(opened.len(), 1);
        let out = h.out.contents();
        assert!(out.contains(&opened[0]), "printed URL must match: {out}");
        assert!(out.contains("Could not open a browser"));
        assert!(h.err.contents().contains("did not complete"));
    }

    #[tokio::test]
    async fn trait_object_delegates_to_state_machine() {
        let mut h = Harness::new().await;
        let jwt = make_jwt(Some(secs(T0) + 300), "j");
        let _m = h.mock_exchange("at_live", &jwt, 1).await;
        let mut provider: Box<dyn JwtProvider> = Box::new(
            h.device_provider()
                .with_state(valid_session("at_live", T0 + 1_000_000)),
        );

        assert_eq!(provider.id(), "device");
        assert_eq!(provider.get_jwt().await, jwt);
    }

    #[tokio::test]
    async fn login_expiry_counts_from_token_issuance() {
        let mut h = Harness::new().await;
        let _m = h.mock_device_code(1).await;
        let _m = h.mock_device_grant("at_slow", "rt_slow", 1).await;
        let clock = h.clock.clone();
        let mut provider = h
            .provider(LoginFlow::Device(
                DeviceLogin::new(true).with_min_interval(Duration::ZERO),
            ))
            .with_browser(Arc::new(SlowUserBrowser {
                clock,
                by: Duration::from_secs(240),
            }));

        assert!(provider.initial_login().await);
        assert_eq!(
            provider.token_state().idp_access_token_expires_at(),
            T0 + 240_000 + 3_600_000
        );
    }

    #[tokio::test]
    async fn browser_login_declined_by_user() {
        let mut h = Harness::new().await;
        let token_calls = h
            .server
            .mock("POST", "/oauth/token")
            .expect(0)
            .create_async()
            .await;
        let before = expired_session();
        let mut provider = h
            .provider(LoginFlow::Browser(BrowserLogin::new(0)))
            .with_state(before.clone())
            .with_browser(Arc::new(RedirectingBrowser::declining(
                "access_denied",
                "User cancelled the login",
            )));

        assert!(!provider.initial_login().await);
        token_calls.assert_async().await;
        assert_eq!(provider.token_state(), &before);
        let err = h.err.contents();
        assert!(err.contains("authorization denied"), "got: {err}");
        assert!(err.contains("User cancelled the login"), "got: {err}");
    }

    #[tokio::test]
    async fn denial_with_foreign_state_is_a_state_mismatch() {
        let mut h = Harness::new().await;
        let mut provider = h
            .provider(LoginFlow::Browser(BrowserLogin::new(0)))
            .with_browser(Arc::new(
                RedirectingBrowser::declining("access_denied", "injected").with_state("attacker"),
            ));

        assert!(!provider.initial_login().await);
        let err = h.err.contents();
        assert!(err.contains("unexpected state"), "got: {err}");
        assert!(!err.contains("injected"), "got: {err}");
    }

    #[tokio::test]
    async fn browser_redirect_targets_literal_loopback() {
        let mut h = Harness::new().await;
        let browser = Arc::new(RecordingBrowser::default());
        let mut provider = h
            .provider(LoginFlow::Browser(BrowserLogin::new(0)))
            .with_browser(browser.clone())
            .with_login_timeout(Duration::from_millis(100));

        assert!(!provider.initial_login().await);
        let opened = browser.opened.lock().unwrap().clone();
        let url = reqwest::Url::parse(&opened[0]).unwrap();
        let redirect = url
            .query_pairs()
            .find(|(k, _)| k == "redirect_uri")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(redirect.starts_with("http://127.0.0.1:"), "got: {redirect}");
        assert!(redirect.ends_with("/callback"), "got: {redirect}");
    }
}
