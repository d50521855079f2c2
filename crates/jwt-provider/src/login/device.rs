//! Headless login via the device authorization grant

use std::time::Duration;

use cloud_auth::{DevicePoll, TokenResponse, poll_device_token, request_device_code};
use tokio::time::Instant;
use tracing::{debug, info};

use super::LoginContext;
use crate::error::{Error, Result};

/// Extra delay the IdP asks for with `slow_down` (RFC 8628 section 3.5).
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Floor on the poll interval, whatever the IdP advertises.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct DeviceLogin {
    /// Also try to open the verification page locally
    pub open_browser: bool,
    min_interval: Duration,
}

impl DeviceLogin {
    pub fn new(open_browser: bool) -> Self {
        Self {
            open_browser,
            min_interval: MIN_POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub(crate) async fn run(&self, ctx: LoginContext<'_>) -> Result<TokenResponse> {
        let authorization = request_device_code(ctx.client, ctx.auth_url, ctx.client_id).await?;

        ctx.console.progress(format!(
            "To log in, open {} and enter the code {}",
            authorization.verification_uri, authorization.user_code
        ));
        if self.open_browser && ctx.browser.open(authorization.browser_url()) {
            ctx.console.progress("Opened the verification page in your browser.");
        }

        let budget = Duration::from_secs(authorization.expires_in).min(ctx.timeout);
        let deadline = Instant::now() + budget;
        let mut interval = Duration::from_secs(authorization.interval).max(self.min_interval);
        info!(
            budget_secs = budget.as_secs(),
            interval_secs = interval.as_secs(),
            "waiting for device login"
        );

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::LoginTimeout(budget));
            }
            tokio::time::sleep(interval.min(deadline - now)).await;

            match poll_device_token(
                ctx.client,
                ctx.auth_url,
                ctx.client_id,
                &authorization.device_code,
            )
            .await?
            {
                DevicePoll::Complete(tokens) => return Ok(tokens),
                DevicePoll::Pending => debug!("device login still pending"),
                DevicePoll::SlowDown => {
                    interval += SLOW_DOWN_STEP;
                    debug!(interval_secs = interval.as_secs(), "IdP asked to slow down");
                }
            }
        }
    }
}
