//! Flow outcome counters
//!
//! - `jwt_provider_flows_total` (counter): labels `flow` (login, refresh,
//!   exchange) and `outcome` (success, failure)
//!
//! Calls are no-ops until the host process installs a recorder.

pub const LOGIN: &str = "login";
pub const REFRESH: &str = "refresh";
pub const EXCHANGE: &str = "exchange";

pub fn record_flow(flow: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("jwt_provider_flows_total", "flow" => flow, "outcome" => outcome)
        .increment(1);
}
