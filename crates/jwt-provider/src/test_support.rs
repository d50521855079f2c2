//! Shared fixtures for provider tests

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::browser::Browser;
use crate::clock::ManualClock;
use crate::console::Console;

/// Clonable in-memory sink.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Console whose progress and error lines can be read back.
pub fn capture_console() -> (Console, SharedBuffer, SharedBuffer) {
    let out = SharedBuffer::default();
    let err = SharedBuffer::default();
    let console = Console::new(Box::new(out.clone()), Box::new(err.clone()));
    (console, out, err)
}

/// Unsigned compact JWT with an optional `exp` (unix seconds). `tag` lands in
/// the `jti` claim so tokens with the same expiry still differ.
pub fn make_jwt(exp: Option<u64>, tag: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let claims = match exp {
        Some(exp) => serde_json::json!({ "sub": "user-1", "jti": tag, "exp": exp }),
        None => serde_json::json!({ "sub": "user-1", "jti": tag }),
    };
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Records opened URLs and reports a fixed outcome.
#[derive(Default)]
pub struct RecordingBrowser {
    pub opened: Mutex<Vec<String>>,
    pub succeeds: bool,
}

impl Browser for RecordingBrowser {
    fn open(&self, url: &str) -> bool {
        self.opened.lock().unwrap().push(url.to_owned());
        self.succeeds
    }
}

/// Plays the user: follows the authorization URL's redirect straight back to
/// the loopback listener with the configured query.
pub struct RedirectingBrowser {
    query: Vec<(String, String)>,
    state_override: Option<String>,
}

impl RedirectingBrowser {
    /// User approves; the IdP redirects with `code`.
    pub fn approving(code: &str) -> Self {
        Self {
            query: vec![("code".into(), code.into())],
            state_override: None,
        }
    }

    /// User declines; the IdP redirects with an OAuth error.
    pub fn declining(error: &str, description: &str) -> Self {
        Self {
            query: vec![
                ("error".into(), error.into()),
                ("error_description".into(), description.into()),
            ],
            state_override: None,
        }
    }

    /// Echo `state` instead of the one in the authorization URL.
    pub fn with_state(mut self, state: &str) -> Self {
        self.state_override = Some(state.into());
        self
    }
}

impl Browser for RedirectingBrowser {
    fn open(&self, url: &str) -> bool {
        let parsed = reqwest::Url::parse(url).unwrap();
        let mut redirect_uri = None;
        let mut state = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "redirect_uri" => redirect_uri = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                _ => {}
            }
        }
        let state = self.state_override.clone().or(state).unwrap();
        let mut callback = reqwest::Url::parse(&redirect_uri.unwrap()).unwrap();
        {
            let mut pairs = callback.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("state", &state);
        }

        tokio::spawn(async move {
            let _ = reqwest::get(callback.as_str()).await;
        });
        true
    }
}

/// Stands in for a user who takes `by` to finish logging in.
pub struct SlowUserBrowser {
    pub clock: Arc<ManualClock>,
    pub by: Duration,
}

impl Browser for SlowUserBrowser {
    fn open(&self, _url: &str) -> bool {
        self.clock.advance(self.by);
        true
    }
}
