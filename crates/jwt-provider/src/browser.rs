//! Best-effort browser launching
//!
//! Failing to open a browser never fails a login: the URL is always printed
//! first, so the user can open it by hand.

use tracing::{debug, warn};

pub trait Browser: Send + Sync {
    /// Try to open `url`; `false` when no browser could be launched.
    fn open(&self, url: &str) -> bool;
}

/// Opens URLs with the platform handler (`xdg-open`, `open`, `start`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> bool {
        match open::that_detached(url) {
            Ok(()) => {
                debug!("launched system browser");
                true
            }
            Err(e) => {
                warn!(error = %e, "could not launch system browser");
                false
            }
        }
    }
}

/// For headless environments: never opens anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBrowser;

impl Browser for NoBrowser {
    fn open(&self, _url: &str) -> bool {
        false
    }
}
