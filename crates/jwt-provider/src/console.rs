//! User-facing progress and error lines
//!
//! Two text sinks: `out` for progress ("open this URL to log in") and `err`
//! for diagnostics. Each message is one line. Write failures are logged and
//! otherwise ignored.

use std::fmt::Display;
use std::io::Write;

use tracing::debug;

pub struct Console {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
}

impl Console {
    pub fn new(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self { out, err }
    }

    /// Both sinks on stderr, leaving stdout for the produced token.
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()), Box::new(std::io::stderr()))
    }

    /// Discard everything.
    pub fn sink() -> Self {
        Self::new(Box::new(std::io::sink()), Box::new(std::io::sink()))
    }

    pub fn progress(&mut self, message: impl Display) {
        write_line(&mut self.out, message);
    }

    pub fn error(&mut self, message: impl Display) {
        write_line(&mut self.err, message);
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Console")
    }
}

fn write_line(sink: &mut Box<dyn Write + Send>, message: impl Display) {
    if let Err(e) = writeln!(sink, "{message}").and_then(|()| sink.flush()) {
        debug!(error = %e, "console write failed");
    }
}
