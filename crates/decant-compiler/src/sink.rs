//! Logging sink
//!
//! The compiler reports through an explicit sink handed to it at
//! construction rather than any process-wide logger. The default sink
//! discards everything; `TracingSink` forwards to `tracing`.

use std::fmt;

/// Message severity as seen by the surrounding system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => write!(f, "info"),
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
        }
    }
}

/// Where compiler messages go. Warnings never alter semantics.
pub trait LogSink {
    fn log(&self, level: Level, source: &str, message: &str);
}

/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: Level, _source: &str, _message: &str) {}
}

/// Forwards messages to the `tracing` ecosystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, source: &str, message: &str) {
        match level {
            Level::Info => tracing::info!(source, "{message}"),
            Level::Warning => tracing::warn!(source, "{message}"),
            Level::Error => tracing::error!(source, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Capture(RefCell<Vec<(Level, String)>>);

    impl LogSink for Capture {
        fn log(&self, level: Level, _source: &str, message: &str) {
            self.0.borrow_mut().push((level, message.to_string()));
        }
    }

    #[test]
    fn test_sink_receives_messages() {
        let sink = Capture(RefCell::new(Vec::new()));
        sink.log(Level::Warning, "compiler", "solubility unknown");
        let seen = sink.0.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, Level::Warning);
    }
}
