// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::gate::Capability;
use thiserror::Error;

/// Result type for viewer operations
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Errors that can occur while driving the viewport pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewerError {
    #[error("{0} is not ready")]
    NotReady(Capability),

    #[error("HTTP error! status: {status}")]
    Fetch { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Worker provisioning failed: {0}")]
    WorkerProvision(String),

    #[error("UI host error: {0}")]
    Ui(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ViewerError {
    /// `NotReady` is an expected outcome, not a failure worth surfacing loudly.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, ViewerError::NotReady(_))
    }

    /// Log under `context`: `warn` for `NotReady`, `error` for the rest.
    pub fn log(&self, context: &str) {
        if self.is_not_ready() {
            tracing::warn!(error = %self, "{context}");
        } else {
            tracing::error!(error = %self, "{context}");
        }
    }
}

/// Failure reported by the external 3D engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        ViewerError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged(err: &ViewerError) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, || err.log("Error loading IFC"));
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_fetch_error_logs_at_error_level() {
        let line = logged(&ViewerError::Fetch { status: 404 });
        assert!(line.contains("ERROR"));
        assert!(line.contains("Error loading IFC"));
        assert!(line.contains("status: 404"));
    }

    #[test]
    fn test_not_ready_logs_at_warn_level() {
        let line = logged(&ViewerError::NotReady(Capability::Worker));
        assert!(line.contains("WARN"));
        assert!(!line.contains("ERROR"));
    }
}
