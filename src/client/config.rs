//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

/// Where a client reaches the broker and receives its replies
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The broker's administrative FIFO
    pub register_path: PathBuf,

    /// This client's own FIFO, created for the duration of one request
    pub pipe_path: PathBuf,

    /// How long to wait for the broker to open either end
    pub open_timeout: Duration,
}

impl ClientConfig {
    pub fn new(register_path: impl Into<PathBuf>, pipe_path: impl Into<PathBuf>) -> Self {
        Self {
            register_path: register_path.into(),
            pipe_path: pipe_path.into(),
            open_timeout: Duration::from_secs(5),
        }
    }

    /// Set the open timeout
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }
}
