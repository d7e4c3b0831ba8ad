//! Broker configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::constants::MESSAGE_LEN;

/// Broker configuration options
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Path of the administrative channel
    pub admin_path: PathBuf,

    /// Worker pool size
    ///
    /// Each publisher or subscriber session occupies one worker for its
    /// whole lifetime, so this is also the cap on concurrent sessions. Once
    /// every worker is held by a session, create/remove/list requests wait
    /// in the queue until a session ends.
    pub max_sessions: usize,

    /// Request queue capacity (None = twice the worker count)
    pub queue_capacity: Option<usize>,

    /// Bytes a subscriber reads from the store per step
    pub read_chunk_size: usize,

    /// How long to wait for a client to open its reply channel
    pub channel_open_timeout: Duration,

    /// How long shutdown waits for workers before aborting them
    pub shutdown_grace: Duration,

    /// Stats log interval
    pub stats_interval: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            admin_path: PathBuf::from("/tmp/mbroker"),
            max_sessions: 4,
            queue_capacity: None,
            read_chunk_size: 4096,
            channel_open_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
            stats_interval: Duration::from_secs(30),
        }
    }
}

impl BrokerConfig {
    /// Create a new config with a custom administrative channel path
    pub fn with_admin_path(path: impl Into<PathBuf>) -> Self {
        Self {
            admin_path: path.into(),
            ..Default::default()
        }
    }

    /// Set the administrative channel path
    pub fn admin_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.admin_path = path.into();
        self
    }

    /// Set the worker pool size
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the request queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Set the subscriber read chunk size
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the reply channel open timeout
    pub fn channel_open_timeout(mut self, timeout: Duration) -> Self {
        self.channel_open_timeout = timeout;
        self
    }

    /// Set the shutdown grace period
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the stats log interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Queue capacity in effect
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| self.max_sessions.saturating_mul(2))
    }

    /// Reject settings the broker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_sessions == 0 {
            return Err(Error::Config("max_sessions must be at least 1".into()));
        }
        if self.effective_queue_capacity() == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        if self.read_chunk_size < MESSAGE_LEN {
            return Err(Error::Config(format!(
                "read_chunk_size must be at least {MESSAGE_LEN} bytes"
            )));
        }
        if self.stats_interval.is_zero() {
            return Err(Error::Config("stats_interval must be non-zero".into()));
        }
        Ok(())
    }
}
