//! Session state machine
//!
//! ```text
//! publisher:   Attaching ──► Active ─────► Closed
//! subscriber:  Attaching ──► Streaming ──► Closed
//! ```
//!
//! A session that fails to attach goes straight to `Closed`.

use std::time::{Duration, Instant};

use super::context::SessionRole;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Looking up the box and claiming a slot on it
    Attaching,
    /// Publisher is reading from its client and appending
    Active,
    /// Subscriber is replaying history or tailing live data
    Streaming,
    /// Counters released, channel closed
    Closed,
}

/// Mutable per-session bookkeeping
#[derive(Debug)]
pub struct SessionState {
    pub role: SessionRole,

    /// Current phase
    pub phase: SessionPhase,

    /// When the registration was picked up
    pub started_at: Instant,

    /// When the session left `Attaching`
    pub attached_at: Option<Instant>,

    /// Messages appended (publisher) or delivered (subscriber)
    pub messages: u64,

    /// Bytes appended or delivered
    pub bytes: u64,
}

impl SessionState {
    pub fn new(role: SessionRole) -> Self {
        Self {
            role,
            phase: SessionPhase::Attaching,
            started_at: Instant::now(),
            attached_at: None,
            messages: 0,
            bytes: 0,
        }
    }

    /// Leave `Attaching` for the role's working phase
    pub fn attach(&mut self) {
        if self.phase == SessionPhase::Attaching {
            self.phase = match self.role {
                SessionRole::Publisher => SessionPhase::Active,
                SessionRole::Subscriber => SessionPhase::Streaming,
            };
            self.attached_at = Some(Instant::now());
        }
    }

    /// Count one message of `bytes` bytes
    pub fn record(&mut self, bytes: usize) {
        self.messages += 1;
        self.bytes += bytes as u64;
    }

    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.phase, SessionPhase::Active | SessionPhase::Streaming)
    }

    /// Time since the registration was picked up
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}
