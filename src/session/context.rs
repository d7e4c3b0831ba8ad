//! Session context
//!
//! Identity of a session, fixed at registration and carried into every log
//! line the session emits.

/// Which side of a box a session is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Publisher,
    Subscriber,
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRole::Publisher => f.write_str("publisher"),
            SessionRole::Subscriber => f.write_str("subscriber"),
        }
    }
}

/// Context of one publisher or subscriber session
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Worker running the session
    pub worker_id: usize,

    pub role: SessionRole,

    /// Box the session is attached to
    pub box_name: String,

    /// Client's reply channel
    pub reply_path: String,
}

impl SessionContext {
    pub fn new(
        session_id: u64,
        worker_id: usize,
        role: SessionRole,
        box_name: impl Into<String>,
        reply_path: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            worker_id,
            role,
            box_name: box_name.into(),
            reply_path: reply_path.into(),
        }
    }
}
