//! Publisher and subscriber sessions
//!
//! A session is the live attachment of one client to one box. It runs on
//! the worker that picked up the registration and keeps that worker busy
//! until the client goes away, the box is removed, or an I/O error occurs.
//! Errors end the session only.

pub mod context;
pub mod publisher;
pub mod state;
pub mod subscriber;

pub use context::{SessionContext, SessionRole};
pub use publisher::run_publisher;
pub use state::{SessionPhase, SessionState};
pub use subscriber::run_subscriber;
