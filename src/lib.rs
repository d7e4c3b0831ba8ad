//! Single-node message broker
//!
//! Named topics ("boxes") accept an append-only stream of text records from
//! at most one active publisher and fan them out, full history first and then
//! live, to any number of concurrent subscribers. Clients reach the broker
//! through an administrative channel and talk to it over per-session reply
//! channels (named pipes in production, in-memory pipes in tests).
//!
//! ```text
//! client ──► admin channel ──► Dispatcher ──► BoundedQueue ──► Worker ×N
//!                                                               │
//!                                    ┌──────────────────────────┤
//!                                    ▼                          ▼
//!                              BoxRegistry              publisher/subscriber
//!                                    │                      session
//!                                    ▼                          │
//!                               BlobStore ◄─────────────────────┘
//! ```

pub mod channel;
pub mod client;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod storage;

pub use error::{Error, Result};
pub use registry::{BoxRegistry, RegistryConfig};
pub use server::{Broker, BrokerConfig};
