//! Box registry
//!
//! The registry owns every box. Sessions borrow a box through an
//! `Arc<BoxEntry>` wrapped in a lease, so a removed box stays allocated
//! until its last session lets go, while new lookups no longer find it.
//!
//! # Locking
//!
//! ```text
//!                 Arc<BoxRegistry>
//!          ┌──────────────────────────────┐
//!          │ boxes: RwLock<HashMap<name,  │   registry lock: create,
//!          │   Arc<BoxEntry> {            │   remove, list scan
//!          │     counters: Mutex<..>,     │   box lock: counters and
//!          │     tail: watch::Sender,     │   the append path
//!          │   }                          │
//!          │ >                            │
//!          └──────────────┬───────────────┘
//!                         │
//!        ┌────────────────┼────────────────┐
//!        ▼                ▼                ▼
//!  PublisherLease   SubscriberLease  SubscriberLease
//!   append() ──► store ──► tail.send ──► changed().await
//! ```
//!
//! The registry lock is always taken before a box lock and never held while
//! a subscriber waits for data.

pub mod config;
pub mod entry;
pub mod error;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{BoxEntry, BoxSummary, BoxTail, PublisherLease, SubscriberLease};
pub use error::RegistryError;
pub use store::BoxRegistry;
