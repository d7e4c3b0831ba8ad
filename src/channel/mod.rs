//! Client channels
//!
//! A channel is a byte stream rendezvous identified by a path. Clients name
//! their reply channel in each request; the broker opens it as a reader
//! (publisher input) or as a writer (answers and subscriber output).
//!
//! Opening waits for the peer to show up, bounded by the implementation's
//! open timeout, so an absent client costs a worker at most that long.

pub mod fifo;
pub mod memory;

pub use fifo::FifoChannels;
pub use memory::MemoryChannels;

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

/// Write end of a reply channel that can notice its reader going away
pub trait ReplyWriter: AsyncWrite + Unpin + Send + 'static {
    /// Resolves once the peer has closed its end
    ///
    /// Lets a session parked on an idle box end without waiting for its
    /// next write to fail.
    fn closed(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens client reply channels by path
pub trait Channels: Send + Sync + 'static {
    type Reader: AsyncRead + Unpin + Send + 'static;
    type Writer: ReplyWriter;

    /// Open the channel at `path` for reading
    fn open_reader(&self, path: &str) -> impl Future<Output = io::Result<Self::Reader>> + Send;

    /// Open the channel at `path` for writing
    fn open_writer(&self, path: &str) -> impl Future<Output = io::Result<Self::Writer>> + Send;
}
