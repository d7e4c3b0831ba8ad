//! In-process channels
//!
//! Each `connect` creates a `tokio::io::duplex` pair, parks the broker's end
//! under a path and hands the client's end back. The broker's `open_*`
//! claims the parked end, waiting for it if the client has not connected
//! yet. Dropping either end closes the channel for the other.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::Notify;

use super::{Channels, ReplyWriter};

/// Buffer size of each duplex pair
const DUPLEX_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Default)]
struct Shared {
    parked: Mutex<HashMap<String, DuplexStream>>,
    connected: Notify,
}

/// Channels that live entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryChannels {
    shared: Arc<Shared>,
    open_timeout: Duration,
}

impl Default for MemoryChannels {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl MemoryChannels {
    pub fn new(open_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            open_timeout,
        }
    }

    /// Create the channel at `path` and return the client's end
    ///
    /// Replaces any end still parked under the same path.
    pub fn connect(&self, path: &str) -> DuplexStream {
        let (client, broker) = tokio::io::duplex(DUPLEX_CAPACITY);
        self.shared
            .parked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), broker);
        self.shared.connected.notify_waiters();
        client
    }

    /// Paths whose broker end has not been claimed yet
    pub fn pending(&self) -> usize {
        self.shared
            .parked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    async fn claim(&self, path: &str) -> io::Result<DuplexStream> {
        let wait = async {
            loop {
                let notified = self.shared.connected.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if let Some(stream) = self
                    .shared
                    .parked
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(path)
                {
                    return stream;
                }

                notified.await;
            }
        };

        tokio::time::timeout(self.open_timeout, wait)
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no peer connected to {path}"),
                )
            })
    }
}

impl Channels for MemoryChannels {
    type Reader = DuplexStream;
    type Writer = DuplexStream;

    async fn open_reader(&self, path: &str) -> io::Result<DuplexStream> {
        self.claim(path).await
    }

    async fn open_writer(&self, path: &str) -> io::Result<DuplexStream> {
        self.claim(path).await
    }
}

impl ReplyWriter for DuplexStream {
    async fn closed(&mut self) {
        // The client never writes on a reply channel; end of stream means
        // its end was dropped
        let mut scratch = [0u8; 64];
        while let Ok(n) = self.read(&mut scratch).await {
            if n == 0 {
                return;
            }
        }
    }
}
