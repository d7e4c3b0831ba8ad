//! Box entry, tail signal and session leases

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::watch;

use super::error::RegistryError;
use crate::storage::{BlobHandle, BlobStore, OpenMode, StorageError};

/// Value broadcast to subscribers whenever a box changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoxTail {
    /// Bytes appended so far
    pub size: u64,
    /// Set once the box has been removed
    pub removed: bool,
}

#[derive(Debug, Default)]
struct Counters {
    publishers: u64,
    subscribers: u64,
    size: u64,
}

/// Point-in-time view of a box
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxSummary {
    pub name: String,
    pub size: u64,
    pub publishers: u64,
    pub subscribers: u64,
}

/// Entry for a single box in the registry
pub struct BoxEntry {
    name: String,

    /// Per-box lock: counters and the append path
    counters: Mutex<Counters>,

    /// Data-available signal, updated on every append and on removal
    tail: watch::Sender<BoxTail>,

    store: Arc<dyn BlobStore>,

    created_at: Instant,
}

impl std::fmt::Debug for BoxEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxEntry")
            .field("name", &self.name)
            .field("summary", &self.summary())
            .field("tail", &*self.tail.borrow())
            .finish()
    }
}

impl BoxEntry {
    pub(super) fn new(name: impl Into<String>, store: Arc<dyn BlobStore>) -> Self {
        let (tail, _) = watch::channel(BoxTail::default());
        Self {
            name: name.into(),
            counters: Mutex::new(Counters::default()),
            tail,
            store,
            created_at: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time since the box was created
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub fn is_removed(&self) -> bool {
        self.tail.borrow().removed
    }

    /// Current size and session counts
    pub fn summary(&self) -> BoxSummary {
        let counters = self.lock();
        BoxSummary {
            name: self.name.clone(),
            size: counters.size,
            publishers: counters.publishers,
            subscribers: counters.subscribers,
        }
    }

    pub fn publisher_count(&self) -> u64 {
        self.lock().publishers
    }

    pub fn subscriber_count(&self) -> u64 {
        self.lock().subscribers
    }

    pub fn size(&self) -> u64 {
        self.lock().size
    }

    /// Attach the box's single publisher
    ///
    /// Fails without touching the counters if a publisher is already active.
    pub fn attach_publisher(self: &Arc<Self>) -> Result<PublisherLease, RegistryError> {
        let mut counters = self.lock();
        self.ensure_live()?;

        if counters.publishers >= 1 {
            return Err(RegistryError::PublisherAlreadyActive(self.name.clone()));
        }

        let handle = self.store.open(&self.name, OpenMode::Append)?;
        counters.publishers += 1;

        Ok(PublisherLease {
            entry: Arc::clone(self),
            handle: Some(handle),
        })
    }

    /// Attach a subscriber whose cursor starts at the beginning of the box
    pub fn attach_subscriber(self: &Arc<Self>) -> Result<SubscriberLease, RegistryError> {
        let mut counters = self.lock();
        self.ensure_live()?;

        let handle = self.store.open(&self.name, OpenMode::Read)?;
        counters.subscribers += 1;

        Ok(SubscriberLease {
            entry: Arc::clone(self),
            handle: Some(handle),
            tail: self.tail.subscribe(),
        })
    }

    /// Flag the box as removed and wake every waiting subscriber
    pub(super) fn mark_removed(&self) {
        let _counters = self.lock();
        self.tail.send_modify(|tail| tail.removed = true);
    }

    fn ensure_live(&self) -> Result<(), RegistryError> {
        if self.is_removed() {
            return Err(StorageError::Removed(self.name.clone()).into());
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The active publisher's hold on a box
///
/// Dropping the lease releases the publisher slot and closes the handle,
/// whichever way the session ends.
#[derive(Debug)]
pub struct PublisherLease {
    entry: Arc<BoxEntry>,
    handle: Option<BlobHandle>,
}

impl PublisherLease {
    pub fn box_name(&self) -> &str {
        &self.entry.name
    }

    pub fn entry(&self) -> &Arc<BoxEntry> {
        &self.entry
    }

    /// Append bytes to the box and wake its subscribers
    ///
    /// Returns the number of bytes written. The new size is published only
    /// after the store write completes, so readers never see a partial
    /// append.
    pub fn append(&self, data: &[u8]) -> Result<usize, RegistryError> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| StorageError::Removed(self.entry.name.clone()))?;

        let mut counters = self.entry.lock();
        self.entry.ensure_live()?;

        let written = self.entry.store.append(handle, data)?;
        counters.size += written as u64;
        let size = counters.size;
        self.entry.tail.send_modify(|tail| tail.size = size);

        Ok(written)
    }
}

impl Drop for PublisherLease {
    fn drop(&mut self) {
        let mut counters = self.entry.lock();
        counters.publishers = counters.publishers.saturating_sub(1);
        drop(counters);

        if let Some(handle) = self.handle.take() {
            self.entry.store.close(handle);
        }
    }
}

/// A subscriber's hold on a box, with its own view of the tail
#[derive(Debug)]
pub struct SubscriberLease {
    entry: Arc<BoxEntry>,
    handle: Option<BlobHandle>,
    tail: watch::Receiver<BoxTail>,
}

impl SubscriberLease {
    pub fn box_name(&self) -> &str {
        &self.entry.name
    }

    pub fn entry(&self) -> &Arc<BoxEntry> {
        &self.entry
    }

    /// Read up to `max_len` bytes starting at `cursor`
    ///
    /// Empty when the cursor has caught up with the tail.
    pub fn read_from(&self, cursor: u64, max_len: usize) -> Result<Bytes, RegistryError> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| StorageError::Removed(self.entry.name.clone()))?;

        let _counters = self.entry.lock();
        self.entry.ensure_live()?;
        Ok(self.entry.store.read_from(handle, cursor, max_len)?)
    }

    /// Wait until the box holds more than `cursor` bytes
    ///
    /// Returns immediately if data past the cursor already exists. Fails
    /// with a storage error once the box is removed.
    pub async fn wait_for_data(&mut self, cursor: u64) -> Result<(), RegistryError> {
        loop {
            {
                let tail = self.tail.borrow_and_update();
                if tail.removed {
                    return Err(StorageError::Removed(self.entry.name.clone()).into());
                }
                if tail.size > cursor {
                    return Ok(());
                }
            }

            if self.tail.changed().await.is_err() {
                return Err(StorageError::Removed(self.entry.name.clone()).into());
            }
        }
    }
}

impl Drop for SubscriberLease {
    fn drop(&mut self) {
        let mut counters = self.entry.lock();
        counters.subscribers = counters.subscribers.saturating_sub(1);
        drop(counters);

        if let Some(handle) = self.handle.take() {
            self.entry.store.close(handle);
        }
    }
}
