//! Bounded FIFO request queue
//!
//! Fixed capacity, strict FIFO, blocking on both ends: `push` waits while
//! the queue is full and `pop` waits while it is empty. Two semaphores count
//! free and filled slots; the items themselves sit in a `VecDeque` behind a
//! short-lived mutex that is never held across an `.await`.
//!
//! The queue knows nothing about what it carries.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Semaphore;

use crate::error::{Error, Result};

/// Bounded multi-producer, multi-consumer queue
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    /// Permits = free slots
    slots: Semaphore,
    /// Permits = items ready to pop
    filled: Semaphore,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            slots: Semaphore::new(capacity),
            filled: Semaphore::new(0),
            capacity,
        }
    }

    /// Append an item, waiting for room if the queue is full
    pub async fn push(&self, item: T) -> Result<()> {
        let permit = self.slots.acquire().await.map_err(|_| Error::QueueClosed)?;
        permit.forget();

        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(item);
        self.filled.add_permits(1);
        Ok(())
    }

    /// Append an item without waiting
    ///
    /// Hands the item back when the queue is full or closed.
    pub fn try_push(&self, item: T) -> std::result::Result<(), T> {
        match self.slots.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.items
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push_back(item);
                self.filled.add_permits(1);
                Ok(())
            }
            Err(_) => Err(item),
        }
    }

    /// Remove the oldest item, waiting for one if the queue is empty
    pub async fn pop(&self) -> Result<T> {
        let permit = self.filled.acquire().await.map_err(|_| Error::QueueClosed)?;
        permit.forget();

        let item = self
            .items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        self.slots.add_permits(1);

        // A filled permit is only issued after its item was pushed
        item.ok_or(Error::QueueClosed)
    }

    /// Close the queue
    ///
    /// Every waiting and future `push`/`pop` fails with `QueueClosed`.
    /// Items still queued are returned to the caller.
    pub fn close(&self) -> Vec<T> {
        self.slots.close();
        self.filled.close();
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.filled.is_closed()
    }

    /// Items currently queued
    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
