//! In-process blob store

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use bytes::{Bytes, BytesMut};

use super::{BlobHandle, BlobStore, OpenMode, StorageError};

/// One incarnation of a named blob
#[derive(Debug)]
struct Blob {
    generation: u64,
    data: RwLock<BytesMut>,
}

/// Blob store held entirely in memory
///
/// Nothing survives a restart. An optional per-blob limit rejects appends
/// that would grow a blob past it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Arc<Blob>>>,
    next_generation: AtomicU64,
    max_blob_size: Option<u64>,
}

impl MemoryStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose blobs may not exceed `limit` bytes
    pub fn with_blob_limit(limit: u64) -> Self {
        Self {
            max_blob_size: Some(limit),
            ..Self::default()
        }
    }

    /// Number of blobs currently stored
    pub fn blob_count(&self) -> usize {
        self.blobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Resolve a handle to the blob incarnation it was opened on
    fn live(&self, handle: &BlobHandle) -> Result<Arc<Blob>, StorageError> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        match blobs.get(handle.name()) {
            Some(blob) if blob.generation == handle.generation() => Ok(Arc::clone(blob)),
            _ => Err(StorageError::Removed(handle.name().to_string())),
        }
    }
}

impl BlobStore for MemoryStore {
    fn create(&self, name: &str) -> Result<(), StorageError> {
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        if blobs.contains_key(name) {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }
        let blob = Blob {
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            data: RwLock::new(BytesMut::new()),
        };
        blobs.insert(name.to_string(), Arc::new(blob));
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.blobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    fn open(&self, name: &str, mode: OpenMode) -> Result<BlobHandle, StorageError> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        let blob = blobs
            .get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        Ok(BlobHandle::new(name, mode, blob.generation))
    }

    fn append(&self, handle: &BlobHandle, data: &[u8]) -> Result<usize, StorageError> {
        if handle.mode() != OpenMode::Append {
            return Err(StorageError::ReadOnly(handle.name().to_string()));
        }
        let blob = self.live(handle)?;
        let mut contents = blob.data.write().unwrap_or_else(|e| e.into_inner());

        if let Some(limit) = self.max_blob_size {
            if contents.len() as u64 + data.len() as u64 > limit {
                return Err(StorageError::NoSpace {
                    name: handle.name().to_string(),
                    limit,
                });
            }
        }

        contents.extend_from_slice(data);
        Ok(data.len())
    }

    fn read_from(
        &self,
        handle: &BlobHandle,
        cursor: u64,
        max_len: usize,
    ) -> Result<Bytes, StorageError> {
        let blob = self.live(handle)?;
        let contents = blob.data.read().unwrap_or_else(|e| e.into_inner());

        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(contents.len());
        let end = start.saturating_add(max_len).min(contents.len());
        Ok(Bytes::copy_from_slice(&contents[start..end]))
    }

    fn len(&self, handle: &BlobHandle) -> Result<u64, StorageError> {
        let blob = self.live(handle)?;
        let len = blob.data.read().unwrap_or_else(|e| e.into_inner()).len();
        Ok(len as u64)
    }

    fn close(&self, handle: BlobHandle) {
        drop(handle);
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        blobs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}
