//! Backing store for box contents
//!
//! The broker only ever touches box data through [`BlobStore`]: create,
//! open, append, read from a cursor, close and remove a named blob. The
//! default implementation, [`MemoryStore`], keeps everything in process.

pub mod memory;

pub use memory::MemoryStore;

use bytes::Bytes;
use thiserror::Error;

/// Mode a blob handle was opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Append,
    Read,
}

/// Storage failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob already exists: {0}")]
    AlreadyExists(String),

    #[error("blob was removed: {0}")]
    Removed(String),

    #[error("handle for {0} is read-only")]
    ReadOnly(String),

    #[error("no space left in {name} (limit {limit} bytes)")]
    NoSpace { name: String, limit: u64 },
}

/// Opaque reference to an open blob
///
/// Handles stay valid until closed; after the blob is removed every
/// operation through them fails with [`StorageError::Removed`].
#[derive(Debug)]
pub struct BlobHandle {
    name: String,
    mode: OpenMode,
    generation: u64,
}

impl BlobHandle {
    /// Build a handle; `generation` identifies one incarnation of the name
    pub fn new(name: impl Into<String>, mode: OpenMode, generation: u64) -> Self {
        Self {
            name: name.into(),
            mode,
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }
}

/// Append-only named blob storage
pub trait BlobStore: Send + Sync + 'static {
    /// Allocate an empty blob
    fn create(&self, name: &str) -> Result<(), StorageError>;

    /// Whether a blob with this name exists
    fn exists(&self, name: &str) -> bool;

    /// Open a blob for appending or reading
    fn open(&self, name: &str, mode: OpenMode) -> Result<BlobHandle, StorageError>;

    /// Append bytes, returning how many were written
    fn append(&self, handle: &BlobHandle, data: &[u8]) -> Result<usize, StorageError>;

    /// Read up to `max_len` bytes starting at `cursor`
    ///
    /// An empty result means the cursor is at the end of the blob.
    fn read_from(&self, handle: &BlobHandle, cursor: u64, max_len: usize)
        -> Result<Bytes, StorageError>;

    /// Current length in bytes
    fn len(&self, handle: &BlobHandle) -> Result<u64, StorageError>;

    /// Release a handle
    fn close(&self, handle: BlobHandle);

    /// Delete a blob; open handles observe the removal
    fn remove(&self, name: &str) -> Result<(), StorageError>;
}
