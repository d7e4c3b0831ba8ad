//! Registry error types

use thiserror::Error;

use crate::storage::StorageError;

/// Error type for registry operations
///
/// The display text is what administrative clients see in a `BoxAnswer`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No box with this name
    #[error("box not found: {0}")]
    NoSuchBox(String),

    /// A box with this name already exists
    #[error("box already exists: {0}")]
    AlreadyExists(String),

    /// Empty name, or too long for the wire format
    #[error("invalid box name: {0:?}")]
    InvalidName(String),

    /// The registry holds its maximum number of boxes
    #[error("box limit reached ({max} boxes)")]
    CapacityExceeded { max: usize },

    /// The box already has its one publisher
    #[error("box already has a publisher: {0}")]
    PublisherAlreadyActive(String),

    /// Backing store failure
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}
