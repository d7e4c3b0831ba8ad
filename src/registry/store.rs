//! Box registry implementation
//!
//! The single owner of every box record. Creation, removal and listing take
//! the registry-wide lock; everything a session does afterwards goes through
//! the box's own lock via its lease.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::entry::{BoxEntry, BoxSummary};
use super::error::RegistryError;
use crate::protocol::constants::MAX_BOX_NAME;
use crate::storage::{BlobStore, MemoryStore, StorageError};

/// Registry of all boxes
///
/// Thread-safe via `RwLock`. Lookups and listings share the lock; create and
/// remove take it exclusively.
pub struct BoxRegistry {
    /// Map of box name to box entry
    boxes: RwLock<HashMap<String, Arc<BoxEntry>>>,

    /// Backing store shared by every box
    store: Arc<dyn BlobStore>,

    /// Configuration
    config: RegistryConfig,
}

impl BoxRegistry {
    /// Create a registry over `store` with default configuration
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_config(RegistryConfig::default(), store)
    }

    /// Create a registry over `store` with custom configuration
    pub fn with_config(config: RegistryConfig, store: Arc<dyn BlobStore>) -> Self {
        Self {
            boxes: RwLock::new(HashMap::new()),
            store,
            config,
        }
    }

    /// Create a registry backed by a fresh in-memory store
    pub fn in_memory(config: RegistryConfig) -> Self {
        let store: Arc<dyn BlobStore> = match config.max_box_size {
            Some(limit) => Arc::new(MemoryStore::with_blob_limit(limit)),
            None => Arc::new(MemoryStore::new()),
        };
        Self::with_config(config, store)
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Create an empty box
    ///
    /// Fails if the name is taken (in the registry or in storage) or the
    /// registry is full.
    pub async fn create(&self, name: &str) -> Result<(), RegistryError> {
        validate_name(name)?;

        let mut boxes = self.boxes.write().await;

        if boxes.contains_key(name) || self.store.exists(name) {
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }
        if boxes.len() >= self.config.max_boxes {
            return Err(RegistryError::CapacityExceeded {
                max: self.config.max_boxes,
            });
        }

        self.store.create(name).map_err(|e| match e {
            StorageError::AlreadyExists(name) => RegistryError::AlreadyExists(name),
            other => RegistryError::Storage(other),
        })?;

        let entry = BoxEntry::new(name, Arc::clone(&self.store));
        boxes.insert(name.to_string(), Arc::new(entry));

        tracing::info!(box_name = %name, boxes = boxes.len(), "Box created");
        Ok(())
    }

    /// Remove a box and its stored data
    ///
    /// Sessions still attached fail with a storage error on their next
    /// read or append.
    pub async fn remove(&self, name: &str) -> Result<(), RegistryError> {
        let mut boxes = self.boxes.write().await;

        let entry = boxes
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NoSuchBox(name.to_string()))?;

        self.store.remove(name)?;
        boxes.remove(name);
        entry.mark_removed();

        let summary = entry.summary();
        tracing::info!(
            box_name = %name,
            size = summary.size,
            publishers = summary.publishers,
            subscribers = summary.subscribers,
            age_secs = entry.age().as_secs(),
            "Box removed"
        );
        Ok(())
    }

    /// Look up a box by name
    pub async fn lookup(&self, name: &str) -> Option<Arc<BoxEntry>> {
        self.boxes.read().await.get(name).cloned()
    }

    /// Snapshot of every box, ordered by name
    ///
    /// The registry lock is held for the whole walk, so no box appears or
    /// disappears part way through.
    pub async fn list(&self) -> Vec<BoxSummary> {
        let boxes = self.boxes.read().await;
        let mut summaries: Vec<BoxSummary> = boxes.values().map(|entry| entry.summary()).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Number of boxes
    pub async fn box_count(&self) -> usize {
        self.boxes.read().await.len()
    }

    /// Remove every box
    ///
    /// Used at shutdown: waiting subscribers wake and end their sessions.
    /// Returns how many boxes were dropped.
    pub async fn clear(&self) -> usize {
        let mut boxes = self.boxes.write().await;
        let count = boxes.len();

        for (name, entry) in boxes.drain() {
            if let Err(e) = self.store.remove(&name) {
                tracing::warn!(box_name = %name, error = %e, "Failed to remove box data");
            }
            entry.mark_removed();
        }

        count
    }
}

impl std::fmt::Debug for BoxRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() || name.len() > MAX_BOX_NAME || name.contains('\0') {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BoxRegistry {
        BoxRegistry::in_memory(RegistryConfig::default())
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let registry = registry();
        registry.create("b").await.unwrap();

        let result = registry.create("b").await;
        assert_eq!(result, Err(RegistryError::AlreadyExists("b".into())));
        assert_eq!(registry.box_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_detects_name_in_storage() {
        let store = Arc::new(MemoryStore::new());
        store.create("orphan").unwrap();
        let registry = BoxRegistry::new(store);

        assert_eq!(
            registry.create("orphan").await,
            Err(RegistryError::AlreadyExists("orphan".into()))
        );
    }

    #[tokio::test]
    async fn test_capacity_exceeded() {
        let registry = BoxRegistry::in_memory(RegistryConfig::default().max_boxes(2));
        registry.create("a").await.unwrap();
        registry.create("b").await.unwrap();

        assert_eq!(
            registry.create("c").await,
            Err(RegistryError::CapacityExceeded { max: 2 })
        );

        // Removing one frees a slot
        registry.remove("a").await.unwrap();
        registry.create("c").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_names() {
        let registry = registry();
        assert!(matches!(
            registry.create("").await,
            Err(RegistryError::InvalidName(_))
        ));
        assert!(matches!(
            registry.create(&"x".repeat(MAX_BOX_NAME + 1)).await,
            Err(RegistryError::InvalidName(_))
        ));
        registry.create(&"x".repeat(MAX_BOX_NAME)).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = registry();

        assert_eq!(
            registry.remove("b").await,
            Err(RegistryError::NoSuchBox("b".into()))
        );

        registry.create("b").await.unwrap();
        registry.remove("b").await.unwrap();
        assert!(registry.lookup("b").await.is_none());

        // The name can be reused
        registry.create("b").await.unwrap();
        assert!(registry.lookup("b").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_with_attached_sessions() {
        let registry = registry();
        registry.create("news").await.unwrap();

        let entry = registry.lookup("news").await.unwrap();
        let publisher = entry.attach_publisher().unwrap();
        let subscriber = entry.attach_subscriber().unwrap();
        publisher.append(b"hello\n").unwrap();

        registry.remove("news").await.unwrap();
        assert!(registry.lookup("news").await.is_none());

        assert!(publisher.append(b"again\n").is_err());
        assert!(subscriber.read_from(0, 16).is_err());
    }

    #[tokio::test]
    async fn test_list() {
        let registry = registry();
        assert!(registry.list().await.is_empty());

        registry.create("zeta").await.unwrap();
        registry.create("alpha").await.unwrap();

        let entry = registry.lookup("zeta").await.unwrap();
        let publisher = entry.attach_publisher().unwrap();
        let _subscriber = entry.attach_subscriber().unwrap();
        publisher.append(b"abc\n").unwrap();

        let list = registry.list().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "alpha");
        assert_eq!(
            list[1],
            BoxSummary {
                name: "zeta".into(),
                size: 4,
                publishers: 1,
                subscribers: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_clear() {
        let registry = registry();
        registry.create("a").await.unwrap();
        registry.create("b").await.unwrap();

        let entry = registry.lookup("a").await.unwrap();
        assert_eq!(registry.clear().await, 2);
        assert!(entry.is_removed());
        assert_eq!(registry.box_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_publishers_one_wins() {
        let registry = Arc::new(registry());
        registry.create("news").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let entry = registry.lookup("news").await.unwrap();
                entry.attach_publisher()
            }));
        }

        let mut leases = Vec::new();
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(lease) => leases.push(lease),
                Err(RegistryError::PublisherAlreadyActive(_)) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(leases.len(), 1);
        assert_eq!(rejected, 7);
    }
}
