//! Bounded volatile storage using moka

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use tokio::sync::Mutex;

use crate::domain::DomainError;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::container::RawContainer;
use crate::domain::storage::{Storage, StorageRow};

/// Configuration for bounded in-memory storage
#[derive(Debug, Clone)]
pub struct BoundedMemoryConfig {
    /// Maximum number of rows
    pub max_capacity: u64,
    /// Rows not accessed for this duration are evicted
    pub time_to_idle: Option<Duration>,
}

impl Default for BoundedMemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_idle: None,
        }
    }
}

impl BoundedMemoryConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle = Some(tti);
        self
    }
}

/// Volatile storage with capacity and idle-time eviction
///
/// Rows are stored whole behind an `Arc`, so a reader always sees one complete row.
/// Mutations are serialized through `write_lock`; an evicted row reads as a miss.
#[derive(Debug)]
pub struct BoundedMemoryStorage {
    rows: MokaCache<String, Arc<StorageRow>>,
    write_lock: Mutex<()>,
    clock: Arc<dyn Clock>,
    config: BoundedMemoryConfig,
}

impl Default for BoundedMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundedMemoryStorage {
    pub fn new() -> Self {
        Self::with_config(BoundedMemoryConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(config: BoundedMemoryConfig, clock: Arc<dyn Clock>) -> Self {
        let mut builder = MokaCache::builder().max_capacity(config.max_capacity);

        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        Self {
            rows: builder.build(),
            write_lock: Mutex::new(()),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &BoundedMemoryConfig {
        &self.config
    }
}

#[async_trait]
impl Storage for BoundedMemoryStorage {
    async fn get_by_serialized_key(
        &self,
        serialized_key: &str,
    ) -> Result<RawContainer, DomainError> {
        Ok(self
            .rows
            .get(serialized_key)
            .await
            .map(|row| row.to_container())
            .unwrap_or_default())
    }

    async fn save_by_serialized_key(
        &self,
        serialized_key: &str,
        related_key: &str,
        container: RawContainer,
    ) -> Result<RawContainer, DomainError> {
        let _tx = self.write_lock.lock().await;

        let row = StorageRow::stamped(
            serialized_key,
            related_key,
            container,
            self.clock.now_millis(),
        );
        let saved = row.to_container();
        self.rows
            .insert(serialized_key.to_string(), Arc::new(row))
            .await;

        Ok(saved)
    }

    async fn remove_by_serialized_key(&self, serialized_key: &str) -> Result<u64, DomainError> {
        let _tx = self.write_lock.lock().await;

        Ok(self.rows.remove(serialized_key).await.map_or(0, |_| 1))
    }

    async fn remove_relatives_by_related_key(
        &self,
        related_key: &str,
    ) -> Result<u64, DomainError> {
        let _tx = self.write_lock.lock().await;

        self.rows.run_pending_tasks().await;

        let rows = self.rows.clone();
        let related = related_key.to_string();
        let keys: Vec<String> = tokio::task::spawn_blocking(move || {
            rows.iter()
                .filter(|(_, row)| row.related_key == related)
                .map(|(key, _)| key.as_ref().clone())
                .collect()
        })
        .await
        .map_err(|e| DomainError::storage_unavailable(format!("Failed to scan rows: {}", e)))?;

        let mut removed = 0;

        for key in keys {
            if self.rows.remove(&key).await.is_some() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        self.rows.run_pending_tasks().await;
        Ok(self.rows.entry_count())
    }

    fn backend_name(&self) -> &'static str {
        "bounded"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;

    fn container(body: &str) -> RawContainer {
        RawContainer::new(body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_get_miss_is_empty() {
        let storage = BoundedMemoryStorage::new();
        assert!(storage.get_by_serialized_key("u:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let storage = BoundedMemoryStorage::with_config(
            BoundedMemoryConfig::default(),
            Arc::new(ManualClock::new(42)),
        );

        storage
            .save_by_serialized_key("u:1", "user:1", container("Alice"))
            .await
            .unwrap();

        let result = storage.get_by_serialized_key("u:1").await.unwrap();
        assert_eq!(result.body, Some(b"Alice".to_vec()));
        assert_eq!(result.saved_at_millis, Some(42));
    }

    #[tokio::test]
    async fn test_remove_by_serialized_key() {
        let storage = BoundedMemoryStorage::new();
        storage
            .save_by_serialized_key("u:1", "user:1", container("Alice"))
            .await
            .unwrap();

        assert_eq!(storage.remove_by_serialized_key("u:1").await.unwrap(), 1);
        assert_eq!(storage.remove_by_serialized_key("u:1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_relatives() {
        let storage = BoundedMemoryStorage::new();
        storage
            .save_by_serialized_key("u:1", "user:1", container("a"))
            .await
            .unwrap();
        storage
            .save_by_serialized_key("u:2", "user:1", container("b"))
            .await
            .unwrap();
        storage
            .save_by_serialized_key("u:3", "user:2", container("c"))
            .await
            .unwrap();

        let removed = storage
            .remove_relatives_by_related_key("user:1")
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert!(storage.get_by_serialized_key("u:1").await.unwrap().is_miss());
        assert!(storage.get_by_serialized_key("u:2").await.unwrap().is_miss());
        assert!(!storage.get_by_serialized_key("u:3").await.unwrap().is_miss());
        assert_eq!(storage.count().await.unwrap(), 1);
    }

    #[test]
    fn test_config_builder() {
        let config = BoundedMemoryConfig::default()
            .with_max_capacity(100)
            .with_time_to_idle(Duration::from_secs(30));

        assert_eq!(config.max_capacity, 100);
        assert_eq!(config.time_to_idle, Some(Duration::from_secs(30)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_never_see_mixed_rows() {
        let storage = Arc::new(BoundedMemoryStorage::new());
        storage
            .save_by_serialized_key("k", "r", container("0").with_attachment(b"0".to_vec()))
            .await
            .unwrap();

        let writer = {
            let storage = storage.clone();
            tokio::spawn(async move {
                for i in 1..500 {
                    let value = i.to_string().into_bytes();
                    storage
                        .save_by_serialized_key(
                            "k",
                            "r",
                            RawContainer::new(value.clone()).with_attachment(value),
                        )
                        .await
                        .unwrap();

                    if i % 50 == 0 {
                        storage.remove_relatives_by_related_key("r").await.unwrap();
                    }
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..3 {
            let storage = storage.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..500 {
                    let row = storage.get_by_serialized_key("k").await.unwrap();
                    assert_eq!(row.body, row.attachment);
                    assert_eq!(row.body.is_some(), row.saved_at_millis.is_some());
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
