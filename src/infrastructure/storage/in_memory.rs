//! In-memory storage implementation

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::domain::DomainError;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::container::RawContainer;
use crate::domain::storage::{Storage, StorageRow};

#[derive(Debug, Default)]
struct Rows {
    by_key: HashMap<String, StorageRow>,
    by_related: HashMap<String, HashSet<String>>,
}

impl Rows {
    fn insert(&mut self, row: StorageRow) {
        if let Some(previous) = self.by_key.get(&row.serialized_key) {
            if previous.related_key != row.related_key {
                let previous_related = previous.related_key.clone();
                self.unlink(&previous_related, &row.serialized_key);
            }
        }

        self.by_related
            .entry(row.related_key.clone())
            .or_default()
            .insert(row.serialized_key.clone());
        self.by_key.insert(row.serialized_key.clone(), row);
    }

    fn remove(&mut self, serialized_key: &str) -> Option<StorageRow> {
        let row = self.by_key.remove(serialized_key)?;
        self.unlink(&row.related_key, serialized_key);
        Some(row)
    }

    fn unlink(&mut self, related_key: &str, serialized_key: &str) {
        if let Some(keys) = self.by_related.get_mut(related_key) {
            keys.remove(serialized_key);

            if keys.is_empty() {
                self.by_related.remove(related_key);
            }
        }
    }
}

/// Thread-safe in-memory storage implementation
///
/// Each mutation holds the write lock for its whole duration, which is this backend's
/// transaction. Data is lost when the process terminates.
#[derive(Debug)]
pub struct InMemoryStorage {
    rows: RwLock<Rows>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    /// Creates a new empty in-memory storage
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty storage stamping saves with `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: RwLock::new(Rows::default()),
            clock,
        }
    }

    /// Creates storage pre-populated with rows
    pub fn with_rows(rows: Vec<StorageRow>) -> Self {
        let storage = Self::new();
        {
            let mut map = storage.rows.write().unwrap();

            for row in rows {
                map.insert(row);
            }
        }
        storage
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_by_serialized_key(
        &self,
        serialized_key: &str,
    ) -> Result<RawContainer, DomainError> {
        let rows = self.rows.read().map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(rows
            .by_key
            .get(serialized_key)
            .map(StorageRow::to_container)
            .unwrap_or_default())
    }

    async fn save_by_serialized_key(
        &self,
        serialized_key: &str,
        related_key: &str,
        container: RawContainer,
    ) -> Result<RawContainer, DomainError> {
        let mut rows = self.rows.write().map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to acquire write lock: {}", e))
        })?;

        let row = StorageRow::stamped(
            serialized_key,
            related_key,
            container,
            self.clock.now_millis(),
        );
        let saved = row.to_container();
        rows.insert(row);

        Ok(saved)
    }

    async fn remove_by_serialized_key(&self, serialized_key: &str) -> Result<u64, DomainError> {
        let mut rows = self.rows.write().map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(rows.remove(serialized_key).map_or(0, |_| 1))
    }

    async fn remove_relatives_by_related_key(
        &self,
        related_key: &str,
    ) -> Result<u64, DomainError> {
        let mut rows = self.rows.write().map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to acquire write lock: {}", e))
        })?;

        let Some(keys) = rows.by_related.remove(related_key) else {
            return Ok(0);
        };

        let mut removed = 0;

        for key in keys {
            if rows.by_key.remove(&key).is_some() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let rows = self.rows.read().map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(rows.by_key.len() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}
