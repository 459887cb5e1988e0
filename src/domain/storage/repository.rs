//! Storage trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;
use crate::domain::container::RawContainer;

/// Uniform transactional persistence for byte-level containers
///
/// Every backend behaves identically:
/// - a miss is an empty container, never an error
/// - a save stamps `saved_at_millis` atomically with the write and returns the row as persisted
/// - mutations run inside one backend transaction and are all-or-nothing
/// - an unreachable medium or failed commit surfaces as `DomainError::StorageUnavailable`
#[async_trait]
pub trait Storage: Send + Sync + Debug {
    /// Reads the container stored under `serialized_key`
    async fn get_by_serialized_key(&self, serialized_key: &str)
    -> Result<RawContainer, DomainError>;

    /// Upserts the row for `serialized_key`, returning the container as persisted
    async fn save_by_serialized_key(
        &self,
        serialized_key: &str,
        related_key: &str,
        container: RawContainer,
    ) -> Result<RawContainer, DomainError>;

    /// Deletes the row for `serialized_key`, returning the number of rows removed (0 or 1)
    async fn remove_by_serialized_key(&self, serialized_key: &str) -> Result<u64, DomainError>;

    /// Deletes every row grouped under `related_key`, returning the number removed
    async fn remove_relatives_by_related_key(&self, related_key: &str)
    -> Result<u64, DomainError>;

    /// Returns the number of stored rows
    async fn count(&self) -> Result<u64, DomainError>;

    /// Short backend name used in logs
    fn backend_name(&self) -> &'static str;
}
