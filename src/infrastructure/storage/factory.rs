//! Storage factory for runtime storage selection

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::domain::DomainError;
use crate::domain::clock::Clock;
use crate::domain::storage::{SchemaRegistry, Storage};

use super::bounded::{BoundedMemoryConfig, BoundedMemoryStorage};
use super::in_memory::InMemoryStorage;
use super::postgres::{PostgresConfig, PostgresStorage};
use super::redis::{RedisStorage, RedisStorageConfig};

/// Supported storage types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    /// Unbounded in-memory storage (for testing/development)
    #[default]
    InMemory,
    /// Bounded in-memory storage using moka
    Bounded,
    /// PostgreSQL storage
    Postgres,
    /// Redis storage
    Redis,
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::InMemory => write!(f, "memory"),
            StorageType::Bounded => write!(f, "bounded"),
            StorageType::Postgres => write!(f, "postgres"),
            StorageType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for StorageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::InMemory),
            "bounded" | "moka" => Ok(Self::Bounded),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown storage backend: {}. Valid backends: memory, bounded, postgres, redis",
                s
            ))),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// In-memory storage configuration
    InMemory,
    /// Bounded in-memory storage configuration
    Bounded(BoundedMemoryConfig),
    /// PostgreSQL storage configuration
    Postgres(PostgresConfig),
    /// Redis storage configuration
    Redis(RedisStorageConfig),
}

impl StorageConfig {
    /// Creates an in-memory storage configuration
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Creates a PostgreSQL configuration from a URL
    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self::Postgres(PostgresConfig::new(url))
    }

    /// Creates a Redis configuration from a URL
    pub fn redis_url(url: impl Into<String>) -> Self {
        Self::Redis(RedisStorageConfig::new(url))
    }

    /// Returns the storage type
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Bounded(_) => StorageType::Bounded,
            Self::Postgres(_) => StorageType::Postgres,
            Self::Redis(_) => StorageType::Redis,
        }
    }
}

/// One storage per registered row kind, all on the same backend
#[derive(Debug, Clone, Default)]
pub struct StorageSet {
    storages: BTreeMap<String, Arc<dyn Storage>>,
}

impl StorageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: impl Into<String>, storage: Arc<dyn Storage>) {
        self.storages.insert(kind.into(), storage);
    }

    /// Returns the storage for `kind`
    pub fn storage_for(&self, kind: &str) -> Result<Arc<dyn Storage>, DomainError> {
        self.storages.get(kind).cloned().ok_or_else(|| {
            DomainError::configuration(format!("No storage configured for row kind '{}'", kind))
        })
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.storages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.storages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }
}

/// Factory for creating storage instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates one storage per schema, sharing the backend connection between them
    pub async fn create_all(
        config: &StorageConfig,
        schemas: &SchemaRegistry,
        clock: Arc<dyn Clock>,
    ) -> Result<StorageSet, DomainError> {
        let mut set = StorageSet::new();

        match config {
            StorageConfig::InMemory => {
                for schema in schemas.iter() {
                    set.insert(
                        schema.kind.clone(),
                        Arc::new(InMemoryStorage::with_clock(clock.clone())),
                    );
                }
            }
            StorageConfig::Bounded(bounded) => {
                for schema in schemas.iter() {
                    set.insert(
                        schema.kind.clone(),
                        Arc::new(BoundedMemoryStorage::with_config(
                            bounded.clone(),
                            clock.clone(),
                        )),
                    );
                }
            }
            StorageConfig::Postgres(pg_config) => {
                let pool = PostgresStorage::connect_pool(pg_config).await?;

                for schema in schemas.iter() {
                    let storage = PostgresStorage::with_clock(pool.clone(), schema, clock.clone());
                    storage.ensure_table().await?;
                    set.insert(schema.kind.clone(), Arc::new(storage));
                }
            }
            StorageConfig::Redis(redis_config) => {
                let connection = RedisStorage::connect_manager(redis_config).await?;

                for schema in schemas.iter() {
                    set.insert(
                        schema.kind.clone(),
                        Arc::new(RedisStorage::new(
                            connection.clone(),
                            redis_config,
                            schema,
                            clock.clone(),
                        )),
                    );
                }
            }
        }

        info!(
            backend = %config.storage_type(),
            kinds = set.len(),
            "Storage initialized"
        );

        Ok(set)
    }

    /// Creates storage for a single row kind
    pub async fn create(
        config: &StorageConfig,
        schemas: &SchemaRegistry,
        kind: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<dyn Storage>, DomainError> {
        let schema = schemas.get(kind)?;
        let mut single = SchemaRegistry::new();
        single.register(schema.kind.clone(), schema.table.clone())?;

        Self::create_all(config, &single, clock)
            .await?
            .storage_for(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;
    use crate::domain::container::RawContainer;

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!("memory".parse::<StorageType>().unwrap(), StorageType::InMemory);
        assert_eq!("IN_MEMORY".parse::<StorageType>().unwrap(), StorageType::InMemory);
        assert_eq!("moka".parse::<StorageType>().unwrap(), StorageType::Bounded);
        assert_eq!("pg".parse::<StorageType>().unwrap(), StorageType::Postgres);
        assert_eq!("redis".parse::<StorageType>().unwrap(), StorageType::Redis);
        assert!(matches!(
            "sqlite".parse::<StorageType>(),
            Err(DomainError::Configuration { .. })
        ));
    }

    #[test]
    fn test_storage_type_display_round_trips() {
        for ty in [
            StorageType::InMemory,
            StorageType::Bounded,
            StorageType::Postgres,
            StorageType::Redis,
        ] {
            assert_eq!(ty.to_string().parse::<StorageType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_storage_config_type() {
        assert_eq!(StorageConfig::in_memory().storage_type(), StorageType::InMemory);
        assert_eq!(
            StorageConfig::postgres_url("postgres://localhost/db").storage_type(),
            StorageType::Postgres
        );
        assert_eq!(
            StorageConfig::redis_url("redis://localhost").storage_type(),
            StorageType::Redis
        );
    }

    #[tokio::test]
    async fn test_create_all_isolates_kinds() {
        let schemas =
            SchemaRegistry::from_entries([("users", "user_rows"), ("repos", "repo_rows")]).unwrap();

        let set = StorageFactory::create_all(
            &StorageConfig::InMemory,
            &schemas,
            Arc::new(ManualClock::new(0)),
        )
        .await
        .unwrap();

        assert_eq!(set.len(), 2);

        let users = set.storage_for("users").unwrap();
        let repos = set.storage_for("repos").unwrap();
        users
            .save_by_serialized_key("k", "r", RawContainer::new(b"user".to_vec()))
            .await
            .unwrap();

        assert!(repos.get_by_serialized_key("k").await.unwrap().is_miss());
        assert_eq!(users.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_configuration_error() {
        let set = StorageFactory::create_all(
            &StorageConfig::Bounded(BoundedMemoryConfig::default()),
            &SchemaRegistry::with_default(),
            Arc::new(ManualClock::new(0)),
        )
        .await
        .unwrap();

        assert!(matches!(
            set.storage_for("missing"),
            Err(DomainError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_single_kind() {
        let storage = StorageFactory::create(
            &StorageConfig::InMemory,
            &SchemaRegistry::with_default(),
            crate::domain::storage::DEFAULT_KIND,
            Arc::new(ManualClock::new(0)),
        )
        .await
        .unwrap();

        assert_eq!(storage.backend_name(), "in_memory");
    }
}
