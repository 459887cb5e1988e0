//! Storage infrastructure - Storage implementations

mod bounded;
mod factory;
mod in_memory;
mod postgres;
mod redis;

pub use bounded::{BoundedMemoryConfig, BoundedMemoryStorage};
pub use factory::{StorageConfig, StorageFactory, StorageSet, StorageType};
pub use in_memory::InMemoryStorage;
pub use postgres::{PostgresConfig, PostgresStorage};
pub use redis::{RedisStorage, RedisStorageConfig};
