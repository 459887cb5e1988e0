//! Cached Repository
//!
//! A read-through cache in front of slow upstream providers:
//! - Typed keys and containers, encoded through an ordered serializer chain
//! - Pluggable storage backends (in-memory, bounded moka, PostgreSQL, Redis)
//! - Freshness policies, related-key invalidation and optional single-flight fetching

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{DataContainer, DataKey, DomainError, Provider, Storage};
pub use infrastructure::services::{DataRepository, RepositoryConfig, Retrieval, RetrievalSource};
