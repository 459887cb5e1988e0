use std::time::Duration;

use serde::Deserialize;

use crate::domain::DomainError;
use crate::domain::freshness::TtlPolicy;
use crate::domain::storage::{DEFAULT_KIND, DEFAULT_TABLE, SchemaRegistry};
use crate::infrastructure::services::RepositoryConfig;
use crate::infrastructure::storage::{
    BoundedMemoryConfig, PostgresConfig, RedisStorageConfig, StorageConfig, StorageType,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub storage: StorageSettings,
    pub repository: RepositorySettings,
    pub schemas: Vec<SchemaSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Backend selection and connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// memory, bounded, postgres or redis
    pub backend: String,
    pub postgres_url: Option<String>,
    pub max_connections: u32,
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
    pub max_capacity: u64,
    pub time_to_idle_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepositorySettings {
    /// Cached values older than this are refetched
    pub ttl_secs: u64,
    pub serve_stale_on_error: bool,
    pub single_flight: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SchemaSettings {
    pub kind: String,
    pub table: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            storage: StorageSettings::default(),
            repository: RepositorySettings::default(),
            schemas: vec![SchemaSettings {
                kind: DEFAULT_KIND.to_string(),
                table: DEFAULT_TABLE.to_string(),
            }],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageType::InMemory.to_string(),
            postgres_url: None,
            max_connections: 10,
            redis_url: None,
            key_prefix: None,
            max_capacity: 10_000,
            time_to_idle_secs: None,
        }
    }
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            serve_stale_on_error: false,
            single_flight: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_with_env(None)
    }

    /// Loads with `vars` standing in for the process environment when given
    pub fn load_with_env(
        vars: Option<config::Map<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validated kind → table registrations
    pub fn schema_registry(&self) -> Result<SchemaRegistry, DomainError> {
        if self.schemas.is_empty() {
            return Ok(SchemaRegistry::with_default());
        }

        SchemaRegistry::from_entries(
            self.schemas
                .iter()
                .map(|schema| (schema.kind.clone(), schema.table.clone())),
        )
    }

    pub fn freshness_policy(&self) -> TtlPolicy {
        TtlPolicy::from_secs(self.repository.ttl_secs)
    }

    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            serve_stale_on_error: self.repository.serve_stale_on_error,
            single_flight: self.repository.single_flight,
        }
    }
}

impl StorageSettings {
    /// Resolves the backend name and connection settings into a factory configuration
    pub fn storage_config(&self) -> Result<StorageConfig, DomainError> {
        let backend: StorageType = self.backend.parse()?;

        Ok(match backend {
            StorageType::InMemory => StorageConfig::InMemory,
            StorageType::Bounded => {
                let mut bounded =
                    BoundedMemoryConfig::default().with_max_capacity(self.max_capacity);

                if let Some(secs) = self.time_to_idle_secs {
                    bounded = bounded.with_time_to_idle(Duration::from_secs(secs));
                }

                StorageConfig::Bounded(bounded)
            }
            StorageType::Postgres => {
                let url = self.postgres_url.clone().ok_or_else(|| {
                    DomainError::configuration("storage.postgres_url is required for postgres")
                })?;

                StorageConfig::Postgres(
                    PostgresConfig::new(url).with_max_connections(self.max_connections),
                )
            }
            StorageType::Redis => {
                let mut redis = match &self.redis_url {
                    Some(url) => RedisStorageConfig::new(url.clone()),
                    None => RedisStorageConfig::default(),
                };

                if let Some(prefix) = &self.key_prefix {
                    redis = redis.with_key_prefix(prefix.clone());
                }

                StorageConfig::Redis(redis)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    fn from_toml(source: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.repository.ttl_secs, 300);
        assert!(!config.repository.single_flight);
        assert!(matches!(
            config.storage.storage_config().unwrap(),
            StorageConfig::InMemory
        ));

        let registry = config.schema_registry().unwrap();
        assert_eq!(registry.get(DEFAULT_KIND).unwrap().table, DEFAULT_TABLE);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = from_toml(
            r#"
            [logging]
            format = "json"

            [repository]
            serve_stale_on_error = true
            "#,
        );

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert!(config.repository_config().serve_stale_on_error);
        assert!(!config.repository_config().single_flight);
        assert_eq!(config.schemas.len(), 1);
    }

    #[test]
    fn test_bounded_backend() {
        let config = from_toml(
            r#"
            [storage]
            backend = "Bounded"
            max_capacity = 50
            time_to_idle_secs = 120
            "#,
        );

        match config.storage.storage_config().unwrap() {
            StorageConfig::Bounded(bounded) => {
                assert_eq!(bounded.max_capacity, 50);
                assert_eq!(bounded.time_to_idle, Some(Duration::from_secs(120)));
            }
            other => panic!("unexpected storage config: {:?}", other),
        }
    }

    #[test]
    fn test_postgres_requires_url() {
        let settings = StorageSettings {
            backend: "postgres".to_string(),
            ..Default::default()
        };

        assert!(matches!(
            settings.storage_config(),
            Err(DomainError::Configuration { .. })
        ));
    }

    #[test]
    fn test_redis_backend_with_prefix() {
        let settings = StorageSettings {
            backend: "redis".to_string(),
            redis_url: Some("redis://cache:6379".to_string()),
            key_prefix: Some("app".to_string()),
            ..Default::default()
        };

        match settings.storage_config().unwrap() {
            StorageConfig::Redis(redis) => {
                assert_eq!(redis.url, "redis://cache:6379");
                assert_eq!(redis.key_prefix, Some("app".to_string()));
            }
            other => panic!("unexpected storage config: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let settings = StorageSettings {
            backend: "cassandra".to_string(),
            ..Default::default()
        };

        assert!(settings.storage_config().is_err());
    }

    #[test]
    fn test_schema_list_validated() {
        let config = from_toml(
            r#"
            [[schemas]]
            kind = "users"
            table = "user_rows"

            [[schemas]]
            kind = "repos"
            table = "user_rows"
            "#,
        );

        assert!(matches!(
            config.schema_registry(),
            Err(DomainError::Validation { .. })
        ));
    }

    fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_env_overrides_storage_settings() {
        let config = AppConfig::load_with_env(env(&[
            ("APP__STORAGE__BACKEND", "bounded"),
            ("APP__STORAGE__MAX_CAPACITY", "25"),
        ]))
        .unwrap();

        assert_eq!(config.storage.backend, "bounded");
        assert_eq!(config.storage.max_capacity, 25);
    }

    #[test]
    fn test_malformed_env_value_is_an_error() {
        let result = AppConfig::load_with_env(env(&[("APP__STORAGE__MAX_CAPACITY", "lots")]));

        assert!(result.is_err());
    }

    #[test]
    fn test_freshness_policy_uses_ttl() {
        let mut config = AppConfig::default();
        config.repository.ttl_secs = 30;

        assert_eq!(config.freshness_policy().ttl(), Duration::from_secs(30));
    }
}
