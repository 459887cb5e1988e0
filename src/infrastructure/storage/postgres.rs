//! PostgreSQL storage implementation with connection pooling

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

use crate::domain::DomainError;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::container::RawContainer;
use crate::domain::storage::{RowSchema, Storage};

/// PostgreSQL storage configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/cached_repository".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

/// PostgreSQL storage implementation
///
/// One table per row schema, keyed by `serialized_key` with an index on `related_key`.
/// Every mutation runs inside its own transaction; a transaction dropped before commit
/// is rolled back by sqlx.
pub struct PostgresStorage {
    pool: PgPool,
    table: String,
    clock: Arc<dyn Clock>,
}

impl Debug for PostgresStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("table", &self.table)
            .finish()
    }
}

impl PostgresStorage {
    /// Creates a storage over an existing pool for the schema's table
    pub fn new(pool: PgPool, schema: &RowSchema) -> Self {
        Self::with_clock(pool, schema, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, schema: &RowSchema, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            table: schema.table.clone(),
            clock,
        }
    }

    /// Opens a connection pool shared by every schema's storage
    pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, DomainError> {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| {
                DomainError::storage_unavailable(format!("Failed to connect to PostgreSQL: {}", e))
            })
    }

    /// Connects and returns storage for a single schema
    pub async fn connect(config: &PostgresConfig, schema: &RowSchema) -> Result<Self, DomainError> {
        let pool = Self::connect_pool(config).await?;
        Ok(Self::new(pool, schema))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Ensures the storage table and its related-key index exist
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        for statement in create_table_sql(&self.table) {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::storage_unavailable(format!(
                        "Failed to create table '{}': {}",
                        self.table, e
                    ))
                })?;
        }

        Ok(())
    }
}

fn create_table_sql(table: &str) -> [String; 2] {
    [
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                serialized_key TEXT PRIMARY KEY,
                related_key TEXT NOT NULL,
                body BYTEA,
                attachment BYTEA,
                saved_at_millis BIGINT NOT NULL,
                requested_at_millis BIGINT
            )
            "#
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_related_key ON {table} (related_key)"),
    ]
}

fn upsert_sql(table: &str) -> String {
    format!(
        r#"
        INSERT INTO {table}
            (serialized_key, related_key, body, attachment, saved_at_millis, requested_at_millis)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (serialized_key) DO UPDATE SET
            related_key = EXCLUDED.related_key,
            body = EXCLUDED.body,
            attachment = EXCLUDED.attachment,
            saved_at_millis = EXCLUDED.saved_at_millis,
            requested_at_millis = EXCLUDED.requested_at_millis
        "#
    )
}

fn container_from_row(row: &PgRow) -> Result<RawContainer, DomainError> {
    let column =
        |e: sqlx::Error| DomainError::storage_unavailable(format!("Failed to read row: {}", e));

    Ok(RawContainer {
        body: row.try_get("body").map_err(column)?,
        attachment: row.try_get("attachment").map_err(column)?,
        saved_at_millis: Some(row.try_get("saved_at_millis").map_err(column)?),
        requested_at_millis: row.try_get("requested_at_millis").map_err(column)?,
    })
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn get_by_serialized_key(
        &self,
        serialized_key: &str,
    ) -> Result<RawContainer, DomainError> {
        let query = format!(
            "SELECT body, attachment, saved_at_millis, requested_at_millis \
             FROM {} WHERE serialized_key = $1",
            self.table
        );

        let result = sqlx::query(&query)
            .bind(serialized_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage_unavailable(format!("Failed to get row: {}", e)))?;

        match result {
            Some(row) => container_from_row(&row),
            None => Ok(RawContainer::empty()),
        }
    }

    async fn save_by_serialized_key(
        &self,
        serialized_key: &str,
        related_key: &str,
        container: RawContainer,
    ) -> Result<RawContainer, DomainError> {
        let saved_at = self.clock.now_millis();

        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(&upsert_sql(&self.table))
            .bind(serialized_key)
            .bind(related_key)
            .bind(&container.body)
            .bind(&container.attachment)
            .bind(saved_at)
            .bind(container.requested_at_millis)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage_unavailable(format!("Failed to save row: {}", e)))?;

        tx.commit().await.map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to commit save: {}", e))
        })?;

        Ok(container.with_saved_at(saved_at))
    }

    async fn remove_by_serialized_key(&self, serialized_key: &str) -> Result<u64, DomainError> {
        let query = format!("DELETE FROM {} WHERE serialized_key = $1", self.table);

        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to begin transaction: {}", e))
        })?;

        let result = sqlx::query(&query)
            .bind(serialized_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage_unavailable(format!("Failed to remove row: {}", e)))?;

        tx.commit().await.map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to commit removal: {}", e))
        })?;

        Ok(result.rows_affected())
    }

    async fn remove_relatives_by_related_key(
        &self,
        related_key: &str,
    ) -> Result<u64, DomainError> {
        let query = format!("DELETE FROM {} WHERE related_key = $1", self.table);

        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to begin transaction: {}", e))
        })?;

        let result = sqlx::query(&query)
            .bind(related_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage_unavailable(format!("Failed to remove related rows: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to commit removal: {}", e))
        })?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let query = format!("SELECT COUNT(*) AS count FROM {}", self.table);

        let row = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage_unavailable(format!("Failed to count rows: {}", e)))?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| DomainError::storage_unavailable(format!("Failed to read count: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
