//! Redis storage implementation

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use crate::domain::DomainError;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::container::RawContainer;
use crate::domain::storage::{RowSchema, Storage};

// Rows are hashes; each related key owns a set of serialized keys. The scripts build the
// previous related set's name from ARGV, so this layout targets a single Redis node.

static SAVE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local previous = redis.call('HGET', KEYS[1], 'related_key')
        if previous and previous ~= ARGV[2] then
            redis.call('SREM', ARGV[9] .. previous, ARGV[1])
        end
        redis.call('DEL', KEYS[1])
        redis.call('HSET', KEYS[1], 'related_key', ARGV[2], 'saved_at', ARGV[3])
        if ARGV[4] ~= '' then redis.call('HSET', KEYS[1], 'requested_at', ARGV[4]) end
        if ARGV[5] == '1' then redis.call('HSET', KEYS[1], 'body', ARGV[6]) end
        if ARGV[7] == '1' then redis.call('HSET', KEYS[1], 'attachment', ARGV[8]) end
        redis.call('SADD', KEYS[2], ARGV[1])
        return 1
        "#,
    )
});

static REMOVE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local related = redis.call('HGET', KEYS[1], 'related_key')
        if not related then return 0 end
        redis.call('SREM', ARGV[2] .. related, ARGV[1])
        return redis.call('DEL', KEYS[1])
        "#,
    )
});

static REMOVE_RELATIVES_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local members = redis.call('SMEMBERS', KEYS[1])
        local removed = 0
        for _, key in ipairs(members) do
            local row = ARGV[1] .. key
            if redis.call('HGET', row, 'related_key') == ARGV[2] then
                removed = removed + redis.call('DEL', row)
            end
        end
        redis.call('DEL', KEYS[1])
        return removed
        "#,
    )
});

/// Configuration for Redis storage
#[derive(Debug, Clone)]
pub struct RedisStorageConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
}

impl Default for RedisStorageConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
        }
    }
}

impl RedisStorageConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

fn escape_glob(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Redis key layout for one row schema
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeySpace {
    rows: String,
    related: String,
}

impl KeySpace {
    fn new(prefix: Option<&str>, table: &str) -> Self {
        let base = match prefix {
            Some(prefix) => format!("{}:{}", prefix, table),
            None => table.to_string(),
        };

        Self {
            rows: format!("{}:row:", base),
            related: format!("{}:related:", base),
        }
    }

    /// SCAN MATCH pattern for every row key; glob characters in the prefix match literally
    fn rows_pattern(&self) -> String {
        format!("{}*", escape_glob(&self.rows))
    }

    fn row(&self, serialized_key: &str) -> String {
        format!("{}{}", self.rows, serialized_key)
    }

    fn related(&self, related_key: &str) -> String {
        format!("{}{}", self.related, related_key)
    }
}

/// Redis storage implementation
///
/// Every mutation is a single Lua script, which Redis runs atomically. A row hash is
/// replaced whole on save, so readers never see a mix of two saves.
#[derive(Clone)]
pub struct RedisStorage {
    connection: ConnectionManager,
    keys: KeySpace,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStorage")
            .field("keys", &self.keys)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisStorage {
    /// Opens a managed connection shared by every schema's storage
    pub async fn connect_manager(
        config: &RedisStorageConfig,
    ) -> Result<ConnectionManager, DomainError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to create Redis client: {}", e))
        })?;

        ConnectionManager::new(client).await.map_err(|e| {
            DomainError::storage_unavailable(format!("Failed to connect to Redis: {}", e))
        })
    }

    /// Creates storage for one schema on an existing connection
    pub fn new(
        connection: ConnectionManager,
        config: &RedisStorageConfig,
        schema: &RowSchema,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            connection,
            keys: KeySpace::new(config.key_prefix.as_deref(), &schema.table),
            clock,
        }
    }

    /// Connects and returns storage for a single schema
    pub async fn connect(
        config: &RedisStorageConfig,
        schema: &RowSchema,
    ) -> Result<Self, DomainError> {
        let connection = Self::connect_manager(config).await?;
        Ok(Self::new(connection, config, schema, Arc::new(SystemClock)))
    }
}

fn parse_millis(field: &str, raw: &[u8]) -> Result<i64, DomainError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            DomainError::storage_unavailable(format!("Corrupt '{}' field in Redis row", field))
        })
}

fn container_from_fields(
    mut fields: HashMap<String, Vec<u8>>,
) -> Result<RawContainer, DomainError> {
    if fields.is_empty() {
        return Ok(RawContainer::empty());
    }

    let saved_at = fields
        .get("saved_at")
        .map(|raw| parse_millis("saved_at", raw))
        .transpose()?;
    let requested_at = fields
        .get("requested_at")
        .map(|raw| parse_millis("requested_at", raw))
        .transpose()?;

    Ok(RawContainer {
        body: fields.remove("body"),
        attachment: fields.remove("attachment"),
        saved_at_millis: saved_at,
        requested_at_millis: requested_at,
    })
}

fn flag(present: bool) -> &'static str {
    if present { "1" } else { "0" }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn get_by_serialized_key(
        &self,
        serialized_key: &str,
    ) -> Result<RawContainer, DomainError> {
        let mut conn = self.connection.clone();

        let fields: HashMap<String, Vec<u8>> = conn
            .hgetall(self.keys.row(serialized_key))
            .await
            .map_err(|e| {
                DomainError::storage_unavailable(format!(
                    "Failed to get key '{}': {}",
                    serialized_key, e
                ))
            })?;

        container_from_fields(fields)
    }

    async fn save_by_serialized_key(
        &self,
        serialized_key: &str,
        related_key: &str,
        container: RawContainer,
    ) -> Result<RawContainer, DomainError> {
        let mut conn = self.connection.clone();
        let saved_at = self.clock.now_millis();
        let requested_at = container
            .requested_at_millis
            .map(|millis| millis.to_string())
            .unwrap_or_default();

        let _: i64 = SAVE_SCRIPT
            .key(self.keys.row(serialized_key))
            .key(self.keys.related(related_key))
            .arg(serialized_key)
            .arg(related_key)
            .arg(saved_at)
            .arg(requested_at)
            .arg(flag(container.body.is_some()))
            .arg(container.body.as_deref().unwrap_or_default())
            .arg(flag(container.attachment.is_some()))
            .arg(container.attachment.as_deref().unwrap_or_default())
            .arg(&self.keys.related)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::storage_unavailable(format!(
                    "Failed to save key '{}': {}",
                    serialized_key, e
                ))
            })?;

        Ok(container.with_saved_at(saved_at))
    }

    async fn remove_by_serialized_key(&self, serialized_key: &str) -> Result<u64, DomainError> {
        let mut conn = self.connection.clone();

        let removed: u64 = REMOVE_SCRIPT
            .key(self.keys.row(serialized_key))
            .arg(serialized_key)
            .arg(&self.keys.related)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::storage_unavailable(format!(
                    "Failed to remove key '{}': {}",
                    serialized_key, e
                ))
            })?;

        Ok(removed)
    }

    async fn remove_relatives_by_related_key(
        &self,
        related_key: &str,
    ) -> Result<u64, DomainError> {
        let mut conn = self.connection.clone();

        let removed: u64 = REMOVE_RELATIVES_SCRIPT
            .key(self.keys.related(related_key))
            .arg(&self.keys.rows)
            .arg(related_key)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::storage_unavailable(format!(
                    "Failed to remove relatives of '{}': {}",
                    related_key, e
                ))
            })?;

        Ok(removed)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let mut conn = self.connection.clone();
        let pattern = self.keys.rows_pattern();

        // SCAN rather than KEYS so a large keyspace does not block the server
        let mut cursor = 0u64;
        let mut total = 0u64;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    DomainError::storage_unavailable(format!("Failed to scan rows: {}", e))
                })?;

            total += keys.len() as u64;
            cursor = next_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(total)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
