//! Registration table mapping key kinds to row schemas

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::DomainError;

/// Kind used when callers do not partition their keys
pub const DEFAULT_KIND: &str = "default";

/// Table used by the default kind
pub const DEFAULT_TABLE: &str = "repository_entries";

/// Leaves room for the `idx_` / `_related_key` index name within Postgres' 63 byte identifiers
pub const MAX_TABLE_NAME_LEN: usize = 47;

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,46}$").expect("valid table name regex"));

/// Where rows for one kind of key live
///
/// `table` is the SQL table for relational backends and the key namespace for the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    pub kind: String,
    pub table: String,
}

/// Explicit kind → schema table, validated when entries are registered
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, RowSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the default kind
    pub fn with_default() -> Self {
        let mut registry = Self::new();
        registry.schemas.insert(
            DEFAULT_KIND.to_string(),
            RowSchema {
                kind: DEFAULT_KIND.to_string(),
                table: DEFAULT_TABLE.to_string(),
            },
        );
        registry
    }

    /// Builds a registry from `(kind, table)` pairs, failing on the first invalid entry
    pub fn from_entries<I, K, T>(entries: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<String>,
    {
        let mut registry = Self::new();

        for (kind, table) in entries {
            registry.register(kind, table)?;
        }

        Ok(registry)
    }

    pub fn register(
        &mut self,
        kind: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<(), DomainError> {
        let kind = kind.into();
        let table = table.into();

        if kind.trim().is_empty() {
            return Err(DomainError::validation("Schema kind must not be empty"));
        }

        if !TABLE_NAME.is_match(&table) {
            return Err(DomainError::validation(format!(
                "Invalid table name '{}' for kind '{}': expected a lowercase identifier of at \
                 most {} characters",
                table, kind, MAX_TABLE_NAME_LEN
            )));
        }

        if self.schemas.contains_key(&kind) {
            return Err(DomainError::validation(format!(
                "Kind '{}' is already registered",
                kind
            )));
        }

        if let Some(existing) = self.schemas.values().find(|s| s.table == table) {
            return Err(DomainError::validation(format!(
                "Table '{}' is already used by kind '{}'",
                table, existing.kind
            )));
        }

        self.schemas
            .insert(kind.clone(), RowSchema { kind, table });
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Result<&RowSchema, DomainError> {
        self.schemas.get(kind).ok_or_else(|| {
            DomainError::configuration(format!("No row schema registered for kind '{}'", kind))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowSchema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_default() {
        let registry = SchemaRegistry::with_default();
        let schema = registry.get(DEFAULT_KIND).unwrap();

        assert_eq!(schema.table, DEFAULT_TABLE);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_from_entries() {
        let registry =
            SchemaRegistry::from_entries([("users", "user_cache"), ("repos", "repo_cache")])
                .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("repos").unwrap().table, "repo_cache");
    }

    #[test]
    fn test_invalid_table_name() {
        let mut registry = SchemaRegistry::new();

        assert!(registry.register("users", "users; DROP TABLE x").is_err());
        assert!(registry.register("users", "1users").is_err());
        assert!(registry.register("users", "Users").is_err());
    }

    #[test]
    fn test_table_name_length_cap() {
        let mut registry = SchemaRegistry::new();

        let longest = "t".repeat(MAX_TABLE_NAME_LEN);
        assert!(registry.register("users", &longest).is_ok());

        let too_long = "t".repeat(MAX_TABLE_NAME_LEN + 1);
        assert!(registry.register("repos", &too_long).is_err());
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register("users", "user_cache").unwrap();

        assert!(registry.register("users", "other_cache").is_err());
        assert!(registry.register("people", "user_cache").is_err());
    }

    #[test]
    fn test_unknown_kind() {
        let registry = SchemaRegistry::with_default();
        let result = registry.get("missing");

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
