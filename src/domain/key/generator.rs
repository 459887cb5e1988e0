//! Deterministic serialized-key generation

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Trait for generating serialized keys from request parameters
pub trait KeyGenerator: Send + Sync + Debug {
    /// Generates a key from the given components
    fn generate(&self, params: &KeyParams) -> String;

    /// Generates a key with a namespace prefix
    fn generate_with_namespace(&self, namespace: &str, params: &KeyParams) -> String {
        format!("{}:{}", namespace, self.generate(params))
    }
}

/// Parameters describing one logical request
#[derive(Debug, Clone, Default)]
pub struct KeyParams {
    /// Primary identifier (e.g., resource name or id)
    pub primary: String,
    /// Secondary components, kept sorted so equal requests yield equal keys
    pub components: BTreeMap<String, String>,
}

impl KeyParams {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            components: BTreeMap::new(),
        }
    }

    pub fn with_component(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.components.insert(key.into(), value.into());
        self
    }

    /// Creates parameters from a serializable request value
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(value)?;
        Ok(Self::new(json))
    }
}

/// Joins the parameters as `primary:k=v:...`, optionally hashed
///
/// Hashing uses SHA-256 so a key stays the same across processes and releases; keys are
/// storage addresses and must survive restarts.
#[derive(Debug, Clone, Default)]
pub struct DefaultKeyGenerator {
    use_short_hash: bool,
}

impl DefaultKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces 16 hex-character keys instead of the joined form
    pub fn with_short_hash(mut self) -> Self {
        self.use_short_hash = true;
        self
    }

    fn short_hash(input: &str) -> String {
        let digest = Sha256::digest(input.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl KeyGenerator for DefaultKeyGenerator {
    fn generate(&self, params: &KeyParams) -> String {
        let mut parts = vec![params.primary.clone()];

        for (k, v) in &params.components {
            parts.push(format!("{}={}", k, v));
        }

        let combined = parts.join(":");

        if self.use_short_hash {
            Self::short_hash(&combined)
        } else {
            combined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_params_with_components() {
        let params = KeyParams::new("user")
            .with_component("id", "1")
            .with_component("fields", "name");

        assert_eq!(params.primary, "user");
        assert_eq!(params.components.len(), 2);
        assert_eq!(params.components.get("id"), Some(&"1".to_string()));
    }

    #[test]
    fn test_default_key_generator() {
        let generator = DefaultKeyGenerator::new();
        let params = KeyParams::new("u")
            .with_component("a", "1")
            .with_component("b", "2");

        assert_eq!(generator.generate(&params), "u:a=1:b=2");
    }

    #[test]
    fn test_components_are_sorted() {
        let generator = DefaultKeyGenerator::new();
        let params = KeyParams::new("test")
            .with_component("zebra", "z")
            .with_component("apple", "a")
            .with_component("mango", "m");

        assert_eq!(generator.generate(&params), "test:apple=a:mango=m:zebra=z");
    }

    #[test]
    fn test_short_hash_is_stable() {
        let generator = DefaultKeyGenerator::new().with_short_hash();
        let params = KeyParams::new("test").with_component("a", "1");

        let key = generator.generate(&params);
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, DefaultKeyGenerator::new().with_short_hash().generate(&params));
        assert_ne!(key, generator.generate(&KeyParams::new("test").with_component("a", "2")));
    }

    #[test]
    fn test_generate_with_namespace() {
        let generator = DefaultKeyGenerator::new();
        let params = KeyParams::new("42");

        assert_eq!(generator.generate_with_namespace("users", &params), "users:42");
    }

    #[test]
    fn test_from_serializable() {
        #[derive(Serialize)]
        struct Query {
            name: String,
            page: u32,
        }

        let params = KeyParams::from_serializable(&Query {
            name: "alice".to_string(),
            page: 2,
        })
        .unwrap();

        assert!(params.primary.contains("alice"));
        assert!(params.primary.contains('2'));
    }
}
