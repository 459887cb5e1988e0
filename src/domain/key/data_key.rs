//! Typed request identifier

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};

use crate::domain::DomainError;
use crate::domain::serializer::TypeDescriptor;

use super::generator::{DefaultKeyGenerator, KeyGenerator, KeyParams};

/// Identifies one cacheable request for a body of type `T` and an attachment of type `A`
///
/// Only `serialized_key` and `related_key` ever reach storage. Many keys may share a
/// related key; invalidating it drops all of them together.
pub struct DataKey<T, A> {
    body_type: TypeDescriptor,
    attachment_type: TypeDescriptor,
    serialized_key: String,
    related_key: String,
    _marker: PhantomData<fn() -> (T, A)>,
}

impl<T, A> DataKey<T, A>
where
    T: Serialize + DeserializeOwned + Any + Send,
    A: Serialize + DeserializeOwned + Any + Send,
{
    /// Creates a key for serde-capable body and attachment types
    pub fn new(
        serialized_key: impl Into<String>,
        related_key: impl Into<String>,
    ) -> Result<Self, DomainError> {
        Self::with_types(
            TypeDescriptor::serde::<T>(),
            TypeDescriptor::serde::<A>(),
            serialized_key,
            related_key,
        )
    }

    /// Creates a key whose serialized form is generated from request parameters
    pub fn from_params(
        namespace: &str,
        params: &KeyParams,
        related_key: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let serialized = DefaultKeyGenerator::new().generate_with_namespace(namespace, params);
        Self::new(serialized, related_key)
    }
}

impl<T, A> DataKey<T, A>
where
    T: Any + Send,
    A: Any + Send,
{
    /// Creates a key with explicit type descriptors
    pub fn with_types(
        body_type: TypeDescriptor,
        attachment_type: TypeDescriptor,
        serialized_key: impl Into<String>,
        related_key: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let serialized_key = serialized_key.into();

        if serialized_key.is_empty() {
            return Err(DomainError::validation("Serialized key must not be empty"));
        }

        if !body_type.is::<T>() || !attachment_type.is::<A>() {
            return Err(DomainError::validation(format!(
                "Type descriptors ({}, {}) do not match the key types",
                body_type.type_name(),
                attachment_type.type_name()
            )));
        }

        Ok(Self {
            body_type,
            attachment_type,
            serialized_key,
            related_key: related_key.into(),
            _marker: PhantomData,
        })
    }
}

impl<T, A> DataKey<T, A> {
    pub fn body_type(&self) -> &TypeDescriptor {
        &self.body_type
    }

    pub fn attachment_type(&self) -> &TypeDescriptor {
        &self.attachment_type
    }

    /// Primary storage address
    pub fn serialized_key(&self) -> &str {
        &self.serialized_key
    }

    /// Grouping address used for bulk invalidation
    pub fn related_key(&self) -> &str {
        &self.related_key
    }
}

impl<T, A> Clone for DataKey<T, A> {
    fn clone(&self) -> Self {
        Self {
            body_type: self.body_type,
            attachment_type: self.attachment_type,
            serialized_key: self.serialized_key.clone(),
            related_key: self.related_key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, A> fmt::Debug for DataKey<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKey")
            .field("serialized_key", &self.serialized_key)
            .field("related_key", &self.related_key)
            .field("body_type", &self.body_type.type_name())
            .field("attachment_type", &self.attachment_type.type_name())
            .finish()
    }
}

impl<T, A> PartialEq for DataKey<T, A> {
    fn eq(&self, other: &Self) -> bool {
        self.serialized_key == other.serialized_key
            && self.related_key == other.related_key
            && self.body_type == other.body_type
            && self.attachment_type == other.attachment_type
    }
}

impl<T, A> Eq for DataKey<T, A> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_key() {
        let key: DataKey<String, String> = DataKey::new("u:1", "user:1").unwrap();

        assert_eq!(key.serialized_key(), "u:1");
        assert_eq!(key.related_key(), "user:1");
        assert!(key.body_type().is::<String>());
        assert!(key.attachment_type().json_codec().is_some());
    }

    #[test]
    fn test_empty_serialized_key_is_rejected() {
        let result: Result<DataKey<String, String>, _> = DataKey::new("", "user:1");
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_mismatched_descriptor_is_rejected() {
        let result: Result<DataKey<String, String>, _> = DataKey::with_types(
            TypeDescriptor::of::<Vec<u8>>(),
            TypeDescriptor::of::<String>(),
            "u:1",
            "user:1",
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_from_params_is_deterministic() {
        let params = KeyParams::new("1").with_component("fields", "name");
        let a: DataKey<String, String> = DataKey::from_params("users", &params, "user:1").unwrap();
        let b: DataKey<String, String> = DataKey::from_params("users", &params, "user:1").unwrap();

        assert_eq!(a.serialized_key(), "users:1:fields=name");
        assert_eq!(a, b);
    }

    #[test]
    fn test_related_key_may_be_shared() {
        let a: DataKey<String, String> = DataKey::new("u:1", "user:1").unwrap();
        let b: DataKey<String, String> = DataKey::new("u:2", "user:1").unwrap();

        assert_eq!(a.related_key(), b.related_key());
        assert_ne!(a, b);
    }
}
