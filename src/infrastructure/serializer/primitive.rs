//! Serializers for byte and string payloads

use std::any::Any;

use crate::domain::DomainError;
use crate::domain::serializer::{
    Exclusions, Serializer, SerializerId, SerializerRegistry, TypeDescriptor,
};

/// Passes `Vec<u8>` values through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesSerializer;

impl BytesSerializer {
    pub const ID: SerializerId = SerializerId::new("bytes");
}

impl Serializer for BytesSerializer {
    fn id(&self) -> SerializerId {
        Self::ID
    }

    fn supports(&self, ty: &TypeDescriptor, _: &SerializerRegistry, _: &Exclusions) -> bool {
        ty.is::<Vec<u8>>()
    }

    fn serialize(
        &self,
        _ty: &TypeDescriptor,
        value: &dyn Any,
        _chain: &SerializerRegistry,
        _excluding: &Exclusions,
    ) -> Result<Vec<u8>, DomainError> {
        value
            .downcast_ref::<Vec<u8>>()
            .cloned()
            .ok_or_else(|| DomainError::serialization("Value is not a byte vector"))
    }

    fn deserialize(
        &self,
        _ty: &TypeDescriptor,
        bytes: &[u8],
        _chain: &SerializerRegistry,
        _excluding: &Exclusions,
    ) -> Result<Box<dyn Any + Send>, DomainError> {
        Ok(Box::new(bytes.to_vec()))
    }
}

/// Stores `String` values as UTF-8
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Serializer;

impl Utf8Serializer {
    pub const ID: SerializerId = SerializerId::new("utf8");
}

impl Serializer for Utf8Serializer {
    fn id(&self) -> SerializerId {
        Self::ID
    }

    fn supports(&self, ty: &TypeDescriptor, _: &SerializerRegistry, _: &Exclusions) -> bool {
        ty.is::<String>()
    }

    fn serialize(
        &self,
        _ty: &TypeDescriptor,
        value: &dyn Any,
        _chain: &SerializerRegistry,
        _excluding: &Exclusions,
    ) -> Result<Vec<u8>, DomainError> {
        value
            .downcast_ref::<String>()
            .map(|s| s.as_bytes().to_vec())
            .ok_or_else(|| DomainError::serialization("Value is not a string"))
    }

    fn deserialize(
        &self,
        _ty: &TypeDescriptor,
        bytes: &[u8],
        _chain: &SerializerRegistry,
        _excluding: &Exclusions,
    ) -> Result<Box<dyn Any + Send>, DomainError> {
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| DomainError::serialization(format!("Invalid UTF-8 payload: {}", e)))?;
        Ok(Box::new(text))
    }
}
