//! JSON serializer for serde-capable types

use std::any::Any;

use crate::domain::DomainError;
use crate::domain::serializer::{
    Exclusions, Serializer, SerializerId, SerializerRegistry, TypeDescriptor,
};

/// Encodes any type whose descriptor was built with [`TypeDescriptor::serde`]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub const ID: SerializerId = SerializerId::new("json");
}

impl Serializer for JsonSerializer {
    fn id(&self) -> SerializerId {
        Self::ID
    }

    fn supports(&self, ty: &TypeDescriptor, _: &SerializerRegistry, _: &Exclusions) -> bool {
        ty.json_codec().is_some()
    }

    fn serialize(
        &self,
        ty: &TypeDescriptor,
        value: &dyn Any,
        _chain: &SerializerRegistry,
        _excluding: &Exclusions,
    ) -> Result<Vec<u8>, DomainError> {
        let codec = ty
            .json_codec()
            .ok_or_else(|| DomainError::unsupported_type(ty.type_name()))?;
        codec.encode(value)
    }

    fn deserialize(
        &self,
        ty: &TypeDescriptor,
        bytes: &[u8],
        _chain: &SerializerRegistry,
        _excluding: &Exclusions,
    ) -> Result<Box<dyn Any + Send>, DomainError> {
        let codec = ty
            .json_codec()
            .ok_or_else(|| DomainError::unsupported_type(ty.type_name()))?;
        codec.decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Repo {
        owner: String,
        stars: u32,
        topics: Vec<String>,
        meta: BTreeMap<String, Option<i64>>,
    }

    #[test]
    fn test_json_round_trip() {
        let registry = SerializerRegistry::new().with_serializer(JsonSerializer);
        let ty = TypeDescriptor::serde::<Repo>();
        let repo = Repo {
            owner: "octo".to_string(),
            stars: 12,
            topics: vec!["rust".to_string(), "cache".to_string()],
            meta: BTreeMap::from([("archived_at".to_string(), None)]),
        };

        let bytes = registry.encode(&ty, &repo).unwrap();
        assert_eq!(registry.decode::<Repo>(&ty, &bytes).unwrap(), repo);
    }

    #[test]
    fn test_json_requires_serde_descriptor() {
        let registry = SerializerRegistry::new().with_serializer(JsonSerializer);
        let ty = TypeDescriptor::of::<u64>();

        let result = registry.encode(&ty, &1u64);
        assert!(matches!(result, Err(DomainError::UnsupportedType { .. })));
    }
}
