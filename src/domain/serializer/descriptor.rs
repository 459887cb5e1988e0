//! Type descriptors used to select serializers

use std::any::{Any, TypeId, type_name};
use std::fmt;

use serde::{Serialize, de::DeserializeOwned};

use crate::domain::DomainError;

type EncodeFn = fn(&dyn Any) -> Result<Vec<u8>, DomainError>;
type DecodeFn = fn(&[u8]) -> Result<Box<dyn Any + Send>, DomainError>;

/// JSON encode/decode functions captured for a concrete type at descriptor construction
#[derive(Clone, Copy)]
pub struct JsonCodec {
    encode: EncodeFn,
    decode: DecodeFn,
}

impl JsonCodec {
    pub fn encode(&self, value: &dyn Any) -> Result<Vec<u8>, DomainError> {
        (self.encode)(value)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>, DomainError> {
        (self.decode)(bytes)
    }
}

fn json_encode<T: Serialize + 'static>(value: &dyn Any) -> Result<Vec<u8>, DomainError> {
    let typed = value.downcast_ref::<T>().ok_or_else(|| {
        DomainError::serialization(format!("Value is not a '{}'", type_name::<T>()))
    })?;

    serde_json::to_vec(typed).map_err(|e| {
        DomainError::serialization(format!(
            "Failed to serialize '{}' as JSON: {}",
            type_name::<T>(),
            e
        ))
    })
}

fn json_decode<T: DeserializeOwned + Send + 'static>(
    bytes: &[u8],
) -> Result<Box<dyn Any + Send>, DomainError> {
    let value: T = serde_json::from_slice(bytes).map_err(|e| {
        DomainError::serialization(format!(
            "Failed to deserialize '{}' from JSON: {}",
            type_name::<T>(),
            e
        ))
    })?;

    Ok(Box::new(value))
}

/// Runtime description of a body or attachment type
///
/// Serializers decide whether they can handle a value by inspecting its descriptor.
/// Descriptors built with [`TypeDescriptor::serde`] also carry a JSON codec, which makes
/// the type eligible for the JSON serializer.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    json: Option<JsonCodec>,
}

impl TypeDescriptor {
    /// Describes a type without any serde capability
    pub fn of<T: Any + Send>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            json: None,
        }
    }

    /// Describes a serde-capable type
    pub fn serde<T>() -> Self
    where
        T: Serialize + DeserializeOwned + Any + Send,
    {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            json: Some(JsonCodec {
                encode: json_encode::<T>,
                decode: json_decode::<T>,
            }),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns true if this descriptor describes `T`
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn json_codec(&self) -> Option<&JsonCodec> {
        self.json.as_ref()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("json", &self.json.is_some())
            .finish()
    }
}
