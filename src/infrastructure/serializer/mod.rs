//! Serializer infrastructure - built-in serializers

mod checksum;
mod json;
mod primitive;

pub use checksum::ChecksumSerializer;
pub use json::JsonSerializer;
pub use primitive::{BytesSerializer, Utf8Serializer};

use crate::domain::serializer::SerializerRegistry;

/// The default chain: checksum wrapping, then bytes, UTF-8 strings and JSON
pub fn default_registry() -> SerializerRegistry {
    SerializerRegistry::new()
        .with_serializer(ChecksumSerializer)
        .with_serializer(BytesSerializer)
        .with_serializer(Utf8Serializer)
        .with_serializer(JsonSerializer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::serializer::TypeDescriptor;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    enum Event {
        Created { id: u64 },
        Deleted,
    }

    #[test]
    fn test_default_registry_order() {
        let ids: Vec<&str> = default_registry().ids().iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["checksum", "bytes", "utf8", "json"]);
    }

    #[test]
    fn test_default_registry_round_trips_supported_types() {
        let registry = default_registry();

        let text = TypeDescriptor::serde::<String>();
        let bytes = registry.encode(&text, &"fresh".to_string()).unwrap();
        assert_eq!(registry.decode::<String>(&text, &bytes).unwrap(), "fresh");

        let raw = TypeDescriptor::serde::<Vec<u8>>();
        let bytes = registry.encode(&raw, &vec![1u8, 2, 3]).unwrap();
        assert_eq!(registry.decode::<Vec<u8>>(&raw, &bytes).unwrap(), vec![1, 2, 3]);

        let events = TypeDescriptor::serde::<Vec<Event>>();
        let value = vec![Event::Created { id: 7 }, Event::Deleted];
        let bytes = registry.encode(&events, &value).unwrap();
        assert_eq!(registry.decode::<Vec<Event>>(&events, &bytes).unwrap(), value);
    }
}
