//! Serializer trait and ordered registry

use std::any::{Any, type_name};
use std::collections::BTreeSet;
use std::fmt::{self, Debug};
use std::sync::Arc;

use tracing::trace;

use crate::domain::DomainError;
use crate::domain::container::{DataContainer, RawContainer};
use crate::domain::key::DataKey;

use super::descriptor::TypeDescriptor;

/// Stable identifier of a serializer within a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SerializerId(&'static str);

impl SerializerId {
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for SerializerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Serializers skipped during selection
///
/// Never mutated in place: each level of a delegating descent builds an extended copy,
/// so sibling calls keep seeing the set they were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions(BTreeSet<SerializerId>);

impl Exclusions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: SerializerId) -> bool {
        self.0.contains(&id)
    }

    /// Returns a new set that also excludes `id`
    pub fn with(&self, id: SerializerId) -> Self {
        let mut ids = self.0.clone();
        ids.insert(id);
        Self(ids)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Transform between typed values and opaque bytes
///
/// `chain` is the registry the serializer was selected from; delegating serializers call
/// back into it with an extended exclusion set.
pub trait Serializer: Send + Sync + Debug {
    fn id(&self) -> SerializerId;

    /// Whether this serializer can handle values described by `ty`
    fn supports(
        &self,
        ty: &TypeDescriptor,
        chain: &SerializerRegistry,
        excluding: &Exclusions,
    ) -> bool;

    fn serialize(
        &self,
        ty: &TypeDescriptor,
        value: &dyn Any,
        chain: &SerializerRegistry,
        excluding: &Exclusions,
    ) -> Result<Vec<u8>, DomainError>;

    fn deserialize(
        &self,
        ty: &TypeDescriptor,
        bytes: &[u8],
        chain: &SerializerRegistry,
        excluding: &Exclusions,
    ) -> Result<Box<dyn Any + Send>, DomainError>;
}

/// Ordered set of candidate serializers; the first capable, non-excluded one wins
#[derive(Clone, Default)]
pub struct SerializerRegistry {
    serializers: Vec<Arc<dyn Serializer>>,
}

impl Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("serializers", &self.ids())
            .finish()
    }
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a serializer to the end of the chain
    pub fn with_serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializers.push(Arc::new(serializer));
        self
    }

    pub fn register(&mut self, serializer: Arc<dyn Serializer>) {
        self.serializers.push(serializer);
    }

    pub fn ids(&self) -> Vec<SerializerId> {
        self.serializers.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }

    /// Selects the first non-excluded serializer declaring capability for `ty`
    pub fn select(
        &self,
        ty: &TypeDescriptor,
        excluding: &Exclusions,
    ) -> Result<&Arc<dyn Serializer>, DomainError> {
        self.serializers
            .iter()
            .filter(|s| !excluding.contains(s.id()))
            .find(|s| s.supports(ty, self, excluding))
            .ok_or_else(|| DomainError::unsupported_type(ty.type_name()))
    }

    pub fn supports(&self, ty: &TypeDescriptor, excluding: &Exclusions) -> bool {
        self.select(ty, excluding).is_ok()
    }

    pub fn serialize(
        &self,
        ty: &TypeDescriptor,
        value: &dyn Any,
        excluding: &Exclusions,
    ) -> Result<Vec<u8>, DomainError> {
        let serializer = self.select(ty, excluding)?;
        trace!(serializer = %serializer.id(), type_name = ty.type_name(), "Serializing value");
        serializer.serialize(ty, value, self, excluding)
    }

    pub fn deserialize(
        &self,
        ty: &TypeDescriptor,
        bytes: &[u8],
        excluding: &Exclusions,
    ) -> Result<Box<dyn Any + Send>, DomainError> {
        let serializer = self.select(ty, excluding)?;
        trace!(serializer = %serializer.id(), type_name = ty.type_name(), "Deserializing value");
        serializer.deserialize(ty, bytes, self, excluding)
    }

    /// Serializes a typed value through the full chain
    pub fn encode<T: Any + Send>(
        &self,
        ty: &TypeDescriptor,
        value: &T,
    ) -> Result<Vec<u8>, DomainError> {
        ensure_describes::<T>(ty)?;
        self.serialize(ty, value, &Exclusions::none())
    }

    /// Deserializes a typed value through the full chain
    pub fn decode<T: Any + Send>(
        &self,
        ty: &TypeDescriptor,
        bytes: &[u8],
    ) -> Result<T, DomainError> {
        ensure_describes::<T>(ty)?;
        let value = self.deserialize(ty, bytes, &Exclusions::none())?;

        value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            DomainError::serialization(format!(
                "Serializer produced a value that is not a '{}'",
                type_name::<T>()
            ))
        })
    }

    /// Encodes a typed container into its byte-level form, keeping absent fields absent
    pub fn encode_container<T, A>(
        &self,
        key: &DataKey<T, A>,
        container: &DataContainer<T, A>,
    ) -> Result<RawContainer, DomainError>
    where
        T: Any + Send,
        A: Any + Send,
    {
        let body = match &container.body {
            Some(body) => Some(self.encode(key.body_type(), body)?),
            None => None,
        };
        let attachment = match &container.attachment {
            Some(attachment) => Some(self.encode(key.attachment_type(), attachment)?),
            None => None,
        };

        Ok(DataContainer {
            body,
            attachment,
            saved_at_millis: container.saved_at_millis,
            requested_at_millis: container.requested_at_millis,
        })
    }

    /// Decodes a byte-level container using the key's type descriptors
    pub fn decode_container<T, A>(
        &self,
        key: &DataKey<T, A>,
        raw: &RawContainer,
    ) -> Result<DataContainer<T, A>, DomainError>
    where
        T: Any + Send,
        A: Any + Send,
    {
        let body = match &raw.body {
            Some(bytes) => Some(self.decode(key.body_type(), bytes)?),
            None => None,
        };
        let attachment = match &raw.attachment {
            Some(bytes) => Some(self.decode(key.attachment_type(), bytes)?),
            None => None,
        };

        Ok(DataContainer {
            body,
            attachment,
            saved_at_millis: raw.saved_at_millis,
            requested_at_millis: raw.requested_at_millis,
        })
    }
}

fn ensure_describes<T: Any>(ty: &TypeDescriptor) -> Result<(), DomainError> {
    if ty.is::<T>() {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "Descriptor for '{}' used with a '{}' value",
            ty.type_name(),
            type_name::<T>()
        )))
    }
}
