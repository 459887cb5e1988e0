//! Integrity-checking serializer that delegates to the rest of the chain

use std::any::Any;

use sha2::{Digest, Sha256};

use crate::domain::DomainError;
use crate::domain::serializer::{
    Exclusions, Serializer, SerializerId, SerializerRegistry, TypeDescriptor,
};

const FORMAT_VERSION: u8 = 1;
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = 1 + DIGEST_LEN;

/// Prefixes payloads with `version || sha256(payload)` and verifies them on read
///
/// Handles any type some other serializer in the chain handles. Itself is excluded while
/// delegating, so placing it first wraps every payload exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumSerializer;

impl ChecksumSerializer {
    pub const ID: SerializerId = SerializerId::new("checksum");
}

impl Serializer for ChecksumSerializer {
    fn id(&self) -> SerializerId {
        Self::ID
    }

    fn supports(
        &self,
        ty: &TypeDescriptor,
        chain: &SerializerRegistry,
        excluding: &Exclusions,
    ) -> bool {
        chain.supports(ty, &excluding.with(Self::ID))
    }

    fn serialize(
        &self,
        ty: &TypeDescriptor,
        value: &dyn Any,
        chain: &SerializerRegistry,
        excluding: &Exclusions,
    ) -> Result<Vec<u8>, DomainError> {
        let payload = chain.serialize(ty, value, &excluding.with(Self::ID))?;

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&Sha256::digest(&payload));
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn deserialize(
        &self,
        ty: &TypeDescriptor,
        bytes: &[u8],
        chain: &SerializerRegistry,
        excluding: &Exclusions,
    ) -> Result<Box<dyn Any + Send>, DomainError> {
        if bytes.len() < HEADER_LEN {
            return Err(DomainError::serialization(format!(
                "Checksummed payload too short: {} bytes",
                bytes.len()
            )));
        }

        if bytes[0] != FORMAT_VERSION {
            return Err(DomainError::serialization(format!(
                "Unknown checksum format version {}",
                bytes[0]
            )));
        }

        let (digest, payload) = bytes[1..].split_at(DIGEST_LEN);

        if Sha256::digest(payload).as_slice() != digest {
            return Err(DomainError::serialization(format!(
                "Checksum mismatch for '{}' payload (expected {})",
                ty.type_name(),
                hex::encode(digest)
            )));
        }

        chain.deserialize(ty, payload, &excluding.with(Self::ID))
    }
}
