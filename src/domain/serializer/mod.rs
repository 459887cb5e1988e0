//! Serializer domain - typed values to opaque byte payloads

mod descriptor;
mod registry;

pub use descriptor::{JsonCodec, TypeDescriptor};
pub use registry::{Exclusions, Serializer, SerializerId, SerializerRegistry};
