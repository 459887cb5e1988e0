//! Domain layer - Keys, containers and the capability traits the repository is built on

pub mod clock;
pub mod container;
pub mod error;
pub mod freshness;
pub mod key;
pub mod provider;
pub mod serializer;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use container::{DataContainer, RawContainer};
pub use error::DomainError;
pub use freshness::{AlwaysFresh, AlwaysStale, FreshnessPolicy, TtlPolicy};
pub use key::{DataKey, DefaultKeyGenerator, KeyGenerator, KeyParams};
pub use provider::{Provider, RawProvider, SerializingProvider};
pub use serializer::{Exclusions, Serializer, SerializerId, SerializerRegistry, TypeDescriptor};
pub use storage::{RowSchema, SchemaRegistry, Storage, StorageRow};
