//! Key domain - request identifiers and deterministic key generation

mod data_key;
mod generator;

pub use data_key::DataKey;
pub use generator::{DefaultKeyGenerator, KeyGenerator, KeyParams};
