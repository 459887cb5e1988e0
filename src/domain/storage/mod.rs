//! Storage domain - uniform persistence contract for cached containers

mod repository;
mod row;
mod schema;

pub use repository::Storage;
pub use row::StorageRow;
pub use schema::{DEFAULT_KIND, DEFAULT_TABLE, MAX_TABLE_NAME_LEN, RowSchema, SchemaRegistry};

#[cfg(test)]
pub use repository::mock;
