//! Application services

mod data_repository;

pub use data_repository::{
    DataRepository, RepositoryConfig, RequestState, Retrieval, RetrievalSource,
};
