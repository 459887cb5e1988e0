//! Infrastructure layer - Backend, serializer and service implementations

pub mod logging;
pub mod serializer;
pub mod services;
pub mod storage;
