//! Infrastructure layer - Store, provider and service implementations

pub mod enhancement;
pub mod experiment;
pub mod logging;
pub mod observability;
pub mod services;
pub mod storage;
