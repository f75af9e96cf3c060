//! Domain layer - Core business logic and entities

pub mod enhancement;
pub mod error;
pub mod experiment;
pub mod storage;

pub use enhancement::{ContentEnhancer, EnhancementContext};
pub use error::DomainError;
pub use experiment::{
    Assignment, AssignmentRepository, Event, EventLog, Test, TestId, TestRepository, TestStatus,
    Variation, VariationId,
};
pub use storage::{Storage, StorageEntity, StorageKey};
