//! Storage domain - key-value abstraction behind test persistence

mod entity;
mod repository;

pub use entity::{StorageEntity, StorageKey};
pub use repository::Storage;
