//! Infrastructure layer for content experiments
//!
//! Stores, hashing and statistics used by the experiment services.

mod in_memory_assignment_repo;
mod in_memory_event_log;
mod stable_hash;
mod statistical;
mod storage_repository;

pub use in_memory_assignment_repo::InMemoryAssignmentRepository;
pub use in_memory_event_log::InMemoryEventLog;
pub use stable_hash::{StableHasher, INCLUSION_BUCKETS};
pub use statistical::{
    critical_z, inverse_normal_cdf, mean, mean_margin, normal_cdf, proportion_margin, std_dev,
    two_proportion_z_test, two_tailed_p_value, variance, welch_t_test, WelchResult,
    Z_CRITICAL_95,
};
pub use storage_repository::StorageTestRepository;
