//! Platform-independent hashing for user assignment
//!
//! Buckets are derived from SHA-256 over the UTF-8 bytes of the input: the
//! first 8 digest bytes are read as a big-endian `u64` and reduced modulo the
//! bucket count. The mapping must never change, since stored assignments are
//! reproduced from it across processes and releases.

use sha2::{Digest, Sha256};

/// Buckets used for the traffic-allocation gate
pub const INCLUSION_BUCKETS: u64 = 100;

/// Stable hasher for test assignments
#[derive(Debug, Clone, Copy)]
pub struct StableHasher;

impl StableHasher {
    /// 64-bit digest of a string
    pub fn hash(input: &str) -> u64 {
        let digest = Sha256::digest(input.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix)
    }

    /// Bucket in `0..buckets`; a zero bucket count maps everything to 0
    pub fn bucket(input: &str, buckets: u64) -> u64 {
        if buckets == 0 {
            return 0;
        }
        Self::hash(input) % buckets
    }

    /// Traffic-allocation bucket (0-99) for a user within a test
    pub fn inclusion_bucket(test_id: &str, user_id: &str) -> u64 {
        Self::bucket(&format!("{}:{}:include", test_id, user_id), INCLUSION_BUCKETS)
    }

    /// Variation bucket in `0..total_weight` for a user within a test
    ///
    /// Hashes a different input from [`Self::inclusion_bucket`], so changing the
    /// allocation never moves an included user to another variation.
    pub fn variation_bucket(test_id: &str, user_id: &str, total_weight: u64) -> u64 {
        Self::bucket(&format!("{}:{}:variation", test_id, user_id), total_weight)
    }

    /// Whether a user passes the traffic-allocation gate
    pub fn is_included(test_id: &str, user_id: &str, traffic_allocation_pct: u8) -> bool {
        Self::inclusion_bucket(test_id, user_id) < traffic_allocation_pct as u64
    }
}
