//! Content enhancement domain - external capability used for AI-assisted variations

mod provider;

pub use provider::{ContentEnhancer, EnhancementContext};

#[cfg(test)]
pub use provider::MockContentEnhancer;
