//! Experiment validation utilities

use thiserror::Error;

/// Maximum length for test IDs
pub const MAX_TEST_ID_LENGTH: usize = 50;

/// Maximum length for variation IDs
pub const MAX_VARIATION_ID_LENGTH: usize = 50;

/// Maximum length for user IDs
pub const MAX_USER_ID_LENGTH: usize = 256;

/// Maximum length for metric names
pub const MAX_METRIC_NAME_LENGTH: usize = 64;

/// Validation errors for tests, variations and ingestion arguments
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExperimentValidationError {
    #[error("Test ID cannot be empty")]
    EmptyId,

    #[error("Test ID exceeds maximum length of {0} characters")]
    IdTooLong(usize),

    #[error("Test ID must start with a letter or number")]
    InvalidIdStart,

    #[error("Test ID must end with a letter or number")]
    InvalidIdEnd,

    #[error("Test ID contains invalid character: '{0}'")]
    InvalidIdCharacter(char),

    #[error("Test ID cannot contain consecutive hyphens")]
    ConsecutiveHyphens,

    #[error("Variation ID cannot be empty")]
    EmptyVariationId,

    #[error("Variation ID exceeds maximum length of {0} characters")]
    VariationIdTooLong(usize),

    #[error("Variation ID must start with a letter or number")]
    InvalidVariationIdStart,

    #[error("Variation ID must end with a letter or number")]
    InvalidVariationIdEnd,

    #[error("Variation ID contains invalid character: '{0}'")]
    InvalidVariationIdCharacter(char),

    #[error("Variation ID cannot contain consecutive hyphens")]
    VariationIdConsecutiveHyphens,

    #[error("User ID cannot be empty")]
    EmptyUserId,

    #[error("User ID exceeds maximum length of {0} characters")]
    UserIdTooLong(usize),

    #[error("Metric name cannot be empty")]
    EmptyMetricName,

    #[error("Metric name exceeds maximum length of {0} characters")]
    MetricNameTooLong(usize),

    #[error("Metric name contains invalid character: '{0}'")]
    InvalidMetricNameCharacter(char),

    #[error("Test name cannot be empty")]
    EmptyName,

    #[error("Traffic allocation must be between 0 and 100, got {0}")]
    InvalidTrafficAllocation(u8),

    #[error("Significance threshold must be between 0 and 1 (exclusive), got {0}")]
    InvalidSignificanceThreshold(f64),

    #[error("Minimum sample size must be at least 1")]
    InvalidMinSampleSize,

    #[error("Test must have at least 2 variations")]
    InsufficientVariations,

    #[error("Test must have exactly one control variation, found {0}")]
    InvalidControlCount(usize),

    #[error("Duplicate variation ID: '{0}'")]
    DuplicateVariationId(String),

    #[error("Variation '{0}' must have a weight of at least 1")]
    ZeroWeight(String),

    #[error("Variation '{0}' does not belong to this test")]
    UnknownVariation(String),

    #[error("Invalid test status transition from {0} to {1}")]
    InvalidStatusTransition(String, String),
}

fn validate_slug(
    id: &str,
    max_len: usize,
    errors: SlugErrors,
) -> Result<(), ExperimentValidationError> {
    let (Some(first_char), Some(last_char)) = (id.chars().next(), id.chars().last()) else {
        return Err(errors.empty);
    };

    if id.len() > max_len {
        return Err((errors.too_long)(max_len));
    }

    if !first_char.is_ascii_alphanumeric() {
        return Err(errors.bad_start);
    }

    if !last_char.is_ascii_alphanumeric() {
        return Err(errors.bad_end);
    }

    let mut prev_was_hyphen = false;

    for ch in id.chars() {
        if ch == '-' {
            if prev_was_hyphen {
                return Err(errors.consecutive_hyphens);
            }
            prev_was_hyphen = true;
        } else if ch.is_ascii_alphanumeric() {
            prev_was_hyphen = false;
        } else {
            return Err((errors.bad_char)(ch));
        }
    }

    Ok(())
}

struct SlugErrors {
    empty: ExperimentValidationError,
    too_long: fn(usize) -> ExperimentValidationError,
    bad_start: ExperimentValidationError,
    bad_end: ExperimentValidationError,
    consecutive_hyphens: ExperimentValidationError,
    bad_char: fn(char) -> ExperimentValidationError,
}

/// Validate a test ID
pub fn validate_test_id(id: &str) -> Result<(), ExperimentValidationError> {
    validate_slug(
        id,
        MAX_TEST_ID_LENGTH,
        SlugErrors {
            empty: ExperimentValidationError::EmptyId,
            too_long: ExperimentValidationError::IdTooLong,
            bad_start: ExperimentValidationError::InvalidIdStart,
            bad_end: ExperimentValidationError::InvalidIdEnd,
            consecutive_hyphens: ExperimentValidationError::ConsecutiveHyphens,
            bad_char: ExperimentValidationError::InvalidIdCharacter,
        },
    )
}

/// Validate a variation ID
pub fn validate_variation_id(id: &str) -> Result<(), ExperimentValidationError> {
    validate_slug(
        id,
        MAX_VARIATION_ID_LENGTH,
        SlugErrors {
            empty: ExperimentValidationError::EmptyVariationId,
            too_long: ExperimentValidationError::VariationIdTooLong,
            bad_start: ExperimentValidationError::InvalidVariationIdStart,
            bad_end: ExperimentValidationError::InvalidVariationIdEnd,
            consecutive_hyphens: ExperimentValidationError::VariationIdConsecutiveHyphens,
            bad_char: ExperimentValidationError::InvalidVariationIdCharacter,
        },
    )
}

/// Validate a user ID. Any non-empty string is accepted up to the length cap.
pub fn validate_user_id(id: &str) -> Result<(), ExperimentValidationError> {
    if id.trim().is_empty() {
        return Err(ExperimentValidationError::EmptyUserId);
    }

    if id.len() > MAX_USER_ID_LENGTH {
        return Err(ExperimentValidationError::UserIdTooLong(MAX_USER_ID_LENGTH));
    }

    Ok(())
}

/// Validate a metric name (`[A-Za-z0-9_.-]+`)
pub fn validate_metric_name(name: &str) -> Result<(), ExperimentValidationError> {
    if name.is_empty() {
        return Err(ExperimentValidationError::EmptyMetricName);
    }

    if name.len() > MAX_METRIC_NAME_LENGTH {
        return Err(ExperimentValidationError::MetricNameTooLong(
            MAX_METRIC_NAME_LENGTH,
        ));
    }

    if let Some(ch) = name
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-')))
    {
        return Err(ExperimentValidationError::InvalidMetricNameCharacter(ch));
    }

    Ok(())
}

/// Validate the numeric knobs of a test definition
pub fn validate_test_parameters(
    traffic_allocation_pct: u8,
    significance_threshold: f64,
    min_sample_size: u64,
) -> Result<(), ExperimentValidationError> {
    if traffic_allocation_pct > 100 {
        return Err(ExperimentValidationError::InvalidTrafficAllocation(
            traffic_allocation_pct,
        ));
    }

    if !(significance_threshold > 0.0 && significance_threshold < 1.0) {
        return Err(ExperimentValidationError::InvalidSignificanceThreshold(
            significance_threshold,
        ));
    }

    if min_sample_size == 0 {
        return Err(ExperimentValidationError::InvalidMinSampleSize);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod test_id_validation {
        use super::*;

        #[test]
        fn test_valid_test_ids() {
            assert!(validate_test_id("spring-sale").is_ok());
            assert!(validate_test_id("subject-line-2024-01").is_ok());
            assert!(validate_test_id("a").is_ok());
            assert!(validate_test_id("test123").is_ok());
        }

        #[test]
        fn test_empty_id() {
            assert_eq!(validate_test_id(""), Err(ExperimentValidationError::EmptyId));
        }

        #[test]
        fn test_id_too_long() {
            let long_id = "a".repeat(51);
            assert_eq!(
                validate_test_id(&long_id),
                Err(ExperimentValidationError::IdTooLong(50))
            );
        }

        #[test]
        fn test_invalid_start_and_end() {
            assert_eq!(
                validate_test_id("-abc"),
                Err(ExperimentValidationError::InvalidIdStart)
            );
            assert_eq!(
                validate_test_id("abc-"),
                Err(ExperimentValidationError::InvalidIdEnd)
            );
        }

        #[test]
        fn test_invalid_character() {
            assert_eq!(
                validate_test_id("abc_def"),
                Err(ExperimentValidationError::InvalidIdCharacter('_'))
            );
            assert_eq!(
                validate_test_id("abc:def"),
                Err(ExperimentValidationError::InvalidIdCharacter(':'))
            );
        }

        #[test]
        fn test_consecutive_hyphens() {
            assert_eq!(
                validate_test_id("abc--def"),
                Err(ExperimentValidationError::ConsecutiveHyphens)
            );
        }
    }

    mod variation_id_validation {
        use super::*;

        #[test]
        fn test_valid_variation_ids() {
            assert!(validate_variation_id("control").is_ok());
            assert!(validate_variation_id("variant-a").is_ok());
        }

        #[test]
        fn test_invalid_variation_ids() {
            assert_eq!(
                validate_variation_id(""),
                Err(ExperimentValidationError::EmptyVariationId)
            );
            assert_eq!(
                validate_variation_id("variant--a"),
                Err(ExperimentValidationError::VariationIdConsecutiveHyphens)
            );
            assert_eq!(
                validate_variation_id("variant a"),
                Err(ExperimentValidationError::InvalidVariationIdCharacter(' '))
            );
        }
    }

    #[test]
    fn test_user_id_validation() {
        assert!(validate_user_id("user-42").is_ok());
        assert!(validate_user_id("alice@example.com").is_ok());
        assert_eq!(
            validate_user_id("   "),
            Err(ExperimentValidationError::EmptyUserId)
        );
        assert_eq!(
            validate_user_id(&"u".repeat(257)),
            Err(ExperimentValidationError::UserIdTooLong(256))
        );
    }

    #[test]
    fn test_metric_name_validation() {
        assert!(validate_metric_name("click").is_ok());
        assert!(validate_metric_name("order.revenue_usd").is_ok());
        assert_eq!(
            validate_metric_name(""),
            Err(ExperimentValidationError::EmptyMetricName)
        );
        assert_eq!(
            validate_metric_name("open rate"),
            Err(ExperimentValidationError::InvalidMetricNameCharacter(' '))
        );
    }

    #[test]
    fn test_parameter_validation() {
        assert!(validate_test_parameters(100, 0.05, 30).is_ok());
        assert!(validate_test_parameters(0, 0.01, 1).is_ok());
        assert_eq!(
            validate_test_parameters(101, 0.05, 30),
            Err(ExperimentValidationError::InvalidTrafficAllocation(101))
        );
        assert_eq!(
            validate_test_parameters(50, 0.0, 30),
            Err(ExperimentValidationError::InvalidSignificanceThreshold(0.0))
        );
        assert_eq!(
            validate_test_parameters(50, 0.05, 0),
            Err(ExperimentValidationError::InvalidMinSampleSize)
        );
    }
}
