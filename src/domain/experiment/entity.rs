//! Experiment domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::validation::{
    validate_test_id, validate_test_parameters, validate_variation_id, ExperimentValidationError,
};
use crate::domain::storage::{StorageEntity, StorageKey};

/// Default alpha for significance testing
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Default minimum number of samples per variation before significance is considered
pub const DEFAULT_MIN_SAMPLE_SIZE: u64 = 30;

/// Default share of eligible users admitted into a test
pub const DEFAULT_TRAFFIC_ALLOCATION_PCT: u8 = 100;

// ============================================================================
// TestId
// ============================================================================

/// Unique identifier for a test
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestId(String);

impl TestId {
    /// Create a new test ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let id = id.into();
        validate_test_id(&id)?;
        Ok(Self(id))
    }

    /// Generate a fresh random test ID
    pub fn generate() -> Self {
        Self(format!("test-{}", uuid::Uuid::new_v4()))
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TestId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TestId> for String {
    fn from(id: TestId) -> Self {
        id.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl StorageKey for TestId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// VariationId
// ============================================================================

/// Unique identifier for a variation within a test
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariationId(String);

impl VariationId {
    /// Create a new variation ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let id = id.into();
        validate_variation_id(&id)?;
        Ok(Self(id))
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VariationId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VariationId> for String {
    fn from(id: VariationId) -> Self {
        id.0
    }
}

impl From<&VariationRole> for VariationId {
    fn from(role: &VariationRole) -> Self {
        // Role labels are always valid slugs
        Self(role.to_string())
    }
}

impl fmt::Display for VariationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for VariationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// TestStatus
// ============================================================================

/// Status of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Test is being configured, not yet accepting traffic
    #[default]
    Draft,
    /// Test is accepting assignments and events
    Active,
    /// Test was stopped after running its course
    Completed,
    /// Test was aborted before reaching a conclusion
    Stopped,
}

impl TestStatus {
    /// Check if the test currently accepts assignments and events
    pub fn accepts_traffic(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if the test is in a terminal, read-only state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped)
    }

    /// Check if a transition to the target status is valid
    pub fn can_transition_to(&self, target: TestStatus) -> bool {
        matches!(
            (self, target),
            (Self::Draft, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Active, Self::Stopped)
        )
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

// ============================================================================
// MetricKind / MetricDirection
// ============================================================================

/// How events for the primary metric are aggregated per variation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Share of assigned users with at least one qualifying event
    #[default]
    Rate,
    /// Total of event values
    Sum,
    /// Mean of event values
    Average,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rate => write!(f, "rate"),
            Self::Sum => write!(f, "sum"),
            Self::Average => write!(f, "average"),
        }
    }
}

/// Which direction of the primary metric counts as an improvement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricDirection {
    #[default]
    HigherIsBetter,
    LowerIsBetter,
}

impl MetricDirection {
    /// Whether `candidate` beats `baseline` in this direction
    pub fn is_better(&self, candidate: f64, baseline: f64) -> bool {
        match self {
            Self::HigherIsBetter => candidate > baseline,
            Self::LowerIsBetter => candidate < baseline,
        }
    }
}

// ============================================================================
// VariationRole
// ============================================================================

/// Role of a variation within a test
///
/// Serialized as `control`, `variant-a`, `variant-b`, ... `variant-z`, then
/// `variant-27` and onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VariationRole {
    Control,
    /// Zero-based index among the non-control variations
    Variant(u16),
}

impl VariationRole {
    /// Role for the n-th (zero-based) non-control variation
    pub fn variant(index: u16) -> Self {
        Self::Variant(index)
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Self::Control)
    }
}

impl fmt::Display for VariationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "control"),
            Self::Variant(index) if *index < 26 => {
                write!(f, "variant-{}", (b'a' + *index as u8) as char)
            }
            Self::Variant(index) => write!(f, "variant-{}", index + 1),
        }
    }
}

impl TryFrom<String> for VariationRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "control" {
            return Ok(Self::Control);
        }

        let suffix = value
            .strip_prefix("variant-")
            .ok_or_else(|| format!("Unknown variation role: '{}'", value))?;

        let mut chars = suffix.chars();

        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_lowercase() => {
                Ok(Self::Variant((ch as u8 - b'a') as u16))
            }
            _ => suffix
                .parse::<u16>()
                .ok()
                .filter(|n| *n > 26)
                .map(|n| Self::Variant(n - 1))
                .ok_or_else(|| format!("Unknown variation role: '{}'", value)),
        }
    }
}

impl From<VariationRole> for String {
    fn from(role: VariationRole) -> Self {
        role.to_string()
    }
}

// ============================================================================
// GenerationMethod / ContentPayload
// ============================================================================

/// How a variation's content was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    #[default]
    RuleBased,
    AiAssisted,
}

impl fmt::Display for GenerationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RuleBased => write!(f, "rule_based"),
            Self::AiAssisted => write!(f, "ai_assisted"),
        }
    }
}

/// Content treatment carried by a variation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ContentPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<String>,
}

impl ContentPayload {
    /// Create a payload with a body only
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            subject: None,
            body: body.into(),
            call_to_action: None,
        }
    }

    /// Set the subject line
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the call to action
    pub fn with_call_to_action(mut self, cta: impl Into<String>) -> Self {
        self.call_to_action = Some(cta.into());
        self
    }

    /// The headline text: the subject when present, the body otherwise
    pub fn headline(&self) -> &str {
        self.subject.as_deref().unwrap_or(&self.body)
    }

    /// Replace the headline text, keeping everything else
    pub fn with_headline(mut self, headline: impl Into<String>) -> Self {
        let headline = headline.into();
        if self.subject.is_some() {
            self.subject = Some(headline);
        } else {
            self.body = headline;
        }
        self
    }
}

// ============================================================================
// Variation
// ============================================================================

/// One content treatment in a test, including the designated control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    id: VariationId,
    role: VariationRole,
    content: ContentPayload,
    generation_method: GenerationMethod,
    weight: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_reason: Option<String>,
}

impl Variation {
    /// Create a new rule-based variation with weight 1
    pub fn new(id: VariationId, role: VariationRole, content: ContentPayload) -> Self {
        Self {
            id,
            role,
            content,
            generation_method: GenerationMethod::RuleBased,
            weight: 1,
            fallback_reason: None,
        }
    }

    /// Create a variation whose ID is derived from its role
    pub fn for_role(role: VariationRole, content: ContentPayload) -> Self {
        Self::new(VariationId::from(&role), role, content)
    }

    /// Set the generation method
    pub fn with_generation_method(mut self, method: GenerationMethod) -> Self {
        self.generation_method = method;
        self
    }

    /// Set the relative assignment weight
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Record why AI-assisted generation fell back to the rule-based transform
    pub fn with_fallback_reason(mut self, reason: impl Into<String>) -> Self {
        self.fallback_reason = Some(reason.into());
        self
    }

    pub fn id(&self) -> &VariationId {
        &self.id
    }

    pub fn role(&self) -> VariationRole {
        self.role
    }

    pub fn content(&self) -> &ContentPayload {
        &self.content
    }

    pub fn generation_method(&self) -> GenerationMethod {
        self.generation_method
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    pub fn is_control(&self) -> bool {
        self.role.is_control()
    }
}

// ============================================================================
// Test
// ============================================================================

/// A controlled content experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    id: TestId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    status: TestStatus,
    variations: Vec<Variation>,
    primary_metric: String,
    metric_kind: MetricKind,
    #[serde(default)]
    metric_direction: MetricDirection,
    significance_threshold: f64,
    min_sample_size: u64,
    traffic_allocation_pct: u8,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stopped_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_reason: Option<String>,
}

impl Test {
    /// Create a new test in Draft status with default statistical settings
    pub fn new(
        id: TestId,
        name: impl Into<String>,
        primary_metric: impl Into<String>,
        metric_kind: MetricKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: None,
            status: TestStatus::Draft,
            variations: Vec::new(),
            primary_metric: primary_metric.into(),
            metric_kind,
            metric_direction: MetricDirection::default(),
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            traffic_allocation_pct: DEFAULT_TRAFFIC_ALLOCATION_PCT,
            created_at: now,
            updated_at: now,
            started_at: None,
            stopped_at: None,
            stop_reason: None,
        }
    }

    // Builder methods

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_variation(mut self, variation: Variation) -> Self {
        self.variations.push(variation);
        self
    }

    pub fn with_variations(mut self, variations: Vec<Variation>) -> Self {
        self.variations = variations;
        self
    }

    pub fn with_metric_direction(mut self, direction: MetricDirection) -> Self {
        self.metric_direction = direction;
        self
    }

    pub fn with_significance_threshold(mut self, threshold: f64) -> Self {
        self.significance_threshold = threshold;
        self
    }

    pub fn with_min_sample_size(mut self, min_sample_size: u64) -> Self {
        self.min_sample_size = min_sample_size;
        self
    }

    pub fn with_traffic_allocation_pct(mut self, pct: u8) -> Self {
        self.traffic_allocation_pct = pct;
        self
    }

    // Getters

    pub fn id(&self) -> &TestId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> TestStatus {
        self.status
    }

    pub fn variations(&self) -> &[Variation] {
        &self.variations
    }

    pub fn primary_metric(&self) -> &str {
        &self.primary_metric
    }

    pub fn metric_kind(&self) -> MetricKind {
        self.metric_kind
    }

    pub fn metric_direction(&self) -> MetricDirection {
        self.metric_direction
    }

    pub fn significance_threshold(&self) -> f64 {
        self.significance_threshold
    }

    pub fn min_sample_size(&self) -> u64 {
        self.min_sample_size
    }

    pub fn traffic_allocation_pct(&self) -> u8 {
        self.traffic_allocation_pct
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.stopped_at
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    // Validation

    /// Check the definition rules that must hold before the test may run
    pub fn validate_definition(&self) -> Result<(), ExperimentValidationError> {
        if self.name.trim().is_empty() {
            return Err(ExperimentValidationError::EmptyName);
        }

        validate_test_parameters(
            self.traffic_allocation_pct,
            self.significance_threshold,
            self.min_sample_size,
        )?;

        if self.variations.len() < 2 {
            return Err(ExperimentValidationError::InsufficientVariations);
        }

        let controls = self.variations.iter().filter(|v| v.is_control()).count();

        if controls != 1 {
            return Err(ExperimentValidationError::InvalidControlCount(controls));
        }

        let mut seen = HashSet::new();

        for variation in &self.variations {
            if !seen.insert(variation.id()) {
                return Err(ExperimentValidationError::DuplicateVariationId(
                    variation.id().to_string(),
                ));
            }

            if variation.weight() == 0 {
                return Err(ExperimentValidationError::ZeroWeight(
                    variation.id().to_string(),
                ));
            }
        }

        Ok(())
    }

    // Status transitions

    /// Start the test (Draft -> Active)
    pub fn start(&mut self) -> Result<(), ExperimentValidationError> {
        self.ensure_transition(TestStatus::Active)?;
        self.validate_definition()?;
        self.status = TestStatus::Active;
        self.started_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Stop the test after it ran its course (Active -> Completed)
    pub fn stop(&mut self, reason: impl Into<String>) -> Result<(), ExperimentValidationError> {
        self.finish(TestStatus::Completed, reason.into())
    }

    /// Abort the test early (Active -> Stopped)
    pub fn abort(&mut self, reason: impl Into<String>) -> Result<(), ExperimentValidationError> {
        self.finish(TestStatus::Stopped, reason.into())
    }

    fn finish(
        &mut self,
        target: TestStatus,
        reason: String,
    ) -> Result<(), ExperimentValidationError> {
        self.ensure_transition(target)?;
        self.status = target;
        self.stopped_at = Some(Utc::now());
        self.stop_reason = Some(reason);
        self.touch();
        Ok(())
    }

    fn ensure_transition(&self, target: TestStatus) -> Result<(), ExperimentValidationError> {
        if !self.status.can_transition_to(target) {
            return Err(ExperimentValidationError::InvalidStatusTransition(
                self.status.to_string(),
                target.to_string(),
            ));
        }
        Ok(())
    }

    // Variation lookup

    /// Get the control variation if one exists
    pub fn control_variation(&self) -> Option<&Variation> {
        self.variations.iter().find(|v| v.is_control())
    }

    /// Get a variation by ID
    pub fn variation(&self, id: &VariationId) -> Option<&Variation> {
        self.variations.iter().find(|v| v.id() == id)
    }

    /// Get a variation by its raw ID string
    pub fn variation_by_str(&self, id: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.id().as_str() == id)
    }

    /// Sum of all variation weights
    pub fn total_weight(&self) -> u64 {
        self.variations.iter().map(|v| v.weight() as u64).sum()
    }

    /// Map a bucket in `0..total_weight()` onto a variation by cumulative weight
    pub fn variation_for_bucket(&self, bucket: u64) -> Option<&Variation> {
        let mut cumulative: u64 = 0;

        for variation in &self.variations {
            cumulative = cumulative.saturating_add(variation.weight() as u64);

            if bucket < cumulative {
                return Some(variation);
            }
        }

        None
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Test {
    type Key = TestId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}
