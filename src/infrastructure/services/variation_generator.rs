//! Variation generator
//!
//! Produces the content treatments of a test. Rule-based generation is a pure
//! function of the request; AI-assisted generation asks a [`ContentEnhancer`]
//! per slot and falls back to the rule-based transform of that slot.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::domain::experiment::{ContentPayload, GenerationMethod, Variation, VariationRole};
use crate::domain::{ContentEnhancer, EnhancementContext};
use crate::infrastructure::observability::record_variation_generated;

/// Default bound on a single enhancement request
pub const DEFAULT_ENHANCEMENT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default upper bound on the length of enhanced content, in characters
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 500;

const CTA_POOL: &[&str] = &[
    "Get started",
    "Claim your offer",
    "Shop now",
    "Learn more",
    "Try it free",
];

// ============================================================================
// Request / Outcome Types
// ============================================================================

/// Request to generate the variations of a test
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Content of the control variation
    pub base: ContentPayload,
    /// Number of non-control variations to produce
    pub variant_count: u16,
    /// Ask the content enhancer before falling back to the rule-based transform
    pub ai_assisted: bool,
}

impl GenerationRequest {
    pub fn new(base: ContentPayload, variant_count: u16) -> Self {
        Self {
            base,
            variant_count,
            ai_assisted: false,
        }
    }

    pub fn with_ai_assistance(mut self) -> Self {
        self.ai_assisted = true;
        self
    }
}

/// Result of generating one variation slot
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The enhancer produced usable content
    Enhanced(ContentPayload),
    /// The rule-based transform was used instead
    Fallback {
        content: ContentPayload,
        reason: String,
    },
}

impl GenerationOutcome {
    pub fn method(&self) -> GenerationMethod {
        match self {
            Self::Enhanced(_) => GenerationMethod::AiAssisted,
            Self::Fallback { .. } => GenerationMethod::RuleBased,
        }
    }

    fn into_variation(self, role: VariationRole) -> Variation {
        match self {
            Self::Enhanced(content) => Variation::for_role(role, content)
                .with_generation_method(GenerationMethod::AiAssisted),
            Self::Fallback { content, reason } => {
                Variation::for_role(role, content).with_fallback_reason(reason)
            }
        }
    }
}

/// Headline mutation families, applied in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadlineTransform {
    Urgency,
    TitleCase,
    Exclusivity,
    Emoji,
}

impl HeadlineTransform {
    const ALL: [HeadlineTransform; 4] = [
        HeadlineTransform::Urgency,
        HeadlineTransform::TitleCase,
        HeadlineTransform::Exclusivity,
        HeadlineTransform::Emoji,
    ];

    fn apply(&self, headline: &str) -> String {
        match self {
            Self::Urgency => format!("Last chance: {}", headline),
            // first casing that changes the text; caseless headlines get a mark
            Self::TitleCase => [
                title_case(headline),
                headline.to_uppercase(),
                headline.to_lowercase(),
            ]
            .into_iter()
            .find(|cased| cased != headline)
            .unwrap_or_else(|| format!("{}!", headline)),
            Self::Exclusivity => format!("Exclusive for you: {}", headline),
            Self::Emoji => format!("🔥 {}", headline),
        }
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Variation Generator
// ============================================================================

/// Generator of test variations
#[derive(Debug, Clone)]
pub struct VariationGenerator {
    enhancer: Option<Arc<dyn ContentEnhancer>>,
    timeout: Duration,
    max_content_chars: usize,
}

impl Default for VariationGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl VariationGenerator {
    /// Create a rule-based generator
    pub fn new() -> Self {
        Self {
            enhancer: None,
            timeout: DEFAULT_ENHANCEMENT_TIMEOUT,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }

    /// Attach a content enhancer for AI-assisted requests
    pub fn with_enhancer(mut self, enhancer: Arc<dyn ContentEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_content_chars(mut self, max_content_chars: usize) -> Self {
        self.max_content_chars = max_content_chars;
        self
    }

    /// Generate the control plus `variant_count` variations
    ///
    /// Never fails: every slot is filled, by the enhancer or by the
    /// rule-based transform of that slot.
    pub async fn generate(&self, request: &GenerationRequest) -> Vec<Variation> {
        let variations = if request.ai_assisted {
            let outcomes = self
                .generate_assisted(&request.base, request.variant_count)
                .await;

            std::iter::once(Variation::for_role(
                VariationRole::Control,
                request.base.clone(),
            ))
            .chain(outcomes.into_iter().enumerate().map(|(index, outcome)| {
                outcome.into_variation(VariationRole::variant(index as u16))
            }))
            .collect()
        } else {
            self.generate_rule_based(&request.base, request.variant_count)
        };

        for variation in variations.iter().filter(|v| !v.is_control()) {
            record_variation_generated(&variation.generation_method().to_string());
        }

        debug!(
            variation_count = variations.len(),
            ai_assisted = request.ai_assisted,
            "Generated variations"
        );

        variations
    }

    /// Deterministic rule-based variations
    pub fn generate_rule_based(&self, base: &ContentPayload, variant_count: u16) -> Vec<Variation> {
        std::iter::once(Variation::for_role(VariationRole::Control, base.clone()))
            .chain((0..variant_count).map(|index| {
                Variation::for_role(
                    VariationRole::variant(index),
                    rule_based_content(base, index),
                )
            }))
            .collect()
    }

    async fn generate_assisted(
        &self,
        base: &ContentPayload,
        variant_count: u16,
    ) -> Vec<GenerationOutcome> {
        let Some(enhancer) = self.enhancer.as_ref() else {
            warn!(
                "AI-assisted generation requested without an enhancer, using rule-based transforms"
            );
            return (0..variant_count)
                .map(|index| GenerationOutcome::Fallback {
                    content: rule_based_content(base, index),
                    reason: "no content enhancer configured".to_string(),
                })
                .collect();
        };

        let slots =
            (0..variant_count).map(|index| self.enhance_slot(enhancer.as_ref(), base, index));
        join_all(slots).await
    }

    async fn enhance_slot(
        &self,
        enhancer: &dyn ContentEnhancer,
        base: &ContentPayload,
        index: u16,
    ) -> GenerationOutcome {
        let context = if base.subject.is_some() {
            EnhancementContext::SubjectLine
        } else {
            EnhancementContext::Body
        };

        let result = tokio::time::timeout(self.timeout, enhancer.enhance(base.headline(), context))
            .await;

        let failure = match result {
            Ok(Ok(content)) => match self.check_enhanced(base, &content) {
                Ok(()) => {
                    return GenerationOutcome::Enhanced(base.clone().with_headline(content.trim()));
                }
                Err(reason) => reason,
            },
            Ok(Err(e)) => format!("enhancer error: {}", e),
            Err(_) => format!("enhancer timed out after {}ms", self.timeout.as_millis()),
        };

        warn!(
            provider = enhancer.provider_name(),
            slot = index,
            reason = %failure,
            "Falling back to rule-based variation"
        );

        GenerationOutcome::Fallback {
            content: rule_based_content(base, index),
            reason: failure,
        }
    }

    fn check_enhanced(&self, base: &ContentPayload, content: &str) -> Result<(), String> {
        let trimmed = content.trim();

        if trimmed.is_empty() {
            return Err("malformed enhancement: empty content".to_string());
        }

        let length = trimmed.chars().count();
        if length > self.max_content_chars {
            return Err(format!(
                "malformed enhancement: {} characters exceeds limit of {}",
                length, self.max_content_chars
            ));
        }

        if trimmed == base.headline() {
            return Err("malformed enhancement: content unchanged".to_string());
        }

        Ok(())
    }
}

/// Rule-based content for the n-th (zero-based) non-control slot
///
/// Slots beyond the number of headline transforms reuse them in order with a
/// ` (n)` suffix.
pub fn rule_based_content(base: &ContentPayload, index: u16) -> ContentPayload {
    let families = HeadlineTransform::ALL.len();
    let transform = HeadlineTransform::ALL[index as usize % families];
    let cycle = index as usize / families;

    let mut headline = transform.apply(base.headline());
    if cycle > 0 {
        headline = format!("{} ({})", headline, cycle + 1);
    }

    let mut content = base.clone().with_headline(headline);

    if let Some(cta) = base.call_to_action.as_deref() {
        let candidates: Vec<&str> = CTA_POOL
            .iter()
            .copied()
            .filter(|candidate| !candidate.eq_ignore_ascii_case(cta))
            .collect();
        content.call_to_action = Some(candidates[index as usize % candidates.len()].to_string());
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enhancement::MockContentEnhancer;
    use crate::domain::DomainError;
    use async_trait::async_trait;
    use std::collections::HashSet;

    fn base() -> ContentPayload {
        ContentPayload::new("Our biggest sale of the season.")
            .with_subject("spring sale starts now")
            .with_call_to_action("Shop now")
    }

    fn mock_enhancer(result: Result<&'static str, &'static str>) -> Arc<dyn ContentEnhancer> {
        let mut mock = MockContentEnhancer::new();
        mock.expect_enhance().returning(move |_, _| match result {
            Ok(content) => Ok(content.to_string()),
            Err(message) => Err(DomainError::provider("mock", message)),
        });
        mock.expect_provider_name().return_const("mock");
        Arc::new(mock)
    }

    #[derive(Debug)]
    struct SlowEnhancer;

    #[async_trait]
    impl ContentEnhancer for SlowEnhancer {
        async fn enhance(
            &self,
            prompt: &str,
            _context: EnhancementContext,
        ) -> Result<String, DomainError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(format!("{} (slow)", prompt))
        }

        fn provider_name(&self) -> &'static str {
            "slow"
        }
    }

    mod rule_based {
        use super::*;

        #[test]
        fn test_applies_each_family() {
            let base = base();

            let headlines: Vec<String> = (0..4)
                .map(|i| rule_based_content(&base, i).subject.unwrap())
                .collect();

            assert_eq!(headlines[0], "Last chance: spring sale starts now");
            assert_eq!(headlines[1], "Spring Sale Starts Now");
            assert_eq!(headlines[2], "Exclusive for you: spring sale starts now");
            assert_eq!(headlines[3], "🔥 spring sale starts now");
        }

        #[test]
        fn test_title_case_of_titled_headline_differs() {
            let base = ContentPayload::new("Big News");
            assert_eq!(rule_based_content(&base, 1).body, "BIG NEWS");
        }

        #[test]
        fn test_title_case_of_upper_case_headline_differs() {
            assert_eq!(rule_based_content(&ContentPayload::new("SALE"), 1).body, "Sale");

            let shouted = ContentPayload::new("FLASH SALE").with_subject("FLASH SALE");
            let content = rule_based_content(&shouted, 1);
            assert_eq!(content.subject.as_deref(), Some("Flash Sale"));
            assert_ne!(content, shouted);
        }

        #[test]
        fn test_title_case_of_caseless_headline_differs() {
            assert_eq!(rule_based_content(&ContentPayload::new("2024"), 1).body, "2024!");
            assert_eq!(rule_based_content(&ContentPayload::new("A"), 1).body, "a");
        }

        #[test]
        fn test_body_is_headline_without_subject() {
            let base = ContentPayload::new("Save today");
            let content = rule_based_content(&base, 0);
            assert_eq!(content.body, "Last chance: Save today");
            assert!(content.subject.is_none());
        }

        #[test]
        fn test_cta_substitution_avoids_original() {
            let base = base();

            for i in 0..10 {
                let cta = rule_based_content(&base, i).call_to_action.unwrap();
                assert_ne!(cta, "Shop now");
                assert!(CTA_POOL.contains(&cta.as_str()));
            }
        }

        #[test]
        fn test_cycles_with_suffix_beyond_templates() {
            let generator = VariationGenerator::new();
            let variations = generator.generate_rule_based(&base(), 9);

            assert_eq!(variations.len(), 10);
            assert_eq!(
                variations[5].content().subject.as_deref(),
                Some("Last chance: spring sale starts now (2)")
            );
            assert_eq!(
                variations[9].content().subject.as_deref(),
                Some("Last chance: spring sale starts now (3)")
            );

            let subjects: HashSet<_> = variations
                .iter()
                .map(|v| v.content().subject.clone())
                .collect();
            assert_eq!(subjects.len(), 10);
        }

        #[test]
        fn test_is_deterministic() {
            let generator = VariationGenerator::new();
            assert_eq!(
                generator.generate_rule_based(&base(), 6),
                generator.generate_rule_based(&base(), 6)
            );
        }

        #[tokio::test]
        async fn test_generate_produces_control_first() {
            let generator = VariationGenerator::new();
            let variations = generator.generate(&GenerationRequest::new(base(), 2)).await;

            assert_eq!(variations.len(), 3);
            assert!(variations[0].is_control());
            assert_eq!(variations[0].content(), &base());
            assert_eq!(variations[1].id().as_str(), "variant-a");
            assert_eq!(variations[2].id().as_str(), "variant-b");
            assert!(variations
                .iter()
                .all(|v| v.generation_method() == GenerationMethod::RuleBased
                    && v.fallback_reason().is_none()));
        }
    }

    mod ai_assisted {
        use super::*;

        #[tokio::test]
        async fn test_enhanced_content_is_tagged() {
            let generator = VariationGenerator::new()
                .with_enhancer(mock_enhancer(Ok("  Spring savings are here  ")));

            let request = GenerationRequest::new(base(), 2).with_ai_assistance();
            let variations = generator.generate(&request).await;

            assert_eq!(variations.len(), 3);
            assert_eq!(variations[0].generation_method(), GenerationMethod::RuleBased);

            for variation in &variations[1..] {
                assert_eq!(variation.generation_method(), GenerationMethod::AiAssisted);
                assert_eq!(
                    variation.content().subject.as_deref(),
                    Some("Spring savings are here")
                );
                assert_eq!(variation.content().call_to_action.as_deref(), Some("Shop now"));
            }
        }

        #[tokio::test]
        async fn test_error_falls_back_per_slot() {
            let generator = VariationGenerator::new()
                .with_enhancer(mock_enhancer(Err("service unavailable")));

            let request = GenerationRequest::new(base(), 3).with_ai_assistance();
            let variations = generator.generate(&request).await;

            assert_eq!(variations.len(), 4);
            let expected = generator.generate_rule_based(&base(), 3);

            for (variation, rule_based) in variations.iter().zip(&expected).skip(1) {
                assert_eq!(variation.generation_method(), GenerationMethod::RuleBased);
                assert_eq!(variation.content(), rule_based.content());
                assert!(variation
                    .fallback_reason()
                    .unwrap()
                    .contains("service unavailable"));
            }
        }

        #[tokio::test]
        async fn test_timeout_falls_back() {
            let generator = VariationGenerator::new()
                .with_enhancer(Arc::new(SlowEnhancer))
                .with_timeout(Duration::from_millis(20));

            let request = GenerationRequest::new(base(), 2).with_ai_assistance();
            let variations = generator.generate(&request).await;

            assert_eq!(variations.len(), 3);
            assert!(variations[1].fallback_reason().unwrap().contains("timed out"));
            assert_eq!(
                variations[1].content().subject.as_deref(),
                Some("Last chance: spring sale starts now")
            );
        }

        #[tokio::test]
        async fn test_empty_content_is_malformed() {
            let generator = VariationGenerator::new().with_enhancer(mock_enhancer(Ok("   ")));

            let request = GenerationRequest::new(base(), 1).with_ai_assistance();
            let variations = generator.generate(&request).await;

            assert!(variations[1].fallback_reason().unwrap().contains("empty"));
        }

        #[tokio::test]
        async fn test_oversized_content_is_malformed() {
            let generator = VariationGenerator::new()
                .with_enhancer(mock_enhancer(Ok("This subject line is far too long")))
                .with_max_content_chars(10);

            let request = GenerationRequest::new(base(), 1).with_ai_assistance();
            let variations = generator.generate(&request).await;

            assert_eq!(variations[1].generation_method(), GenerationMethod::RuleBased);
            assert!(variations[1].fallback_reason().unwrap().contains("exceeds"));
        }

        #[tokio::test]
        async fn test_without_enhancer_falls_back() {
            let generator = VariationGenerator::new();

            let request = GenerationRequest::new(base(), 2).with_ai_assistance();
            let variations = generator.generate(&request).await;

            assert_eq!(variations.len(), 3);
            assert!(variations[1..]
                .iter()
                .all(|v| v.fallback_reason() == Some("no content enhancer configured")));
        }
    }
}
