//! Content enhancer trait definition

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Which part of a content payload an enhancement request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementContext {
    SubjectLine,
    Body,
    CallToAction,
}

impl EnhancementContext {
    /// Instruction prefix sent along with the content
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::SubjectLine => {
                "Rewrite this email subject line as a distinct alternative for an A/B test. \
                 Reply with the subject line only."
            }
            Self::Body => {
                "Rewrite this marketing copy as a distinct alternative for an A/B test, \
                 keeping its meaning. Reply with the copy only."
            }
            Self::CallToAction => {
                "Suggest an alternative call to action for an A/B test. \
                 Reply with the call to action only."
            }
        }
    }
}

impl fmt::Display for EnhancementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubjectLine => write!(f, "subject_line"),
            Self::Body => write!(f, "body"),
            Self::CallToAction => write!(f, "call_to_action"),
        }
    }
}

/// External capability that rewrites content
///
/// Callers apply their own timeout; implementations may block on network I/O.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentEnhancer: Send + Sync + fmt::Debug {
    /// Produce enhanced content for the prompt
    async fn enhance(
        &self,
        prompt: &str,
        context: EnhancementContext,
    ) -> Result<String, DomainError>;

    /// Name used in logs and provider errors
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        assert_eq!(EnhancementContext::SubjectLine.to_string(), "subject_line");
        assert_eq!(EnhancementContext::CallToAction.to_string(), "call_to_action");
    }

    #[tokio::test]
    async fn test_mock_enhancer() {
        let mut mock = MockContentEnhancer::new();
        mock.expect_enhance()
            .withf(|prompt, context| {
                prompt.contains("Spring sale") && *context == EnhancementContext::SubjectLine
            })
            .returning(|_, _| Ok("Spring savings start now".to_string()));

        let result = mock
            .enhance("Spring sale", EnhancementContext::SubjectLine)
            .await
            .unwrap();
        assert_eq!(result, "Spring savings start now");
    }
}
