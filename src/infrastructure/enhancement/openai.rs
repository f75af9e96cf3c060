use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http_client::HttpClientTrait;
use crate::domain::{ContentEnhancer, DomainError, EnhancementContext};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const PROVIDER_NAME: &str = "openai";

/// Content enhancer backed by the OpenAI chat completions API
#[derive(Debug)]
pub struct OpenAiEnhancer<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
}

impl<C: HttpClientTrait> OpenAiEnhancer<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request(&self, prompt: &str, context: EnhancementContext) -> serde_json::Value {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: Some(context.instruction().to_string()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            },
        ];

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "temperature": 0.9,
        })
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<String, DomainError> {
        let response: ChatResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::provider(PROVIDER_NAME, "No choices in response"))?;

        let content = choice.message.content.unwrap_or_default();
        let content = content.trim().trim_matches('"').trim();

        if content.is_empty() {
            return Err(DomainError::provider(PROVIDER_NAME, "Empty completion"));
        }

        Ok(content.to_string())
    }
}

#[async_trait]
impl<C: HttpClientTrait> ContentEnhancer for OpenAiEnhancer<C> {
    async fn enhance(
        &self,
        prompt: &str,
        context: EnhancementContext,
    ) -> Result<String, DomainError> {
        let url = self.chat_completions_url();
        let body = self.build_request(prompt, context);
        let response = self
            .client
            .post_json(&url, self.headers(), &body)
            .await?;

        self.parse_response(response)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
