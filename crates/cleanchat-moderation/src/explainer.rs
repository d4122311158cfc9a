use std::time::Duration;

use async_trait::async_trait;
use cleanchat_core::{LlmConfig, ModerationError};
use serde::{Deserialize, Serialize};
use tracing::debug;

// MARK: - Explainer trait

/// Produces a short, educational explanation of why text was flagged.
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, text: &str) -> Result<String, ModerationError>;
}

// MARK: - Wire types (OpenAI-compatible chat completions)

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// MARK: - ChatCompletionExplainer

#[derive(Clone)]
pub struct ChatCompletionExplainer {
    base_url: String,
    model: String,
    api_key: String,
    prompt: String,
    http_client: reqwest::Client,
}

impl ChatCompletionExplainer {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Result<Self, ModerationError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ModerationError::ExplainerFailed { reason: e.to_string() })?;
        Ok(Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            prompt: prompt.into(),
            http_client,
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>, ModerationError> {
        match config.api_key.as_deref() {
            Some(key) if !key.is_empty() => {
                Self::new(&config.base_url, &config.model, key, &config.prompt).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Explainer for ChatCompletionExplainer {
    async fn explain(&self, text: &str) -> Result<String, ModerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: &self.prompt },
                ChatMessage { role: "user", content: text },
            ],
        };

        let response = self
            .http_client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModerationError::ExplainerFailed { reason: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModerationError::ExplainerFailed { reason: format!("{status}: {body}") });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModerationError::ExplainerFailed { reason: format!("decoding response: {e}") })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .ok_or(ModerationError::EmptyCompletion)?;
        debug!(model = %self.model, "Explanation received");
        Ok(content)
    }
}
