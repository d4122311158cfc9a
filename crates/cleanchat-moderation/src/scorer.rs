use std::time::Duration;

use async_trait::async_trait;
use cleanchat_core::ModerationError;
use serde::{Deserialize, Serialize};
use tracing::debug;

// MARK: - ProfanityScorer trait

/// Scores a piece of text for profanity, `0.0` (clean) to `1.0`.
#[async_trait]
pub trait ProfanityScorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<f64, ModerationError>;
}

// MARK: - HttpProfanityScorer

#[derive(Serialize)]
struct ScoreRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ScoreResponse {
    profanity_score: f64,
}

/// Client for the classifier service: `POST {"text"}` → `{"profanity_score"}`.
#[derive(Clone)]
pub struct HttpProfanityScorer {
    url: String,
    http_client: reqwest::Client,
}

impl HttpProfanityScorer {
    pub fn new(url: impl Into<String>) -> Result<Self, ModerationError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ModerationError::ScorerUnavailable { reason: e.to_string() })?;
        Ok(Self { url: url.into(), http_client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProfanityScorer for HttpProfanityScorer {
    async fn score(&self, text: &str) -> Result<f64, ModerationError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&ScoreRequest { text })
            .send()
            .await
            .map_err(|e| ModerationError::ScorerUnavailable { reason: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModerationError::ScorerRejected { status: status.as_u16() });
        }

        let body: ScoreResponse = response
            .json()
            .await
            .map_err(|e| ModerationError::ScorerUnavailable { reason: format!("decoding response: {e}") })?;
        debug!(score = body.profanity_score, "Classifier replied");
        Ok(body.profanity_score)
    }
}
