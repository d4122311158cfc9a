use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::CleanChatError;

pub const DEFAULT_LLM_PROMPT: &str = "You are a helpful assistant aiding a user in understanding transcribed audio.
The provided text contains profanity.

In under 20 words, explain why the text is profane.
Focus on the reason behind the profanity without explicitly stating \"this is profane\" or similar phrases.

Be concise, direct, and educational to help the user learn.";

// MARK: - LlmConfig

/// Chat-completion endpoint used to explain flagged text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(alias = "baseUrl")]
    pub base_url: String,
    pub model: String,
    /// Never serialized back out.
    #[serde(alias = "apiKey", skip_serializing)]
    pub api_key: Option<String>,
    pub prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            prompt: DEFAULT_LLM_PROMPT.into(),
        }
    }
}

impl LlmConfig {
    /// Explanations are only requested when a key is configured.
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

// MARK: - ServiceConfig

/// Backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listen port of a hosting signaling server. The console binary does
    /// not bind it.
    pub port: u16,
    #[serde(alias = "profanityUrl")]
    pub profanity_url: String,
    /// Scores strictly above this trigger an explanation.
    #[serde(alias = "profanityThreshold")]
    pub profanity_threshold: f64,
    /// Trailing words kept in the transcript buffer.
    #[serde(alias = "bufferWords")]
    pub buffer_words: usize,
    /// Fragments between two explanation requests.
    #[serde(alias = "analysisInterval")]
    pub analysis_interval: u32,
    #[serde(alias = "inputSampleRate")]
    pub input_sample_rate: u32,
    #[serde(alias = "modelSampleRate")]
    pub model_sample_rate: u32,
    pub llm: LlmConfig,
    #[serde(alias = "allowedHosts")]
    pub allowed_hosts: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            profanity_url: "http://profanity:8080/profanity".into(),
            profanity_threshold: 0.9,
            buffer_words: 8,
            analysis_interval: 7,
            input_sample_rate: 48_000,
            model_sample_rate: 16_000,
            llm: LlmConfig::default(),
            allowed_hosts: vec!["ai-clean-chat.home.site".into()],
        }
    }
}

impl ServiceConfig {
    /// Load from `CLEANCHAT_CONFIG` (a JSON file, optional) and then apply
    /// environment overrides.
    pub fn from_env() -> Result<Self, CleanChatError> {
        let mut config = match std::env::var("CLEANCHAT_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CleanChatError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading config file");
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Apply `PORT`, `PROFANITY_URL`, `PROFANITY_THRESHOLD`, `OPENAI_*` and
    /// `CLEANCHAT_ALLOWED_HOSTS` from `lookup`. Unparseable numbers are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(p) => self.port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid PORT"),
            }
        }
        if let Some(url) = lookup("PROFANITY_URL") {
            self.profanity_url = url;
        }
        if let Some(threshold) = lookup("PROFANITY_THRESHOLD") {
            match threshold.parse() {
                Ok(t) => self.profanity_threshold = t,
                Err(_) => warn!(value = %threshold, "Ignoring invalid PROFANITY_THRESHOLD"),
            }
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(hosts) = lookup("CLEANCHAT_ALLOWED_HOSTS") {
            self.allowed_hosts = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_owned)
                .collect();
        }
    }

    pub fn validate(&self) -> Result<(), CleanChatError> {
        let invalid = |reason: &str| CleanChatError::ConfigurationInvalid { reason: reason.into() };

        if !(0.0..=1.0).contains(&self.profanity_threshold) {
            return Err(invalid("profanity_threshold must be within [0, 1]"));
        }
        if self.buffer_words == 0 {
            return Err(invalid("buffer_words must be greater than zero"));
        }
        if self.analysis_interval == 0 {
            return Err(invalid("analysis_interval must be greater than zero"));
        }
        if self.input_sample_rate == 0 || self.model_sample_rate == 0 {
            return Err(invalid("sample rates must be greater than zero"));
        }
        if self.input_sample_rate < self.model_sample_rate {
            return Err(invalid("input_sample_rate must not be below model_sample_rate"));
        }
        if self.profanity_url.is_empty() {
            return Err(invalid("profanity_url is empty"));
        }
        Ok(())
    }

    /// Host-header check. Ignores case and any `:port` suffix; an empty
    /// allow-list accepts every host.
    pub fn host_allowed(&self, host: &str) -> bool {
        if self.allowed_hosts.is_empty() {
            return true;
        }
        let name = strip_port(host.trim());
        self.allowed_hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(name))
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literal, e.g. "[::1]:8080".
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
