//! Per-connection moderation state.
//!
//! # Flow
//!
//! ```text
//! client msg ──► handle_message ── streaming ──► flag + echo
//!                               └─ offer/answer/iceCandidate ──► Dispatch::Negotiation
//!
//! transcript ──► on_transcript ──► buffer.append ──► scorer.score(buffer)
//!                                      ├─ score > threshold && cadence due ──► spawn explain ──► llmAnalysis
//!                                      └─ transcription { text, uuid, profanityScore }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cleanchat_core::{ModerationError, ServiceConfig, SignalingMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::buffer::TranscriptBuffer;
use crate::explainer::Explainer;
use crate::scorer::ProfanityScorer;

/// What the session did with a client message.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Consumed by the session.
    Handled,
    /// Peer-connection negotiation; belongs to the media layer.
    Negotiation(SignalingMessage),
    /// Not meaningful from a client.
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringStats {
    pub scored: u64,
    pub total_latency_ms: u64,
    pub explanations: u64,
}

impl ScoringStats {
    pub fn average_latency_ms(&self) -> Option<u64> {
        (self.scored > 0).then(|| self.total_latency_ms / self.scored)
    }
}

pub struct ModerationSession {
    session_id: String,
    buffer: TranscriptBuffer,
    threshold: f64,
    scorer: Arc<dyn ProfanityScorer>,
    explainer: Option<Arc<dyn Explainer>>,
    outbound: mpsc::Sender<SignalingMessage>,
    streaming: Arc<AtomicBool>,
    last_text: Option<String>,
    stats: ScoringStats,
}

impl ModerationSession {
    pub fn new(
        session_id: impl Into<String>,
        config: &ServiceConfig,
        scorer: Arc<dyn ProfanityScorer>,
        explainer: Option<Arc<dyn Explainer>>,
        outbound: mpsc::Sender<SignalingMessage>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            buffer: TranscriptBuffer::new(config.buffer_words, config.analysis_interval),
            threshold: config.profanity_threshold,
            scorer,
            explainer,
            outbound,
            streaming: Arc::new(AtomicBool::new(false)),
            last_text: None,
            stats: ScoringStats::default(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Relaxed)
    }

    /// Shared flag for an audio reader that should drop packets while off.
    pub fn streaming_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.streaming)
    }

    pub fn stats(&self) -> ScoringStats {
        self.stats
    }

    pub fn buffer(&self) -> &TranscriptBuffer {
        &self.buffer
    }

    // ── Client messages ──────────────────────────────────────────────────────

    pub async fn handle_message(&mut self, msg: SignalingMessage) -> Result<Dispatch, ModerationError> {
        match msg {
            SignalingMessage::Streaming { is_streaming } => {
                self.streaming.store(is_streaming, Ordering::Relaxed);
                if is_streaming {
                    info!(session = %self.session_id, "Starting streaming");
                } else {
                    info!(session = %self.session_id, "Stopping streaming");
                }
                self.send(SignalingMessage::streaming(is_streaming)).await?;
                Ok(Dispatch::Handled)
            }
            msg if msg.kind().is_negotiation() => {
                debug!(session = %self.session_id, kind = %msg.kind(), "Negotiation message");
                Ok(Dispatch::Negotiation(msg))
            }
            other => {
                warn!(session = %self.session_id, kind = %other.kind(), "Ignoring server-only message from client");
                Ok(Dispatch::Ignored)
            }
        }
    }

    // ── Transcripts ──────────────────────────────────────────────────────────

    /// Feed one recognized fragment.
    ///
    /// Returns the buffer's score, or `None` when the fragment was skipped
    /// (streaming off, blank, or a repeat of the previous fragment).
    pub async fn on_transcript(&mut self, text: &str) -> Result<Option<f64>, ModerationError> {
        if !self.is_streaming() {
            return Ok(None);
        }
        let fragment = text.trim().to_lowercase();
        if fragment.is_empty() || self.last_text.as_deref() == Some(fragment.as_str()) {
            return Ok(None);
        }
        self.last_text = Some(fragment.clone());
        debug!(session = %self.session_id, text = %fragment, "Transcription");

        if self.buffer.is_empty() {
            self.buffer.append(&fragment);
        } else {
            self.buffer.append(&format!(" {fragment}"));
        }

        let started = Instant::now();
        let score = self.scorer.score(self.buffer.as_str()).await?;
        self.stats.scored += 1;
        self.stats.total_latency_ms += started.elapsed().as_millis() as u64;
        info!(
            session = %self.session_id,
            profanity_score = score,
            avg_ms = self.stats.average_latency_ms().unwrap_or(0),
            "Profanity analysis"
        );

        if score > self.threshold && self.buffer.analysis_due() {
            self.spawn_explanation();
        }

        let id = Uuid::new_v4().to_string();
        self.send(SignalingMessage::transcription(fragment, id, score)).await?;
        Ok(Some(score))
    }

    fn spawn_explanation(&mut self) {
        let Some(explainer) = self.explainer.clone() else {
            debug!(session = %self.session_id, "No explainer configured; skipping analysis");
            return;
        };
        self.stats.explanations += 1;

        let snapshot = self.buffer.as_str().to_owned();
        let outbound = self.outbound.clone();
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            match explainer.explain(&snapshot).await {
                Ok(message) => {
                    info!(session = %session_id, content = %message, "LLM answer");
                    if outbound.send(SignalingMessage::llm_analysis(message, snapshot)).await.is_err() {
                        debug!(session = %session_id, "Outbound closed before analysis was delivered");
                    }
                }
                Err(e) => warn!(session = %session_id, "Explanation failed: {e}"),
            }
        });
    }

    async fn send(&self, msg: SignalingMessage) -> Result<(), ModerationError> {
        self.outbound.send(msg).await.map_err(|_| ModerationError::ChannelClosed)
    }
}
