//! cleanchat-moderation: transcript moderation for a single connection.
//!
//! A [`ModerationSession`] keeps the rolling [`TranscriptBuffer`], asks a
//! [`ProfanityScorer`] for a score on every new fragment and, when the score
//! crosses the threshold on an analysis beat, asks an [`Explainer`] why.
//!
//! ```text
//! recognizer text ──► ModerationSession ──► HttpProfanityScorer  (POST /profanity)
//!                            │          └─► ChatCompletionExplainer (POST /chat/completions)
//!                            ▼
//!                 mpsc::Sender<SignalingMessage>  (transcription, llmAnalysis, streaming)
//! ```

pub mod buffer;
pub mod explainer;
pub mod scorer;
pub mod session;

#[cfg(test)]
mod testutil;

pub use buffer::{keep_last_words, TranscriptBuffer};
pub use explainer::{ChatCompletionExplainer, Explainer};
pub use scorer::{HttpProfanityScorer, ProfanityScorer};
pub use session::{Dispatch, ModerationSession, ScoringStats};
