use std::sync::Arc;

use anyhow::{Context, Result};
use cleanchat_core::{ModerationError, ProtocolError, ServiceConfig, SignalingMessage};
use cleanchat_moderation::{
    ChatCompletionExplainer, Dispatch, Explainer, HttpProfanityScorer, ModerationSession, ProfanityScorer,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Console driver for one moderation session.
///
/// # Input (stdin, one item per line)
/// - a JSON object → decoded as a signaling message
///   (`{"type":"streaming","isStreaming":true}` must come first)
/// - anything else → a recognized transcript fragment
///
/// # Output (stdout)
/// Every outbound message, encoded as one JSON line.
pub async fn run() -> Result<()> {
    let config = ServiceConfig::from_env().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let scorer: Arc<dyn ProfanityScorer> = Arc::new(HttpProfanityScorer::new(&config.profanity_url)?);
    let explainer: Option<Arc<dyn Explainer>> = ChatCompletionExplainer::from_config(&config.llm)?
        .map(|e| Arc::new(e) as Arc<dyn Explainer>);

    info!("Profanity classifier: {}", config.profanity_url);
    if explainer.is_some() {
        info!("Explanations enabled (model {})", config.llm.model);
    } else {
        info!("OPENAI_API_KEY not set; explanations disabled");
    }

    let (outbound_tx, outbound_rx) = mpsc::channel::<SignalingMessage>(64);
    let writer = tokio::spawn(write_outbound(outbound_rx));

    let mut session = ModerationSession::new("console", &config, scorer, explainer, outbound_tx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        match classify_line(&line) {
            Input::Blank => {}
            Input::Invalid(e) => warn!("Bad message incoming: {e}"),
            Input::Message(msg) => {
                if let Dispatch::Negotiation(msg) = session.handle_message(msg).await? {
                    warn!(kind = %msg.kind(), "No media layer attached; dropping negotiation message");
                }
            }
            Input::Transcript(text) => match session.on_transcript(text).await {
                Ok(Some(score)) => debug!(score, "Fragment scored"),
                Ok(None) => debug!("Fragment skipped"),
                Err(ModerationError::ChannelClosed) => anyhow::bail!("outbound writer stopped"),
                Err(e) => warn!("Error analyzing buffer: {e}"),
            },
        }
    }

    let stats = session.stats();
    info!(
        scored = stats.scored,
        explanations = stats.explanations,
        avg_ms = stats.average_latency_ms().unwrap_or(0),
        "Input closed"
    );

    // Pending explanations hold their own senders; the writer drains them.
    drop(session);
    writer.await.context("outbound writer panicked")?
}

// ── Input classification ─────────────────────────────────────────────────────

#[derive(Debug)]
enum Input<'a> {
    Blank,
    Message(SignalingMessage),
    Invalid(ProtocolError),
    Transcript(&'a str),
}

fn classify_line(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        Input::Blank
    } else if line.starts_with('{') {
        match SignalingMessage::decode(line) {
            Ok(msg) => Input::Message(msg),
            Err(e) => Input::Invalid(e),
        }
    } else {
        Input::Transcript(line)
    }
}

// ── Outbound writer ──────────────────────────────────────────────────────────

async fn write_outbound(mut rx: mpsc::Receiver<SignalingMessage>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(msg) = rx.recv().await {
        let mut line = msg.encode()?;
        line.push('\n');
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}
