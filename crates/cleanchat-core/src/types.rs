//! Signaling message model shared by the browser client and the backend.
//!
//! Every message is a JSON object whose `type` field is a literal
//! discriminant. Decoding is tolerant of the older shapes still sent by
//! some clients (`payload`-wrapped descriptions, string-encoded ICE
//! candidates); encoding always produces the canonical flat shape.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

// MARK: - Discriminants

pub const ICE_CANDIDATE: &str = "iceCandidate";
pub const OFFER: &str = "offer";
pub const ANSWER: &str = "answer";
pub const STREAMING: &str = "streaming";
pub const TRANSCRIPTION: &str = "transcription";
pub const LLM_ANALYSIS: &str = "llmAnalysis";

/// The `type` discriminant of a [`SignalingMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Offer,
    Answer,
    IceCandidate,
    Streaming,
    Transcription,
    LlmAnalysis,
}

impl MessageKind {
    pub const ALL: [MessageKind; 6] = [
        Self::Offer,
        Self::Answer,
        Self::IceCandidate,
        Self::Streaming,
        Self::Transcription,
        Self::LlmAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => OFFER,
            Self::Answer => ANSWER,
            Self::IceCandidate => ICE_CANDIDATE,
            Self::Streaming => STREAMING,
            Self::Transcription => TRANSCRIPTION,
            Self::LlmAnalysis => LLM_ANALYSIS,
        }
    }

    /// Offer, answer and ICE candidates belong to peer-connection negotiation.
    pub fn is_negotiation(&self) -> bool {
        matches!(self, Self::Offer | Self::Answer | Self::IceCandidate)
    }

    /// Kinds only ever produced by the backend.
    pub fn is_server_originated(&self) -> bool {
        matches!(self, Self::Transcription | Self::LlmAnalysis)
    }
}

impl FromStr for MessageKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProtocolError::MalformedMessage {
                reason: format!("unknown message type '{s}'"),
            })
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// MARK: - SessionDescription

/// SDP body of an offer or answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SessionDescriptionWire")]
pub struct SessionDescription {
    pub sdp: String,
}

impl SessionDescription {
    pub fn new(sdp: impl Into<String>) -> Self {
        Self { sdp: sdp.into() }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SessionDescriptionWire {
    Flat { sdp: String },
    Wrapped { payload: SessionDescriptionInit },
}

/// Browser `RTCSessionDescriptionInit`; its own `type` is checked in
/// [`SignalingMessage::decode`].
#[derive(Deserialize)]
struct SessionDescriptionInit {
    sdp: String,
}

impl From<SessionDescriptionWire> for SessionDescription {
    fn from(wire: SessionDescriptionWire) -> Self {
        match wire {
            SessionDescriptionWire::Flat { sdp } => Self { sdp },
            SessionDescriptionWire::Wrapped { payload } => Self { sdp: payload.sdp },
        }
    }
}

// MARK: - IceCandidateInit

/// Browser `RTCIceCandidateInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateInit {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidateInit {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }

    pub fn with_mid(mut self, sdp_mid: impl Into<String>, sdp_m_line_index: u16) -> Self {
        self.sdp_mid = Some(sdp_mid.into());
        self.sdp_m_line_index = Some(sdp_m_line_index);
        self
    }
}

/// Body of an `iceCandidate` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CandidateWire")]
pub struct CandidatePayload {
    pub candidate: IceCandidateInit,
}

#[derive(Deserialize)]
struct CandidateWire {
    #[serde(default)]
    candidate: Option<CandidateField>,
    #[serde(default)]
    payload: Option<IceCandidateInit>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateField {
    Init(IceCandidateInit),
    Encoded(String),
}

impl TryFrom<CandidateWire> for CandidatePayload {
    type Error = ProtocolError;

    fn try_from(wire: CandidateWire) -> Result<Self, Self::Error> {
        let candidate = match (wire.candidate, wire.payload) {
            (Some(CandidateField::Init(init)), _) => init,
            (Some(CandidateField::Encoded(raw)), _) => {
                serde_json::from_str::<IceCandidateInit>(&raw).map_err(|e| {
                    ProtocolError::InvalidCandidate { reason: format!("encoded candidate: {e}") }
                })?
            }
            (None, Some(init)) => init,
            (None, None) => {
                return Err(ProtocolError::InvalidCandidate {
                    reason: "missing 'candidate' or 'payload'".into(),
                })
            }
        };

        if candidate.candidate.is_empty() {
            return Err(ProtocolError::InvalidCandidate { reason: "empty candidate string".into() });
        }
        Ok(Self { candidate })
    }
}

// MARK: - SignalingMessage

/// A message exchanged over the client WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SignalingMessage {
    #[serde(rename = "offer")]
    Offer(SessionDescription),

    #[serde(rename = "answer")]
    Answer(SessionDescription),

    #[serde(rename = "iceCandidate")]
    IceCandidate(CandidatePayload),

    /// Start/stop flag for audio transcription.
    #[serde(rename = "streaming", rename_all = "camelCase")]
    Streaming { is_streaming: bool },

    /// A transcribed fragment with the profanity score of its buffer.
    #[serde(rename = "transcription", rename_all = "camelCase")]
    Transcription {
        text: String,
        uuid: String,
        profanity_score: f64,
    },

    /// LLM explanation of why the user's text scored as profane.
    #[serde(rename = "llmAnalysis", rename_all = "camelCase")]
    LlmAnalysis {
        llm_message: String,
        user_message: String,
    },
}

impl SignalingMessage {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self::Offer(SessionDescription::new(sdp))
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self::Answer(SessionDescription::new(sdp))
    }

    pub fn ice_candidate(candidate: IceCandidateInit) -> Self {
        Self::IceCandidate(CandidatePayload { candidate })
    }

    pub fn streaming(is_streaming: bool) -> Self {
        Self::Streaming { is_streaming }
    }

    pub fn transcription(text: impl Into<String>, uuid: impl Into<String>, profanity_score: f64) -> Self {
        Self::Transcription {
            text: text.into(),
            uuid: uuid.into(),
            profanity_score,
        }
    }

    pub fn llm_analysis(llm_message: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self::LlmAnalysis {
            llm_message: llm_message.into(),
            user_message: user_message.into(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Offer(_) => MessageKind::Offer,
            Self::Answer(_) => MessageKind::Answer,
            Self::IceCandidate(_) => MessageKind::IceCandidate,
            Self::Streaming { .. } => MessageKind::Streaming,
            Self::Transcription { .. } => MessageKind::Transcription,
            Self::LlmAnalysis { .. } => MessageKind::LlmAnalysis,
        }
    }

    /// Parse a message from its JSON text.
    ///
    /// Besides the serde shape this checks that a `payload`-wrapped session
    /// description declares the same type as the message itself, and that an
    /// ICE candidate is present and non-empty.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedMessage { reason: e.to_string() })?;
        check_description_type(&value)?;
        check_candidate(&value)?;
        serde_json::from_value(value)
            .map_err(|e| ProtocolError::MalformedMessage { reason: e.to_string() })
    }

    /// Serialize to canonical JSON text.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode { reason: e.to_string() })
    }
}

fn check_description_type(value: &serde_json::Value) -> Result<(), ProtocolError> {
    let Some(outer) = value.get("type").and_then(|t| t.as_str()) else {
        return Ok(());
    };
    if outer != OFFER && outer != ANSWER {
        return Ok(());
    }
    let inner = value
        .get("payload")
        .and_then(|p| p.get("type"))
        .and_then(|t| t.as_str());
    match inner {
        Some(found) if found != outer => Err(ProtocolError::DescriptionMismatch {
            expected: outer.to_owned(),
            found: found.to_owned(),
        }),
        _ => Ok(()),
    }
}

fn check_candidate(value: &serde_json::Value) -> Result<(), ProtocolError> {
    if value.get("type").and_then(|t| t.as_str()) != Some(ICE_CANDIDATE) {
        return Ok(());
    }
    let present = |key: &str| value.get(key).filter(|v| !v.is_null());

    let parsed = match (present("candidate"), present("payload")) {
        (Some(serde_json::Value::String(raw)), _) => serde_json::from_str::<IceCandidateInit>(raw)
            .map_err(|e| format!("encoded candidate: {e}")),
        (Some(field), _) | (None, Some(field)) => {
            IceCandidateInit::deserialize(field).map_err(|e| e.to_string())
        }
        (None, None) => Err("missing 'candidate' or 'payload'".to_owned()),
    };

    match parsed {
        Ok(init) if init.candidate.is_empty() => Err(ProtocolError::InvalidCandidate {
            reason: "empty candidate string".into(),
        }),
        Ok(_) => Ok(()),
        Err(reason) => Err(ProtocolError::InvalidCandidate { reason }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_encodes_with_literal_discriminant() {
        let msg = SignalingMessage::offer("v=0\r\n");
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(json["type"], "offer");
        assert_eq!(json["sdp"], "v=0\r\n");
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn every_kind_roundtrips_through_canonical_json() {
        let messages = vec![
            SignalingMessage::offer("o"),
            SignalingMessage::answer("a"),
            SignalingMessage::ice_candidate(IceCandidateInit::new("candidate:1 1 udp 1 10.0.0.1 5000 typ host").with_mid("0", 0)),
            SignalingMessage::streaming(true),
            SignalingMessage::transcription("hello there", "id-1", 0.25),
            SignalingMessage::llm_analysis("Insulting language.", "you idiot"),
        ];
        for msg in messages {
            let text = msg.encode().unwrap();
            let back = SignalingMessage::decode(&text).unwrap();
            assert_eq!(back, msg, "roundtrip of {text}");
            let json: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(json["type"], msg.kind().as_str());
        }
    }

    #[test]
    fn streaming_uses_camel_case_flag() {
        let msg = SignalingMessage::decode(r#"{"type":"streaming","isStreaming":false}"#).unwrap();
        assert_eq!(msg, SignalingMessage::streaming(false));
    }

    #[test]
    fn transcription_fields_are_camel_case() {
        let text = SignalingMessage::transcription("t", "u", 0.5).encode().unwrap();
        assert!(text.contains("\"profanityScore\":0.5"));
        let text = SignalingMessage::llm_analysis("why", "what").encode().unwrap();
        assert!(text.contains("\"llmMessage\":\"why\""));
        assert!(text.contains("\"userMessage\":\"what\""));
    }

    #[test]
    fn payload_wrapped_offer_decodes_like_flat_offer() {
        let wrapped = r#"{"type":"offer","payload":{"type":"offer","sdp":"v=0"}}"#;
        assert_eq!(SignalingMessage::decode(wrapped).unwrap(), SignalingMessage::offer("v=0"));
    }

    #[test]
    fn payload_type_must_match_message_type() {
        let wrapped = r#"{"type":"answer","payload":{"type":"offer","sdp":"v=0"}}"#;
        let err = SignalingMessage::decode(wrapped).unwrap_err();
        assert!(matches!(err, ProtocolError::DescriptionMismatch { .. }));
    }

    #[test]
    fn browser_candidate_object_decodes() {
        let json = r#"{"type":"iceCandidate","candidate":{"candidate":"candidate:0 1 UDP 2122 192.168.1.2 5000 typ host","sdpMid":"0","sdpMLineIndex":0,"usernameFragment":"abcd"}}"#;
        let SignalingMessage::IceCandidate(payload) = SignalingMessage::decode(json).unwrap() else {
            panic!("expected iceCandidate");
        };
        assert_eq!(payload.candidate.sdp_mid.as_deref(), Some("0"));
        assert_eq!(payload.candidate.sdp_m_line_index, Some(0));
        assert_eq!(payload.candidate.username_fragment.as_deref(), Some("abcd"));
    }

    #[test]
    fn string_encoded_and_payload_candidates_decode() {
        let expected = SignalingMessage::ice_candidate(IceCandidateInit::new("candidate:1").with_mid("0", 0));
        let encoded = r#"{"type":"iceCandidate","candidate":"{\"candidate\":\"candidate:1\",\"sdpMid\":\"0\",\"sdpMLineIndex\":0}"}"#;
        let payload = r#"{"type":"iceCandidate","payload":{"candidate":"candidate:1","sdpMid":"0","sdpMLineIndex":0}}"#;
        assert_eq!(SignalingMessage::decode(encoded).unwrap(), expected);
        assert_eq!(SignalingMessage::decode(payload).unwrap(), expected);
    }

    #[test]
    fn null_mid_is_accepted() {
        let json = r#"{"type":"iceCandidate","candidate":{"candidate":"candidate:1","sdpMid":null,"sdpMLineIndex":null}}"#;
        let msg = SignalingMessage::decode(json).unwrap();
        assert_eq!(msg, SignalingMessage::ice_candidate(IceCandidateInit::new("candidate:1")));
    }

    #[test]
    fn empty_or_missing_candidate_is_invalid_candidate() {
        for json in [
            r#"{"type":"iceCandidate","candidate":{"candidate":""}}"#,
            r#"{"type":"iceCandidate"}"#,
            r#"{"type":"iceCandidate","candidate":"not json"}"#,
            r#"{"type":"iceCandidate","candidate":"{\"candidate\":\"\"}"}"#,
            r#"{"type":"iceCandidate","payload":{"candidate":""}}"#,
        ] {
            let err = SignalingMessage::decode(json).unwrap_err();
            assert!(matches!(err, ProtocolError::InvalidCandidate { .. }), "{json}: {err}");
        }
    }

    #[test]
    fn empty_candidate_reason_is_preserved() {
        let err = SignalingMessage::decode(r#"{"type":"iceCandidate","candidate":{"candidate":""}}"#).unwrap_err();
        let ProtocolError::InvalidCandidate { reason } = &err else {
            panic!("expected InvalidCandidate, got {err:?}");
        };
        assert_eq!(reason, "empty candidate string");
    }

    #[test]
    fn unknown_type_and_missing_fields_are_malformed() {
        for json in [
            r#"{"type":"bye"}"#,
            r#"{"sdp":"v=0"}"#,
            r#"{"type":"offer"}"#,
            r#"{"type":"streaming"}"#,
            "not json at all",
        ] {
            assert!(
                matches!(SignalingMessage::decode(json), Err(ProtocolError::MalformedMessage { .. })),
                "{json}"
            );
        }
    }

    #[test]
    fn kind_parsing_and_classification() {
        for kind in MessageKind::ALL {
            assert_eq!(kind.as_str().parse::<MessageKind>().unwrap(), kind);
        }
        assert!("Offer".parse::<MessageKind>().is_err());
        assert!(MessageKind::IceCandidate.is_negotiation());
        assert!(!MessageKind::Streaming.is_negotiation());
        assert!(MessageKind::LlmAnalysis.is_server_originated());
    }
}
