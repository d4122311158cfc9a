use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanChatError {
    #[error("Configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Moderation error: {0}")]
    Moderation(#[from] ModerationError),

    #[error("Room error: {0}")]
    Room(#[from] RoomError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed signaling message: {reason}")]
    MalformedMessage { reason: String },

    #[error("Invalid ICE candidate: {reason}")]
    InvalidCandidate { reason: String },

    #[error("Session description type '{found}' does not match message type '{expected}'")]
    DescriptionMismatch { expected: String, found: String },

    #[error("Failed to encode message: {reason}")]
    Encode { reason: String },
}

#[derive(Error, Debug)]
pub enum ModerationError {
    #[error("Profanity scorer unavailable: {reason}")]
    ScorerUnavailable { reason: String },

    #[error("Profanity scorer rejected request with status {status}")]
    ScorerRejected { status: u16 },

    #[error("Explainer failed: {reason}")]
    ExplainerFailed { reason: String },

    #[error("Explainer returned an empty completion")]
    EmptyCompletion,

    #[error("Outbound channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room not found: {room_id}")]
    RoomNotFound { room_id: String },

    #[error("Invalid room id '{room_id}'")]
    InvalidRoomId { room_id: String },

    #[error("User {user_id} already joined room {room_id}")]
    DuplicateParticipant { room_id: String, user_id: String },

    #[error("User {user_id} is not in room {room_id}")]
    ParticipantNotFound { room_id: String, user_id: String },
}
