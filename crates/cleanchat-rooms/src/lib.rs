//! cleanchat-rooms: room membership and signaling fan-out.
//!
//! A room is a list of participants, each with an outbox channel. Relaying a
//! message delivers a clone to every participant except the sender; the
//! socket task owning each outbox is responsible for writing it out.
//!
//! ```text
//! user A ──relay(room, "a", msg)──► RoomRegistry ──► outbox(B)
//!                                                └──► outbox(C)
//! ```

use std::collections::HashMap;
use std::str::FromStr;

use cleanchat_core::{RoomError, SignalingMessage};
use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// MARK: - RoomId

/// Letters used in room ids (no `o`, to avoid confusion with `0`).
pub const ROOM_ALPHABET: &[u8] = b"abcdefghijklmnpqrstuvwxyz";

const SEGMENTS: [usize; 3] = [3, 4, 3];

/// Room identifier of the form `xxx-xxxx-xxx`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let segments: Vec<String> = SEGMENTS
            .iter()
            .map(|&len| {
                (0..len)
                    .map(|_| ROOM_ALPHABET[rng.gen_range(0..ROOM_ALPHABET.len())] as char)
                    .collect()
            })
            .collect();
        Self(segments.join("-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomId {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        let valid = parts.len() == SEGMENTS.len()
            && parts.iter().zip(SEGMENTS).all(|(part, len)| {
                part.len() == len && part.bytes().all(|b| ROOM_ALPHABET.contains(&b))
            });
        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(RoomError::InvalidRoomId { room_id: s.to_owned() })
        }
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// MARK: - Participants

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub user_id: String,
    pub host: bool,
}

struct Participant {
    user_id: String,
    host: bool,
    outbox: mpsc::UnboundedSender<SignalingMessage>,
}

// MARK: - RoomRegistry

/// Thread-safe map of live rooms.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Vec<Participant>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty room under a fresh id.
    pub fn create_room(&self) -> RoomId {
        let mut rooms = self.rooms.write();
        let id = loop {
            let candidate = RoomId::generate();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        rooms.insert(id.clone(), Vec::new());
        info!(room = %id, "Room created");
        id
    }

    pub fn join(
        &self,
        room: &RoomId,
        user_id: impl Into<String>,
        host: bool,
        outbox: mpsc::UnboundedSender<SignalingMessage>,
    ) -> Result<(), RoomError> {
        let user_id = user_id.into();
        let mut rooms = self.rooms.write();
        let participants = rooms.get_mut(room).ok_or_else(|| not_found(room))?;

        if participants.iter().any(|p| p.user_id == user_id) {
            return Err(RoomError::DuplicateParticipant {
                room_id: room.to_string(),
                user_id,
            });
        }
        info!(room = %room, user = %user_id, host, "Participant joined");
        participants.push(Participant { user_id, host, outbox });
        Ok(())
    }

    pub fn leave(&self, room: &RoomId, user_id: &str) -> Result<(), RoomError> {
        let mut rooms = self.rooms.write();
        let participants = rooms.get_mut(room).ok_or_else(|| not_found(room))?;
        let before = participants.len();
        participants.retain(|p| p.user_id != user_id);
        if participants.len() == before {
            return Err(RoomError::ParticipantNotFound {
                room_id: room.to_string(),
                user_id: user_id.to_owned(),
            });
        }
        info!(room = %room, user = %user_id, "Participant left");
        Ok(())
    }

    pub fn delete_room(&self, room: &RoomId) -> Result<(), RoomError> {
        self.rooms
            .write()
            .remove(room)
            .map(|_| info!(room = %room, "Room deleted"))
            .ok_or_else(|| not_found(room))
    }

    pub fn participants(&self, room: &RoomId) -> Result<Vec<ParticipantInfo>, RoomError> {
        let rooms = self.rooms.read();
        let participants = rooms.get(room).ok_or_else(|| not_found(room))?;
        Ok(participants
            .iter()
            .map(|p| ParticipantInfo { user_id: p.user_id.clone(), host: p.host })
            .collect())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    /// Deliver `msg` to every participant of `room` except `from_user`.
    ///
    /// Participants whose outbox is closed are removed. Returns the number
    /// of successful deliveries.
    pub fn relay(&self, room: &RoomId, from_user: &str, msg: &SignalingMessage) -> Result<usize, RoomError> {
        let mut rooms = self.rooms.write();
        let participants = rooms.get_mut(room).ok_or_else(|| not_found(room))?;

        if !participants.iter().any(|p| p.user_id == from_user) {
            return Err(RoomError::ParticipantNotFound {
                room_id: room.to_string(),
                user_id: from_user.to_owned(),
            });
        }

        let mut delivered = 0;
        participants.retain(|p| {
            if p.user_id == from_user {
                return true;
            }
            match p.outbox.send(msg.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    warn!(room = %room, user = %p.user_id, "Outbox closed; removing participant");
                    false
                }
            }
        });
        debug!(room = %room, from = %from_user, kind = %msg.kind(), delivered, "Relayed");
        Ok(delivered)
    }
}

fn not_found(room: &RoomId) -> RoomError {
    RoomError::RoomNotFound { room_id: room.to_string() }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn generated_ids_match_pattern() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let id = RoomId::generate_with(&mut rng);
            assert_eq!(id.as_str().len(), 12);
            assert!(!id.as_str().contains('o'));
            assert_eq!(id.as_str().parse::<RoomId>().unwrap(), id);
        }
    }

    #[test]
    fn parse_rejects_bad_ids() {
        for bad in ["", "abc-defg-hij-klm", "abc-defg-hi", "abc-dofg-hij", "ABC-DEFG-HIJ", "abc_defg_hij"] {
            assert!(matches!(bad.parse::<RoomId>(), Err(RoomError::InvalidRoomId { .. })), "{bad}");
        }
    }

    #[test]
    fn create_join_leave_delete() {
        let registry = RoomRegistry::new();
        let room = registry.create_room();
        assert_eq!(registry.room_count(), 1);

        let (tx, _rx) = mpsc::unbounded_channel();
        registry.join(&room, "alice", true, tx.clone()).unwrap();
        assert_eq!(
            registry.join(&room, "alice", false, tx.clone()),
            Err(RoomError::DuplicateParticipant { room_id: room.to_string(), user_id: "alice".into() })
        );
        registry.join(&room, "bob", false, tx).unwrap();

        let users = registry.participants(&room).unwrap();
        assert_eq!(
            users,
            vec![
                ParticipantInfo { user_id: "alice".into(), host: true },
                ParticipantInfo { user_id: "bob".into(), host: false },
            ]
        );

        registry.leave(&room, "alice").unwrap();
        assert!(registry.leave(&room, "alice").is_err());
        assert_eq!(registry.participants(&room).unwrap().len(), 1);

        registry.delete_room(&room).unwrap();
        assert_eq!(registry.room_count(), 0);
        assert!(matches!(registry.participants(&room), Err(RoomError::RoomNotFound { .. })));
    }

    #[test]
    fn joining_unknown_room_fails() {
        let registry = RoomRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let room: RoomId = "abc-defg-hij".parse().unwrap();
        assert!(matches!(registry.join(&room, "x", false, tx), Err(RoomError::RoomNotFound { .. })));
    }

    #[test]
    fn relay_skips_sender_and_prunes_closed_outboxes() {
        let registry = RoomRegistry::new();
        let room = registry.create_room();

        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        let (carol_tx, carol_rx) = mpsc::unbounded_channel();
        registry.join(&room, "alice", true, alice_tx).unwrap();
        registry.join(&room, "bob", false, bob_tx).unwrap();
        registry.join(&room, "carol", false, carol_tx).unwrap();
        drop(carol_rx);

        let offer = SignalingMessage::offer("v=0");
        assert_eq!(registry.relay(&room, "alice", &offer).unwrap(), 1);
        assert_eq!(bob_rx.try_recv().unwrap(), offer);
        assert!(alice_rx.try_recv().is_err());

        let names: Vec<String> = registry.participants(&room).unwrap().into_iter().map(|p| p.user_id).collect();
        assert_eq!(names, vec!["alice", "bob"]);

        let answer = SignalingMessage::answer("v=0");
        assert_eq!(registry.relay(&room, "bob", &answer).unwrap(), 1);
        assert_eq!(alice_rx.try_recv().unwrap(), answer);
    }

    #[test]
    fn relay_from_non_member_fails() {
        let registry = RoomRegistry::new();
        let room = registry.create_room();
        let err = registry.relay(&room, "mallory", &SignalingMessage::streaming(true)).unwrap_err();
        assert!(matches!(err, RoomError::ParticipantNotFound { .. }));
    }
}
