use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Actions a connected client may issue. Identity (participant id and
/// display name) comes from the connection, not the message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateSession {
        #[serde(default)]
        config: Option<GameConfig>,
    },
    Join {
        session_id: SessionId,
    },
    Leave {
        session_id: SessionId,
    },
    StartGame {
        session_id: SessionId,
    },
    Speak {
        session_id: SessionId,
        word: String,
    },
    Vote {
        session_id: SessionId,
        target_id: ParticipantId,
    },
    AckWord {
        session_id: SessionId,
    },
    Spectate {
        session_id: SessionId,
    },
    EndSession {
        session_id: SessionId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        participant_id: ParticipantId,
        server_now: DateTime<Utc>,
    },
    /// The canonical public snapshot, broadcast after every accepted write.
    SessionState {
        session: PublicSession,
        server_now: DateTime<Utc>,
    },
    /// Per-participant secret material, sent once per round over the
    /// private channel and never part of the shared broadcast.
    SecretRole {
        session_id: SessionId,
        round_number: u32,
        is_imposter: bool,
        secret_word: Option<String>,
        category: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Participant info as shown to everyone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantInfo {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: ParticipantRole,
    pub is_host: bool,
    pub is_active: bool,
}

/// Round state as shown to everyone: the imposter's identity and the
/// secret word stay out until the Results phase publishes them inside
/// `results`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicRound {
    pub round_number: u32,
    pub max_rounds: u32,
    pub category: String,
    pub phase: RoundPhase,
    pub phase_deadline: DateTime<Utc>,
    pub turn_order: Vec<ParticipantId>,
    pub current_speaker: Option<ParticipantId>,
    pub cycles_done: u32,
    pub spoken: Vec<SpokenWord>,
    pub votes: HashMap<ParticipantId, ParticipantId>,
    pub results: Option<RoundResults>,
}

/// The shared view of a session. Everything here is safe to broadcast to
/// every subscriber, including spectators and the imposter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicSession {
    pub id: SessionId,
    pub host_id: ParticipantId,
    pub status: SessionStatus,
    pub config: GameConfig,
    pub version: u64,
    pub participants: Vec<ParticipantInfo>,
    pub round: Option<PublicRound>,
}

impl From<&GameSession> for PublicSession {
    fn from(session: &GameSession) -> Self {
        let mut participants: Vec<ParticipantInfo> = session
            .participants
            .values()
            .map(|p| ParticipantInfo {
                id: p.id.clone(),
                display_name: p.display_name.clone(),
                role: p.role,
                is_host: p.is_host,
                is_active: p.is_active,
            })
            .collect();
        participants.sort_by(|a, b| a.id.cmp(&b.id));

        let round = session.round.as_ref().map(|r| PublicRound {
            round_number: r.round_number,
            max_rounds: r.max_rounds,
            category: r.category.clone(),
            phase: r.phase,
            phase_deadline: r.phase_deadline,
            turn_order: r.turn_order.clone(),
            current_speaker: session.current_speaker().cloned(),
            cycles_done: r.cycles_done,
            spoken: r.spoken.clone(),
            votes: r.votes.clone(),
            results: r.results.clone(),
        });

        Self {
            id: session.id.clone(),
            host_id: session.host_id.clone(),
            status: session.status,
            config: session.config.clone(),
            version: session.version,
            participants,
            round,
        }
    }
}
