mod actions;
mod roles;
mod timer;
mod turns;
mod voting;

pub use actions::{Action, SecretDeal};
pub use roles::assign_imposter;
pub use timer::{tick, TickOutcome};
pub use turns::TurnAdvance;
pub use voting::tally;

use crate::types::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

impl GameSession {
    /// Create a fresh session in the lobby, with the creator joined as the
    /// host player.
    pub fn create(host_id: ParticipantId, display_name: String, config: GameConfig) -> Self {
        let now = Utc::now();
        let host = Participant {
            id: host_id.clone(),
            display_name,
            role: ParticipantRole::Player,
            is_host: true,
            is_active: true,
            joined_at: now,
        };

        let mut participants = HashMap::new();
        participants.insert(host_id.clone(), host);

        Self {
            id: ulid::Ulid::new().to_string(),
            host_id,
            status: SessionStatus::Lobby,
            config,
            participants,
            spectators: Default::default(),
            round: None,
            version: 1,
            recent_words: Vec::new(),
            recent_imposters: Vec::new(),
            paused_at: None,
            created_at: now,
        }
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// True for a participant who may act in the round: an active,
    /// non-spectating player.
    pub fn is_active_player(&self, id: &str) -> bool {
        self.participants
            .get(id)
            .map(|p| p.is_active && p.role == ParticipantRole::Player)
            .unwrap_or(false)
    }

    pub fn active_player_ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self
            .participants
            .values()
            .filter(|p| p.is_active && p.role == ParticipantRole::Player)
            .map(|p| p.id.clone())
            .collect();
        // Deterministic order regardless of map iteration.
        ids.sort();
        ids
    }

    pub fn active_player_count(&self) -> usize {
        self.participants
            .values()
            .filter(|p| p.is_active && p.role == ParticipantRole::Player)
            .count()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Finished | SessionStatus::Cancelled
        )
    }

    /// The participant whose speaking turn it currently is, if any.
    pub fn current_speaker(&self) -> Option<&ParticipantId> {
        let round = self.round.as_ref()?;
        if round.phase != RoundPhase::Speaking {
            return None;
        }
        round.turn_order.get(round.turn_cursor)
    }

    /// The secret material a participant is entitled to for the current
    /// round, used for re-delivery on reconnect.
    pub fn secret_for(&self, participant_id: &str) -> Option<SecretDeal> {
        let round = self.round.as_ref()?;
        if !self.is_active_player(participant_id) {
            return None;
        }
        let is_imposter = round.imposter_id == participant_id;
        Some(SecretDeal {
            participant_id: participant_id.to_string(),
            round_number: round.round_number,
            is_imposter,
            secret_word: (!is_imposter).then(|| round.secret_word.clone()),
            category: round.category.clone(),
        })
    }

    /// Drop the session into Paused, remembering when, so the grace window
    /// can be enforced. No-op if already paused.
    pub(crate) fn pause(&mut self, now: DateTime<Utc>) {
        if self.status == SessionStatus::InProgress {
            self.status = SessionStatus::Paused;
            self.paused_at = Some(now);
            tracing::info!(session = %self.id, "session paused below min players");
        }
    }

    /// Resume from Paused at the same phase, restoring the remaining phase
    /// time the pause interrupted.
    pub(crate) fn resume(&mut self, now: DateTime<Utc>) {
        if self.status != SessionStatus::Paused {
            return;
        }
        if let (Some(paused_at), Some(round)) = (self.paused_at, self.round.as_mut()) {
            let remaining = round.phase_deadline - paused_at;
            round.phase_deadline = now + remaining.max(chrono::Duration::zero());
        }
        self.status = SessionStatus::InProgress;
        self.paused_at = None;
        tracing::info!(session = %self.id, "session resumed");
    }
}
