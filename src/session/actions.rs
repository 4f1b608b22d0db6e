use super::{assign_imposter, tally, TurnAdvance};
use crate::error::GameError;
use crate::types::*;
use crate::words::WordBank;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

/// The action API surface. Every action is validated against the current
/// status/phase/role before any mutation; invalid actions are rejected
/// with a typed error, never silently ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Join {
        participant_id: ParticipantId,
        display_name: String,
    },
    Leave {
        participant_id: ParticipantId,
    },
    StartGame {
        participant_id: ParticipantId,
    },
    Speak {
        participant_id: ParticipantId,
        word: String,
    },
    Vote {
        voter_id: ParticipantId,
        target_id: ParticipantId,
    },
    AckWord {
        participant_id: ParticipantId,
    },
    Spectate {
        participant_id: ParticipantId,
        display_name: String,
    },
    EndSession {
        participant_id: ParticipantId,
    },
}

/// Per-participant secret material for one round. Delivered individually,
/// never through the shared snapshot broadcast.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SecretDeal {
    pub participant_id: ParticipantId,
    pub round_number: u32,
    pub is_imposter: bool,
    /// `None` for the imposter, who never receives the word.
    pub secret_word: Option<String>,
    pub category: String,
}

impl GameSession {
    /// Apply one action to the session. Returns the secret deals the
    /// mutation produced (only round starts produce any). The caller is
    /// responsible for running the lazy deadline tick *before* applying,
    /// so actions arriving after a deadline see the advanced phase.
    pub fn apply<R: Rng>(
        &mut self,
        action: Action,
        now: DateTime<Utc>,
        bank: &WordBank,
        rng: &mut R,
    ) -> Result<Vec<SecretDeal>, GameError> {
        match self.status {
            SessionStatus::Cancelled => return Err(GameError::SessionCancelled),
            SessionStatus::Finished => {
                if !matches!(action, Action::Leave { .. }) {
                    return Err(GameError::PhaseClosed);
                }
            }
            _ => {}
        }

        let deals = match action {
            Action::Join {
                participant_id,
                display_name,
            } => self.join(participant_id, display_name, now)?,
            Action::Leave { participant_id } => {
                self.leave(&participant_id, now)?;
                Vec::new()
            }
            Action::StartGame { participant_id } => {
                self.start_game(&participant_id, now, bank, rng)?
            }
            Action::Speak {
                participant_id,
                word,
            } => {
                self.speak(&participant_id, &word, now)?;
                Vec::new()
            }
            Action::Vote {
                voter_id,
                target_id,
            } => {
                self.vote(&voter_id, &target_id, now)?;
                Vec::new()
            }
            Action::AckWord { participant_id } => {
                self.ack_word(&participant_id, now)?;
                Vec::new()
            }
            Action::Spectate {
                participant_id,
                display_name,
            } => {
                self.spectate(participant_id, display_name, now)?;
                Vec::new()
            }
            Action::EndSession { participant_id } => {
                if participant_id != self.host_id {
                    return Err(GameError::NotHost);
                }
                self.status = SessionStatus::Cancelled;
                tracing::info!(session = %self.id, "session ended by host");
                Vec::new()
            }
        };

        self.version += 1;
        Ok(deals)
    }

    fn join(
        &mut self,
        participant_id: ParticipantId,
        display_name: String,
        now: DateTime<Utc>,
    ) -> Result<Vec<SecretDeal>, GameError> {
        let active = self.active_player_count();
        if let Some(p) = self.participants.get_mut(&participant_id) {
            if p.is_active {
                return Err(GameError::AlreadyJoined);
            }
            // Leaving frees the seat; a rejoin into a full lobby counts
            // against capacity like any fresh join.
            if self.status == SessionStatus::Lobby
                && p.role == ParticipantRole::Player
                && active >= self.config.max_players
            {
                return Err(GameError::TooManyPlayers {
                    max: self.config.max_players,
                });
            }
            // Rejoin after a disconnect or leave.
            p.is_active = true;
            p.display_name = display_name;

            if self.status == SessionStatus::Paused
                && self.active_player_count() >= self.config.min_players
            {
                self.resume(now);
            }

            // Re-deliver this round's secret so a reconnecting player can
            // keep playing.
            return Ok(self.secret_for(&participant_id).into_iter().collect());
        }

        let role = if self.status == SessionStatus::Lobby {
            if active >= self.config.max_players {
                return Err(GameError::TooManyPlayers {
                    max: self.config.max_players,
                });
            }
            ParticipantRole::Player
        } else {
            // Mid-game joiners observe; spectating is open at any time.
            ParticipantRole::Spectator
        };

        if role == ParticipantRole::Spectator {
            self.spectators.insert(participant_id.clone());
        }
        self.participants.insert(
            participant_id.clone(),
            Participant {
                id: participant_id,
                display_name,
                role,
                is_host: false,
                is_active: true,
                joined_at: now,
            },
        );
        Ok(Vec::new())
    }

    fn leave(&mut self, participant_id: &str, now: DateTime<Utc>) -> Result<(), GameError> {
        let p = self
            .participants
            .get_mut(participant_id)
            .ok_or(GameError::UnknownParticipant)?;
        p.is_active = false;

        self.after_player_departure(now);
        Ok(())
    }

    fn spectate(
        &mut self,
        participant_id: ParticipantId,
        display_name: String,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        match self.participants.get_mut(&participant_id) {
            Some(p) => {
                p.role = ParticipantRole::Spectator;
                p.is_active = true;
                p.display_name = display_name;
            }
            None => {
                self.participants.insert(
                    participant_id.clone(),
                    Participant {
                        id: participant_id.clone(),
                        display_name,
                        role: ParticipantRole::Spectator,
                        is_host: false,
                        is_active: true,
                        joined_at: now,
                    },
                );
            }
        }
        self.spectators.insert(participant_id);

        // Converting a player to a spectator shrinks the player pool the
        // same way leaving does.
        self.after_player_departure(now);
        Ok(())
    }

    /// Shared bookkeeping after the active player pool shrinks: pause or
    /// cancel if the session fell below its floor, and close out phases
    /// that were only waiting on the departed player.
    fn after_player_departure(&mut self, now: DateTime<Utc>) {
        let active = self.active_player_count();

        match self.status {
            SessionStatus::InProgress | SessionStatus::Paused => {
                if active == 0 {
                    tracing::info!(session = %self.id, "all players left, cancelling");
                    self.status = SessionStatus::Cancelled;
                    return;
                }
                if active < self.config.min_players {
                    self.pause(now);
                    return;
                }
            }
            SessionStatus::Lobby => {
                if active == 0 {
                    self.status = SessionStatus::Cancelled;
                }
                return;
            }
            _ => return,
        }

        let Some(round) = self.round.as_ref() else {
            return;
        };
        match round.phase {
            RoundPhase::WordAssignment => self.maybe_begin_speaking(now),
            RoundPhase::Speaking => self.skip_departed_speaker(now),
            RoundPhase::Voting => self.maybe_close_voting(now),
            _ => {}
        }
    }

    /// If the departed player held the speaking turn, hand it on right away
    /// instead of letting the turn run out. No pass entry is recorded; only
    /// turns the player actually timed out on go into the history.
    fn skip_departed_speaker(&mut self, now: DateTime<Utc>) {
        let active: HashSet<ParticipantId> = self.active_player_ids().into_iter().collect();
        let turn_seconds = self.config.turn_duration_seconds as i64;

        let advance = {
            let Some(round) = self.round.as_mut() else {
                return;
            };
            if round.phase != RoundPhase::Speaking {
                return;
            }
            if round
                .turn_order
                .get(round.turn_cursor)
                .is_some_and(|id| active.contains(id))
            {
                return;
            }
            round.advance_speaker(&active)
        };

        match advance {
            TurnAdvance::Next(_) => {
                if let Some(round) = self.round.as_mut() {
                    round.phase_deadline = now + Duration::seconds(turn_seconds);
                }
            }
            TurnAdvance::SpeakingComplete => self.enter_voting(now),
        }
    }

    fn start_game<R: Rng>(
        &mut self,
        participant_id: &str,
        now: DateTime<Utc>,
        bank: &WordBank,
        rng: &mut R,
    ) -> Result<Vec<SecretDeal>, GameError> {
        if participant_id != self.host_id {
            return Err(GameError::NotHost);
        }
        if self.status != SessionStatus::Lobby {
            return Err(GameError::PhaseClosed);
        }
        let active = self.active_player_count();
        if active < self.config.min_players {
            return Err(GameError::NotEnoughPlayers {
                min: self.config.min_players,
            });
        }
        if active > self.config.max_players {
            return Err(GameError::TooManyPlayers {
                max: self.config.max_players,
            });
        }

        self.status = SessionStatus::Starting;
        Ok(self.begin_round(1, now, bank, rng))
    }

    /// Roll secret material for a round and enter WordAssignment. The only
    /// place role/word secrets are generated.
    pub(crate) fn begin_round<R: Rng>(
        &mut self,
        round_number: u32,
        now: DateTime<Utc>,
        bank: &WordBank,
        rng: &mut R,
    ) -> Vec<SecretDeal> {
        let active = self.active_player_ids();
        let Some(imposter_id) = assign_imposter(&active, &self.recent_imposters, rng) else {
            tracing::error!(session = %self.id, "round start with no active players");
            self.status = SessionStatus::Cancelled;
            return Vec::new();
        };

        let exclude: HashSet<String> = self.recent_words.iter().cloned().collect();
        let entry = bank.pick(&exclude, rng);

        self.recent_words.push(entry.word.clone());
        let spill = self.recent_words.len().saturating_sub(RECENT_WORD_WINDOW);
        self.recent_words.drain(..spill);

        self.recent_imposters.push(imposter_id.clone());
        let spill = self
            .recent_imposters
            .len()
            .saturating_sub(IMPOSTER_FAIRNESS_WINDOW);
        self.recent_imposters.drain(..spill);

        let mut turn_order = active.clone();
        turn_order.shuffle(rng);

        self.round = Some(RoundState {
            round_number,
            max_rounds: self.config.round_count,
            imposter_id: imposter_id.clone(),
            secret_word: entry.word.clone(),
            category: entry.category.clone(),
            phase: RoundPhase::WordAssignment,
            turn_order,
            turn_cursor: 0,
            cycles_done: 0,
            word_acks: Default::default(),
            spoken: Vec::new(),
            votes: Default::default(),
            phase_deadline: now + Duration::seconds(self.config.word_grace_seconds as i64),
            results: None,
        });
        self.status = SessionStatus::InProgress;

        tracing::info!(
            session = %self.id,
            round = round_number,
            category = %entry.category,
            "round started"
        );

        active
            .into_iter()
            .map(|id| {
                let is_imposter = id == imposter_id;
                SecretDeal {
                    participant_id: id,
                    round_number,
                    is_imposter,
                    secret_word: (!is_imposter).then(|| entry.word.clone()),
                    category: entry.category.clone(),
                }
            })
            .collect()
    }

    fn speak(
        &mut self,
        participant_id: &str,
        word: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        if self.status != SessionStatus::InProgress {
            return Err(GameError::PhaseClosed);
        }
        let active: HashSet<ParticipantId> = self.active_player_ids().into_iter().collect();
        let round = self.round.as_mut().ok_or(GameError::PhaseClosed)?;
        if round.phase != RoundPhase::Speaking {
            return Err(GameError::PhaseClosed);
        }
        if round.turn_order.get(round.turn_cursor).map(String::as_str) != Some(participant_id) {
            return Err(GameError::NotYourTurn);
        }

        let word = word.trim();
        if word.is_empty() {
            return Err(GameError::EmptyWord);
        }

        round.spoken.push(SpokenWord {
            player_id: participant_id.to_string(),
            word: Some(word.to_string()),
            cycle: round.cycles_done + 1,
            submitted_at: now,
        });

        match round.advance_speaker(&active) {
            TurnAdvance::Next(_) => {
                round.phase_deadline =
                    now + Duration::seconds(self.config.turn_duration_seconds as i64);
            }
            TurnAdvance::SpeakingComplete => self.enter_voting(now),
        }
        Ok(())
    }

    fn vote(
        &mut self,
        voter_id: &str,
        target_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        if self.status != SessionStatus::InProgress {
            return Err(GameError::PhaseClosed);
        }
        if self
            .round
            .as_ref()
            .map(|r| r.phase != RoundPhase::Voting)
            .unwrap_or(true)
        {
            return Err(GameError::PhaseClosed);
        }
        // Spectators cannot vote; the imposter can (and deflects by doing so).
        if !self.is_active_player(voter_id) {
            return Err(GameError::InvalidVoter);
        }
        if voter_id == target_id || !self.is_active_player(target_id) {
            return Err(GameError::InvalidTarget);
        }

        if let Some(round) = self.round.as_mut() {
            // Re-votes before the phase closes overwrite; last vote counts.
            round
                .votes
                .insert(voter_id.to_string(), target_id.to_string());
        }
        self.maybe_close_voting(now);
        Ok(())
    }

    fn ack_word(&mut self, participant_id: &str, now: DateTime<Utc>) -> Result<(), GameError> {
        if self.status != SessionStatus::InProgress {
            return Err(GameError::PhaseClosed);
        }
        if !self.is_active_player(participant_id) {
            return Err(GameError::NotAPlayer);
        }
        let round = self.round.as_mut().ok_or(GameError::PhaseClosed)?;
        if round.phase != RoundPhase::WordAssignment {
            return Err(GameError::PhaseClosed);
        }
        round.word_acks.insert(participant_id.to_string());
        self.maybe_begin_speaking(now);
        Ok(())
    }

    /// Start the Speaking phase once every active player acknowledged
    /// their word (the grace deadline covers the rest).
    fn maybe_begin_speaking(&mut self, now: DateTime<Utc>) {
        let all_acked = {
            let Some(round) = self.round.as_ref() else {
                return;
            };
            round.phase == RoundPhase::WordAssignment
                && self
                    .active_player_ids()
                    .iter()
                    .all(|id| round.word_acks.contains(id))
        };
        if all_acked {
            self.enter_speaking(now);
        }
    }

    pub(crate) fn enter_speaking(&mut self, now: DateTime<Utc>) {
        let active: HashSet<ParticipantId> = self.active_player_ids().into_iter().collect();
        let turn_seconds = self.config.turn_duration_seconds as i64;
        let Some(round) = self.round.as_mut() else {
            return;
        };
        round.phase = RoundPhase::Speaking;
        match round.ensure_active_speaker(&active) {
            TurnAdvance::Next(_) => {
                round.phase_deadline = now + Duration::seconds(turn_seconds);
            }
            TurnAdvance::SpeakingComplete => self.enter_voting(now),
        }
    }

    pub(crate) fn enter_voting(&mut self, now: DateTime<Utc>) {
        let voting_seconds = self.config.voting_duration_seconds as i64;
        if let Some(round) = self.round.as_mut() {
            round.phase = RoundPhase::Voting;
            round.phase_deadline = now + Duration::seconds(voting_seconds);
        }
    }

    /// Close Voting early once every active player has voted.
    fn maybe_close_voting(&mut self, now: DateTime<Utc>) {
        let all_voted = {
            let Some(round) = self.round.as_ref() else {
                return;
            };
            let active = self.active_player_ids();
            round.phase == RoundPhase::Voting
                && !active.is_empty()
                && active.iter().all(|id| round.votes.contains_key(id))
        };
        if all_voted {
            self.enter_results(now);
        }
    }

    /// Tally whatever votes exist (non-voters simply don't count) and
    /// publish the round outcome.
    pub(crate) fn enter_results(&mut self, now: DateTime<Utc>) {
        let results_seconds = self.config.results_seconds as i64;
        let Some(round) = self.round.as_mut() else {
            return;
        };

        let (ranked, voted_out) = tally(&round.votes);
        let imposter_caught = voted_out.as_deref() == Some(round.imposter_id.as_str());
        let winners: Vec<ParticipantId> = if imposter_caught {
            round
                .turn_order
                .iter()
                .filter(|id| **id != round.imposter_id)
                .cloned()
                .collect()
        } else {
            vec![round.imposter_id.clone()]
        };

        round.results = Some(RoundResults {
            tally: ranked,
            voted_out,
            imposter_id: round.imposter_id.clone(),
            secret_word: round.secret_word.clone(),
            imposter_caught,
            winners,
        });
        round.phase = RoundPhase::Results;
        round.phase_deadline = now + Duration::seconds(results_seconds);

        tracing::info!(
            session = %self.id,
            round = round.round_number,
            caught = imposter_caught,
            "round results"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testutil::{bank, lobby, rng, speaking, started};

    fn apply(session: &mut GameSession, action: Action) -> Result<Vec<SecretDeal>, GameError> {
        session.apply(action, Utc::now(), &bank(), &mut rng())
    }

    fn speak_in_turn(session: &mut GameSession) -> ParticipantId {
        let speaker = session.current_speaker().unwrap().clone();
        apply(
            session,
            Action::Speak {
                participant_id: speaker.clone(),
                word: "clue".into(),
            },
        )
        .unwrap();
        speaker
    }

    #[test]
    fn only_host_can_start() {
        let mut session = lobby(4);
        let err = apply(
            &mut session,
            Action::StartGame {
                participant_id: "p1".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::NotHost);
        assert_eq!(session.status, SessionStatus::Lobby);
    }

    #[test]
    fn start_requires_min_players() {
        let mut session = lobby(2);
        let err = apply(
            &mut session,
            Action::StartGame {
                participant_id: "p0".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::NotEnoughPlayers { min: 3 });
    }

    #[test]
    fn start_deals_secrets_and_enters_word_assignment() {
        let mut session = lobby(4);
        let deals = apply(
            &mut session,
            Action::StartGame {
                participant_id: "p0".into(),
            },
        )
        .unwrap();

        assert_eq!(session.status, SessionStatus::InProgress);
        let round = session.round.as_ref().unwrap();
        assert_eq!(round.phase, RoundPhase::WordAssignment);
        assert_eq!(round.round_number, 1);
        assert_eq!(round.turn_order.len(), 4);

        // One deal per active player, exactly one imposter, and the
        // imposter never receives the word.
        assert_eq!(deals.len(), 4);
        let imposters: Vec<_> = deals.iter().filter(|d| d.is_imposter).collect();
        assert_eq!(imposters.len(), 1);
        assert!(imposters[0].secret_word.is_none());
        assert!(deals
            .iter()
            .filter(|d| !d.is_imposter)
            .all(|d| d.secret_word.as_deref() == Some(round.secret_word.as_str())));
    }

    #[test]
    fn join_after_capacity_is_rejected() {
        let mut config = GameConfig::default();
        config.max_players = 3;
        let mut session = GameSession::create("p0".into(), "Host".into(), config);
        for i in 1..3 {
            apply(
                &mut session,
                Action::Join {
                    participant_id: format!("p{i}"),
                    display_name: format!("P{i}"),
                },
            )
            .unwrap();
        }
        let err = apply(
            &mut session,
            Action::Join {
                participant_id: "p9".into(),
                display_name: "Late".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::TooManyPlayers { max: 3 });
    }

    #[test]
    fn rejoin_into_a_full_lobby_is_rejected() {
        let mut config = GameConfig::default();
        config.max_players = 3;
        let mut session = GameSession::create("p0".into(), "Host".into(), config);
        for i in 1..3 {
            apply(
                &mut session,
                Action::Join {
                    participant_id: format!("p{i}"),
                    display_name: format!("P{i}"),
                },
            )
            .unwrap();
        }

        // p1 leaves; p3 takes the freed seat.
        apply(
            &mut session,
            Action::Leave {
                participant_id: "p1".into(),
            },
        )
        .unwrap();
        apply(
            &mut session,
            Action::Join {
                participant_id: "p3".into(),
                display_name: "P3".into(),
            },
        )
        .unwrap();

        // p1's rejoin competes for capacity and loses.
        let err = apply(
            &mut session,
            Action::Join {
                participant_id: "p1".into(),
                display_name: "P1".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::TooManyPlayers { max: 3 });
        assert_eq!(session.active_player_count(), 3);
    }

    #[test]
    fn join_mid_game_becomes_spectator() {
        let mut session = started(4);
        apply(
            &mut session,
            Action::Join {
                participant_id: "late".into(),
                display_name: "Late".into(),
            },
        )
        .unwrap();

        let p = session.participant("late").unwrap();
        assert_eq!(p.role, ParticipantRole::Spectator);
        assert!(session.spectators.contains("late"));
    }

    #[test]
    fn double_join_is_rejected() {
        let mut session = lobby(3);
        let err = apply(
            &mut session,
            Action::Join {
                participant_id: "p1".into(),
                display_name: "Again".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::AlreadyJoined);
    }

    #[test]
    fn ack_from_a_spectator_is_rejected() {
        let mut session = started(4);
        apply(
            &mut session,
            Action::Join {
                participant_id: "watcher".into(),
                display_name: "W".into(),
            },
        )
        .unwrap();

        let err = apply(
            &mut session,
            Action::AckWord {
                participant_id: "watcher".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::NotAPlayer);
    }

    #[test]
    fn all_acks_enter_speaking() {
        let session = speaking(4);
        let round = session.round.as_ref().unwrap();
        assert_eq!(round.phase, RoundPhase::Speaking);
        assert!(session.current_speaker().is_some());
    }

    #[test]
    fn speak_out_of_turn_fails() {
        let mut session = speaking(4);
        let speaker = session.current_speaker().unwrap().clone();
        let other = session
            .active_player_ids()
            .into_iter()
            .find(|id| *id != speaker)
            .unwrap();

        let err = apply(
            &mut session,
            Action::Speak {
                participant_id: other,
                word: "sneaky".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::NotYourTurn);
        assert!(session.round.as_ref().unwrap().spoken.is_empty());
    }

    #[test]
    fn empty_word_is_rejected() {
        let mut session = speaking(4);
        let speaker = session.current_speaker().unwrap().clone();
        let err = apply(
            &mut session,
            Action::Speak {
                participant_id: speaker,
                word: "   ".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::EmptyWord);
    }

    #[test]
    fn speak_stores_trimmed_word_and_advances_turn() {
        let mut session = speaking(4);
        let first = session.current_speaker().unwrap().clone();
        apply(
            &mut session,
            Action::Speak {
                participant_id: first.clone(),
                word: "  breakfast  ".into(),
            },
        )
        .unwrap();

        let round = session.round.as_ref().unwrap();
        assert_eq!(round.spoken.len(), 1);
        assert_eq!(round.spoken[0].word.as_deref(), Some("breakfast"));
        assert_eq!(round.spoken[0].cycle, 1);
        assert_ne!(session.current_speaker().unwrap(), &first);
    }

    #[test]
    fn five_players_three_cycles_is_fifteen_speaks() {
        let mut session = speaking(5);
        for _ in 0..15 {
            assert_eq!(
                session.round.as_ref().unwrap().phase,
                RoundPhase::Speaking
            );
            speak_in_turn(&mut session);
        }
        assert_eq!(session.round.as_ref().unwrap().phase, RoundPhase::Voting);
    }

    #[test]
    fn vote_before_voting_phase_is_closed() {
        let mut session = speaking(4);
        let ids = session.active_player_ids();
        let err = apply(
            &mut session,
            Action::Vote {
                voter_id: ids[0].clone(),
                target_id: ids[1].clone(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::PhaseClosed);
    }

    fn voting_session(n: usize) -> GameSession {
        let mut session = speaking(n);
        let cycles = session.config.round_count as usize;
        for _ in 0..(n * cycles) {
            speak_in_turn(&mut session);
        }
        assert_eq!(session.round.as_ref().unwrap().phase, RoundPhase::Voting);
        session
    }

    #[test]
    fn self_vote_is_invalid_and_does_not_mutate() {
        let mut session = voting_session(4);
        let ids = session.active_player_ids();
        let err = apply(
            &mut session,
            Action::Vote {
                voter_id: ids[0].clone(),
                target_id: ids[0].clone(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::InvalidTarget);
        assert!(session.round.as_ref().unwrap().votes.is_empty());
    }

    #[test]
    fn spectator_vote_is_invalid() {
        let mut session = voting_session(4);
        apply(
            &mut session,
            Action::Join {
                participant_id: "watcher".into(),
                display_name: "W".into(),
            },
        )
        .unwrap();
        let target = session.active_player_ids()[0].clone();
        let err = apply(
            &mut session,
            Action::Vote {
                voter_id: "watcher".into(),
                target_id: target,
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::InvalidVoter);
    }

    #[test]
    fn revote_overwrites_and_last_vote_counts() {
        let mut session = voting_session(4);
        let ids = session.active_player_ids();
        apply(
            &mut session,
            Action::Vote {
                voter_id: ids[0].clone(),
                target_id: ids[1].clone(),
            },
        )
        .unwrap();
        apply(
            &mut session,
            Action::Vote {
                voter_id: ids[0].clone(),
                target_id: ids[2].clone(),
            },
        )
        .unwrap();

        let round = session.round.as_ref().unwrap();
        assert_eq!(round.votes.get(&ids[0]), Some(&ids[2]));
        assert_eq!(round.votes.len(), 1);
    }

    #[test]
    fn unanimous_vote_catches_imposter() {
        let mut session = voting_session(5);
        let imposter = session.round.as_ref().unwrap().imposter_id.clone();
        let ids = session.active_player_ids();
        let scapegoat = ids.iter().find(|id| **id != imposter).unwrap().clone();

        // Everyone votes for the imposter; the imposter deflects.
        for voter in &ids {
            let target = if *voter == imposter {
                scapegoat.clone()
            } else {
                imposter.clone()
            };
            apply(
                &mut session,
                Action::Vote {
                    voter_id: voter.clone(),
                    target_id: target,
                },
            )
            .unwrap();
        }

        // All active players voted, so Voting closed on its own.
        let round = session.round.as_ref().unwrap();
        assert_eq!(round.phase, RoundPhase::Results);
        let results = round.results.as_ref().unwrap();
        assert_eq!(results.voted_out.as_deref(), Some(imposter.as_str()));
        assert!(results.imposter_caught);
        assert_eq!(results.winners.len(), ids.len() - 1);
        assert!(!results.winners.contains(&imposter));
    }

    #[test]
    fn tied_vote_scores_for_the_imposter() {
        let mut session = voting_session(4);
        let ids = session.active_player_ids();
        let imposter = session.round.as_ref().unwrap().imposter_id.clone();

        // Counts end up {ids[0]: 2, ids[1]: 2} with nobody self-voting.
        let pairs = [
            (ids[2].clone(), ids[0].clone()),
            (ids[1].clone(), ids[0].clone()),
            (ids[3].clone(), ids[1].clone()),
            (ids[0].clone(), ids[1].clone()),
        ];
        for (voter_id, target_id) in pairs {
            apply(&mut session, Action::Vote { voter_id, target_id }).unwrap();
        }

        let round = session.round.as_ref().unwrap();
        assert_eq!(round.phase, RoundPhase::Results);
        let results = round.results.as_ref().unwrap();
        assert_eq!(results.voted_out, None);
        assert!(!results.imposter_caught);
        assert_eq!(results.winners, vec![imposter]);
    }

    #[test]
    fn current_speaker_leaving_hands_the_turn_on() {
        let mut session = speaking(5);
        let speaker = session.current_speaker().unwrap().clone();
        apply(
            &mut session,
            Action::Leave {
                participant_id: speaker.clone(),
            },
        )
        .unwrap();

        assert_eq!(session.status, SessionStatus::InProgress);
        assert_ne!(session.current_speaker().unwrap(), &speaker);
        // The leaver gets no pass entry; only timed-out turns do.
        assert!(session.round.as_ref().unwrap().spoken.is_empty());
    }

    #[test]
    fn leave_below_min_pauses_the_session() {
        let mut session = speaking(5);
        session.config.min_players = 3;
        let phase_before = session.round.as_ref().unwrap().phase;

        for id in ["p3", "p4", "p1"] {
            apply(
                &mut session,
                Action::Leave {
                    participant_id: id.into(),
                },
            )
            .unwrap();
        }

        assert_eq!(session.status, SessionStatus::Paused);
        assert_eq!(session.round.as_ref().unwrap().phase, phase_before);
    }

    #[test]
    fn rejoin_above_min_resumes_at_same_phase() {
        let mut session = speaking(5);
        let phase_before = session.round.as_ref().unwrap().phase;
        for id in ["p1", "p2", "p3", "p4"] {
            apply(
                &mut session,
                Action::Leave {
                    participant_id: id.into(),
                },
            )
            .unwrap();
        }
        assert_eq!(session.status, SessionStatus::Paused);

        // One rejoin is still below min_players.
        apply(
            &mut session,
            Action::Join {
                participant_id: "p3".into(),
                display_name: "P3".into(),
            },
        )
        .unwrap();
        assert_eq!(session.status, SessionStatus::Paused);

        let deals = apply(
            &mut session,
            Action::Join {
                participant_id: "p4".into(),
                display_name: "P4".into(),
            },
        )
        .unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.round.as_ref().unwrap().phase, phase_before);
        // Rejoining players get their secret re-dealt.
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].participant_id, "p4");
    }

    #[test]
    fn all_players_leaving_cancels() {
        let mut session = speaking(3);
        for id in ["p0", "p1", "p2"] {
            let res = apply(
                &mut session,
                Action::Leave {
                    participant_id: id.into(),
                },
            );
            if session.status == SessionStatus::Cancelled {
                break;
            }
            res.unwrap();
        }
        assert_eq!(session.status, SessionStatus::Cancelled);
    }

    #[test]
    fn host_end_session_cancels_and_blocks_actions() {
        let mut session = speaking(4);
        apply(
            &mut session,
            Action::EndSession {
                participant_id: "p0".into(),
            },
        )
        .unwrap();
        assert_eq!(session.status, SessionStatus::Cancelled);

        let err = apply(
            &mut session,
            Action::Join {
                participant_id: "new".into(),
                display_name: "New".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::SessionCancelled);
    }

    #[test]
    fn non_host_cannot_end_session() {
        let mut session = speaking(4);
        let err = apply(
            &mut session,
            Action::EndSession {
                participant_id: "p1".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, GameError::NotHost);
        assert_eq!(session.status, SessionStatus::InProgress);
    }

    #[test]
    fn every_accepted_mutation_bumps_version() {
        let mut session = lobby(3);
        let v = session.version;
        apply(
            &mut session,
            Action::Join {
                participant_id: "p9".into(),
                display_name: "P9".into(),
            },
        )
        .unwrap();
        assert_eq!(session.version, v + 1);

        // Rejected actions leave the version untouched.
        let v = session.version;
        let _ = apply(
            &mut session,
            Action::StartGame {
                participant_id: "p1".into(),
            },
        )
        .unwrap_err();
        assert_eq!(session.version, v);
    }

    #[test]
    fn player_count_invariant_outside_lobby() {
        let session = speaking(5);
        assert!(session.status != SessionStatus::Lobby);
        let count = session.active_player_count();
        assert!(count >= session.config.min_players);
        assert!(count <= session.config.max_players);
    }
}
