use super::actions::SecretDeal;
use super::TurnAdvance;
use crate::types::*;
use crate::words::WordBank;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashSet;

/// Catch-up bound for a session that sat untouched across several
/// deadlines.
const MAX_CATCH_UP: usize = 64;

#[derive(Debug, Default)]
pub struct TickOutcome {
    pub changed: bool,
    /// Secret material produced by a deadline-triggered round start.
    pub deals: Vec<SecretDeal>,
}

/// Advance every phase whose `phase_deadline` has passed. Driven by
/// wall-clock deadlines only, never by a client's local timer: any caller
/// observing `now >= phase_deadline` may run this, and duplicate triggers
/// are no-ops (the session store's version check discards stale writes,
/// and a re-read sees the already-advanced phase).
///
/// Transitions anchor at the expired deadline rather than `now`, so the
/// resulting state does not depend on when the trigger happened to run.
pub fn tick<R: Rng>(
    session: &mut GameSession,
    now: DateTime<Utc>,
    bank: &WordBank,
    rng: &mut R,
) -> TickOutcome {
    let mut out = TickOutcome::default();

    for _ in 0..MAX_CATCH_UP {
        match session.status {
            SessionStatus::Paused => {
                let grace = Duration::seconds(session.config.pause_grace_seconds as i64);
                if let Some(paused_at) = session.paused_at {
                    if now - paused_at >= grace {
                        tracing::info!(session = %session.id, "pause grace expired, cancelling");
                        session.status = SessionStatus::Cancelled;
                        out.changed = true;
                    }
                }
                break;
            }
            SessionStatus::InProgress => {}
            _ => break,
        }

        let Some(round) = session.round.as_ref() else {
            break;
        };
        if round.phase == RoundPhase::GameOver || now < round.phase_deadline {
            break;
        }

        let anchor = round.phase_deadline;
        out.changed = true;

        match round.phase {
            RoundPhase::WordAssignment => {
                // Grace elapsed; unacknowledged players start anyway.
                session.enter_speaking(anchor);
            }
            RoundPhase::Speaking => timeout_turn(session, anchor),
            RoundPhase::Voting => {
                // Partial votes are tallied as-is; non-voters don't count.
                session.enter_results(anchor);
            }
            RoundPhase::Results => {
                let (round_number, max_rounds) = (round.round_number, round.max_rounds);
                if round_number >= max_rounds {
                    if let Some(r) = session.round.as_mut() {
                        r.phase = RoundPhase::GameOver;
                    }
                    session.status = SessionStatus::Finished;
                    tracing::info!(session = %session.id, "game over");
                } else {
                    out.deals
                        .extend(session.begin_round(round_number + 1, anchor, bank, rng));
                }
            }
            RoundPhase::GameOver => break,
        }
    }

    if out.changed {
        session.version += 1;
    }
    out
}

/// The current speaker's turn timer expired: record a pass entry for them
/// and move on.
fn timeout_turn(session: &mut GameSession, anchor: DateTime<Utc>) {
    let active: HashSet<ParticipantId> = session.active_player_ids().into_iter().collect();
    let turn_seconds = session.config.turn_duration_seconds as i64;

    let advance = {
        let Some(round) = session.round.as_mut() else {
            return;
        };
        if let Some(speaker) = round.turn_order.get(round.turn_cursor).cloned() {
            round.spoken.push(SpokenWord {
                player_id: speaker,
                word: None,
                cycle: round.cycles_done + 1,
                submitted_at: anchor,
            });
        }
        round.advance_speaker(&active)
    };

    match advance {
        TurnAdvance::Next(_) => {
            if let Some(round) = session.round.as_mut() {
                round.phase_deadline = anchor + Duration::seconds(turn_seconds);
            }
        }
        TurnAdvance::SpeakingComplete => session.enter_voting(anchor),
    }
}
