use crate::types::{ParticipantId, RoundState};
use std::collections::HashSet;

/// Outcome of moving the speaking turn forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnAdvance {
    /// The next speaker is up.
    Next(ParticipantId),
    /// Every configured cycle has completed; Speaking is over.
    SpeakingComplete,
}

impl RoundState {
    /// Advance the turn cursor to the next active speaker. Players who left
    /// mid-round stay in `turn_order` (their history stands) but are
    /// skipped. Wrapping past the end of the order completes a cycle; after
    /// `max_rounds` cycles the Speaking phase is done.
    pub(crate) fn advance_speaker(&mut self, active: &HashSet<ParticipantId>) -> TurnAdvance {
        if !self.turn_order.iter().any(|id| active.contains(id)) {
            return TurnAdvance::SpeakingComplete;
        }

        loop {
            self.turn_cursor += 1;
            if self.turn_cursor >= self.turn_order.len() {
                self.cycles_done += 1;
                if self.cycles_done >= self.max_rounds {
                    return TurnAdvance::SpeakingComplete;
                }
                self.turn_cursor = 0;
            }
            let id = &self.turn_order[self.turn_cursor];
            if active.contains(id) {
                return TurnAdvance::Next(id.clone());
            }
        }
    }

    /// Make sure the cursor points at an active speaker when Speaking
    /// begins (someone may have left during WordAssignment).
    pub(crate) fn ensure_active_speaker(
        &mut self,
        active: &HashSet<ParticipantId>,
    ) -> TurnAdvance {
        match self.turn_order.get(self.turn_cursor) {
            Some(id) if active.contains(id) => TurnAdvance::Next(id.clone()),
            _ => self.advance_speaker(active),
        }
    }
}
