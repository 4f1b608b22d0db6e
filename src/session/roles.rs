use crate::types::{ParticipantId, IMPOSTER_FAIRNESS_WINDOW};
use rand::Rng;

/// Pick the round's imposter with a fairness-weighted draw: a player's
/// weight is inversely proportional to how often they were imposter in the
/// last `IMPOSTER_FAIRNESS_WINDOW` rounds, so repeat selection stays
/// possible but unlikely. `previous` is ordered oldest to newest.
///
/// Pure in its inputs plus the supplied random source.
pub fn assign_imposter<R: Rng>(
    active: &[ParticipantId],
    previous: &[ParticipantId],
    rng: &mut R,
) -> Option<ParticipantId> {
    if active.is_empty() {
        return None;
    }

    let window_start = previous.len().saturating_sub(IMPOSTER_FAIRNESS_WINDOW);
    let recent = &previous[window_start..];

    let weights: Vec<f64> = active
        .iter()
        .map(|id| {
            let times = recent.iter().filter(|p| *p == id).count();
            1.0 / (1.0 + times as f64)
        })
        .collect();

    let total: f64 = weights.iter().sum();
    let mut roll = rng.random_range(0.0..total);
    for (id, weight) in active.iter().zip(&weights) {
        if roll < *weight {
            return Some(id.clone());
        }
        roll -= weight;
    }
    // Floating-point edge: fall back to the last candidate.
    active.last().cloned()
}
