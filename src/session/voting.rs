use crate::types::{ParticipantId, VoteCount};
use std::collections::HashMap;

/// Rank the vote counts and determine who, if anyone, is voted out.
///
/// A strict plurality elects the top candidate; a tie for the highest
/// count elects nobody, and the round then scores as imposter-not-caught.
/// The imposter wins ties.
///
/// Pure: the ranking is sorted by count descending, then target id, so the
/// same vote map always produces the same output.
pub fn tally(
    votes: &HashMap<ParticipantId, ParticipantId>,
) -> (Vec<VoteCount>, Option<ParticipantId>) {
    let mut counts: HashMap<&ParticipantId, u32> = HashMap::new();
    for target in votes.values() {
        *counts.entry(target).or_insert(0) += 1;
    }

    let mut ranked: Vec<VoteCount> = counts
        .into_iter()
        .map(|(target, count)| VoteCount {
            target: target.clone(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.target.cmp(&b.target)));

    let voted_out = match ranked.as_slice() {
        [] => None,
        [top] => Some(top.target.clone()),
        [top, second, ..] if top.count == second.count => None,
        [top, ..] => Some(top.target.clone()),
    };

    (ranked, voted_out)
}
