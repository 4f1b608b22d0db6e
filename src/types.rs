use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Opaque ID types for type safety
pub type SessionId = String;
pub type ParticipantId = String;

/// How many past rounds a secret word stays excluded from selection
pub const RECENT_WORD_WINDOW: usize = 5;

/// How many past rounds count against a player in the imposter draw
pub const IMPOSTER_FAIRNESS_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Lobby,
    Starting,
    InProgress,
    Paused,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundPhase {
    WordAssignment,
    Speaking,
    Voting,
    Results,
    GameOver,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Player,
    Spectator,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    pub min_players: usize,
    pub max_players: usize,
    /// Number of rounds per game, and number of speaking cycles per round.
    pub round_count: u32,
    pub turn_duration_seconds: u32,
    pub voting_duration_seconds: u32,
    /// Grace period in WordAssignment before speaking starts automatically.
    pub word_grace_seconds: u32,
    /// How long the Results phase is shown before the next round rolls.
    pub results_seconds: u32,
    /// How long a session may sit below min_players before it is cancelled.
    pub pause_grace_seconds: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 3,
            max_players: 10,
            round_count: 3,
            turn_duration_seconds: 30,
            voting_duration_seconds: 45,
            word_grace_seconds: 5,
            results_seconds: 10,
            pause_grace_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: ParticipantRole,
    pub is_host: bool,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

/// One entry in the spoken-word history. `word` is `None` for a timed-out
/// turn (a "pass"). Append-only once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpokenWord {
    pub player_id: ParticipantId,
    pub word: Option<String>,
    pub cycle: u32,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoteCount {
    pub target: ParticipantId,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundResults {
    /// Ranked vote counts, highest first.
    pub tally: Vec<VoteCount>,
    /// `None` when the top count was tied; nobody is voted out on a tie.
    pub voted_out: Option<ParticipantId>,
    pub imposter_id: ParticipantId,
    pub secret_word: String,
    pub imposter_caught: bool,
    pub winners: Vec<ParticipantId>,
}

/// Per-round state, recreated fresh each round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundState {
    pub round_number: u32,
    pub max_rounds: u32,
    /// Secret until Results; never included in public snapshots before then.
    pub imposter_id: ParticipantId,
    /// Known to everyone except the imposter; redacted until Results.
    pub secret_word: String,
    pub category: String,
    pub phase: RoundPhase,
    /// Randomized once at round start, then stable for the round.
    pub turn_order: Vec<ParticipantId>,
    pub turn_cursor: usize,
    /// Completed passes through the active players this round.
    pub cycles_done: u32,
    pub word_acks: HashSet<ParticipantId>,
    pub spoken: Vec<SpokenWord>,
    pub votes: HashMap<ParticipantId, ParticipantId>,
    /// Absolute wall-clock deadline at which the current phase auto-advances.
    pub phase_deadline: DateTime<Utc>,
    pub results: Option<RoundResults>,
}

/// Root aggregate. Always read-modified-written as a whole unit; `version`
/// backs the optimistic-concurrency protocol in the session store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSession {
    pub id: SessionId,
    pub host_id: ParticipantId,
    pub status: SessionStatus,
    pub config: GameConfig,
    pub participants: HashMap<ParticipantId, Participant>,
    pub spectators: HashSet<ParticipantId>,
    pub round: Option<RoundState>,
    pub version: u64,
    /// Secret words of recent rounds, newest last (selection exclusion).
    pub recent_words: Vec<String>,
    /// Imposter ids of recent rounds, newest last (fairness weighting).
    pub recent_imposters: Vec<ParticipantId>,
    pub paused_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
