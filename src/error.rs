use thiserror::Error;

/// Every way an action can be rejected. Validation errors are returned to
/// the caller synchronously; `VersionConflict` is the only kind the
/// synchronization layer retries on its own.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("only the host can do that")]
    NotHost,
    #[error("not enough players to start (need at least {min})")]
    NotEnoughPlayers { min: usize },
    #[error("session is full (max {max} players)")]
    TooManyPlayers { max: usize },
    #[error("it is not your turn to speak")]
    NotYourTurn,
    #[error("only active players can do that")]
    NotAPlayer,
    #[error("this phase is no longer accepting that action")]
    PhaseClosed,
    #[error("you are not eligible to vote")]
    InvalidVoter,
    #[error("invalid vote target")]
    InvalidTarget,
    #[error("spoken word must not be empty")]
    EmptyWord,
    #[error("already joined this session")]
    AlreadyJoined,
    #[error("unknown participant")]
    UnknownParticipant,
    #[error("session not found")]
    SessionNotFound,
    #[error("session was modified concurrently, retry")]
    VersionConflict,
    #[error("session has been cancelled")]
    SessionCancelled,
}

impl GameError {
    /// Stable wire code for the protocol's `Error` message.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NotHost => "NOT_HOST",
            GameError::NotEnoughPlayers { .. } => "NOT_ENOUGH_PLAYERS",
            GameError::TooManyPlayers { .. } => "TOO_MANY_PLAYERS",
            GameError::NotYourTurn => "NOT_YOUR_TURN",
            GameError::NotAPlayer => "NOT_A_PLAYER",
            GameError::PhaseClosed => "PHASE_CLOSED",
            GameError::InvalidVoter => "INVALID_VOTER",
            GameError::InvalidTarget => "INVALID_TARGET",
            GameError::EmptyWord => "EMPTY_WORD",
            GameError::AlreadyJoined => "ALREADY_JOINED",
            GameError::UnknownParticipant => "UNKNOWN_PARTICIPANT",
            GameError::SessionNotFound => "SESSION_NOT_FOUND",
            GameError::VersionConflict => "VERSION_CONFLICT",
            GameError::SessionCancelled => "SESSION_CANCELLED",
        }
    }
}
