//! Client message dispatch
//!
//! Translates wire messages into engine actions and typed errors back
//! into wire errors. The connection's identity is attached here; message
//! bodies never carry it.

use crate::error::GameError;
use crate::protocol::{ClientMessage, PublicSession, ServerMessage};
use crate::session::Action;
use crate::store::SessionStore;
use crate::sync::SessionSync;
use crate::types::{ParticipantId, SessionId};
use chrono::Utc;
use std::sync::Arc;

/// Who is on the other end of the socket, as supplied by the identity
/// provider. Trusted as-is.
#[derive(Debug, Clone)]
pub struct Identity {
    pub participant_id: ParticipantId,
    pub display_name: String,
}

pub struct HandlerOutcome {
    pub reply: Option<ServerMessage>,
    /// Set when the client entered a session and the connection should
    /// (re)attach its snapshot subscription and private channel.
    pub attached: Option<SessionId>,
}

impl HandlerOutcome {
    fn reply(msg: ServerMessage) -> Self {
        Self {
            reply: Some(msg),
            attached: None,
        }
    }
}

fn state_reply(session: PublicSession) -> ServerMessage {
    ServerMessage::SessionState {
        session,
        server_now: Utc::now(),
    }
}

fn error_reply(e: &GameError) -> ServerMessage {
    ServerMessage::Error {
        code: e.code().to_string(),
        msg: e.to_string(),
    }
}

/// The session id a message targets, known before dispatch. `None` for
/// `CreateSession` (the id does not exist yet).
pub fn target_session(msg: &ClientMessage) -> Option<&SessionId> {
    match msg {
        ClientMessage::CreateSession { .. } => None,
        ClientMessage::Join { session_id }
        | ClientMessage::Leave { session_id }
        | ClientMessage::StartGame { session_id }
        | ClientMessage::Speak { session_id, .. }
        | ClientMessage::Vote { session_id, .. }
        | ClientMessage::AckWord { session_id }
        | ClientMessage::Spectate { session_id }
        | ClientMessage::EndSession { session_id } => Some(session_id),
    }
}

pub async fn handle_message<S: SessionStore>(
    msg: ClientMessage,
    who: &Identity,
    sync: &Arc<SessionSync<S>>,
) -> HandlerOutcome {
    match msg {
        ClientMessage::CreateSession { config } => {
            let session = sync
                .create_session(
                    who.participant_id.clone(),
                    who.display_name.clone(),
                    config.unwrap_or_default(),
                )
                .await;
            HandlerOutcome {
                attached: Some(session.id.clone()),
                reply: Some(state_reply(PublicSession::from(&session))),
            }
        }

        ClientMessage::Join { session_id } => {
            let action = Action::Join {
                participant_id: who.participant_id.clone(),
                display_name: who.display_name.clone(),
            };
            match sync.apply(&session_id, action).await {
                Ok(session) => HandlerOutcome {
                    attached: Some(session_id),
                    reply: Some(state_reply(PublicSession::from(&session))),
                },
                Err(e) => HandlerOutcome::reply(error_reply(&e)),
            }
        }

        ClientMessage::Spectate { session_id } => {
            let action = Action::Spectate {
                participant_id: who.participant_id.clone(),
                display_name: who.display_name.clone(),
            };
            match sync.apply(&session_id, action).await {
                Ok(session) => HandlerOutcome {
                    attached: Some(session_id),
                    reply: Some(state_reply(PublicSession::from(&session))),
                },
                Err(e) => HandlerOutcome::reply(error_reply(&e)),
            }
        }

        ClientMessage::Leave { session_id } => {
            apply_simple(
                sync,
                &session_id,
                Action::Leave {
                    participant_id: who.participant_id.clone(),
                },
            )
            .await
        }

        ClientMessage::StartGame { session_id } => {
            apply_simple(
                sync,
                &session_id,
                Action::StartGame {
                    participant_id: who.participant_id.clone(),
                },
            )
            .await
        }

        ClientMessage::Speak { session_id, word } => {
            apply_simple(
                sync,
                &session_id,
                Action::Speak {
                    participant_id: who.participant_id.clone(),
                    word,
                },
            )
            .await
        }

        ClientMessage::Vote {
            session_id,
            target_id,
        } => {
            apply_simple(
                sync,
                &session_id,
                Action::Vote {
                    voter_id: who.participant_id.clone(),
                    target_id,
                },
            )
            .await
        }

        ClientMessage::AckWord { session_id } => {
            apply_simple(
                sync,
                &session_id,
                Action::AckWord {
                    participant_id: who.participant_id.clone(),
                },
            )
            .await
        }

        ClientMessage::EndSession { session_id } => {
            apply_simple(
                sync,
                &session_id,
                Action::EndSession {
                    participant_id: who.participant_id.clone(),
                },
            )
            .await
        }
    }
}

async fn apply_simple<S: SessionStore>(
    sync: &Arc<SessionSync<S>>,
    session_id: &str,
    action: Action,
) -> HandlerOutcome {
    match sync.apply(session_id, action).await {
        Ok(session) => HandlerOutcome::reply(state_reply(PublicSession::from(&session))),
        Err(e) => HandlerOutcome::reply(error_reply(&e)),
    }
}
