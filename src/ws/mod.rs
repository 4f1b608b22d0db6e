pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::protocol::{ClientMessage, PublicSession, ServerMessage};
use crate::session::SecretDeal;
use crate::store::SessionStore;
use crate::sync::SessionSync;
use crate::types::SessionId;
use handlers::Identity;

/// Identity comes in on the query string, as handed over by the identity
/// provider; the engine trusts it as-is.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub participant_id: Option<String>,
    pub name: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler<S: SessionStore>(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(sync): State<Arc<SessionSync<S>>>,
) -> impl IntoResponse {
    let identity = Identity {
        participant_id: params
            .participant_id
            .unwrap_or_else(|| ulid::Ulid::new().to_string()),
        display_name: params.name.unwrap_or_else(|| "Guest".to_string()),
    };
    tracing::info!(participant = %identity.participant_id, "WebSocket connection request");

    ws.on_upgrade(move |socket| handle_socket(socket, identity, sync))
}

/// Handle individual WebSocket connection
async fn handle_socket<S: SessionStore>(
    socket: WebSocket,
    identity: Identity,
    sync: Arc<SessionSync<S>>,
) {
    let (mut sender, mut receiver) = socket.split();

    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        participant_id: identity.participant_id.clone(),
        server_now: chrono::Utc::now(),
    };
    if send_msg(&mut sender, &welcome).await.is_err() {
        return;
    }

    // Attached once the client enters a session: the shared snapshot
    // stream plus the private secret-material channel.
    let mut attached: Option<SessionId> = None;
    let mut snapshot_rx: Option<broadcast::Receiver<PublicSession>> = None;
    let mut secret_rx: Option<mpsc::UnboundedReceiver<SecretDeal>> = None;

    loop {
        tokio::select! {
            // Canonical snapshots from the session store
            snapshot = async {
                match &mut snapshot_rx {
                    Some(rx) => Some(rx.recv().await),
                    None => std::future::pending().await,
                }
            } => {
                match snapshot {
                    Some(Ok(public)) => {
                        let msg = ServerMessage::SessionState {
                            session: public,
                            server_now: chrono::Utc::now(),
                        };
                        if send_msg(&mut sender, &msg).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                        // Missed intermediate snapshots; the next recv
                        // returns a newer one, which is all clients need.
                        tracing::debug!(participant = %identity.participant_id, skipped, "snapshot stream lagged");
                    }
                    Some(Err(broadcast::error::RecvError::Closed)) | None => {
                        snapshot_rx = None;
                    }
                }
            }

            // Private secret material
            deal = async {
                match &mut secret_rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                match (deal, &attached) {
                    (Some(deal), Some(session_id)) => {
                        let msg = ServerMessage::SecretRole {
                            session_id: session_id.clone(),
                            round_number: deal.round_number,
                            is_imposter: deal.is_imposter,
                            secret_word: deal.secret_word,
                            category: deal.category,
                        };
                        if send_msg(&mut sender, &msg).await.is_err() {
                            break;
                        }
                    }
                    _ => {
                        // Channel replaced by a newer connection.
                        secret_rx = None;
                    }
                }
            }

            // Client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                // Attach before joining so round secrets
                                // dealt during the action reach us.
                                if matches!(
                                    client_msg,
                                    ClientMessage::Join { .. } | ClientMessage::Spectate { .. }
                                ) {
                                    if let Some(sid) = handlers::target_session(&client_msg) {
                                        let sid = sid.clone();
                                        attach(
                                            &sync,
                                            &identity,
                                            &sid,
                                            &mut attached,
                                            &mut snapshot_rx,
                                            &mut secret_rx,
                                            &mut sender,
                                        )
                                        .await;
                                    }
                                }

                                let outcome =
                                    handlers::handle_message(client_msg, &identity, &sync).await;

                                if let Some(sid) = outcome.attached {
                                    attach(
                                        &sync,
                                        &identity,
                                        &sid,
                                        &mut attached,
                                        &mut snapshot_rx,
                                        &mut secret_rx,
                                        &mut sender,
                                    )
                                    .await;
                                }
                                if let Some(reply) = outcome.reply {
                                    if send_msg(&mut sender, &reply).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::debug!("failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if send_msg(&mut sender, &error).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // A dropped socket is not a leave: the participant can reconnect and
    // pick their session back up.
    if let Some(session_id) = &attached {
        sync.unregister_private(session_id, &identity.participant_id)
            .await;
    }
    tracing::info!(participant = %identity.participant_id, "WebSocket connection closed");
}

/// Subscribe to a session's snapshot stream and open the private channel,
/// then push the current state (and any secret this participant holds) so
/// reconnecting clients resync immediately.
async fn attach<S: SessionStore, Sink>(
    sync: &Arc<SessionSync<S>>,
    identity: &Identity,
    session_id: &SessionId,
    attached: &mut Option<SessionId>,
    snapshot_rx: &mut Option<broadcast::Receiver<PublicSession>>,
    secret_rx: &mut Option<mpsc::UnboundedReceiver<SecretDeal>>,
    sender: &mut Sink,
) where
    Sink: SinkExt<Message> + Unpin,
{
    if attached.as_ref() == Some(session_id) {
        return;
    }
    let Ok(rx) = sync.store().subscribe(session_id).await else {
        // Unknown session; the action handler reports the error.
        return;
    };

    if let Some(previous) = attached.take() {
        sync.unregister_private(&previous, &identity.participant_id)
            .await;
    }
    *snapshot_rx = Some(rx);
    *secret_rx = Some(
        sync.register_private(session_id, &identity.participant_id)
            .await,
    );
    *attached = Some(session_id.clone());

    if let Ok((session, _)) = sync.store().get(session_id).await {
        let state = ServerMessage::SessionState {
            session: PublicSession::from(&session),
            server_now: chrono::Utc::now(),
        };
        let _ = send_msg(sender, &state).await;

        if let Some(deal) = session.secret_for(&identity.participant_id) {
            let msg = ServerMessage::SecretRole {
                session_id: session_id.clone(),
                round_number: deal.round_number,
                is_imposter: deal.is_imposter,
                secret_word: deal.secret_word,
                category: deal.category,
            };
            let _ = send_msg(sender, &msg).await;
        }
    }
}

async fn send_msg<Sink>(sender: &mut Sink, msg: &ServerMessage) -> Result<(), ()>
where
    Sink: SinkExt<Message> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|e| {
        tracing::error!("failed to serialize server message: {}", e);
    })?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
