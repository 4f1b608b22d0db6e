use crate::error::GameError;
use crate::session::{tick, Action, SecretDeal};
use crate::store::{SessionStore, StoreError};
use crate::types::{GameConfig, GameSession, ParticipantId, SessionId};
use crate::words::WordBank;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

impl From<StoreError> for GameError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => GameError::SessionNotFound,
            StoreError::VersionConflict => GameError::VersionConflict,
        }
    }
}

type SecretKey = (SessionId, ParticipantId);

/// Applies client actions to sessions with optimistic-concurrency
/// semantics: read a snapshot at version `v`, run the lazy deadline tick,
/// validate and apply the action, then write conditioned on the store
/// still being at `v`. Conflicts re-read and re-validate, bounded by
/// `max_retries`.
///
/// Also owns the per-participant private channels that carry secret
/// role/word material, kept apart from the shared snapshot broadcast.
pub struct SessionSync<S> {
    store: Arc<S>,
    bank: WordBank,
    max_retries: u32,
    secrets: RwLock<HashMap<SecretKey, mpsc::UnboundedSender<SecretDeal>>>,
}

impl<S: SessionStore> SessionSync<S> {
    pub fn new(store: Arc<S>, bank: WordBank, max_retries: u32) -> Self {
        Self {
            store,
            bank,
            max_retries,
            secrets: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn create_session(
        &self,
        host_id: ParticipantId,
        display_name: String,
        config: GameConfig,
    ) -> GameSession {
        let session = GameSession::create(host_id, display_name, config);
        tracing::info!(session = %session.id, host = %session.host_id, "session created");
        self.store.create(session.clone()).await;
        session
    }

    /// Apply an action now. See [`SessionSync::apply_at`].
    pub async fn apply(&self, session_id: &str, action: Action) -> Result<GameSession, GameError> {
        self.apply_at(session_id, action, Utc::now()).await
    }

    /// Apply an action at an explicit instant (tests drive the clock this
    /// way). On success the store has broadcast the new canonical snapshot
    /// and any secret deals have been delivered.
    pub async fn apply_at(
        &self,
        session_id: &str,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<GameSession, GameError> {
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::debug!(session = %session_id, attempt, "retrying after version conflict");
            }
            let (mut session, read_version) = self.store.get(session_id).await?;

            let (tick_deals, tick_changed, applied) = {
                let mut rng = rand::rng();
                let tick_out = tick(&mut session, now, &self.bank, &mut rng);
                let applied = session.apply(action.clone(), now, &self.bank, &mut rng);
                (tick_out.deals, tick_out.changed, applied)
            };

            match applied {
                Ok(action_deals) => {
                    match self
                        .store
                        .put(session_id, session.clone(), read_version)
                        .await
                    {
                        Ok(()) => {
                            self.deliver(session_id, tick_deals).await;
                            self.deliver(session_id, action_deals).await;
                            return Ok(session);
                        }
                        Err(StoreError::VersionConflict) => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => {
                    // The action was rejected, but deadline progress the
                    // tick made still counts; losing the write is fine, the
                    // sweep will get it.
                    if tick_changed
                        && self
                            .store
                            .put(session_id, session, read_version)
                            .await
                            .is_ok()
                    {
                        self.deliver(session_id, tick_deals).await;
                    }
                    return Err(e);
                }
            }
        }
        Err(GameError::VersionConflict)
    }

    /// Advance any expired deadline on one session. Returns whether a
    /// transition was committed.
    pub async fn tick_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, GameError> {
        for _ in 0..=self.max_retries {
            let (mut session, read_version) = self.store.get(session_id).await?;
            let out = {
                let mut rng = rand::rng();
                tick(&mut session, now, &self.bank, &mut rng)
            };
            if !out.changed {
                return Ok(false);
            }
            match self.store.put(session_id, session, read_version).await {
                Ok(()) => {
                    self.deliver(session_id, out.deals).await;
                    return Ok(true);
                }
                Err(StoreError::VersionConflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(GameError::VersionConflict)
    }

    /// Open the private secret-material channel for one participant in one
    /// session, replacing any previous registration (reconnects).
    pub async fn register_private(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> mpsc::UnboundedReceiver<SecretDeal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.secrets
            .write()
            .await
            .insert((session_id.to_string(), participant_id.to_string()), tx);
        rx
    }

    pub async fn unregister_private(&self, session_id: &str, participant_id: &str) {
        self.secrets
            .write()
            .await
            .remove(&(session_id.to_string(), participant_id.to_string()));
    }

    async fn deliver(&self, session_id: &str, deals: Vec<SecretDeal>) {
        if deals.is_empty() {
            return;
        }
        let secrets = self.secrets.read().await;
        for deal in deals {
            let key = (session_id.to_string(), deal.participant_id.clone());
            if let Some(tx) = secrets.get(&key) {
                // A closed receiver just means the client went away; they
                // get the secret re-dealt on reconnect.
                let _ = tx.send(deal);
            }
        }
    }
}

/// Background watchdog guaranteeing phase progress even when no client
/// acts: cycles over all sessions and fires the deadline tick. Failures
/// are logged and retried next sweep; they are never user-visible.
pub fn spawn_deadline_sweeper<S: SessionStore>(sync: Arc<SessionSync<S>>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            for id in sync.store().session_ids().await {
                if let Err(e) = sync.tick_session(&id, Utc::now()).await {
                    tracing::warn!(session = %id, error = %e, "deadline sweep failed");
                }
            }
        }
    });
}
