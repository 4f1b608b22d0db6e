use crate::protocol::PublicSession;
use crate::types::{GameSession, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("session not found")]
    NotFound,
    #[error("version conflict")]
    VersionConflict,
}

/// The session store collaborator: single-document conditional writes plus
/// a change stream per session. The engine assumes no consistency beyond
/// this.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn create(&self, session: GameSession);

    /// Latest snapshot plus the version it was committed at.
    async fn get(&self, id: &str) -> Result<(GameSession, u64), StoreError>;

    /// Conditional write: accepted only if the stored version still equals
    /// `expected_version`. An accepted write publishes the new public
    /// snapshot to every subscriber.
    async fn put(
        &self,
        id: &str,
        session: GameSession,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    async fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<PublicSession>, StoreError>;

    /// All known session ids, for the deadline sweep.
    async fn session_ids(&self) -> Vec<SessionId>;

    async fn remove(&self, id: &str) -> bool;
}

struct Entry {
    session: GameSession,
    version: u64,
    updates: broadcast::Sender<PublicSession>,
}

/// In-memory store; one broadcast channel per session fans the canonical
/// snapshot out to subscribers.
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, session: GameSession) {
        let (tx, _rx) = broadcast::channel(100);
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session.id.clone(),
            Entry {
                version: session.version,
                updates: tx,
                session,
            },
        );
    }

    async fn get(&self, id: &str) -> Result<(GameSession, u64), StoreError> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(id).ok_or(StoreError::NotFound)?;
        Ok((entry.session.clone(), entry.version))
    }

    async fn put(
        &self,
        id: &str,
        session: GameSession,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id).ok_or(StoreError::NotFound)?;
        if entry.version != expected_version {
            return Err(StoreError::VersionConflict);
        }
        entry.version = session.version;
        // No receivers connected is fine.
        let _ = entry.updates.send(PublicSession::from(&session));
        entry.session = session;
        Ok(())
    }

    async fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<PublicSession>, StoreError> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(id).ok_or(StoreError::NotFound)?;
        Ok(entry.updates.subscribe())
    }

    async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GameConfig;

    fn session() -> GameSession {
        GameSession::create("host".into(), "Host".into(), GameConfig::default())
    }

    #[tokio::test]
    async fn get_missing_session_is_not_found() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").await.unwrap_err(), StoreError::NotFound);
    }

    #[tokio::test]
    async fn conditional_put_rejects_stale_writers() {
        let store = MemoryStore::new();
        let s = session();
        let id = s.id.clone();
        store.create(s).await;

        let (mut first, v) = store.get(&id).await.unwrap();
        let (mut second, v2) = store.get(&id).await.unwrap();
        assert_eq!(v, v2);

        first.version += 1;
        store.put(&id, first, v).await.unwrap();

        // The concurrent writer read at the same version; its write loses.
        second.version += 1;
        assert_eq!(
            store.put(&id, second, v2).await.unwrap_err(),
            StoreError::VersionConflict
        );
    }

    #[tokio::test]
    async fn accepted_put_reaches_subscribers() {
        let store = MemoryStore::new();
        let s = session();
        let id = s.id.clone();
        store.create(s).await;

        let mut rx = store.subscribe(&id).await.unwrap();
        let (mut snapshot, v) = store.get(&id).await.unwrap();
        snapshot.version += 1;
        store.put(&id, snapshot.clone(), v).await.unwrap();

        let public = rx.recv().await.unwrap();
        assert_eq!(public.version, snapshot.version);
        assert_eq!(public.id, id);
    }

    #[tokio::test]
    async fn remove_drops_the_session() {
        let store = MemoryStore::new();
        let s = session();
        let id = s.id.clone();
        store.create(s).await;

        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
        assert_eq!(store.get(&id).await.unwrap_err(), StoreError::NotFound);
    }
}
