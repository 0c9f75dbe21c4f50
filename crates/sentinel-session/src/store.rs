//! Session persistence seam and an in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_types::{SessionId, StoreError};

use crate::session::{ServerSession, SessionStatus};

/// Storage for server sessions.
///
/// List methods return at most `limit` sessions, most recently started
/// first. `list_by_time_range` selects on `started_at` in `[start, end)`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &ServerSession) -> Result<(), StoreError>;

    async fn get(&self, id: &SessionId) -> Result<ServerSession, StoreError>;

    async fn update(&self, session: &ServerSession) -> Result<(), StoreError>;

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError>;

    async fn list_by_user(&self, user: &str, limit: usize) -> Result<Vec<ServerSession>, StoreError>;

    async fn list_by_status(
        &self,
        status: SessionStatus,
        limit: usize,
    ) -> Result<Vec<ServerSession>, StoreError>;

    async fn list_by_profile(
        &self,
        profile: &str,
        limit: usize,
    ) -> Result<Vec<ServerSession>, StoreError>;

    async fn list_by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ServerSession>, StoreError>;

    /// The session held by a credential server instance that is still
    /// active at `now`, if any.
    async fn find_active_by_server_instance(
        &self,
        server_instance_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ServerSession>, StoreError>;

    /// Records one use: increments `request_count`, sets `last_access_at`.
    async fn touch(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn get_by_source_identity(
        &self,
        source_identity: &str,
    ) -> Result<ServerSession, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, ServerSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn list_where(
        &self,
        limit: usize,
        keep: impl Fn(&ServerSession) -> bool,
    ) -> Result<Vec<ServerSession>, StoreError> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        let mut matched: Vec<ServerSession> = sessions.values().filter(|s| keep(s)).cloned().collect();
        matched.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matched.truncate(limit);
        Ok(matched)
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::backend("session store lock poisoned")
}

fn not_found(id: impl ToString) -> StoreError {
    StoreError::NotFound {
        kind: "session",
        id: id.to_string(),
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &ServerSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        if sessions.contains_key(&session.id) {
            return Err(StoreError::AlreadyExists {
                kind: "session",
                id: session.id.to_string(),
            });
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<ServerSession, StoreError> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        sessions.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn update(&self, session: &ServerSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let existing = sessions.get_mut(&session.id).ok_or_else(|| not_found(&session.id))?;
        *existing = session.clone();
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.remove(id).map(|_| ()).ok_or_else(|| not_found(id))
    }

    async fn list_by_user(&self, user: &str, limit: usize) -> Result<Vec<ServerSession>, StoreError> {
        self.list_where(limit, |s| s.user == user)
    }

    async fn list_by_status(
        &self,
        status: SessionStatus,
        limit: usize,
    ) -> Result<Vec<ServerSession>, StoreError> {
        self.list_where(limit, |s| s.status == status)
    }

    async fn list_by_profile(
        &self,
        profile: &str,
        limit: usize,
    ) -> Result<Vec<ServerSession>, StoreError> {
        self.list_where(limit, |s| s.profile == profile)
    }

    async fn list_by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ServerSession>, StoreError> {
        self.list_where(limit, |s| s.started_at >= start && s.started_at < end)
    }

    async fn find_active_by_server_instance(
        &self,
        server_instance_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ServerSession>, StoreError> {
        let found = self.list_where(1, |s| {
            s.server_instance_id == server_instance_id
                && s.effective_status(now) == SessionStatus::Active
        })?;
        Ok(found.into_iter().next())
    }

    async fn touch(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let session = sessions.get_mut(id).ok_or_else(|| not_found(id))?;
        session.request_count += 1;
        session.last_access_at = at;
        Ok(())
    }

    async fn get_by_source_identity(
        &self,
        source_identity: &str,
    ) -> Result<ServerSession, StoreError> {
        let found = self.list_where(1, |s| s.source_identity == source_identity)?;
        found.into_iter().next().ok_or_else(|| not_found(source_identity))
    }
}
