//! Session lifecycle operations over an injected store.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use sentinel_types::{SessionId, is_valid_id};
use tracing::{debug, info};

use crate::error::{Result, SessionError};
use crate::session::{ServerSession, SessionStatus, new_session};
use crate::store::SessionStore;

/// True iff `id` is exactly 16 lowercase hex characters.
pub fn validate_session_id(id: &str) -> bool {
    is_valid_id(id)
}

fn parse_id(id: &str) -> Result<SessionId> {
    SessionId::parse(id).map_err(|_| SessionError::InvalidId)
}

/// Arguments to [`SessionManager::revoke`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeInput {
    pub session_id: String,
    pub revoked_by: String,
    pub reason: String,
}

/// Half-open `[start, end)` window on `started_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Filters for [`SessionManager::list`]. Every set filter must match.
///
/// `status` matches the status at read time, so an active session past its
/// `expires_at` counts as expired.
///
/// `limit` bounds the primary index fetch; the in-memory filters run on
/// that page, so fewer than `limit` sessions may come back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionQuery {
    pub user: Option<String>,
    pub status: Option<SessionStatus>,
    pub profile: Option<String>,
    pub time_range: Option<TimeRange>,
    pub limit: usize,
}

impl SessionQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_time_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.time_range = Some(TimeRange { start, end });
        self
    }

    fn matches(&self, session: &ServerSession, now: DateTime<Utc>) -> bool {
        self.user.as_ref().is_none_or(|u| &session.user == u)
            && self.status.is_none_or(|s| session.effective_status(now) == s)
            && self.profile.as_ref().is_none_or(|p| &session.profile == p)
            && self
                .time_range
                .is_none_or(|r| session.started_at >= r.start && session.started_at < r.end)
    }
}

/// Creates, reads, touches, revokes, and lists sessions.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Persists a new active session.
    pub async fn create(&self, session: &ServerSession) -> Result<()> {
        if session.status != SessionStatus::Active {
            return Err(SessionError::Invalid(format!(
                "new session must be active, got {}",
                session.status
            )));
        }
        self.store.create(session).await?;
        info!(
            session_id = %session.id,
            user = %session.user,
            profile = %session.profile,
            expires_at = %session.expires_at,
            "session created"
        );
        Ok(())
    }

    /// Generates and persists a session for freshly issued credentials.
    pub async fn issue(
        &self,
        user: &str,
        profile: &str,
        server_instance_id: &str,
        source_identity: &str,
        duration: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<ServerSession> {
        let session = new_session(user, profile, server_instance_id, source_identity, duration, now)?;
        self.create(&session).await?;
        Ok(session)
    }

    pub async fn get(&self, id: &str) -> Result<ServerSession> {
        let session_id = parse_id(id)?;
        self.store
            .get(&session_id)
            .await
            .map_err(|e| SessionError::from_store(id, e))
    }

    /// Records one credential use against the session.
    pub async fn touch(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let session_id = parse_id(id)?;
        self.store
            .touch(&session_id, now)
            .await
            .map_err(|e| SessionError::from_store(id, e))
    }

    /// Revokes an active session.
    ///
    /// Checks, in order: ID format, non-empty reason, existence, then the
    /// fetched record's status. Nothing is written unless all pass.
    pub async fn revoke(&self, input: &RevokeInput, now: DateTime<Utc>) -> Result<ServerSession> {
        let session_id = parse_id(&input.session_id)?;
        if input.reason.trim().is_empty() {
            return Err(SessionError::ReasonRequired);
        }

        let mut session = self
            .store
            .get(&session_id)
            .await
            .map_err(|e| SessionError::from_store(&input.session_id, e))?;

        match session.effective_status(now) {
            SessionStatus::Revoked => return Err(SessionError::AlreadyRevoked),
            SessionStatus::Expired => return Err(SessionError::Expired),
            SessionStatus::Active => {}
        }

        session.status = SessionStatus::Revoked;
        session.revoked_by.clone_from(&input.revoked_by);
        session.revoked_reason.clone_from(&input.reason);
        self.store
            .update(&session)
            .await
            .map_err(|e| SessionError::from_store(&input.session_id, e))?;

        info!(
            session_id = %session.id,
            user = %session.user,
            profile = %session.profile,
            revoked_by = %session.revoked_by,
            reason = %session.revoked_reason,
            "session revoked"
        );
        Ok(session)
    }

    /// Lists sessions matching `query` as of `now`.
    ///
    /// The store is asked by one index, chosen in the order time range,
    /// status, user, profile; remaining filters are applied in memory.
    /// Expired sessions may still be stored as active, so an `Expired`
    /// status query reads both status pages.
    pub async fn list(&self, query: &SessionQuery, now: DateTime<Utc>) -> Result<Vec<ServerSession>> {
        if query.limit == 0 {
            return Err(SessionError::InvalidQuery("limit must be positive".into()));
        }

        let page = if let Some(range) = query.time_range {
            if range.start >= range.end {
                return Err(SessionError::InvalidQuery(
                    "time range start must precede end".into(),
                ));
            }
            debug!(index = "time_range", "listing sessions");
            self.store
                .list_by_time_range(range.start, range.end, query.limit)
                .await?
        } else if let Some(status) = query.status {
            debug!(index = "status", "listing sessions");
            let mut page = self.store.list_by_status(status, query.limit).await?;
            if status == SessionStatus::Expired {
                page.extend(
                    self.store
                        .list_by_status(SessionStatus::Active, query.limit)
                        .await?,
                );
            }
            page
        } else if let Some(user) = &query.user {
            debug!(index = "user", "listing sessions");
            self.store.list_by_user(user, query.limit).await?
        } else if let Some(profile) = &query.profile {
            debug!(index = "profile", "listing sessions");
            self.store.list_by_profile(profile, query.limit).await?
        } else {
            return Err(SessionError::InvalidQuery(
                "at least one filter is required".into(),
            ));
        };

        let mut sessions: Vec<ServerSession> =
            page.into_iter().filter(|s| query.matches(s, now)).collect();
        sessions.truncate(query.limit);
        Ok(sessions)
    }

    pub async fn list_by_user(&self, user: &str, limit: usize) -> Result<Vec<ServerSession>> {
        Ok(self.store.list_by_user(user, limit).await?)
    }

    pub async fn list_by_status(
        &self,
        status: SessionStatus,
        limit: usize,
    ) -> Result<Vec<ServerSession>> {
        Ok(self.store.list_by_status(status, limit).await?)
    }

    pub async fn list_by_profile(&self, profile: &str, limit: usize) -> Result<Vec<ServerSession>> {
        Ok(self.store.list_by_profile(profile, limit).await?)
    }

    pub async fn list_by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ServerSession>> {
        Ok(self.store.list_by_time_range(start, end, limit).await?)
    }

    pub async fn find_active_by_server_instance(
        &self,
        server_instance_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ServerSession>> {
        Ok(self
            .store
            .find_active_by_server_instance(server_instance_id, now)
            .await?)
    }

    pub async fn get_by_source_identity(&self, source_identity: &str) -> Result<ServerSession> {
        self.store
            .get_by_source_identity(source_identity)
            .await
            .map_err(|e| SessionError::from_store(source_identity, e))
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}
