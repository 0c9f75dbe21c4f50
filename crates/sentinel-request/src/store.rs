//! Request persistence seam and an in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sentinel_types::{RequestId, StoreError};

use crate::request::{Request, RequestStatus};

/// Storage for access requests.
///
/// List methods return at most `limit` records, most recently created first.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn create(&self, request: &Request) -> Result<(), StoreError>;

    async fn get(&self, id: &RequestId) -> Result<Request, StoreError>;

    /// Replaces an existing request; `NotFound` if it was never created.
    async fn update(&self, request: &Request) -> Result<(), StoreError>;

    async fn list_by_requester(
        &self,
        requester: &str,
        limit: usize,
    ) -> Result<Vec<Request>, StoreError>;

    async fn list_by_status(
        &self,
        status: RequestStatus,
        limit: usize,
    ) -> Result<Vec<Request>, StoreError>;
}

/// A process-local request store.
///
/// Used by tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryRequestStore {
    requests: RwLock<HashMap<RequestId, Request>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn list_where(
        &self,
        limit: usize,
        keep: impl Fn(&Request) -> bool,
    ) -> Result<Vec<Request>, StoreError> {
        let requests = self.requests.read().map_err(poisoned)?;
        let mut matched: Vec<Request> = requests.values().filter(|r| keep(r)).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit);
        Ok(matched)
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::backend("request store lock poisoned")
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn create(&self, request: &Request) -> Result<(), StoreError> {
        let mut requests = self.requests.write().map_err(poisoned)?;
        if requests.contains_key(&request.id) {
            return Err(StoreError::AlreadyExists {
                kind: "request",
                id: request.id.to_string(),
            });
        }
        requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn get(&self, id: &RequestId) -> Result<Request, StoreError> {
        let requests = self.requests.read().map_err(poisoned)?;
        requests.get(id).cloned().ok_or_else(|| StoreError::NotFound {
            kind: "request",
            id: id.to_string(),
        })
    }

    async fn update(&self, request: &Request) -> Result<(), StoreError> {
        let mut requests = self.requests.write().map_err(poisoned)?;
        match requests.get_mut(&request.id) {
            Some(existing) => {
                *existing = request.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: "request",
                id: request.id.to_string(),
            }),
        }
    }

    async fn list_by_requester(
        &self,
        requester: &str,
        limit: usize,
    ) -> Result<Vec<Request>, StoreError> {
        self.list_where(limit, |r| r.requester == requester)
    }

    async fn list_by_status(
        &self,
        status: RequestStatus,
        limit: usize,
    ) -> Result<Vec<Request>, StoreError> {
        self.list_where(limit, |r| r.status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestLimits;
    use chrono::{TimeDelta, TimeZone, Utc};

    fn request_at(requester: &str, minute: u32) -> Request {
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 12, minute, 0).unwrap();
        Request::new(
            requester,
            "production",
            "rotating the database credentials",
            TimeDelta::hours(1),
            at,
            &RequestLimits::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let store = MemoryRequestStore::new();
        let mut request = request_at("alice", 0);
        store.create(&request).await.unwrap();

        assert!(matches!(
            store.create(&request).await,
            Err(StoreError::AlreadyExists { .. })
        ));

        request.approver_comment = "edited".into();
        store.update(&request).await.unwrap();
        let loaded = store.get(&request.id).await.unwrap();
        assert_eq!(loaded.approver_comment, "edited");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryRequestStore::new();
        let id = RequestId::parse("0123456789abcdef").unwrap();
        assert!(store.get(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_requester_newest_first_and_limited() {
        let store = MemoryRequestStore::new();
        for minute in [5, 1, 9] {
            store.create(&request_at("alice", minute)).await.unwrap();
        }
        store.create(&request_at("bob", 3)).await.unwrap();

        let listed = store.list_by_requester("alice", 2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at > listed[1].created_at);
        assert!(listed.iter().all(|r| r.requester == "alice"));
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let store = MemoryRequestStore::new();
        store.create(&request_at("alice", 0)).await.unwrap();
        let pending = store.list_by_status(RequestStatus::Pending, 10).await.unwrap();
        let approved = store.list_by_status(RequestStatus::Approved, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(approved.is_empty());
    }
}
