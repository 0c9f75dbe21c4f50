//! Break-glass persistence seam and an in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sentinel_types::{EventId, StoreError};

use crate::event::BreakGlassEvent;

/// Storage for break-glass events.
///
/// `list_by_invoker` returns at most `limit` events, most recent first.
#[async_trait]
pub trait BreakGlassStore: Send + Sync {
    async fn create(&self, event: &BreakGlassEvent) -> Result<(), StoreError>;

    async fn get(&self, id: &EventId) -> Result<BreakGlassEvent, StoreError>;

    async fn update(&self, event: &BreakGlassEvent) -> Result<(), StoreError>;

    async fn list_by_invoker(
        &self,
        invoker: &str,
        limit: usize,
    ) -> Result<Vec<BreakGlassEvent>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryBreakGlassStore {
    events: RwLock<HashMap<EventId, BreakGlassEvent>>,
}

impl MemoryBreakGlassStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::backend("break-glass store lock poisoned")
}

#[async_trait]
impl BreakGlassStore for MemoryBreakGlassStore {
    async fn create(&self, event: &BreakGlassEvent) -> Result<(), StoreError> {
        let mut events = self.events.write().map_err(poisoned)?;
        if events.contains_key(&event.id) {
            return Err(StoreError::AlreadyExists {
                kind: "break-glass event",
                id: event.id.to_string(),
            });
        }
        events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn get(&self, id: &EventId) -> Result<BreakGlassEvent, StoreError> {
        let events = self.events.read().map_err(poisoned)?;
        events.get(id).cloned().ok_or_else(|| StoreError::NotFound {
            kind: "break-glass event",
            id: id.to_string(),
        })
    }

    async fn update(&self, event: &BreakGlassEvent) -> Result<(), StoreError> {
        let mut events = self.events.write().map_err(poisoned)?;
        let Some(existing) = events.get_mut(&event.id) else {
            return Err(StoreError::NotFound {
                kind: "break-glass event",
                id: event.id.to_string(),
            });
        };
        *existing = event.clone();
        Ok(())
    }

    async fn list_by_invoker(
        &self,
        invoker: &str,
        limit: usize,
    ) -> Result<Vec<BreakGlassEvent>, StoreError> {
        let events = self.events.read().map_err(poisoned)?;
        let mut matched: Vec<BreakGlassEvent> = events
            .values()
            .filter(|e| e.invoker == invoker)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit);
        Ok(matched)
    }
}
