//! Active break-glass lookup.

use chrono::{DateTime, TimeDelta, Utc};
use sentinel_types::StoreError;
use tracing::debug;

use crate::event::BreakGlassEvent;
use crate::store::BreakGlassStore;

/// Finds a live break-glass event held by `invoker` for `profile`.
///
/// An event is live when it is `Active`, `now < expires_at`, and its
/// profile matches exactly. When several are live the most recently
/// created wins. Store errors are returned unchanged.
pub async fn find_active_break_glass(
    store: &dyn BreakGlassStore,
    invoker: &str,
    profile: &str,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Option<BreakGlassEvent>, StoreError> {
    let events = store.list_by_invoker(invoker, limit).await?;

    let found = events
        .into_iter()
        .filter(|e| e.is_live(profile, now))
        .max_by_key(|e| e.created_at);

    if found.is_none() {
        debug!(invoker, profile, "no active break-glass event");
    }
    Ok(found)
}

/// Time left on `event`: `max(0, expires_at - now)`.
pub fn remaining_duration(event: &BreakGlassEvent, now: DateTime<Utc>) -> TimeDelta {
    (event.expires_at - now).max(TimeDelta::zero())
}
