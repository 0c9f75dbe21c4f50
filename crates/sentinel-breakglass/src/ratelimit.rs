//! Per-user throttling of break-glass invocations.

use chrono::{DateTime, TimeDelta, Utc};
use sentinel_types::StoreError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::BreakGlassStore;

/// Limits on how often one user may invoke break-glass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Minimum gap between two invocations by the same user.
    #[serde(
        rename = "cooldown_secs",
        default,
        with = "sentinel_types::option_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub cooldown: Option<TimeDelta>,
    /// Most invocations allowed per user inside `quota_window`. `Some(0)`
    /// refuses every invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_user: Option<u32>,
    #[serde(rename = "quota_window_secs", with = "sentinel_types::duration_secs")]
    pub quota_window: TimeDelta,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            cooldown: Some(TimeDelta::minutes(5)),
            max_per_user: Some(3),
            quota_window: TimeDelta::hours(24),
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Why the invocation was refused; empty when allowed.
    pub reason: String,
    /// How long until a retry could succeed.
    pub retry_after: Option<TimeDelta>,
}

impl RateLimitResult {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
            retry_after: None,
        }
    }

    fn refuse(reason: String, retry_after: TimeDelta) -> Self {
        Self {
            allowed: false,
            reason,
            retry_after: Some(retry_after),
        }
    }
}

/// Checks whether `invoker` may invoke break-glass at `now`.
///
/// Looks at the invoker's `limit` most recent events. Cooldown is checked
/// before quota.
pub async fn check_rate_limit(
    store: &dyn BreakGlassStore,
    invoker: &str,
    policy: &RateLimitPolicy,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<RateLimitResult, StoreError> {
    let events = store.list_by_invoker(invoker, limit).await?;

    if let Some(cooldown) = policy.cooldown {
        if let Some(latest) = events.iter().map(|e| e.created_at).max() {
            let ready_at = latest + cooldown;
            if now < ready_at {
                let wait = ready_at - now;
                warn!(invoker, wait_secs = wait.num_seconds(), "break-glass cooldown active");
                return Ok(RateLimitResult::refuse(
                    format!("cooldown active, retry in {}s", wait.num_seconds()),
                    wait,
                ));
            }
        }
    }

    if let Some(max) = policy.max_per_user {
        if max == 0 {
            warn!(invoker, "break-glass quota is zero");
            return Ok(RateLimitResult::refuse(
                "break-glass quota is zero".to_string(),
                policy.quota_window,
            ));
        }
        let window_start = now - policy.quota_window;
        let mut in_window: Vec<DateTime<Utc>> = events
            .iter()
            .map(|e| e.created_at)
            .filter(|at| *at > window_start)
            .collect();
        if in_window.len() >= max as usize {
            in_window.sort();
            // The oldest counted event ages out first.
            let frees_at = in_window[in_window.len() - max as usize] + policy.quota_window;
            let wait = (frees_at - now).max(TimeDelta::zero());
            warn!(invoker, count = in_window.len(), max, "break-glass quota exhausted");
            return Ok(RateLimitResult::refuse(
                format!("quota of {max} per {}s exhausted", policy.quota_window.num_seconds()),
                wait,
            ));
        }
    }

    Ok(RateLimitResult::allow())
}
