//! Approved-request lookup and auto-approval.

use chrono::{DateTime, Utc};
use sentinel_policy::{ApprovalPolicy, ApprovalRule, find_approval_rule, should_auto_approve};
use sentinel_types::StoreError;
use tracing::{debug, info};

use crate::error::Result;
use crate::request::{Request, RequestStatus};
use crate::store::RequestStore;

/// Finds a live approved request held by `requester` for `profile`.
///
/// Scans at most `limit` of the requester's requests. A request qualifies
/// when it is `Approved`, `now < expires_at`, and its profile matches
/// exactly. When several qualify, the most recently created wins, so the
/// result does not depend on store ordering.
///
/// Store errors are returned unchanged.
pub async fn find_approved_request(
    store: &dyn RequestStore,
    requester: &str,
    profile: &str,
    now: DateTime<Utc>,
    limit: usize,
) -> std::result::Result<Option<Request>, StoreError> {
    let requests = store.list_by_requester(requester, limit).await?;

    let found = requests
        .into_iter()
        .filter(|r| r.is_live_approval(profile, now))
        .max_by_key(|r| r.created_at);

    if found.is_none() {
        debug!(requester, profile, "no live approved request");
    }
    Ok(found)
}

/// Approves `request` automatically if `rule` allows it.
///
/// Returns true if the request was stamped approved. Only pending requests
/// are considered.
pub fn apply_auto_approve(request: &mut Request, rule: &ApprovalRule, now: DateTime<Utc>) -> bool {
    if request.status != RequestStatus::Pending {
        return false;
    }
    if !should_auto_approve(rule, &request.requester, now, request.duration) {
        return false;
    }
    request.auto_approve(now);
    info!(
        request_id = %request.id,
        requester = %request.requester,
        profile = %request.profile,
        rule = %rule.name,
        "request auto-approved"
    );
    true
}

/// Persists a new request, auto-approving it first when the approval
/// policy's rule for its profile allows.
pub async fn submit_request(
    store: &dyn RequestStore,
    policy: Option<&ApprovalPolicy>,
    mut request: Request,
    now: DateTime<Utc>,
) -> Result<Request> {
    if let Some(rule) = policy.and_then(|p| find_approval_rule(p, &request.profile)) {
        apply_auto_approve(&mut request, rule, now);
    }
    store.create(&request).await?;
    Ok(request)
}
