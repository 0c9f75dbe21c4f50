//! YAML loading for access, approval, and break-glass policies.
//!
//! Every loader parses then validates; a document that parses but fails
//! validation is rejected as a whole.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::approval::ApprovalPolicy;
use crate::breakglass::BreakGlassPolicy;
use crate::error::{PolicyError, Result};
use crate::policy::Policy;

/// Parses and validates an access policy document.
pub fn parse_policy(yaml: &str) -> Result<Policy> {
    let policy: Policy = serde_yaml::from_str(yaml)?;
    policy.validate()?;
    Ok(policy)
}

/// Parses and validates an approval policy document.
pub fn parse_approval_policy(yaml: &str) -> Result<ApprovalPolicy> {
    let policy: ApprovalPolicy = serde_yaml::from_str(yaml)?;
    policy.validate()?;
    Ok(policy)
}

/// Parses and validates a break-glass policy document.
pub fn parse_break_glass_policy(yaml: &str) -> Result<BreakGlassPolicy> {
    let policy: BreakGlassPolicy = serde_yaml::from_str(yaml)?;
    policy.validate()?;
    Ok(policy)
}

pub fn load_policy_file(path: impl AsRef<Path>) -> Result<Policy> {
    load_file(path.as_ref(), parse_policy)
}

pub fn load_approval_policy_file(path: impl AsRef<Path>) -> Result<ApprovalPolicy> {
    load_file(path.as_ref(), parse_approval_policy)
}

pub fn load_break_glass_policy_file(path: impl AsRef<Path>) -> Result<BreakGlassPolicy> {
    load_file(path.as_ref(), parse_break_glass_policy)
}

fn load_file<T: DeserializeOwned>(path: &Path, parse: fn(&str) -> Result<T>) -> Result<T> {
    let yaml = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = yaml.len(), "loaded policy document");
    parse(&yaml)
}
