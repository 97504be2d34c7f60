//! Application of a composed metadata policy to a leaf's self-asserted
//! metadata.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::ClaimPolicy;
use crate::error::Error;

/// Applies `policy` (one entry per claim) to `metadata` in place, following
/// the fixed per-claim operator order: `default` -> `add` -> `value` ->
/// `one_of` -> `subset_of` -> `superset_of` -> `essential`.
///
/// # Errors
///
/// Returns [`Error::PolicyViolation`] if a constraint operator rejects the
/// resulting value, or [`Error::EssentialClaimMissing`] if an essential
/// claim is absent once every other operator has run.
pub fn apply_policy(policy: &HashMap<String, ClaimPolicy>, metadata: &mut Map<String, Value>) -> Result<(), Error> {
    let mut claims: Vec<&String> = policy.keys().collect();
    claims.sort();
    for claim in claims {
        apply_claim(claim, &policy[claim], metadata)?;
    }
    Ok(())
}

fn apply_claim(claim: &str, policy: &ClaimPolicy, metadata: &mut Map<String, Value>) -> Result<(), Error> {
    // default
    if let Some(default) = &policy.default {
        metadata.entry(claim.to_string()).or_insert_with(|| default.clone());
    }

    // add
    if let Some(extra) = &policy.add {
        match metadata.get_mut(claim) {
            Some(Value::Array(existing)) => {
                for v in extra {
                    if !existing.contains(v) {
                        existing.push(v.clone());
                    }
                }
            }
            Some(_) => {
                return Err(Error::PolicyViolation {
                    claim: claim.to_string(),
                    reason: "`add` requires the claim to be an array".to_string(),
                });
            }
            None => {
                metadata.insert(claim.to_string(), Value::Array(extra.clone()));
            }
        }
    }

    // value
    if let Some(value) = &policy.value {
        metadata.insert(claim.to_string(), value.clone());
    }

    // one_of
    if let Some(allowed) = &policy.one_of {
        if let Some(current) = metadata.get(claim) {
            let satisfied = match current {
                Value::Array(values) => values.iter().all(|v| allowed.contains(v)),
                other => allowed.contains(other),
            };
            if !satisfied {
                return Err(Error::PolicyViolation {
                    claim: claim.to_string(),
                    reason: format!("{current} is not one of the permitted values {allowed:?}"),
                });
            }
        }
    }

    // subset_of
    if let Some(allowed) = &policy.subset_of {
        if let Some(Value::Array(values)) = metadata.get_mut(claim) {
            let had_values = !values.is_empty();
            values.retain(|v| allowed.contains(v));
            if had_values && values.is_empty() {
                return Err(Error::PolicyViolation {
                    claim: claim.to_string(),
                    reason: "filtering to `subset_of` left no permitted values".to_string(),
                });
            }
        }
    }

    // superset_of
    if let Some(required) = &policy.superset_of {
        let satisfied = match metadata.get(claim) {
            Some(Value::Array(values)) => required.iter().all(|r| values.contains(r)),
            Some(_) | None => required.is_empty(),
        };
        if !satisfied {
            return Err(Error::PolicyViolation {
                claim: claim.to_string(),
                reason: format!("missing required values {required:?}"),
            });
        }
    }

    // essential
    if policy.essential == Some(true) && !metadata.contains_key(claim) {
        return Err(Error::EssentialClaimMissing { claim: claim.to_string() });
    }

    Ok(())
}
