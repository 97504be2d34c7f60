//! Composition of metadata policy across a trust chain.

use std::collections::HashMap;

use super::ClaimPolicy;
use crate::chain::TrustChain;
use crate::error::Error;
use crate::statement::EntityTypeTag;

/// Composes one claim's policy from a superior (`sup`) and the next
/// statement down the chain toward the leaf (`sub`), per the composition
/// column of the operator table: `sup` wins ties on `value` and `default`;
/// `one_of`/`subset_of` intersect; `add`/`superset_of` union; `essential`
/// is a logical OR.
///
/// # Errors
///
/// Returns [`Error::PolicyConflict`] if composing `one_of` yields an empty
/// intersection, or if both sides set an incompatible `value`.
fn compose_claim(claim: &str, sup: &ClaimPolicy, sub: &ClaimPolicy) -> Result<ClaimPolicy, Error> {
    let value = match (&sup.value, &sub.value) {
        (Some(s), Some(o)) if s != o => {
            return Err(Error::PolicyConflict {
                claim: claim.to_string(),
                reason: format!("conflicting `value` operators: {s} vs {o}"),
            });
        }
        (Some(s), _) => Some(s.clone()),
        (None, other) => other.clone(),
    };

    let default = match (&sup.default, &sub.default) {
        (Some(s), _) => Some(s.clone()),
        (None, other) => other.clone(),
    };

    let add = union_opt(&sup.add, &sub.add);

    let one_of = match (&sup.one_of, &sub.one_of) {
        (Some(s), Some(o)) => {
            let intersection: Vec<_> = s.iter().filter(|v| o.contains(v)).cloned().collect();
            if intersection.is_empty() {
                return Err(Error::PolicyConflict {
                    claim: claim.to_string(),
                    reason: "`one_of` composition yielded an empty intersection".to_string(),
                });
            }
            Some(intersection)
        }
        (Some(s), None) => Some(s.clone()),
        (None, o) => o.clone(),
    };

    let subset_of = match (&sup.subset_of, &sub.subset_of) {
        (Some(s), Some(o)) => Some(s.iter().filter(|v| o.contains(v)).cloned().collect()),
        (Some(s), None) => Some(s.clone()),
        (None, o) => o.clone(),
    };

    let superset_of = union_opt(&sup.superset_of, &sub.superset_of);

    let essential = match (sup.essential, sub.essential) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(false) || b.unwrap_or(false)),
    };

    Ok(ClaimPolicy { value, add, default, one_of, subset_of, superset_of, essential })
}

fn union_opt(
    a: &Option<Vec<serde_json::Value>>, b: &Option<Vec<serde_json::Value>>,
) -> Option<Vec<serde_json::Value>> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (Some(x), Some(y)) => {
            let mut merged = x.clone();
            for v in y {
                if !merged.contains(v) {
                    merged.push(v.clone());
                }
            }
            Some(merged)
        }
    }
}

/// Composes the full metadata policy for `entity_type` across `chain`,
/// folding from the anchor toward the leaf (excluding the leaf's own
/// self-signed statement, which carries no policy over itself).
///
/// # Errors
///
/// Returns [`Error::PolicyConflict`] if any claim's operators cannot be
/// composed (see [`compose_claim`]).
pub fn compose_chain_policy(
    chain: &TrustChain, entity_type: &EntityTypeTag,
) -> Result<HashMap<String, ClaimPolicy>, Error> {
    let mut composed: HashMap<String, ClaimPolicy> = HashMap::new();

    // `chain.statements()` is ordered leaf -> anchor; policy composition
    // proceeds anchor -> leaf, so walk it in reverse, skipping the leaf's
    // own self-signed statement at index 0.
    for statement in chain.statements().iter().skip(1).rev() {
        let Some(slice) = statement.metadata_policy.get(entity_type) else { continue };
        for (claim, policy) in slice {
            let merged = match composed.remove(claim) {
                Some(existing_super) => compose_claim(claim, &existing_super, policy)?,
                None => policy.clone(),
            };
            composed.insert(claim.clone(), merged);
        }
    }

    Ok(composed)
}
