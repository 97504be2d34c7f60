//! # Trust Mark Filtering
//!
//! Extracts trust marks from a resolved leaf and filters them against the
//! chain that resolved it: a mark survives iff some statement along the
//! chain names its issuer under `trust_mark_issuers` for that mark's `id`.
//! Verifying a trust mark's own signature is out of scope for this crate
//! (§1 Non-goals) - only extraction and this survival check are performed.

use crate::chain::TrustChain;
use crate::entity::EntityId;
use crate::statement::TrustMarkClaim;
use crate::verifier::unverified_payload;

/// A trust mark that did not survive filtering, kept so callers can report
/// it rather than have it silently vanish from the resolved result.
#[derive(Clone, Debug)]
pub struct TrustMarkIssue {
    /// The trust mark's identifier.
    pub mark_id: String,
    /// The mark's issuer, if its payload could be read at all.
    pub issuer: Option<EntityId>,
    /// Why the mark was dropped.
    pub reason: String,
}

/// Splits `chain.leaf().trust_marks` into those whose issuer is named along
/// the chain and those that are not (or whose payload could not be read).
#[must_use]
pub fn filter_trust_marks(chain: &TrustChain) -> (Vec<TrustMarkClaim>, Vec<TrustMarkIssue>) {
    let leaf = chain.leaf();
    let mut surviving = Vec::new();
    let mut issues = Vec::new();

    for mark in &leaf.trust_marks {
        match mark_issuer(mark) {
            Ok(issuer) if issuer_is_trusted(chain, &mark.id, &issuer) => surviving.push(mark.clone()),
            Ok(issuer) => issues.push(TrustMarkIssue {
                mark_id: mark.id.clone(),
                issuer: Some(issuer),
                reason: "issuer is not a trust_mark_issuer for this mark anywhere along the chain".to_string(),
            }),
            Err(reason) => issues.push(TrustMarkIssue { mark_id: mark.id.clone(), issuer: None, reason }),
        }
    }

    (surviving, issues)
}

fn mark_issuer(mark: &TrustMarkClaim) -> Result<EntityId, String> {
    let payload = unverified_payload(&mark.trust_mark).map_err(|e| e.to_string())?;
    let iss = payload.get("iss").and_then(|v| v.as_str()).ok_or_else(|| "trust mark payload has no iss".to_string())?;
    EntityId::parse(iss).map_err(|e| e.to_string())
}

fn issuer_is_trusted(chain: &TrustChain, mark_id: &str, issuer: &EntityId) -> bool {
    chain.statements().iter().any(|statement| {
        statement.federation_entity_metadata().trust_mark_issuers.get(mark_id).is_some_and(|issuers| issuers.contains(issuer))
    })
}
