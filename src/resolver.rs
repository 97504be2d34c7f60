//! # Resolver
//!
//! Orchestrates the fetcher, explorer, chain validator, and policy engine
//! for a single (leaf, anchor, entity_type) resolution.

use serde_json::{Map, Value};
use tracing::instrument;

use crate::chain::TrustChain;
use crate::config::ResolverConfig;
use crate::entity::EntityId;
use crate::error::Error;
use crate::explorer::upward::trust_chains;
use crate::fetcher::Fetcher;
use crate::policy::resolve_metadata;
use crate::statement::{EntityTypeTag, TrustMarkClaim};
use crate::transport::Transport;
use crate::trust_mark::{filter_trust_marks, TrustMarkIssue};

/// The result of resolving a leaf's metadata against a trust anchor.
#[derive(Debug)]
pub struct ResolvedEntity {
    /// The leaf entity resolved.
    pub entity_id: EntityId,
    /// The entity type the metadata was resolved for.
    pub entity_type: EntityTypeTag,
    /// The leaf's metadata after composed policy application.
    pub metadata: Map<String, Value>,
    /// Trust marks that survived chain-based filtering.
    pub trust_marks: Vec<TrustMarkClaim>,
    /// Trust marks present on the leaf but dropped during filtering.
    pub trust_mark_issues: Vec<TrustMarkIssue>,
    /// The chain used, as raw compact JWSs, leaf first.
    pub chain: Vec<String>,
    /// Errors from sibling chain-building branches that did not succeed;
    /// does not include any error that would have failed this resolution.
    pub chain_errors: Vec<Error>,
}

/// Resolves `leaf`'s metadata for `entity_type`, trusting `anchor`.
///
/// Builds every valid chain from `leaf` to `anchor`, picks the shortest
/// (tie-broken lexicographically on the concatenation of superior ids),
/// applies the chain's composed metadata policy, and filters the leaf's
/// trust marks against the chain's declarations.
///
/// # Errors
///
/// Returns [`Error::AnchorNotReached`] if no valid chain to `anchor` exists,
/// or any policy error from [`crate::policy::resolve_metadata`].
#[instrument(level = "debug", skip(fetcher, config))]
pub async fn resolve<T>(
    fetcher: &Fetcher<T>, leaf: &EntityId, anchor: &EntityId, entity_type: &EntityTypeTag, config: &ResolverConfig,
) -> Result<ResolvedEntity, Error>
where
    T: Transport + Clone + 'static,
{
    let outcome = trust_chains(fetcher, leaf, Some(std::slice::from_ref(anchor)), config).await;

    let chain = pick_shortest(outcome.chains).ok_or_else(|| Error::AnchorNotReached { leaf: leaf.clone() })?;

    let metadata = resolve_metadata(&chain, entity_type)?;
    let (trust_marks, trust_mark_issues) = filter_trust_marks(&chain);
    let chain_jws = chain.statements().iter().map(|s| s.raw.clone()).collect();

    Ok(ResolvedEntity {
        entity_id: leaf.clone(),
        entity_type: *entity_type,
        metadata,
        trust_marks,
        trust_mark_issues,
        chain: chain_jws,
        chain_errors: outcome.errors,
    })
}

fn pick_shortest(chains: Vec<TrustChain>) -> Option<TrustChain> {
    chains.into_iter().min_by(|a, b| a.hop_count().cmp(&b.hop_count()).then_with(|| superior_key(a).cmp(&superior_key(b))))
}

fn superior_key(chain: &TrustChain) -> String {
    chain.statements().iter().step_by(2).map(|s| s.sub.as_str()).collect::<Vec<_>>().join("|")
}
