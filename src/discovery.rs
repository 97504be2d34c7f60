//! # Discovery
//!
//! Enumerates the entities of a given type (by default
//! [`EntityTypeTag::OpenidProvider`]) reachable through a relying party's
//! configured trust anchors, retaining only those that actually chain back
//! to the anchor they were discovered under.

use std::collections::HashSet;

use tracing::instrument;

use crate::config::ResolverConfig;
use crate::entity::EntityId;
use crate::error::Error;
use crate::explorer::downward::subtree;
use crate::explorer::upward::trust_chains;
use crate::fetcher::Fetcher;
use crate::statement::EntityTypeTag;
use crate::transport::Transport;

/// Discovers entities of `entity_type` reachable through `anchors` (or,
/// when `anchors` is empty, through `rp_id`'s own configured trust
/// anchors).
///
/// # Errors
///
/// Returns [`Error::NoTrustAnchorConfigured`] if `anchors` is empty and
/// `rp_id`'s configuration names none either.
#[instrument(level = "debug", skip(fetcher, config))]
pub async fn discovery<T>(
    fetcher: &Fetcher<T>, rp_id: &EntityId, anchors: &[EntityId], entity_type: Option<EntityTypeTag>,
    config: &ResolverConfig,
) -> Result<Vec<EntityId>, Error>
where
    T: Transport + Clone + 'static,
{
    let entity_type = entity_type.unwrap_or(EntityTypeTag::OpenidProvider);

    let anchors: Vec<EntityId> = if anchors.is_empty() {
        let rp_config = fetcher.fetch_configuration(rp_id).await?;
        let configured = rp_config.federation_entity_metadata().trust_anchors;
        if configured.is_empty() {
            return Err(Error::NoTrustAnchorConfigured);
        }
        configured
    } else {
        anchors.to_vec()
    };

    let mut discovered = HashSet::new();

    for anchor in &anchors {
        let (snapshot, _errors) = subtree(fetcher, anchor).await;
        for node in snapshot.nodes {
            if !node.entity_types.contains(&entity_type) || discovered.contains(&node.entity_id) {
                continue;
            }
            let outcome = trust_chains(fetcher, &node.entity_id, Some(std::slice::from_ref(anchor)), config).await;
            if !outcome.chains.is_empty() {
                discovered.insert(node.entity_id);
            }
        }
    }

    let mut result: Vec<EntityId> = discovered.into_iter().collect();
    result.sort();
    Ok(result)
}
