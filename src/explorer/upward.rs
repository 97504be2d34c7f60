//! Upward traversal: enumerate trust chains from a leaf toward one or more
//! trust anchors (or every reachable self-signed root, if unconstrained).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::{join_all, BoxFuture};

use crate::chain::TrustChain;
use crate::config::ResolverConfig;
use crate::entity::EntityId;
use crate::error::Error;
use crate::fetcher::Fetcher;
use crate::statement::EntityStatement;
use crate::transport::Transport;

/// The chains a [`trust_chains`] call was able to build, plus every error
/// encountered on branches that did not yield one - a rejected branch never
/// aborts its siblings.
#[derive(Debug, Default)]
pub struct ExplorationOutcome {
    /// Valid chains, sorted by (hop count ascending, anchor id lexicographic).
    pub chains: Vec<TrustChain>,
    /// Errors from branches that did not produce a valid chain.
    pub errors: Vec<Error>,
}

/// Enumerates every valid trust chain from `leaf` to `anchors` (or, if
/// `anchors` is `None`, to every reachable self-signed root), bounded by
/// `config.max_depth` superior-hops.
pub async fn trust_chains<T>(
    fetcher: &Fetcher<T>, leaf: &EntityId, anchors: Option<&[EntityId]>, config: &ResolverConfig,
) -> ExplorationOutcome
where
    T: Transport + Clone + 'static,
{
    let leaf_self = match fetcher.fetch_configuration(leaf).await {
        Ok(s) => s,
        Err(e) => return ExplorationOutcome { chains: vec![], errors: vec![e] },
    };

    let mut visited = HashSet::new();
    visited.insert(leaf.clone());

    let (mut chains, errors) =
        explore(fetcher, leaf_self.clone(), vec![leaf_self], visited, anchors, config, 0).await;

    chains.sort_by(|a, b| {
        a.hop_count().cmp(&b.hop_count()).then_with(|| a.anchor_id().as_str().cmp(b.anchor_id().as_str()))
    });

    ExplorationOutcome { chains, errors }
}

fn explore<'a, T>(
    fetcher: &'a Fetcher<T>, current_self: Arc<EntityStatement>, path: Vec<Arc<EntityStatement>>,
    path_visited: HashSet<EntityId>, anchors: Option<&'a [EntityId]>, config: &'a ResolverConfig, depth: u32,
) -> BoxFuture<'a, (Vec<TrustChain>, Vec<Error>)>
where
    T: Transport + Clone + 'static,
{
    Box::pin(async move {
        let leaf_id = path[0].sub.clone();

        if let Some(anchors) = anchors {
            if anchors.contains(&current_self.sub) {
                return match TrustChain::validate(path, Some(anchors), Utc::now(), config.clock_skew) {
                    Ok(chain) => (vec![chain], vec![]),
                    Err(e) => (vec![], vec![e]),
                };
            }
        }

        if depth >= config.max_depth {
            return (vec![], vec![Error::PathTooLong { max: config.max_depth }]);
        }

        if current_self.authority_hints.is_empty() {
            return if anchors.is_some() {
                (vec![], vec![Error::AnchorNotReached { leaf: leaf_id }])
            } else {
                match TrustChain::validate(path, None, Utc::now(), config.clock_skew) {
                    Ok(chain) => (vec![chain], vec![]),
                    Err(e) => (vec![], vec![e]),
                }
            };
        }

        let branches = current_self.authority_hints.iter().map(|superior| {
            let superior = superior.clone();
            let current_self = current_self.clone();
            let mut branch_path = path.clone();
            let mut branch_visited = path_visited.clone();

            async move {
                if !branch_visited.insert(superior.clone()) {
                    return (vec![], vec![Error::CycleDetected { entity: superior }]);
                }

                let superior_self = match fetcher.fetch_configuration(&superior).await {
                    Ok(s) => s,
                    Err(e) => return (vec![], vec![e]),
                };
                let subordinate = match fetcher.fetch_subordinate(&superior, &current_self.sub, &superior_self).await {
                    Ok(s) => s,
                    Err(e) => return (vec![], vec![e]),
                };

                branch_path.push(subordinate);
                branch_path.push(superior_self.clone());

                explore(fetcher, superior_self, branch_path, branch_visited, anchors, config, depth + 1).await
            }
        });

        let results = join_all(branches).await;
        let mut chains = Vec::new();
        let mut errors = Vec::new();
        for (c, e) in results {
            chains.extend(c);
            errors.extend(e);
        }
        (chains, errors)
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::test_support::sign_es256;

    #[derive(Clone, Default)]
    struct MapTransport {
        responses: Arc<HashMap<String, String>>,
        calls: Arc<AtomicUsize>,
    }

    impl Transport for MapTransport {
        async fn get(&self, url: &str) -> Result<String, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.get(url).cloned().ok_or_else(|| Error::UnexpectedStatus { url: url.to_string(), status: 404 })
        }
    }

    fn sign_configuration(kid: &str, id: &str, hints: &[&str]) -> String {
        let now = Utc::now();
        let jwk = crate::test_support::ec_jwk(kid);
        let claims = json!({
            "iss": id, "sub": id,
            "iat": (now - chrono::Duration::seconds(10)).timestamp(),
            "exp": (now + chrono::Duration::hours(1)).timestamp(),
            "jwks": { "keys": [jwk] },
            "authority_hints": hints,
            "metadata": { "federation_entity": { "federation_fetch_endpoint": format!("{id}/fetch") } },
        });
        sign_es256(kid, &claims).0
    }

    fn sign_subordinate(kid: &str, iss: &str, sub: &str) -> String {
        let now = Utc::now();
        let claims = json!({
            "iss": iss, "sub": sub,
            "iat": (now - chrono::Duration::seconds(10)).timestamp(),
            "exp": (now + chrono::Duration::hours(1)).timestamp(),
        });
        sign_es256(kid, &claims).0
    }

    #[tokio::test]
    async fn linear_chain_to_single_anchor() {
        let leaf = "https://leaf.example";
        let mid = "https://mid.example";
        let anchor = "https://anchor.example";

        let mut responses = HashMap::new();
        responses.insert(
            EntityId::parse(leaf).unwrap().well_known_configuration_url(),
            sign_configuration("key-1", leaf, &[mid]),
        );
        responses.insert(
            EntityId::parse(mid).unwrap().well_known_configuration_url(),
            sign_configuration("key-2", mid, &[anchor]),
        );
        responses.insert(
            EntityId::parse(anchor).unwrap().well_known_configuration_url(),
            sign_configuration("key-3", anchor, &[]),
        );
        responses.insert(format!("{mid}/fetch?sub={}", urlenc(leaf)), sign_subordinate("key-2", mid, leaf));
        responses.insert(format!("{anchor}/fetch?sub={}", urlenc(mid)), sign_subordinate("key-3", anchor, mid));

        let transport = MapTransport { responses: Arc::new(responses), calls: Arc::new(AtomicUsize::new(0)) };
        let fetcher = Fetcher::new(transport, 8, Duration::from_secs(60));
        let config = ResolverConfig::default();

        let leaf_id = EntityId::parse(leaf).unwrap();
        let anchor_id = EntityId::parse(anchor).unwrap();
        let outcome = trust_chains(&fetcher, &leaf_id, Some(&[anchor_id.clone()]), &config).await;

        assert_eq!(outcome.chains.len(), 1, "errors: {:?}", outcome.errors);
        assert_eq!(outcome.chains[0].anchor_id(), &anchor_id);
        assert_eq!(outcome.chains[0].hop_count(), 2);
    }

    #[tokio::test]
    async fn cycle_is_detected_and_no_chain_emitted() {
        let leaf = "https://leaf.example";
        let other = "https://other.example";

        let mut responses = HashMap::new();
        responses.insert(
            EntityId::parse(leaf).unwrap().well_known_configuration_url(),
            sign_configuration("key-1", leaf, &[other]),
        );
        responses.insert(
            EntityId::parse(other).unwrap().well_known_configuration_url(),
            sign_configuration("key-2", other, &[leaf]),
        );
        responses.insert(format!("{other}/fetch?sub={}", urlenc(leaf)), sign_subordinate("key-2", other, leaf));
        responses.insert(format!("{leaf}/fetch?sub={}", urlenc(other)), sign_subordinate("key-1", leaf, other));

        let transport = MapTransport { responses: Arc::new(responses), calls: Arc::new(AtomicUsize::new(0)) };
        let fetcher = Fetcher::new(transport, 8, Duration::from_secs(60));
        let config = ResolverConfig::default();

        let leaf_id = EntityId::parse(leaf).unwrap();
        let outcome = trust_chains(&fetcher, &leaf_id, None, &config).await;

        assert!(outcome.chains.is_empty());
        assert!(outcome.errors.iter().any(|e| matches!(e, Error::CycleDetected { .. })));
    }

    fn urlenc(s: &str) -> String {
        url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
    }
}
