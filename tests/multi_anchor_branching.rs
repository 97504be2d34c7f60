//! A leaf with two distinct `authority_hints` superiors, each chaining to a
//! different trust anchor: `trust_chains` with no anchor filter should
//! return one chain per reachable anchor, and `resolve` against a specific
//! anchor should pick only the chain that actually reaches it.

mod common;

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use common::{eid, sign_configuration, sign_subordinate, urlenc, MapTransport};
use oidcfed_trust::{resolve, trust_chains, EntityTypeTag, Fetcher, ResolverConfig};
use serde_json::json;

fn build_transport() -> MapTransport {
    let leaf = "https://leaf.example";
    let branch_a = "https://branch-a.example";
    let anchor_a = "https://anchor-a.example";
    let branch_b = "https://branch-b.example";
    let anchor_b = "https://anchor-b.example";

    let mut responses = HashMap::new();

    responses.insert(
        eid(leaf).well_known_configuration_url(),
        sign_configuration("key-1", leaf, &[branch_a, branch_b], json!({ "openid_relying_party": {} })),
    );

    responses.insert(
        eid(branch_a).well_known_configuration_url(),
        sign_configuration("key-2", branch_a, &[anchor_a], json!({})),
    );
    responses.insert(
        eid(anchor_a).well_known_configuration_url(),
        sign_configuration(
            "key-3",
            anchor_a,
            &[],
            json!({ "federation_entity": { "federation_fetch_endpoint": format!("{anchor_a}/fetch") } }),
        ),
    );
    responses.insert(format!("{branch_a}/fetch?sub={}", urlenc(leaf)), sign_subordinate("key-2", branch_a, leaf));
    responses.insert(format!("{anchor_a}/fetch?sub={}", urlenc(branch_a)), sign_subordinate("key-3", anchor_a, branch_a));

    responses.insert(
        eid(branch_b).well_known_configuration_url(),
        sign_configuration("key-1", branch_b, &[anchor_b], json!({})),
    );
    responses.insert(
        eid(anchor_b).well_known_configuration_url(),
        sign_configuration(
            "key-2",
            anchor_b,
            &[],
            json!({ "federation_entity": { "federation_fetch_endpoint": format!("{anchor_b}/fetch") } }),
        ),
    );
    responses.insert(format!("{branch_b}/fetch?sub={}", urlenc(leaf)), sign_subordinate("key-1", branch_b, leaf));
    responses.insert(format!("{anchor_b}/fetch?sub={}", urlenc(branch_b)), sign_subordinate("key-2", anchor_b, branch_b));

    MapTransport { responses: Arc::new(responses), calls: Arc::new(AtomicUsize::new(0)) }
}

#[tokio::test]
async fn unconstrained_exploration_finds_both_anchors() {
    let transport = build_transport();
    let fetcher = Fetcher::new(transport, 8, Duration::from_secs(60));
    let config = ResolverConfig::default();

    let outcome = trust_chains(&fetcher, &eid("https://leaf.example"), None, &config).await;

    assert_eq!(outcome.chains.len(), 2, "errors: {:?}", outcome.errors);
    let mut anchors: Vec<String> = outcome.chains.iter().map(|c| c.anchor_id().as_str().to_string()).collect();
    anchors.sort();
    assert_eq!(
        anchors,
        vec!["https://anchor-a.example/".to_string(), "https://anchor-b.example/".to_string()]
    );
}

#[tokio::test]
async fn resolve_against_one_anchor_ignores_the_other_branch() {
    let transport = build_transport();
    let fetcher = Fetcher::new(transport, 8, Duration::from_secs(60));
    let config = ResolverConfig::default();

    let resolved = resolve(
        &fetcher,
        &eid("https://leaf.example"),
        &eid("https://anchor-b.example"),
        &EntityTypeTag::OpenidRelyingParty,
        &config,
    )
    .await
    .unwrap();

    assert_eq!(resolved.chain.len(), 5);
}
