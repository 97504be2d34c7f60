//! # DOT Export
//!
//! Pure rendering of trust chains and subtree snapshots to Graphviz DOT.
//! Kept independent of the fetcher and transport layers - these functions
//! only read already-built [`TrustChain`]s and
//! [`crate::explorer::SubtreeSnapshot`]s, matching §6's description of
//! export as a pure function from chains/subtree to a string.

use std::fmt::Write as _;

use crate::chain::TrustChain;
use crate::explorer::SubtreeSnapshot;

/// Renders a set of upward trust chains as a DOT digraph: one dashed
/// leaf -> superior edge per adjacent self-signed pair in each chain.
#[must_use]
pub fn chains_to_dot(chains: &[TrustChain]) -> String {
    let mut out = String::from("digraph trust_chains {\n");
    for chain in chains {
        let selves: Vec<_> = chain.statements().iter().step_by(2).collect();
        for pair in selves.windows(2) {
            let _ = writeln!(out, "  \"{}\" -> \"{}\" [style=dashed];", pair[0].sub, pair[1].sub);
        }
    }
    out.push_str("}\n");
    out
}

/// Renders a subtree snapshot as a DOT digraph: solid superior -> child
/// edges, nodes labelled with their entity identifier and declared entity
/// types.
#[must_use]
pub fn subtree_to_dot(snapshot: &SubtreeSnapshot) -> String {
    let mut out = String::from("digraph subtree {\n");
    for node in &snapshot.nodes {
        let types = node.entity_types.iter().map(|t| format!("{t:?}")).collect::<Vec<_>>().join(",");
        let _ = writeln!(out, "  \"{}\" [label=\"{}\\n{}\"];", node.entity_id, node.entity_id, types);
    }
    for (superior, child) in &snapshot.edges {
        let _ = writeln!(out, "  \"{superior}\" -> \"{child}\";");
    }
    out.push_str("}\n");
    out
}
