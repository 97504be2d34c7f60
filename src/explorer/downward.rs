//! Downward traversal: breadth-first subtree discovery via
//! `federation_list_endpoint` + `federation_fetch_endpoint`.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::entity::EntityId;
use crate::error::Error;
use crate::fetcher::Fetcher;
use crate::statement::{EntityStatement, EntityTypeTag};
use crate::transport::Transport;

/// One entity discovered during a [`subtree`] walk.
#[derive(Clone, Debug)]
pub struct SubtreeNode {
    /// The entity's identifier.
    pub entity_id: EntityId,
    /// Entity types this entity's self-configuration declares metadata for.
    pub entity_types: Vec<EntityTypeTag>,
    /// The entity's verified self-signed configuration.
    pub self_statement: Arc<EntityStatement>,
}

/// A completed subtree walk: every node reached, and the superior -> child
/// edges traversed to reach them (first arrival only).
#[derive(Clone, Debug, Default)]
pub struct SubtreeSnapshot {
    /// Every entity reached, in breadth-first discovery order.
    pub nodes: Vec<SubtreeNode>,
    /// (superior, child) edges, in the order they were first traversed.
    pub edges: Vec<(EntityId, EntityId)>,
}

/// Breadth-first walk of the subtree rooted at `root`: lists each visited
/// entity's subordinates, fetches and verifies the subordinate statement
/// and the child's own configuration, and records every entity reached. A
/// node reachable via more than one superior is recorded once, on first
/// arrival.
///
/// Returns the discovered nodes and edges plus every error encountered
/// along the way; a failing branch does not abort the rest of the walk.
pub async fn subtree<T>(fetcher: &Fetcher<T>, root: &EntityId) -> (SubtreeSnapshot, Vec<Error>)
where
    T: Transport + Clone + 'static,
{
    let mut errors = Vec::new();

    let root_self = match fetcher.fetch_configuration(root).await {
        Ok(s) => s,
        Err(e) => return (SubtreeSnapshot::default(), vec![e]),
    };

    let mut visited = HashSet::new();
    visited.insert(root.clone());

    let mut queue = VecDeque::new();
    queue.push_back((root.clone(), root_self));

    let mut snapshot = SubtreeSnapshot::default();

    while let Some((entity_id, self_statement)) = queue.pop_front() {
        let entity_types: Vec<EntityTypeTag> = self_statement.declared_entity_types().copied().collect();
        snapshot.nodes.push(SubtreeNode {
            entity_id: entity_id.clone(),
            entity_types,
            self_statement: self_statement.clone(),
        });

        let children = match fetcher.list_subordinates(&entity_id, &self_statement, None).await {
            Ok(children) => children,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        for child in children {
            if !visited.insert(child.clone()) {
                continue;
            }

            if let Err(e) = fetcher.fetch_subordinate(&entity_id, &child, &self_statement).await {
                errors.push(e);
                continue;
            }

            match fetcher.fetch_configuration(&child).await {
                Ok(child_self) => {
                    snapshot.edges.push((entity_id.clone(), child.clone()));
                    queue.push_back((child, child_self));
                }
                Err(e) => errors.push(e),
            }
        }
    }

    (snapshot, errors)
}
