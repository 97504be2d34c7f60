//! A library for exploring and evaluating [OpenID Connect Federation]
//! trust structures.
//!
//! Given one or more entity identifiers (URLs) in a federation, this crate
//! discovers the federation topology rooted in or reachable from that
//! entity, constructs every valid trust chain to one or more trust anchors,
//! verifies each chain's cryptographic and temporal integrity, and composes
//! the per-entity metadata that results from applying federation metadata
//! policies along a chain.
//!
//! # Scope
//!
//! This crate is the trust-chain builder and metadata resolver: graph
//! exploration over signed entity statements, chain validation, and policy
//! composition. It does not implement a federation endpoint, a CLI, or a
//! REST surface - those are expected to be thin wrappers around the
//! [`resolver`] and [`discovery`] entry points.
//!
//! [OpenID Connect Federation]: https://openid.net/specs/openid-federation-1_0.html

pub mod chain;
pub mod config;
pub mod discovery;
pub mod dot;
pub mod entity;
pub mod error;
pub mod explorer;
pub mod fetcher;
pub mod policy;
pub mod resolver;
pub mod statement;
#[cfg(test)]
mod test_support;
pub mod transport;
pub mod trust_mark;
pub mod verifier;

pub use crate::chain::TrustChain;
pub use crate::config::ResolverConfig;
pub use crate::discovery::discovery;
pub use crate::dot::{chains_to_dot, subtree_to_dot};
pub use crate::entity::EntityId;
pub use crate::error::Error;
pub use crate::explorer::{subtree, trust_chains, ExplorationOutcome, SubtreeNode, SubtreeSnapshot};
pub use crate::fetcher::Fetcher;
pub use crate::policy::resolve_metadata;
pub use crate::resolver::{resolve, ResolvedEntity};
pub use crate::statement::{EntityStatement, EntityTypeTag};
pub use crate::trust_mark::{filter_trust_marks, TrustMarkIssue};
