//! # Graph Explorer
//!
//! Traverses the federation graph induced by `authority_hints` (upward, for
//! chain discovery) and by `federation_list_endpoint` (downward, for
//! subtree discovery), both built on [`crate::fetcher::Fetcher`].

pub mod downward;
pub mod upward;

pub use downward::{subtree, SubtreeNode, SubtreeSnapshot};
pub use upward::{trust_chains, ExplorationOutcome};
