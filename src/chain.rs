//! # Trust Chain
//!
//! A [`TrustChain`] is an ordered, leaf-to-anchor sequence of entity
//! statements, alternating self-signed configurations and the subordinate
//! statements that connect them: `[leaf_self, sub_about_leaf, superior_self,
//! sub_about_superior, …, anchor_self]`. Every statement has already been
//! individually verified (signature, `iat`/`exp`) by whoever fetched it -
//! [`TrustChain::validate`] checks the properties that only hold across the
//! whole chain: issuer/subject linkage between adjacent statements, anchor
//! identity, path-length constraints, and the intersection of every
//! statement's validity window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::entity::EntityId;
use crate::error::Error;
use crate::statement::EntityStatement;

/// A validated leaf-to-anchor trust chain.
#[derive(Clone, Debug)]
pub struct TrustChain {
    statements: Vec<Arc<EntityStatement>>,
}

impl TrustChain {
    /// Validates `statements` as a candidate chain and, on success, wraps
    /// them as a [`TrustChain`].
    ///
    /// `statements` must already be individually signature- and
    /// time-verified (that happens at fetch time, in
    /// [`crate::verifier::verify_jws`]); this only checks cross-statement
    /// invariants.
    ///
    /// # Errors
    ///
    /// - [`Error::IssuerSubjectMismatch`] if adjacent statements do not link.
    /// - [`Error::AnchorNotReached`] if `anchors` is given and the chain's
    ///   top does not terminate at one of them.
    /// - [`Error::PathTooLong`] if a superior's `constraints.max_path_length`
    ///   is exceeded.
    /// - [`Error::StatementExpired`] / [`Error::StatementNotYetValid`] if the
    ///   intersection of every statement's `[iat, exp]` excludes `now`.
    pub fn validate(
        statements: Vec<Arc<EntityStatement>>, anchors: Option<&[EntityId]>, now: DateTime<Utc>,
        skew: Duration,
    ) -> Result<Self, Error> {
        assert!(!statements.is_empty(), "candidate chain must not be empty");

        let leaf = &statements[0];
        assert!(leaf.is_self_signed(), "chain must start with the leaf's self-signed configuration");

        // Interleaved pairs: (self_k, sub_k) at indices (2k, 2k+1), linked to
        // the next self-signed statement at index 2k+2.
        let mut i = 0;
        while i + 1 < statements.len() {
            let this_self = &statements[i];
            let subordinate = &statements[i + 1];
            if subordinate.sub != this_self.sub {
                return Err(Error::IssuerSubjectMismatch {
                    expected_iss: subordinate.iss.clone(),
                    expected_sub: this_self.sub.clone(),
                    got_iss: subordinate.iss.clone(),
                    got_sub: subordinate.sub.clone(),
                });
            }
            if let Some(superior_self) = statements.get(i + 2) {
                if subordinate.iss != superior_self.sub {
                    return Err(Error::IssuerSubjectMismatch {
                        expected_iss: superior_self.sub.clone(),
                        expected_sub: subordinate.sub.clone(),
                        got_iss: subordinate.iss.clone(),
                        got_sub: subordinate.sub.clone(),
                    });
                }
            }
            i += 2;
        }

        let anchor = statements.last().expect("non-empty");
        assert!(anchor.is_self_signed(), "chain must terminate in a self-signed statement");

        if let Some(anchors) = anchors {
            if !anchors.contains(&anchor.sub) {
                return Err(Error::AnchorNotReached { leaf: leaf.sub.clone() });
            }
        }

        let hops = (statements.len() - 1) / 2;
        for (k, statement) in statements.iter().enumerate().step_by(2) {
            let Some(constraints) = &statement.constraints else { continue };
            let Some(max_path_length) = constraints.max_path_length else { continue };
            // superiors strictly between this constrainer and the leaf,
            // not counting the constrainer itself or the leaf.
            let superiors_below = (k / 2).saturating_sub(1);
            if superiors_below as u32 > max_path_length {
                return Err(Error::PathTooLong { max: max_path_length });
            }
        }
        let _ = hops;

        let skew = chrono::Duration::from_std(skew).unwrap_or(chrono::Duration::zero());
        let latest_iat = statements.iter().map(|s| s.iat).max().expect("non-empty");
        let earliest_exp = statements.iter().map(|s| s.exp).min().expect("non-empty");
        if latest_iat > now + skew {
            return Err(Error::StatementNotYetValid { issuer: leaf.iss.clone(), subject: leaf.sub.clone(), iat: latest_iat });
        }
        if now >= earliest_exp {
            return Err(Error::StatementExpired { issuer: leaf.iss.clone(), subject: leaf.sub.clone(), exp: earliest_exp });
        }

        Ok(Self { statements })
    }

    /// The chain's statements, leaf first, anchor last.
    #[must_use]
    pub fn statements(&self) -> &[Arc<EntityStatement>] {
        &self.statements
    }

    /// The leaf's self-signed configuration.
    #[must_use]
    pub fn leaf(&self) -> &EntityStatement {
        &self.statements[0]
    }

    /// The anchor's self-signed configuration.
    #[must_use]
    pub fn anchor(&self) -> &EntityStatement {
        self.statements.last().expect("chain is never empty")
    }

    /// The anchor's entity identifier.
    #[must_use]
    pub fn anchor_id(&self) -> &EntityId {
        &self.anchor().sub
    }

    /// Number of superior hops between the leaf and the anchor.
    #[must_use]
    pub fn hop_count(&self) -> usize {
        (self.statements.len() - 1) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{Constraints, Metadata, MetadataPolicy};

    fn self_signed(id: &str, iat: DateTime<Utc>, exp: DateTime<Utc>) -> Arc<EntityStatement> {
        let eid = EntityId::parse(id).unwrap();
        Arc::new(EntityStatement {
            iss: eid.clone(),
            sub: eid,
            iat,
            exp,
            jwks: None,
            authority_hints: vec![],
            metadata: Metadata::new(),
            metadata_policy: MetadataPolicy::new(),
            trust_marks: vec![],
            constraints: None,
            raw: String::new(),
        })
    }

    fn subordinate(iss: &str, sub: &str, iat: DateTime<Utc>, exp: DateTime<Utc>) -> Arc<EntityStatement> {
        Arc::new(EntityStatement {
            iss: EntityId::parse(iss).unwrap(),
            sub: EntityId::parse(sub).unwrap(),
            iat,
            exp,
            jwks: None,
            authority_hints: vec![],
            metadata: Metadata::new(),
            metadata_policy: MetadataPolicy::new(),
            trust_marks: vec![],
            constraints: None,
            raw: String::new(),
        })
    }

    #[test]
    fn linear_chain_validates() {
        let now = Utc::now();
        let past = now - chrono::Duration::hours(1);
        let future = now + chrono::Duration::hours(1);
        let leaf_self = self_signed("https://leaf.example", past, future);
        let sub_about_leaf = subordinate("https://mid.example", "https://leaf.example", past, future);
        let mid_self = self_signed("https://mid.example", past, future);
        let sub_about_mid = subordinate("https://anchor.example", "https://mid.example", past, future);
        let anchor_self = self_signed("https://anchor.example", past, future);

        let chain = TrustChain::validate(
            vec![leaf_self, sub_about_leaf, mid_self, sub_about_mid, anchor_self],
            None,
            now,
            Duration::from_secs(60),
        )
        .unwrap();
        assert_eq!(chain.hop_count(), 2);
        assert_eq!(chain.anchor_id().as_str(), "https://anchor.example/");
    }

    #[test]
    fn mismatched_linkage_is_rejected() {
        let now = Utc::now();
        let past = now - chrono::Duration::hours(1);
        let future = now + chrono::Duration::hours(1);
        let leaf_self = self_signed("https://leaf.example", past, future);
        let sub_about_other = subordinate("https://anchor.example", "https://someone-else.example", past, future);
        let anchor_self = self_signed("https://anchor.example", past, future);

        let err = TrustChain::validate(vec![leaf_self, sub_about_other, anchor_self], None, now, Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, Error::IssuerSubjectMismatch { .. }));
    }

    #[test]
    fn anchor_filter_rejects_unlisted_anchor() {
        let now = Utc::now();
        let past = now - chrono::Duration::hours(1);
        let future = now + chrono::Duration::hours(1);
        let leaf_self = self_signed("https://leaf.example", past, future);
        let sub_about_leaf = subordinate("https://anchor.example", "https://leaf.example", past, future);
        let anchor_self = self_signed("https://anchor.example", past, future);
        let other = EntityId::parse("https://other-anchor.example").unwrap();

        let err = TrustChain::validate(vec![leaf_self, sub_about_leaf, anchor_self], Some(&[other]), now, Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, Error::AnchorNotReached { .. }));
    }

    #[test]
    fn expired_statement_breaks_temporal_intersection() {
        let now = Utc::now();
        let past = now - chrono::Duration::hours(2);
        let expired = now - chrono::Duration::hours(1);
        let future = now + chrono::Duration::hours(1);
        let leaf_self = self_signed("https://leaf.example", past, future);
        let sub_about_leaf = subordinate("https://anchor.example", "https://leaf.example", past, expired);
        let anchor_self = self_signed("https://anchor.example", past, future);

        let err = TrustChain::validate(vec![leaf_self, sub_about_leaf, anchor_self], None, now, Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, Error::StatementExpired { .. }));
    }

    #[test]
    fn constraint_path_length_exceeded_is_rejected() {
        let now = Utc::now();
        let past = now - chrono::Duration::hours(1);
        let future = now + chrono::Duration::hours(1);
        let leaf_self = self_signed("https://leaf.example", past, future);
        let sub_about_leaf = subordinate("https://mid.example", "https://leaf.example", past, future);
        let mid_self = self_signed("https://mid.example", past, future);
        let sub_about_mid = subordinate("https://anchor.example", "https://mid.example", past, future);
        let mut anchor_self = self_signed("https://anchor.example", past, future);
        Arc::get_mut(&mut anchor_self).unwrap().constraints = Some(Constraints { max_path_length: Some(0), naming_constraints: None });

        let err = TrustChain::validate(
            vec![leaf_self, sub_about_leaf, mid_self, sub_about_mid, anchor_self],
            None,
            now,
            Duration::from_secs(60),
        )
        .unwrap_err();
        assert!(matches!(err, Error::PathTooLong { .. }));
    }
}
