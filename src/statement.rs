//! # Entity Statements
//!
//! The parsed, verified shape of a federation entity statement - the
//! payload of a compact JWS fetched from a `.well-known/openid-federation`
//! document or a superior's `fetch` endpoint. See [`crate::verifier`] for
//! how a raw JWS becomes one of these.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::EntityId;
use crate::policy::ClaimPolicy;

/// The entity-type tags a federation statement's metadata and metadata
/// policy can be keyed by.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityTypeTag {
    /// An OpenID Provider.
    OpenidProvider,
    /// An OpenID Relying Party.
    OpenidRelyingParty,
    /// A federation entity (the `federation_entity` metadata block carried
    /// by every participant, e.g. fetch/list endpoints).
    FederationEntity,
    /// An OAuth 2.0 authorization server.
    OauthAuthorizationServer,
    /// An OAuth 2.0 protected resource.
    OauthResource,
}

/// Metadata for one entity type: a bag of claims whose shape is defined by
/// the relevant OpenID/OAuth specification, not by this crate.
pub type EntityTypeMetadata = Map<String, Value>;

/// `metadata`: per entity-type claim bags.
pub type Metadata = HashMap<EntityTypeTag, EntityTypeMetadata>;

/// `metadata_policy`: per entity-type, per-claim policy operators.
pub type MetadataPolicy = HashMap<EntityTypeTag, HashMap<String, ClaimPolicy>>;

/// A naming constraint on subordinate entity identifiers.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamingConstraints {
    /// Name prefixes a subordinate's identifier must match at least one of.
    #[serde(default)]
    pub permitted: Vec<String>,
    /// Name prefixes a subordinate's identifier must not match any of.
    #[serde(default)]
    pub excluded: Vec<String>,
}

/// `constraints`: limits a superior places on the subtree below it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    /// Maximum number of superiors, not counting the constraining entity
    /// itself, permitted between it and a leaf.
    #[serde(default, rename = "max_path_length")]
    pub max_path_length: Option<u32>,
    /// Naming constraints on subordinate identifiers.
    #[serde(default)]
    pub naming_constraints: Option<NamingConstraints>,
}

/// An entry in a statement's `trust_marks` array: a signed JWT, opaque here
/// except for the `id` of the mark it asserts (read from the JWT payload
/// without requiring full verification, since trust mark verification
/// beyond extraction and reporting is out of scope for this crate).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustMarkClaim {
    /// The trust mark identifier.
    pub id: String,
    /// The compact JWT asserting the mark.
    pub trust_mark: String,
}

/// Federation entity metadata relevant to fetching and trust-mark
/// filtering (a view onto the `federation_entity` metadata block).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FederationEntityMetadata {
    /// The endpoint a superior exposes for fetching subordinate statements.
    pub federation_fetch_endpoint: Option<String>,
    /// The endpoint a superior exposes for listing subordinates.
    pub federation_list_endpoint: Option<String>,
    /// The endpoint an entity exposes for federation-wide metadata
    /// resolution (not used by this crate, carried for completeness).
    pub federation_resolve_endpoint: Option<String>,
    /// Trust mark issuers this entity vouches for, keyed by mark id.
    #[serde(default)]
    pub trust_mark_issuers: HashMap<String, Vec<EntityId>>,
    /// Trust anchors this entity (typically a relying party) is configured
    /// to use, consulted by [`crate::discovery`] when no anchor is given
    /// explicitly.
    #[serde(default)]
    pub trust_anchors: Vec<EntityId>,
}

/// Whether a statement is an entity's assertion about itself, or a
/// superior's assertion about a subordinate.
///
/// Modelled as an explicit tag (rather than inferring `iss == sub` at every
/// call site) so the verifier can dispatch the two materially different
/// signature-bootstrapping paths on it: a self-signed statement supplies
/// its own verification keys, a subordinate statement is verified against
/// keys the caller already holds for the issuing superior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementOrigin {
    /// `iss == sub`: the subject's own entity configuration.
    SelfSigned,
    /// `iss != sub`: a superior's statement about a subordinate.
    Subordinate,
}

/// A parsed and signature/time-verified federation entity statement.
///
/// Immutable once constructed - verification happens once, in
/// [`crate::verifier::verify_statement`], and the result is never mutated
/// afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EntityStatement {
    /// The issuer of this statement.
    pub iss: EntityId,
    /// The subject this statement is about.
    pub sub: EntityId,
    /// When the statement was issued.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,
    /// When the statement expires.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
    /// The subject's federation signing keys. Required when `iss == sub`;
    /// may be absent on a subordinate statement.
    #[serde(default)]
    pub jwks: Option<JwkSet>,
    /// Superiors that may issue statements about this subject. Only
    /// meaningful when `iss == sub`.
    #[serde(default)]
    pub authority_hints: Vec<EntityId>,
    /// Per entity-type self-asserted (or, for a subordinate statement,
    /// superior-observed) metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Per entity-type metadata policy this statement's issuer imposes on
    /// the subject.
    #[serde(default)]
    pub metadata_policy: MetadataPolicy,
    /// Trust marks the subject has collected.
    #[serde(default)]
    pub trust_marks: Vec<TrustMarkClaim>,
    /// Constraints the issuer places on the subtree below the subject.
    #[serde(default)]
    pub constraints: Option<Constraints>,
    /// The original compact JWS this statement was parsed from, kept for
    /// display, export, and re-verification.
    #[serde(skip)]
    pub raw: String,
}

impl EntityStatement {
    /// Returns whether this is a self-signed entity configuration or a
    /// subordinate statement.
    #[must_use]
    pub fn origin(&self) -> StatementOrigin {
        if self.iss == self.sub { StatementOrigin::SelfSigned } else { StatementOrigin::Subordinate }
    }

    /// Convenience: `origin() == SelfSigned`.
    #[must_use]
    pub fn is_self_signed(&self) -> bool {
        matches!(self.origin(), StatementOrigin::SelfSigned)
    }

    /// Parses this statement's `federation_entity` metadata block, if
    /// present. Missing or malformed blocks are treated as empty rather
    /// than an error - not every entity exposes fetch/list endpoints.
    #[must_use]
    pub fn federation_entity_metadata(&self) -> FederationEntityMetadata {
        self.metadata
            .get(&EntityTypeTag::FederationEntity)
            .and_then(|m| serde_json::from_value(Value::Object(m.clone())).ok())
            .unwrap_or_default()
    }

    /// The entity types this statement's self-configuration declares
    /// metadata for.
    #[must_use]
    pub fn declared_entity_types(&self) -> impl Iterator<Item = &EntityTypeTag> {
        self.metadata.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(iss: &str, sub: &str) -> EntityStatement {
        EntityStatement {
            iss: EntityId::parse(iss).unwrap(),
            sub: EntityId::parse(sub).unwrap(),
            iat: Utc::now(),
            exp: Utc::now(),
            jwks: None,
            authority_hints: vec![],
            metadata: Metadata::new(),
            metadata_policy: MetadataPolicy::new(),
            trust_marks: vec![],
            constraints: None,
            raw: String::new(),
        }
    }

    #[test]
    fn self_signed_detected_by_iss_eq_sub() {
        let s = sample("https://leaf.example", "https://leaf.example");
        assert_eq!(s.origin(), StatementOrigin::SelfSigned);
        assert!(s.is_self_signed());
    }

    #[test]
    fn subordinate_detected_by_iss_ne_sub() {
        let s = sample("https://superior.example", "https://leaf.example");
        assert_eq!(s.origin(), StatementOrigin::Subordinate);
        assert!(!s.is_self_signed());
    }

    #[test]
    fn missing_federation_entity_metadata_is_empty_not_error() {
        let s = sample("https://leaf.example", "https://leaf.example");
        let fem = s.federation_entity_metadata();
        assert!(fem.federation_fetch_endpoint.is_none());
        assert!(fem.trust_mark_issuers.is_empty());
    }
}
