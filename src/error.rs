//! # Error Taxonomy
//!
//! A single [`Error`] enum covers every failure this crate can produce,
//! grouped below by the taxonomy the rest of the crate's documentation
//! refers to (Network, Protocol, Cryptographic, Temporal, Linkage, Policy,
//! Configuration). Variant names, not the grouping, are what callers match
//! on.

use thiserror::Error as ThisError;

use crate::entity::EntityId;

/// The kind of network failure that occurred while fetching a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    /// DNS resolution failed.
    Dns,
    /// The TCP/TLS connection could not be established.
    Connect,
    /// The TLS handshake failed (certificate validation, protocol mismatch).
    Tls,
    /// The request exceeded its configured timeout.
    Timeout,
    /// Any other transport-level failure.
    Other,
}

/// Errors produced by this crate.
#[derive(Debug, ThisError)]
pub enum Error {
    // --- Network -------------------------------------------------------
    /// A network-level failure occurred while contacting `url`.
    #[error("network error ({kind:?}) contacting {url}: {source}")]
    Network { url: String, kind: NetworkKind, #[source] source: reqwest::Error },

    // --- Protocol --------------------------------------------------------
    /// The peer responded with a non-success HTTP status.
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// The response body was not a well-formed compact JWS.
    #[error("malformed JWS from {url}: {reason}")]
    MalformedJws { url: String, reason: String },

    /// The response body was not a JSON array of entity identifiers.
    #[error("malformed entity list from {url}: {reason}")]
    MalformedList { url: String, reason: String },

    // --- Cryptographic ---------------------------------------------------
    /// No candidate key in the supplied JWKS produced a valid signature.
    #[error("signature invalid for statement issued by {issuer}")]
    SignatureInvalid { issuer: EntityId },

    /// The JWS header named a `kid` that is not present in the JWKS, or no
    /// compatible key could be found.
    #[error("no matching key found for statement issued by {issuer}")]
    KeyNotFound { issuer: EntityId },

    /// The JWS header's `alg` is not on the federation allow-list.
    #[error("algorithm {alg} is not permitted for federation statements")]
    AlgNotAllowed { alg: String },

    // --- Temporal ----------------------------------------------------------
    /// The statement's `exp` has already passed.
    #[error("statement from {issuer} about {subject} expired at {exp}")]
    StatementExpired { issuer: EntityId, subject: EntityId, exp: chrono::DateTime<chrono::Utc> },

    /// The statement's `iat` is in the future (beyond the configured skew).
    #[error("statement from {issuer} about {subject} is not yet valid (iat {iat})")]
    StatementNotYetValid { issuer: EntityId, subject: EntityId, iat: chrono::DateTime<chrono::Utc> },

    // --- Linkage -----------------------------------------------------------
    /// A subordinate statement's `iss`/`sub` did not match the expected pair.
    #[error("issuer/subject mismatch: expected iss={expected_iss} sub={expected_sub}, got iss={got_iss} sub={got_sub}")]
    IssuerSubjectMismatch {
        expected_iss: EntityId,
        expected_sub: EntityId,
        got_iss: EntityId,
        got_sub: EntityId,
    },

    /// An entity's self-signed configuration names no authority hints, so
    /// upward traversal cannot continue past it.
    #[error("{entity} has no authority_hints to traverse")]
    NoAuthorityHint { entity: EntityId },

    /// Upward traversal from the leaf never reached a configured trust
    /// anchor within the depth bound.
    #[error("no trust chain from {leaf} reached a configured trust anchor")]
    AnchorNotReached { leaf: EntityId },

    /// A candidate chain exceeded the configured or constraint-imposed
    /// maximum path length.
    #[error("path length exceeds maximum of {max} superior hops")]
    PathTooLong { max: u32 },

    /// Upward traversal revisited an entity already on the current path.
    #[error("cycle detected at {entity}")]
    CycleDetected { entity: EntityId },

    // --- Policy --------------------------------------------------------
    /// Two statements in a chain specify incompatible operators for the
    /// same claim.
    #[error("policy conflict composing claim {claim}: {reason}")]
    PolicyConflict { claim: String, reason: String },

    /// Applying the composed policy to a leaf's metadata failed a
    /// constraint (`one_of`, `subset_of`, `superset_of`).
    #[error("policy violation on claim {claim}: {reason}")]
    PolicyViolation { claim: String, reason: String },

    /// A claim marked `essential` is absent after policy application.
    #[error("essential claim {claim} is missing after policy application")]
    EssentialClaimMissing { claim: String },

    /// The metadata policy named an operator outside the closed federation
    /// set.
    #[error("unknown policy operator: {operator}")]
    UnknownOperator { operator: String },

    // --- Configuration ---------------------------------------------------
    /// `value` could not be parsed as an absolute `https` entity identifier.
    #[error("invalid entity identifier '{value}': {reason}")]
    InvalidEntityId { value: String, reason: String },

    /// An operation that requires a trust anchor was called without one
    /// configured.
    #[error("no trust anchor configured")]
    NoTrustAnchorConfigured,

    // --- Cross-cutting ---------------------------------------------------
    /// The operation's deadline elapsed or its cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// A wrapped error from internal orchestration code that does not (yet)
    /// have a dedicated variant. Kept narrow deliberately - new call sites
    /// should add a concrete variant rather than growing this one.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Internal(anyhow::anyhow!("JOSE error: {e}"))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
