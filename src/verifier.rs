//! # Verifier
//!
//! Validates a compact JWS against a supplied JWKS and clock, and
//! deserializes its payload. Signature and JWK handling are delegated to
//! [`jsonwebtoken`] (the externally supplied JOSE primitive); this module
//! owns only the federation-specific policy wrapped around it: the
//! algorithm allow-list, `kid`-based key selection across a JWK set, and
//! the `iat`/`exp` clock check with skew.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::entity::EntityId;
use crate::error::Error;

/// Algorithms permitted for federation statements: the RS/ES/PS families.
/// `none` and the `HS*` family are never permitted, regardless of what a
/// statement's header claims.
const ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// The same allow-list, as the header's raw `alg` string - `none` and
/// `HS*` never appear here, unlike `jsonwebtoken::Algorithm` (which has no
/// `none` variant at all).
const ALLOWED_ALGORITHM_NAMES: &[&str] =
    &["RS256", "RS384", "RS512", "ES256", "ES384", "PS256", "PS384", "PS512"];

/// Reads the `alg` field out of a compact JWS header without requiring it
/// to be a recognised [`Algorithm`] variant.
fn raw_header_alg(compact: &str) -> Result<String, Error> {
    let header_segment = compact
        .split('.')
        .next()
        .ok_or_else(|| Error::MalformedJws { url: String::new(), reason: "missing header segment".into() })?;
    let bytes = base64_url_decode(header_segment)
        .ok_or_else(|| Error::MalformedJws { url: String::new(), reason: "header is not valid base64url".into() })?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedJws { url: String::new(), reason: format!("header is not valid JSON: {e}") })?;
    value
        .get("alg")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::MalformedJws { url: String::new(), reason: "header has no `alg`".into() })
}

/// Extracts the `iat`/`exp`/`iss`/`sub` fields common to every federation
/// statement, used only to perform the temporal check independently of the
/// caller's target payload type.
#[derive(serde::Deserialize)]
struct TemporalClaims {
    iss: EntityId,
    sub: EntityId,
    iat: i64,
    exp: i64,
}

/// Verifies `compact` (a compact JWS) against `jwks` and returns its
/// decoded payload as `T` once the signature, algorithm, and temporal
/// checks all pass.
///
/// # Errors
///
/// - [`Error::AlgNotAllowed`] if the header's `alg` is not in
///   [`ALLOWED_ALGORITHMS`].
/// - [`Error::KeyNotFound`] if no key in `jwks` matches the header's `kid`
///   (or, absent a `kid`, no key is algorithm-compatible).
/// - [`Error::SignatureInvalid`] if every candidate key fails to verify the
///   signature.
/// - [`Error::StatementNotYetValid`] / [`Error::StatementExpired`] if the
///   temporal check fails.
pub fn verify_jws<T: DeserializeOwned>(
    compact: &str, jwks: &JwkSet, now: DateTime<Utc>, skew: Duration,
) -> Result<T, Error> {
    // Inspect the raw `alg` ourselves before handing the token to
    // `jsonwebtoken`: its `Algorithm` enum has no `none` variant at all, and
    // we want a uniform `AlgNotAllowed` for every disallowed algorithm
    // (`none`, `HS*`, or anything else) rather than a parse error for some
    // and a policy rejection for others.
    let raw_alg = raw_header_alg(compact)?;
    if !ALLOWED_ALGORITHM_NAMES.contains(&raw_alg.as_str()) {
        return Err(Error::AlgNotAllowed { alg: raw_alg });
    }
    let header = decode_header(compact)?;
    debug_assert!(ALLOWED_ALGORITHMS.contains(&header.alg));

    let candidates: Vec<&Jwk> = match &header.kid {
        Some(kid) => jwks.keys.iter().filter(|k| k.common.key_id.as_deref() == Some(kid.as_str())).collect(),
        None => jwks.keys.iter().filter(|k| algorithm_compatible(k, header.alg)).collect(),
    };

    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims.clear();

    let mut saw_candidate = false;
    let mut payload: Option<Value> = None;
    for jwk in &candidates {
        saw_candidate = true;
        let Ok(decoding_key) = DecodingKey::from_jwk(jwk) else { continue };
        if let Ok(token) = decode::<Value>(compact, &decoding_key, &validation) {
            payload = Some(token.claims);
            break;
        }
    }

    let Some(payload) = payload else {
        return Err(if saw_candidate {
            Error::SignatureInvalid { issuer: extract_issuer(compact).unwrap_or_else(placeholder_entity) }
        } else {
            Error::KeyNotFound { issuer: extract_issuer(compact).unwrap_or_else(placeholder_entity) }
        });
    };

    let temporal: TemporalClaims = serde_json::from_value(payload.clone())
        .map_err(|e| Error::Internal(anyhow::anyhow!("statement payload missing iat/exp/iss/sub: {e}")))?;

    let iat = Utc.timestamp_opt(temporal.iat, 0).single().unwrap_or(now);
    let exp = Utc.timestamp_opt(temporal.exp, 0).single().unwrap_or(now);
    let skew = chrono::Duration::from_std(skew).unwrap_or(chrono::Duration::zero());

    if iat > now + skew {
        return Err(Error::StatementNotYetValid { issuer: temporal.iss, subject: temporal.sub, iat });
    }
    if now >= exp {
        return Err(Error::StatementExpired { issuer: temporal.iss, subject: temporal.sub, exp });
    }

    serde_json::from_value(payload)
        .map_err(|e| Error::Internal(anyhow::anyhow!("statement payload did not match expected shape: {e}")))
}

/// Reads a compact JWS's payload without verifying its signature.
///
/// Used only to bootstrap a self-signed entity configuration: the JWKS
/// needed to verify the statement is itself a claim inside the payload, so
/// it must be read before verification can happen.
///
/// # Errors
///
/// Returns [`Error::MalformedJws`] if the payload segment is missing, not
/// valid base64url, or not valid JSON.
pub fn unverified_payload(compact: &str) -> Result<Value, Error> {
    let payload_segment = compact
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::MalformedJws { url: String::new(), reason: "missing payload segment".into() })?;
    let bytes = base64_url_decode(payload_segment)
        .ok_or_else(|| Error::MalformedJws { url: String::new(), reason: "payload is not valid base64url".into() })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedJws { url: String::new(), reason: format!("payload is not valid JSON: {e}") })
}

/// Whether `jwk` is usable with `alg` based on key type - used only as a
/// fallback when the JWS header carries no `kid` and every key in the set
/// must be considered.
fn algorithm_compatible(jwk: &Jwk, alg: Algorithm) -> bool {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => {
            matches!(alg, Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 | Algorithm::PS256 | Algorithm::PS384 | Algorithm::PS512)
        }
        AlgorithmParameters::EllipticCurve(_) => matches!(alg, Algorithm::ES256 | Algorithm::ES384),
        AlgorithmParameters::OctetKeyPair(_) | AlgorithmParameters::OctetKey(_) => false,
    }
}

/// Best-effort extraction of `iss` from a statement's payload without
/// verifying its signature, used only to attach an entity identifier to an
/// error when verification itself has already failed.
fn extract_issuer(compact: &str) -> Option<EntityId> {
    let payload_segment = compact.split('.').nth(1)?;
    let bytes = base64_url_decode(payload_segment)?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    let iss = value.get("iss")?.as_str()?;
    EntityId::parse(iss).ok()
}

fn base64_url_decode(segment: &str) -> Option<Vec<u8>> {
    use base64ct::{Base64UrlUnpadded, Encoding};
    Base64UrlUnpadded::decode_vec(segment).ok()
}

fn placeholder_entity() -> EntityId {
    EntityId::parse("https://unknown.invalid").expect("static URL is valid")
}
