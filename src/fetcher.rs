//! # Fetcher
//!
//! Retrieves and verifies entity statements over [`Transport`], coalescing
//! concurrent requests for the same (issuer, subject) pair and bounding the
//! number of requests in flight. Statements are cached for the lifetime of
//! the [`Fetcher`], keyed by (issuer, subject); entries are considered
//! fresh until the statement's own `exp`.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::Shared;
use futures::FutureExt;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, instrument};

use crate::entity::EntityId;
use crate::error::Error;
use crate::statement::EntityStatement;
use crate::transport::Transport;
use crate::verifier::{unverified_payload, verify_jws};

type PendingFetch = Pin<Box<dyn Future<Output = Result<Arc<EntityStatement>, Arc<Error>>> + Send>>;
type SharedFetch = Shared<PendingFetch>;

/// Retrieves entity statements and subordinate listings, caching and
/// single-flighting requests by (issuer, subject).
pub struct Fetcher<T: Transport> {
    transport: T,
    clock_skew: Duration,
    semaphore: Arc<Semaphore>,
    cache: Mutex<HashMap<(EntityId, EntityId), Arc<EntityStatement>>>,
    inflight: Mutex<HashMap<(EntityId, EntityId), SharedFetch>>,
}

impl<T: Transport + Clone + 'static> Fetcher<T> {
    /// Builds a fetcher over `transport`, bounding concurrent requests to
    /// `max_concurrency` and allowing `clock_skew` on every statement's
    /// `iat`.
    #[must_use]
    pub fn new(transport: T, max_concurrency: usize, clock_skew: Duration) -> Self {
        Self {
            transport,
            clock_skew,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            cache: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches and verifies `entity_id`'s self-signed entity configuration
    /// from its `.well-known/openid-federation` document. The JWKS used to
    /// verify the signature is the one embedded in the payload itself - the
    /// standard self-signed bootstrap.
    ///
    /// # Errors
    ///
    /// [`Error::Network`] / [`Error::UnexpectedStatus`] on transport
    /// failure; [`Error::MalformedJws`] if the body is not a compact JWS
    /// with a JWKS; any verification error from [`verify_jws`]; or
    /// [`Error::IssuerSubjectMismatch`] if `iss != sub != entity_id`.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_configuration(&self, entity_id: &EntityId) -> Result<Arc<EntityStatement>, Error> {
        let url = entity_id.well_known_configuration_url();
        let entity_id = entity_id.clone();
        let skew = self.clock_skew;
        self.fetch((entity_id.clone(), entity_id.clone()), url, move |body| {
            verify_self_signed(&body, &entity_id, skew)
        })
        .await
    }

    /// Fetches and verifies the subordinate statement `issuer_id` has issued
    /// about `subject_id`, via `issuer_id`'s `federation_fetch_endpoint`
    /// (read from `issuer_config`, already verified) and signed with
    /// `issuer_config`'s JWKS.
    ///
    /// # Errors
    ///
    /// Same as [`Fetcher::fetch_configuration`].
    #[instrument(level = "debug", skip(self, issuer_config))]
    pub async fn fetch_subordinate(
        &self, issuer_id: &EntityId, subject_id: &EntityId, issuer_config: &EntityStatement,
    ) -> Result<Arc<EntityStatement>, Error> {
        let fem = issuer_config.federation_entity_metadata();
        let Some(endpoint) = fem.federation_fetch_endpoint else {
            return Err(Error::MalformedJws {
                url: issuer_id.well_known_configuration_url(),
                reason: "issuer advertises no federation_fetch_endpoint".to_string(),
            });
        };
        let url = format!("{endpoint}?sub={}", urlencode(subject_id.as_str()));
        let issuer_jwks = issuer_config.jwks.clone().unwrap_or(JwkSet { keys: vec![] });
        let issuer_id = issuer_id.clone();
        let subject_id = subject_id.clone();
        let skew = self.clock_skew;
        self.fetch((issuer_id.clone(), subject_id.clone()), url, move |body| {
            verify_subordinate(&body, &issuer_id, &subject_id, &issuer_jwks, skew)
        })
        .await
    }

    /// Lists `entity_id`'s subordinates, optionally filtered by entity type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedList`] if the response body is not a JSON
    /// array of entity identifiers, or a transport error.
    #[instrument(level = "debug", skip(self, entity_config))]
    pub async fn list_subordinates(
        &self, entity_id: &EntityId, entity_config: &EntityStatement, entity_type: Option<&str>,
    ) -> Result<Vec<EntityId>, Error> {
        let fem = entity_config.federation_entity_metadata();
        let Some(endpoint) = fem.federation_list_endpoint else {
            debug!(%entity_id, "entity advertises no federation_list_endpoint");
            return Ok(Vec::new());
        };
        let url = match entity_type {
            Some(t) => format!("{endpoint}?entity_type={t}"),
            None => endpoint,
        };

        let _permit = self.semaphore.acquire().await.expect("semaphore is never closed");
        let body = self.transport.get(&url).await?;
        let values: Vec<String> = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedList { url: url.clone(), reason: e.to_string() })?;
        let mut ids = values
            .into_iter()
            .map(|v| {
                EntityId::parse(&v).map_err(|_| Error::MalformedList {
                    url: url.clone(),
                    reason: format!("'{v}' is not a valid entity identifier"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        ids.sort();
        Ok(ids)
    }

    /// Shared cache/single-flight wrapper: at most one in-flight request per
    /// (issuer, subject) key; `verify` turns the fetched body into a
    /// verified statement once the response has been retrieved.
    async fn fetch(
        &self, key: (EntityId, EntityId), url: String,
        verify: impl FnOnce(String) -> Result<EntityStatement, Error> + Send + 'static,
    ) -> Result<Arc<EntityStatement>, Error> {
        if let Some(cached) = self.cache.lock().await.get(&key) {
            if cached.exp > Utc::now() {
                debug!(iss = %key.0, sub = %key.1, "fetch cache hit");
                return Ok(cached.clone());
            }
        }

        let shared = {
            let mut inflight = self.inflight.lock().await;
            if let Some(existing) = inflight.get(&key) {
                existing.clone()
            } else {
                let transport = self.transport.clone();
                let semaphore = self.semaphore.clone();
                let pending: PendingFetch = Box::pin(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                    let body = transport.get(&url).await.map_err(Arc::new)?;
                    verify(body).map(Arc::new).map_err(Arc::new)
                });
                let shared = pending.shared();
                inflight.insert(key.clone(), shared.clone());
                shared
            }
        };

        let result = shared.await;
        self.inflight.lock().await.remove(&key);

        match result {
            Ok(statement) => {
                self.cache.lock().await.insert(key, statement.clone());
                Ok(statement)
            }
            Err(shared_err) => Err(Arc::try_unwrap(shared_err).unwrap_or_else(|e| Error::Internal(anyhow::anyhow!("{e}")))),
        }
    }
}

fn verify_self_signed(body: &str, entity_id: &EntityId, skew: Duration) -> Result<EntityStatement, Error> {
    let payload = unverified_payload(body)?;
    let jwks: JwkSet = payload
        .get("jwks")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| Error::MalformedJws { url: entity_id.well_known_configuration_url(), reason: e.to_string() })?
        .ok_or_else(|| Error::MalformedJws {
            url: entity_id.well_known_configuration_url(),
            reason: "self-signed configuration carries no jwks".to_string(),
        })?;

    let mut statement: EntityStatement = verify_jws(body, &jwks, Utc::now(), skew)?;
    statement.raw = body.to_string();

    if statement.iss != *entity_id || statement.sub != *entity_id {
        return Err(Error::IssuerSubjectMismatch {
            expected_iss: entity_id.clone(),
            expected_sub: entity_id.clone(),
            got_iss: statement.iss,
            got_sub: statement.sub,
        });
    }
    Ok(statement)
}

fn verify_subordinate(
    body: &str, issuer_id: &EntityId, subject_id: &EntityId, issuer_jwks: &JwkSet, skew: Duration,
) -> Result<EntityStatement, Error> {
    let mut statement: EntityStatement = verify_jws(body, issuer_jwks, Utc::now(), skew)?;
    statement.raw = body.to_string();

    if statement.iss != *issuer_id || statement.sub != *subject_id {
        return Err(Error::IssuerSubjectMismatch {
            expected_iss: issuer_id.clone(),
            expected_sub: subject_id.clone(),
            got_iss: statement.iss,
            got_sub: statement.sub,
        });
    }
    Ok(statement)
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::test_support::sign_es256;

    #[derive(Clone, Default)]
    struct MockTransport {
        responses: Arc<StdHashMap<String, String>>,
        calls: Arc<AtomicUsize>,
    }

    impl Transport for MockTransport {
        async fn get(&self, url: &str) -> Result<String, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| Error::UnexpectedStatus { url: url.to_string(), status: 404 })
        }
    }

    fn leaf_configuration(jwk: &jsonwebtoken::jwk::Jwk) -> (String, String) {
        let now = Utc::now();
        let claims = json!({
            "iss": "https://leaf.example",
            "sub": "https://leaf.example",
            "iat": (now - chrono::Duration::seconds(10)).timestamp(),
            "exp": (now + chrono::Duration::hours(1)).timestamp(),
            "jwks": { "keys": [jwk] },
        });
        let (compact, _) = sign_es256("key-1", &claims);
        (EntityId::parse("https://leaf.example").unwrap().well_known_configuration_url(), compact)
    }

    #[tokio::test]
    async fn fetch_configuration_verifies_against_embedded_jwks() {
        let jwk = crate::test_support::ec_jwk("key-1");
        let (url, compact) = leaf_configuration(&jwk);
        let mut responses = StdHashMap::new();
        responses.insert(url, compact);
        let transport = MockTransport { responses: Arc::new(responses), calls: Arc::new(AtomicUsize::new(0)) };
        let fetcher = Fetcher::new(transport, 4, Duration::from_secs(60));

        let leaf = EntityId::parse("https://leaf.example").unwrap();
        let statement = fetcher.fetch_configuration(&leaf).await.unwrap();
        assert_eq!(statement.iss, leaf);
    }

    #[tokio::test]
    async fn concurrent_fetches_for_same_key_coalesce_to_one_request() {
        let jwk = crate::test_support::ec_jwk("key-1");
        let (url, compact) = leaf_configuration(&jwk);
        let mut responses = StdHashMap::new();
        responses.insert(url, compact);
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = MockTransport { responses: Arc::new(responses), calls: calls.clone() };
        let fetcher = Arc::new(Fetcher::new(transport, 4, Duration::from_secs(60)));

        let leaf = EntityId::parse("https://leaf.example").unwrap();
        let (a, b) = tokio::join!(fetcher.fetch_configuration(&leaf), fetcher.fetch_configuration(&leaf));
        a.unwrap();
        b.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
