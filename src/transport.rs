//! # HTTP Transport
//!
//! The [`Transport`] trait isolates the fetcher from any particular HTTP
//! client, so tests can swap in an in-memory double (see
//! `tests/common/mod.rs`) and exercise the explorer, chain validator, and
//! policy engine without touching the network. [`ReqwestTransport`] is the
//! production implementation, built on a pooled [`reqwest::Client`].

use std::time::Duration;

use crate::error::{Error, NetworkKind};

/// A minimal HTTP GET abstraction: fetch a URL, get back a status code and
/// body. Response media type is not inspected here - callers (the fetcher)
/// know whether they expect a compact JWS or a JSON array and validate
/// accordingly.
pub trait Transport: Send + Sync {
    /// Performs a `GET` request against `url`, returning the response body
    /// on a `200 OK` status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] for transport-level failures and
    /// [`Error::UnexpectedStatus`] for any non-`200` response.
    fn get(&self, url: &str) -> impl Future<Output = Result<String, Error>> + Send;
}

/// The default [`Transport`], backed by a pooled `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with the given per-request timeout and TLS
    /// verification setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying TLS backend could not be
    /// initialised.
    pub fn new(timeout: Duration, verify_tls: bool) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<String, Error> {
        let response = self.client.get(url).send().await.map_err(|source| Error::Network {
            url: url.to_string(),
            kind: classify(&source),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus { url: url.to_string(), status: status.as_u16() });
        }

        response.text().await.map_err(|source| Error::Network {
            url: url.to_string(),
            kind: classify(&source),
            source,
        })
    }
}

fn classify(error: &reqwest::Error) -> NetworkKind {
    if error.is_timeout() {
        NetworkKind::Timeout
    } else if error.is_connect() {
        NetworkKind::Connect
    } else {
        NetworkKind::Other
    }
}
