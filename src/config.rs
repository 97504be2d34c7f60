//! # Resolver Configuration
//!
//! A single value type carrying every tunable named in the component design:
//! traversal depth, timeouts, concurrency, clock skew, and TLS enforcement.
//! Callers (the CLI and REST surfaces live outside this crate) construct one
//! of these and pass it through; this crate never reads environment
//! variables or configuration files itself.

use std::time::Duration;

/// Tunables shared by the fetcher, explorer, and resolver.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Maximum number of superior-hops explored when building a trust
    /// chain. Defaults to 10.
    pub max_depth: u32,

    /// Per-HTTP-request timeout. Defaults to 10 seconds.
    pub http_timeout: Duration,

    /// Overall timeout for a single public operation (a `trustchains`,
    /// `resolve`, `subtree`, or `discovery` call). Defaults to 60 seconds.
    pub operation_timeout: Duration,

    /// Maximum number of in-flight HTTP requests across the whole
    /// operation. Defaults to 32.
    pub max_concurrency: usize,

    /// Allowed clock skew when checking a statement's `iat` against `now`.
    /// Defaults to 60 seconds.
    pub clock_skew: Duration,

    /// Whether to verify TLS certificates on outbound requests. Defaults to
    /// `true`; disabling this is equivalent to the CLI's `--insecure` flag.
    pub verify_tls: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            http_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(60),
            max_concurrency: 32,
            clock_skew: Duration::from_secs(60),
            verify_tls: true,
        }
    }
}
