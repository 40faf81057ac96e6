//! Error types for the discovery pipeline.
//!
//! Only fatal conditions live here. Soft rejections (closed port, packet loss,
//! a proxy that answers with something other than 200) are plain `None`/`false`
//! results and never surface as errors.

use thiserror::Error;

/// Structural failure while reading `ping` output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PingParseError {
    #[error("ping produced no output")]
    Empty,

    #[error("ping header does not match target: {0}")]
    HeaderMismatch(String),

    #[error("unrecognized ping output line: {0}")]
    UnrecognizedLine(String),

    #[error("malformed ping statistics header: {0}")]
    MalformedStatsHeader(String),

    #[error("malformed ping statistics line 1: {0}")]
    MalformedStatsLine1(String),

    #[error("malformed ping statistics line 2: {0}")]
    MalformedStatsLine2(String),
}

/// A fatal error that stops one discovery worker.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid proxy url {url}: {source}")]
    InvalidProxyUrl {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to build proxied http client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("liveness probe output could not be parsed: {0}")]
    LivenessParse(#[from] PingParseError),

    #[error("gave up after {0} sampled addresses")]
    AttemptsExhausted(u64),

    #[error("discovery cancelled")]
    Cancelled,
}
