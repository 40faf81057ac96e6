use std::time::Duration;

use crate::ports;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";
pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";

/// Endpoints requested through a candidate proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTargets {
    /// Must answer 200 through the proxy for it to count at all.
    pub echo_url: String,
    pub google_url: String,
    pub cloudflare_url: String,
}

impl Default for ValidationTargets {
    fn default() -> Self {
        Self {
            echo_url: "https://httpbin.org/get".into(),
            google_url: "https://google.com".into(),
            cloudflare_url: "https://cloudflare.com/".into(),
        }
    }
}

/// ICMP probe parameters handed to the liveness collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingSettings {
    pub per_packet_timeout: Duration,
    pub overall_timeout: Duration,
    pub count: u32,
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            per_packet_timeout: Duration::from_secs(2),
            overall_timeout: Duration::from_secs(5),
            count: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub ping: PingSettings,
    pub port_timeout: Duration,
    pub echo_timeout: Duration,
    pub bypass_timeout: Duration,
    pub targets: ValidationTargets,
    pub user_agent: String,
    pub accept: String,
    /// Tried first, in this order, on every live host.
    pub well_known_ports: Vec<u16>,
    /// Upper bound on workers running at the same time.
    pub concurrency: usize,
    /// Sampled addresses a worker may burn through before giving up. `None` is unbounded.
    pub max_attempts: Option<u64>,
    /// Base seed; worker `i` seeds its generator with `seed + i`.
    pub seed: Option<u64>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ping: PingSettings::default(),
            port_timeout: Duration::from_secs(5),
            echo_timeout: Duration::from_secs(10),
            bypass_timeout: Duration::from_secs(5),
            targets: ValidationTargets::default(),
            user_agent: USER_AGENT.into(),
            accept: ACCEPT.into(),
            well_known_ports: ports::well_known_ports(),
            concurrency: 64,
            max_attempts: None,
            seed: None,
        }
    }
}
