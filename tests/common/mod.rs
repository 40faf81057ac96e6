#![allow(dead_code)]

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use proxy_finder_rs::config::DiscoveryConfig;
use proxy_finder_rs::error::{DiscoveryError, PingParseError};
use proxy_finder_rs::liveness::LivenessProbe;
use proxy_finder_rs::scanner::PortProbe;
use proxy_finder_rs::validator::{HttpOutcome, HttpProber, ProxyValidator};
use reqwest::Url;

/// Reports a fixed loss for every host; optionally fails the first call with a parse error.
pub struct MockPing {
    pub loss: f64,
    pub fail_first: AtomicBool,
    pub calls: AtomicUsize,
}

impl MockPing {
    pub fn alive() -> Self {
        Self::with_loss(0.0)
    }

    pub fn with_loss(loss: f64) -> Self {
        Self {
            loss,
            fail_first: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_once() -> Self {
        let p = Self::alive();
        p.fail_first.store(true, Ordering::SeqCst);
        p
    }
}

#[async_trait]
impl LivenessProbe for MockPing {
    async fn probe(
        &self,
        _addr: Ipv4Addr,
        _per_packet: Duration,
        _overall: Duration,
        _count: u32,
    ) -> Result<f64, PingParseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_first.swap(false, Ordering::SeqCst) {
            return Err(PingParseError::MalformedStatsHeader("--- garbage".into()));
        }
        Ok(self.loss)
    }
}

/// Open only on the listed ports; records every port it was asked about, in order.
pub struct MockPorts {
    pub open: HashSet<u16>,
    pub probed: Mutex<Vec<u16>>,
}

impl MockPorts {
    pub fn open_on(ports: &[u16]) -> Self {
        Self {
            open: ports.iter().copied().collect(),
            probed: Mutex::new(Vec::new()),
        }
    }

    pub fn probed(&self) -> Vec<u16> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PortProbe for MockPorts {
    async fn is_open(&self, _addr: Ipv4Addr, port: u16, _timeout: Duration) -> bool {
        self.probed.lock().unwrap().push(port);
        tokio::task::yield_now().await;
        self.open.contains(&port)
    }
}

/// Answers by target host; ports in `echo_fails_on` get a 502 from the echo endpoint.
pub struct MockHttp {
    pub echo: u16,
    pub google: u16,
    pub cloudflare: u16,
    pub echo_fails_on: HashSet<u16>,
    pub requests: Mutex<Vec<(String, String)>>,
}

impl MockHttp {
    pub fn statuses(echo: u16, google: u16, cloudflare: u16) -> Self {
        Self {
            echo,
            google,
            cloudflare,
            echo_fails_on: HashSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn all_ok() -> Self {
        Self::statuses(200, 200, 200)
    }
}

#[async_trait]
impl HttpProber for MockHttp {
    async fn get_through(
        &self,
        proxy: &Url,
        target: &Url,
        _timeout: Duration,
    ) -> Result<HttpOutcome, DiscoveryError> {
        self.requests
            .lock()
            .unwrap()
            .push((proxy.to_string(), target.to_string()));
        let status = match target.host_str() {
            Some("httpbin.org") => {
                if proxy.port().is_some_and(|p| self.echo_fails_on.contains(&p)) {
                    502
                } else {
                    self.echo
                }
            }
            Some("google.com") => self.google,
            Some("cloudflare.com") => self.cloudflare,
            other => panic!("unexpected target host {other:?}"),
        };
        if status == 0 {
            return Ok(HttpOutcome::Failed("connection reset".into()));
        }
        Ok(HttpOutcome::Status(status))
    }
}

pub fn config() -> DiscoveryConfig {
    DiscoveryConfig {
        seed: Some(1234),
        ..DiscoveryConfig::default()
    }
}

pub fn validator<P: PortProbe, H: HttpProber>(ports: P, http: H) -> ProxyValidator<P, H> {
    ProxyValidator::new(ports, http, &config()).expect("default targets parse")
}
