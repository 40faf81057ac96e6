use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Url;
use tracing::{debug, info};

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::scanner::PortProbe;
use crate::types::{ProxyRecord, ProxyType};

/// What came back from one request routed through a candidate proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome {
    Status(u16),
    Failed(String),
}

impl HttpOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, HttpOutcome::Status(200))
    }
}

/// Outbound HTTP collaborator able to route a GET through an arbitrary forward proxy.
///
/// Transport problems are reported as [`HttpOutcome::Failed`]; `Err` is
/// reserved for being unable to set up the proxied client at all.
#[async_trait]
pub trait HttpProber: Send + Sync {
    async fn get_through(
        &self,
        proxy: &Url,
        target: &Url,
        timeout: Duration,
    ) -> Result<HttpOutcome, DiscoveryError>;
}

#[async_trait]
impl<T: HttpProber + ?Sized> HttpProber for Arc<T> {
    async fn get_through(
        &self,
        proxy: &Url,
        target: &Url,
        timeout: Duration,
    ) -> Result<HttpOutcome, DiscoveryError> {
        (**self).get_through(proxy, target, timeout).await
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestProber {
    user_agent: String,
    accept: String,
}

impl ReqwestProber {
    pub fn new(user_agent: impl Into<String>, accept: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            accept: accept.into(),
        }
    }

    pub fn from_config(cfg: &DiscoveryConfig) -> Self {
        Self::new(cfg.user_agent.clone(), cfg.accept.clone())
    }
}

#[async_trait]
impl HttpProber for ReqwestProber {
    async fn get_through(
        &self,
        proxy: &Url,
        target: &Url,
        timeout: Duration,
    ) -> Result<HttpOutcome, DiscoveryError> {
        let route = reqwest::Proxy::all(proxy.clone()).map_err(|source| {
            DiscoveryError::InvalidProxyUrl {
                url: proxy.to_string(),
                source: Box::new(source),
            }
        })?;
        let client = reqwest::Client::builder()
            .proxy(route)
            .timeout(timeout)
            .connect_timeout(timeout)
            .tcp_keepalive(Duration::from_secs(1))
            .build()
            .map_err(DiscoveryError::HttpClient)?;

        let res = client
            .get(target.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, &self.accept)
            .send()
            .await;
        match res {
            Ok(r) => Ok(HttpOutcome::Status(r.status().as_u16())),
            Err(e) => Ok(HttpOutcome::Failed(e.to_string())),
        }
    }
}

/// `http://{ip}:{port}`, the forward-proxy address every check routes through.
pub fn proxy_url(ip: Ipv4Addr, port: u16) -> Result<Url, DiscoveryError> {
    let raw = format!("http://{ip}:{port}");
    Url::parse(&raw).map_err(|e| DiscoveryError::InvalidProxyUrl {
        url: raw,
        source: Box::new(e),
    })
}

#[derive(Debug, Clone)]
struct Targets {
    echo: Url,
    google: Url,
    cloudflare: Url,
}

/// Open check, functional check, then the two bypass probes. Stops at the first rejection.
pub struct ProxyValidator<P, H> {
    ports: P,
    http: H,
    targets: Targets,
    port_timeout: Duration,
    echo_timeout: Duration,
    bypass_timeout: Duration,
}

impl<P: PortProbe, H: HttpProber> ProxyValidator<P, H> {
    pub fn new(ports: P, http: H, cfg: &DiscoveryConfig) -> anyhow::Result<Self> {
        let parse = |name: &str, raw: &str| {
            Url::parse(raw).with_context(|| format!("invalid {name} target url: {raw}"))
        };
        let targets = Targets {
            echo: parse("echo", &cfg.targets.echo_url)?,
            google: parse("google", &cfg.targets.google_url)?,
            cloudflare: parse("cloudflare", &cfg.targets.cloudflare_url)?,
        };
        Ok(Self {
            ports,
            http,
            targets,
            port_timeout: cfg.port_timeout,
            echo_timeout: cfg.echo_timeout,
            bypass_timeout: cfg.bypass_timeout,
        })
    }

    pub async fn validate(
        &self,
        ip: Ipv4Addr,
        port: u16,
    ) -> Result<Option<ProxyRecord>, DiscoveryError> {
        if !self.ports.is_open(ip, port, self.port_timeout).await {
            return Ok(None);
        }
        debug!(%ip, port, "port open, validating");

        let proxy = proxy_url(ip, port)?;
        let echo = self
            .http
            .get_through(&proxy, &self.targets.echo, self.echo_timeout)
            .await?;
        if !echo.is_ok() {
            debug!(%ip, port, outcome = ?echo, "functional check rejected");
            return Ok(None);
        }
        info!(%ip, port, "proxy is valid, checking bypass targets");

        let google = self.bypass(&proxy, &self.targets.google).await?;
        let cloudflare = self.bypass(&proxy, &self.targets.cloudflare).await?;

        // TODO: fill anonymity and country once a geolocation lookup exists.
        Ok(Some(ProxyRecord {
            ip,
            port,
            proxy_type: ProxyType::Tcp,
            anonymity: String::new(),
            country: String::new(),
            country_code: String::new(),
            https: self.targets.echo.scheme() == "https",
            google,
            cloudflare,
        }))
    }

    async fn bypass(&self, proxy: &Url, target: &Url) -> Result<bool, DiscoveryError> {
        let outcome = self
            .http
            .get_through(proxy, target, self.bypass_timeout)
            .await?;
        let ok = outcome.is_ok();
        debug!(%proxy, %target, ok, "bypass probe");
        Ok(ok)
    }
}
