use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DiscoveryError;

/// Which ports a worker is allowed to try on a live host.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Only the well-known proxy port list.
    #[default]
    Fast,
    /// Well-known list first, then every remaining port in 1..=65535.
    #[serde(rename = "all")]
    #[value(name = "all")]
    Exhaustive,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Fast => f.write_str("fast"),
            ScanMode::Exhaustive => f.write_str("all"),
        }
    }
}

impl std::str::FromStr for ScanMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fast" => Ok(ScanMode::Fast),
            "all" => Ok(ScanMode::Exhaustive),
            other => anyhow::bail!("unknown scan mode: {other} (expected \"fast\" or \"all\")"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSource {
    WellKnown,
    FullSweep,
}

/// A port to try, tagged with the list it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortCandidate {
    pub port: u16,
    pub source: PortSource,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    Tcp,
}

/// A validated forward proxy. Only built by the validator after a 200 through it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRecord {
    pub ip: Ipv4Addr,
    #[serde(serialize_with = "port_as_string", deserialize_with = "port_from_string")]
    pub port: u16,
    #[serde(rename = "type")]
    pub proxy_type: ProxyType,
    pub anonymity: String,
    pub country: String,
    pub country_code: String,
    pub https: bool,
    pub google: bool,
    pub cloudflare: bool,
}

impl ProxyRecord {
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }
}

fn port_as_string<S: Serializer>(port: &u16, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&port.to_string())
}

fn port_from_string<'de, D: Deserializer<'de>>(d: D) -> Result<u16, D::Error> {
    let raw = String::deserialize(d)?;
    raw.parse::<u16>().map_err(serde::de::Error::custom)
}

/// Pipeline stage a worker was in when it gave up.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sampling,
    Liveness,
    PortScan,
    Validation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Sampling => "sampling",
            Stage::Liveness => "liveness",
            Stage::PortScan => "port scan",
            Stage::Validation => "validation",
        };
        f.write_str(s)
    }
}

/// One fatal worker outcome, kept whole instead of folded into a message.
#[derive(Debug)]
pub struct DiscoveryFailure {
    pub worker: usize,
    pub stage: Stage,
    pub cause: DiscoveryError,
}

impl DiscoveryFailure {
    pub fn new(worker: usize, stage: Stage, cause: DiscoveryError) -> Self {
        Self { worker, stage, cause }
    }
}

impl fmt::Display for DiscoveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worker {} failed during {}: {}",
            self.worker, self.stage, self.cause
        )
    }
}

/// Everything a `discover_many` call produced. Records are in completion order.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub proxies: Vec<ProxyRecord>,
    pub failures: Vec<DiscoveryFailure>,
}

impl DiscoveryReport {
    pub fn is_complete(&self, requested: usize) -> bool {
        self.failures.is_empty() && self.proxies.len() == requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ProxyRecord {
        ProxyRecord {
            ip: Ipv4Addr::new(93, 184, 216, 34),
            port: 8080,
            proxy_type: ProxyType::Tcp,
            anonymity: String::new(),
            country: String::new(),
            country_code: String::new(),
            https: true,
            google: true,
            cloudflare: false,
        }
    }

    #[test]
    fn record_serializes_in_wire_shape() {
        let v = serde_json::to_value(record()).unwrap();
        assert_eq!(v["ip"], "93.184.216.34");
        assert_eq!(v["port"], "8080");
        assert_eq!(v["type"], "tcp");
        assert_eq!(v["anonymity"], "");
        assert_eq!(v["countryCode"], "");
        assert_eq!(v["google"], true);
        assert_eq!(v["cloudflare"], false);
    }

    #[test]
    fn record_reads_back_string_port() {
        let json = serde_json::to_string(&record()).unwrap();
        let back: ProxyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn scan_mode_names() {
        assert_eq!("fast".parse::<ScanMode>().unwrap(), ScanMode::Fast);
        assert_eq!("all".parse::<ScanMode>().unwrap(), ScanMode::Exhaustive);
        assert!("everything".parse::<ScanMode>().is_err());
        assert_eq!(ScanMode::Exhaustive.to_string(), "all");
    }
}
