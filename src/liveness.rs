use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::PingSettings;
use crate::error::PingParseError;
use crate::ping_output;

/// Loss reported when the probe could not run or the host never answered.
pub const TOTAL_LOSS: f64 = 100.0;

/// ICMP reachability collaborator.
///
/// Returns packet loss in percent. Only a structural failure to read the
/// probe's own output is an error; every transport problem is 100% loss.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(
        &self,
        addr: Ipv4Addr,
        per_packet_timeout: Duration,
        overall_timeout: Duration,
        count: u32,
    ) -> Result<f64, PingParseError>;
}

#[async_trait]
impl<T: LivenessProbe + ?Sized> LivenessProbe for Arc<T> {
    async fn probe(
        &self,
        addr: Ipv4Addr,
        per_packet_timeout: Duration,
        overall_timeout: Duration,
        count: u32,
    ) -> Result<f64, PingParseError> {
        (**self)
            .probe(addr, per_packet_timeout, overall_timeout, count)
            .await
    }
}

/// Gate a candidate on zero packet loss.
pub async fn is_live<L: LivenessProbe + ?Sized>(
    probe: &L,
    addr: Ipv4Addr,
    settings: &PingSettings,
) -> Result<bool, PingParseError> {
    let loss = probe
        .probe(
            addr,
            settings.per_packet_timeout,
            settings.overall_timeout,
            settings.count,
        )
        .await?;
    Ok(loss == 0.0)
}

/// Runs the platform `ping` binary and parses what it prints.
#[derive(Debug, Clone)]
pub struct SystemPing {
    program: String,
}

impl SystemPing {
    pub fn new() -> Self {
        Self::with_program("ping")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(
        &self,
        addr: Ipv4Addr,
        per_packet_timeout: Duration,
        overall_timeout: Duration,
        count: u32,
    ) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-n").arg("-c").arg(count.max(1).to_string());
        if cfg!(target_os = "macos") {
            cmd.arg("-W")
                .arg(per_packet_timeout.as_millis().max(1).to_string())
                .arg("-t")
                .arg(overall_timeout.as_secs().max(1).to_string());
        } else {
            cmd.arg("-W")
                .arg(per_packet_timeout.as_secs().max(1).to_string())
                .arg("-w")
                .arg(overall_timeout.as_secs().max(1).to_string());
        }
        cmd.arg(addr.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for SystemPing {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LivenessProbe for SystemPing {
    async fn probe(
        &self,
        addr: Ipv4Addr,
        per_packet_timeout: Duration,
        overall_timeout: Duration,
        count: u32,
    ) -> Result<f64, PingParseError> {
        let output = match self
            .command(addr, per_packet_timeout, overall_timeout, count)
            .output()
            .await
        {
            Ok(o) => o,
            Err(e) => {
                debug!(ip = %addr, error = %e, "ping could not be started");
                return Ok(TOTAL_LOSS);
            }
        };

        // 0: replies seen, 1: no replies; anything else is a transport failure.
        match output.status.code() {
            Some(0) | Some(1) => {}
            code => {
                debug!(ip = %addr, ?code, "ping exited abnormally");
                return Ok(TOTAL_LOSS);
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = ping_output::parse(&addr.to_string(), &stdout)?;
        debug!(
            ip = %addr,
            replies = parsed.replies,
            loss = parsed.stats.packet_loss_percent,
            "ping finished"
        );
        Ok(parsed.stats.packet_loss_percent)
    }
}
