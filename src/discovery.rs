use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::liveness::{self, LivenessProbe, SystemPing};
use crate::ports::candidate_ports;
use crate::sampler::AddressSampler;
use crate::scanner::{PortProbe, TcpPortProbe};
use crate::types::{DiscoveryFailure, DiscoveryReport, ProxyRecord, ScanMode, Stage};
use crate::validator::{HttpProber, ProxyValidator, ReqwestProber};

struct Inner<L, P, H> {
    liveness: L,
    validator: ProxyValidator<P, H>,
    cfg: DiscoveryConfig,
}

/// Runs discovery workers: sample, ping, scan, validate, repeat until one proxy is found.
pub struct Discovery<L, P, H> {
    inner: Arc<Inner<L, P, H>>,
    cancel: CancellationToken,
}

impl<L, P, H> Clone for Discovery<L, P, H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl Discovery<SystemPing, TcpPortProbe, ReqwestProber> {
    /// Discovery wired to the real `ping`, TCP connect and reqwest collaborators.
    pub fn system(cfg: DiscoveryConfig) -> anyhow::Result<Self> {
        let http = ReqwestProber::from_config(&cfg);
        let validator = ProxyValidator::new(TcpPortProbe, http, &cfg)?;
        Ok(Self::new(SystemPing::new(), validator, cfg))
    }
}

impl<L, P, H> Discovery<L, P, H>
where
    L: LivenessProbe + 'static,
    P: PortProbe + 'static,
    H: HttpProber + 'static,
{
    pub fn new(liveness: L, validator: ProxyValidator<P, H>, cfg: DiscoveryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                liveness,
                validator,
                cfg,
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Share an external token; cancelling it stops every worker at its next await.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn sampler_for(&self, worker: usize) -> AddressSampler {
        match self.inner.cfg.seed {
            Some(seed) => AddressSampler::seeded(seed.wrapping_add(worker as u64)),
            None => AddressSampler::from_entropy(),
        }
    }

    async fn until_cancelled<F: Future>(&self, fut: F) -> Result<F::Output, DiscoveryError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DiscoveryError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Find one working proxy.
    ///
    /// Loops over fresh addresses until a port validates. The first validated
    /// port wins; remaining ports on that host are never tried. Without
    /// `max_attempts` this only returns on success, a fatal error or cancellation.
    pub async fn discover_one(
        &self,
        worker: usize,
        mode: ScanMode,
    ) -> Result<ProxyRecord, DiscoveryFailure> {
        let cfg = &self.inner.cfg;
        let fail = |stage, cause| DiscoveryFailure::new(worker, stage, cause);
        let mut sampler = self.sampler_for(worker);
        let mut attempts = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                return Err(fail(Stage::Sampling, DiscoveryError::Cancelled));
            }
            if cfg.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(fail(
                    Stage::Sampling,
                    DiscoveryError::AttemptsExhausted(attempts),
                ));
            }
            attempts += 1;
            let ip = sampler.sample();

            let live = self
                .until_cancelled(liveness::is_live(&self.inner.liveness, ip, &cfg.ping))
                .await
                .map_err(|e| fail(Stage::Liveness, e))?;
            match live {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    error!(worker, %ip, error = %e, "ping fatal error");
                    return Err(fail(Stage::Liveness, e.into()));
                }
            }
            info!(worker, %ip, "ip is alive, scanning ports");

            for candidate in candidate_ports(&cfg.well_known_ports, mode) {
                let port = candidate.port;
                let outcome = self
                    .until_cancelled(self.inner.validator.validate(ip, port))
                    .await
                    .map_err(|e| fail(Stage::PortScan, e))?;
                match outcome {
                    Ok(Some(record)) => {
                        info!(worker, %ip, port, google = record.google, cloudflare = record.cloudflare, "proxy saved");
                        return Ok(record);
                    }
                    Ok(None) => {
                        debug!(worker, %ip, port, source = ?candidate.source, "not a proxy");
                    }
                    Err(e) => return Err(fail(Stage::Validation, e)),
                }
            }

            info!(worker, %ip, "ip can not be used as proxy, resampling");
        }
    }

    /// Run `n` workers and collect what they find.
    ///
    /// At most `concurrency` workers run at once. Returns after every worker
    /// has finished; records appear in completion order and failures are
    /// kept per worker rather than failing the whole call.
    pub async fn discover_many(&self, n: usize, mode: ScanMode) -> DiscoveryReport {
        let harvest = Arc::new(Mutex::new(DiscoveryReport::default()));
        let sem = Arc::new(Semaphore::new(self.inner.cfg.concurrency.max(1)));
        let mut set = JoinSet::new();

        info!(count = n, %mode, "starting discovery");
        for worker in 0..n {
            let Ok(permit) = sem.clone().acquire_owned().await else {
                break;
            };
            let this = self.clone();
            let harvest = harvest.clone();

            set.spawn(async move {
                let _permit = permit;
                let outcome = this.discover_one(worker, mode).await;

                let mut guard = harvest.lock().await;
                match outcome {
                    Ok(record) => guard.proxies.push(record),
                    Err(failure) => {
                        warn!(%failure, "worker stopped");
                        guard.failures.push(failure);
                    }
                }
            });
        }

        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                error!(error = %e, "discovery worker aborted");
            }
        }

        match Arc::try_unwrap(harvest) {
            Ok(m) => m.into_inner(),
            Err(shared) => std::mem::take(&mut *shared.lock().await),
        }
    }
}
