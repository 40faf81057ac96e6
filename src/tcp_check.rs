//! Raw TCP reachability checker.
//!
//! The checker runs a background loop that owns all in-flight connect probes.
//! Callers start the loop, wait until it is ready, submit `check_addr`
//! requests and stop it by cancelling the loop's token. [`ScopedChecker`]
//! ties that whole lifecycle to one value so it cannot outlive its caller.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;
use tokio_util::sync::CancellationToken;

struct CheckRequest {
    addr: SocketAddr,
    timeout: Duration,
    reply: oneshot::Sender<io::Result<()>>,
}

pub struct TcpChecker {
    requests: mpsc::Sender<CheckRequest>,
    inbox: Mutex<Option<mpsc::Receiver<CheckRequest>>>,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

impl TcpChecker {
    pub fn new() -> Self {
        let (requests, inbox) = mpsc::channel(64);
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            requests,
            inbox: Mutex::new(Some(inbox)),
            ready_tx,
            ready_rx,
        }
    }

    /// Serve check requests until `cancel` fires. In-flight probes are aborted on exit.
    /// A second call on the same checker returns immediately.
    pub async fn checking_loop(&self, cancel: CancellationToken) {
        let Some(mut inbox) = self.inbox.lock().await.take() else {
            return;
        };
        let mut inflight = JoinSet::new();
        let _ = self.ready_tx.send(true);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(req) = inbox.recv() => {
                    inflight.spawn(async move {
                        let res = connect_probe(req.addr, req.timeout).await;
                        let _ = req.reply.send(res);
                    });
                }
                Some(_) = inflight.join_next() => {}
                else => break,
            }
        }

        let _ = self.ready_tx.send(false);
        inflight.shutdown().await;
    }

    pub async fn wait_ready(&self) {
        let mut rx = self.ready_rx.clone();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// `Ok(())` when a TCP connection to `addr` was established within `timeout`.
    pub async fn check_addr(&self, addr: SocketAddr, timeout: Duration) -> io::Result<()> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(CheckRequest {
                addr,
                timeout,
                reply,
            })
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::NotConnected, "checking loop stopped"))?;
        answer
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::Interrupted, "checking loop stopped"))?
    }
}

impl Default for TcpChecker {
    fn default() -> Self {
        Self::new()
    }
}

async fn connect_probe(addr: SocketAddr, timeout: Duration) -> io::Result<()> {
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
    }
}

/// A checker whose loop lives exactly as long as this value.
///
/// `stop` tears the loop down and waits for it. Dropping without `stop`
/// (early return, caller cancelled) cancels and aborts the loop instead.
pub struct ScopedChecker {
    checker: Arc<TcpChecker>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ScopedChecker {
    pub async fn start() -> Self {
        let checker = Arc::new(TcpChecker::new());
        let cancel = CancellationToken::new();
        let task = {
            let checker = checker.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { checker.checking_loop(cancel).await })
        };
        let scoped = Self {
            checker,
            cancel,
            task: Some(task),
        };
        scoped.checker.wait_ready().await;
        scoped
    }

    pub async fn check(&self, addr: SocketAddr, timeout: Duration) -> io::Result<()> {
        self.checker.check_addr(addr, timeout).await
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ScopedChecker {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn open_listener_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let checker = ScopedChecker::start().await;
        checker.check(addr, Duration::from_secs(2)).await.unwrap();
        checker.stop().await;
    }

    #[tokio::test]
    async fn closed_port_is_refused() {
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap()
        };
        let checker = ScopedChecker::start().await;
        assert!(checker.check(addr, Duration::from_secs(2)).await.is_err());
        checker.stop().await;
    }

    #[tokio::test]
    async fn stopped_loop_rejects_checks() {
        let checker = Arc::new(TcpChecker::new());
        let cancel = CancellationToken::new();
        let handle = {
            let c = checker.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { c.checking_loop(cancel).await })
        };
        checker.wait_ready().await;
        cancel.cancel();
        handle.await.unwrap();

        let res = checker
            .check_addr("127.0.0.1:9".parse().unwrap(), Duration::from_millis(200))
            .await;
        assert!(res.is_err());
    }
}
