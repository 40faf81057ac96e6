use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::tcp_check::ScopedChecker;

/// Decides whether `(addr, port)` accepts a TCP connection.
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn is_open(&self, addr: Ipv4Addr, port: u16, timeout: Duration) -> bool;
}

#[async_trait]
impl<T: PortProbe + ?Sized> PortProbe for Arc<T> {
    async fn is_open(&self, addr: Ipv4Addr, port: u16, timeout: Duration) -> bool {
        (**self).is_open(addr, port, timeout).await
    }
}

/// Connect probe backed by a fresh [`ScopedChecker`] per call.
///
/// Calls share nothing, so any number of them may run concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpPortProbe;

#[async_trait]
impl PortProbe for TcpPortProbe {
    async fn is_open(&self, addr: Ipv4Addr, port: u16, timeout: Duration) -> bool {
        let target = SocketAddr::V4(SocketAddrV4::new(addr, port));
        let checker = ScopedChecker::start().await;
        let res = checker.check(target, timeout).await;
        checker.stop().await;
        match res {
            Ok(()) => true,
            Err(e) => {
                trace!(%target, error = %e, "port closed");
                false
            }
        }
    }
}
