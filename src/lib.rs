//! Library crate for proxy-finder-rs: random IPv4 sampling, liveness gating,
//! port scanning and HTTP forward-proxy validation.
pub mod config;
pub mod discovery;
pub mod error;
pub mod liveness;
pub mod output;
pub mod ping_output;
pub mod ports;
pub mod sampler;
pub mod scanner;
pub mod tcp_check;
pub mod types;
pub mod validator;

pub use discovery::Discovery;
pub use error::DiscoveryError;
pub use types::{DiscoveryFailure, DiscoveryReport, ProxyRecord, ScanMode, Stage};
