// Connection seam used by the exposure prober.
// Tests swap in fake connectors so timing and failures are deterministic.

use crate::error::ProbeError;
use async_trait::async_trait;
use std::net::SocketAddr;

/// Anything able to attempt a TCP connection
#[async_trait]
pub trait Connector: Send + Sync {
    /// Attempt a connection. `Ok` means the peer accepted it.
    ///
    /// Implementations do not need their own deadline; the prober wraps
    /// every call in the configured timeout.
    async fn connect(&self, addr: SocketAddr) -> Result<(), ProbeError>;

    /// Get connector name
    fn name(&self) -> &str;
}

/// TCP Connect - No privileges required
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: SocketAddr) -> Result<(), ProbeError> {
        let stream = tokio::net::TcpStream::connect(addr).await?;
        // Connection established - close quickly
        drop(stream);
        Ok(())
    }

    fn name(&self) -> &str {
        "TCP Connect"
    }
}
