//! Network module: connection seam and local host information

pub mod connector;
pub mod host;

use serde::{Deserialize, Serialize};

pub use connector::{Connector, TcpConnector};
pub use host::{local_ipv4, resolve_ipv4, DeviceInfo};

/// Port state as reported to callers.
///
/// Refused, timed out and unreachable all collapse into `Closed`: from an
/// exposure point of view none of them is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortState {
    Open,
    Closed,
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortState::Open => write!(f, "open"),
            PortState::Closed => write!(f, "closed"),
        }
    }
}

/// Probe result for a single port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeResult {
    pub port: u16,
    pub open: bool,
}

impl ProbeResult {
    pub fn new(port: u16, open: bool) -> Self {
        Self { port, open }
    }

    pub fn closed(port: u16) -> Self {
        Self::new(port, false)
    }

    pub fn state(&self) -> PortState {
        if self.open {
            PortState::Open
        } else {
            PortState::Closed
        }
    }
}
