//! Scanner module containing the port exposure prober

pub mod engine;

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::Duration;
use uuid::Uuid;

pub use engine::PortProber;

/// What to probe: one host, a port list and a per-port deadline.
///
/// Built once per scan and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    host: Ipv4Addr,
    ports: Vec<u16>,
    timeout: Duration,
}

impl ProbeTarget {
    /// Create a target, rejecting an empty port list and port 0.
    /// Repeated ports are probed once.
    pub fn new(host: Ipv4Addr, ports: &[u16], timeout: Duration) -> Result<Self, ValidationError> {
        if ports.is_empty() {
            return Err(ValidationError::EmptyPortList);
        }
        if ports.contains(&0) {
            return Err(ValidationError::InvalidPort(0));
        }

        let mut seen = HashSet::with_capacity(ports.len());
        let ports = ports.iter().copied().filter(|port| seen.insert(*port)).collect();

        Ok(Self { host, ports, timeout })
    }

    pub fn host(&self) -> Ipv4Addr {
        self.host
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Complete exposure scan result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub id: Uuid,

    /// Host that was probed
    pub host: Ipv4Addr,

    /// Ports that were requested, in request order
    pub ports: Vec<u16>,

    /// Ports that accepted a connection, sorted for display
    pub open_ports: Vec<u16>,

    pub started_at: DateTime<Utc>,

    /// Wall-clock time of the whole scan
    pub duration: Duration,
}

impl ScanReport {
    pub fn new(
        target: &ProbeTarget,
        open: HashSet<u16>,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let mut open_ports: Vec<u16> = open.into_iter().collect();
        open_ports.sort_unstable();

        Self {
            id: Uuid::new_v4(),
            host: target.host(),
            ports: target.ports().to_vec(),
            open_ports,
            started_at,
            duration,
        }
    }

    /// Whether any requested port is exposed
    pub fn is_exposed(&self) -> bool {
        !self.open_ports.is_empty()
    }

    /// Requested ports that did not accept a connection
    pub fn closed_ports(&self) -> Vec<u16> {
        self.ports
            .iter()
            .copied()
            .filter(|port| self.open_ports.binary_search(port).is_err())
            .collect()
    }
}
