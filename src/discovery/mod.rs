//! Neighbor discovery - reads the OS neighbor (ARP) table
//!
//! Discovery is passive and best-effort: the table is read through a
//! [`NeighborSource`], parsed by [`parse_neighbor_table`], and any failure to
//! obtain the table degrades to an empty result.

pub mod engine;
pub mod methods;
pub mod table;

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

pub use engine::NeighborDiscovery;
pub use methods::CommandSource;
pub use table::{is_reportable, parse_neighbor_table, TableFormat};

/// One reachable neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub ip: Ipv4Addr,
}

impl NeighborEntry {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self { ip }
    }
}

impl std::fmt::Display for NeighborEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ip)
    }
}

/// Where the raw neighbor table text comes from
pub trait NeighborSource: Send + Sync {
    /// Fetch the table as text
    fn read_table(&self) -> Result<String, DiscoveryError>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Discovery errors. Never escape [`NeighborDiscovery::discover`].
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Neighbor table command unavailable: {0}")]
    CommandUnavailable(String),

    #[error("Neighbor table command failed ({status}): {stderr}")]
    CommandFailed { status: String, stderr: String },
}
