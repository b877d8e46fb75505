//! cityguard - network exposure and intrusion diagnostics
//!
//! Three independent engines behind one small boundary:
//! [`scan_ports`] probes which TCP ports of a host accept connections,
//! [`discover_neighbors`] reads the local neighbor (ARP) table, and
//! [`classify`] labels 32-feature traffic records with a pre-trained model.

pub mod config;
pub mod discovery;
pub mod error;
pub mod inference;
pub mod network;
pub mod output;
pub mod scanner;
pub mod top_ports;
pub mod utils;

use std::collections::HashSet;
use std::time::Duration;

// Re-export commonly used types
pub use config::GuardConfig;
pub use discovery::{NeighborDiscovery, NeighborEntry};
pub use error::{GuardError, GuardResult, ProbeError, ValidationError};
pub use inference::{
    ClassificationResult, Classifier, FeatureBatch, FeatureVector, InferencePipeline, LabelSummary,
    ModelGate, ThreatLabel,
};
pub use scanner::{PortProber, ProbeTarget, ScanReport};
pub use top_ports::exposure_ports;

pub type Result<T> = std::result::Result<T, GuardError>;

/// Ports of `host` that accepted a TCP connection within `timeout`
pub async fn scan_ports(host: &str, ports: &[u16], timeout: Duration) -> Result<HashSet<u16>> {
    Ok(PortProber::tcp().scan_host(host, ports, timeout).await?)
}

/// Reachable neighbors from the default `arp -a` table. Empty when the table
/// cannot be read.
pub fn discover_neighbors() -> HashSet<NeighborEntry> {
    NeighborDiscovery::default().discover()
}

/// Label every row of `batch`, in input order
pub fn classify(pipeline: &InferencePipeline, batch: &FeatureBatch) -> Result<Vec<ClassificationResult>> {
    pipeline.classify(batch)
}
