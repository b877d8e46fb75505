//! Neighbor discovery reader

use super::{parse_neighbor_table, CommandSource, DiscoveryError, NeighborEntry, NeighborSource, TableFormat};
use crate::config::DiscoveryConfig;
use std::collections::HashSet;

/// Reads the neighbor table and turns it into reachable IPv4 neighbors
pub struct NeighborDiscovery {
    source: Box<dyn NeighborSource>,
    format: TableFormat,
}

impl NeighborDiscovery {
    pub fn new(source: Box<dyn NeighborSource>, format: TableFormat) -> Self {
        Self { source, format }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(Box::new(CommandSource::from_config(config)), config.table_format())
    }

    pub fn format(&self) -> TableFormat {
        self.format
    }

    /// Discover neighbors, surfacing why the table could not be read
    pub fn try_discover(&self) -> Result<HashSet<NeighborEntry>, DiscoveryError> {
        let table = self.source.read_table()?;
        let neighbors = parse_neighbor_table(&table, self.format);
        log::info!(
            "Neighbor table from `{}` listed {} device(s)",
            self.source.describe(),
            neighbors.len()
        );
        Ok(neighbors)
    }

    /// Discover neighbors. Best-effort: when the table cannot be read the
    /// result is empty, never an error.
    pub fn discover(&self) -> HashSet<NeighborEntry> {
        match self.try_discover() {
            Ok(neighbors) => neighbors,
            Err(e) => {
                log::warn!("Neighbor discovery skipped: {}", e);
                HashSet::new()
            }
        }
    }
}

impl Default for NeighborDiscovery {
    fn default() -> Self {
        Self::from_config(&DiscoveryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Result<&'static str, &'static str>);

    impl NeighborSource for Canned {
        fn read_table(&self) -> Result<String, DiscoveryError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(reason) => Err(DiscoveryError::CommandUnavailable(reason.to_string())),
            }
        }

        fn describe(&self) -> String {
            "canned".to_string()
        }
    }

    #[test]
    fn test_discover_parses_source() {
        let discovery = NeighborDiscovery::new(
            Box::new(Canned(Ok("192.168.0.4   11-22-33-44-55-66   dynamic\n"))),
            TableFormat::Windows,
        );
        let found = discovery.discover();
        assert_eq!(found.len(), 1);
        assert!(found.contains(&NeighborEntry::new("192.168.0.4".parse().unwrap())));
    }

    #[test]
    fn test_failure_degrades_to_empty() {
        let discovery = NeighborDiscovery::new(Box::new(Canned(Err("arp not found"))), TableFormat::Bsd);
        assert!(discovery.try_discover().is_err());
        assert!(discovery.discover().is_empty());
    }
}
