//! Neighbor discovery tests

use cityguard::discovery::{
    is_reportable, parse_neighbor_table, DiscoveryError, NeighborDiscovery, NeighborEntry,
    NeighborSource, TableFormat,
};
use cityguard::config::DiscoveryConfig;
use proptest::prelude::*;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Serves fixed command output
struct Simulated(String);

impl NeighborSource for Simulated {
    fn read_table(&self) -> Result<String, DiscoveryError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "simulated arp -a".to_string()
    }
}

/// Behaves like a command that exits non-zero
struct Failing;

impl NeighborSource for Failing {
    fn read_table(&self) -> Result<String, DiscoveryError> {
        Err(DiscoveryError::CommandFailed {
            status: "exit status: 1".to_string(),
            stderr: "arp: permission denied".to_string(),
        })
    }

    fn describe(&self) -> String {
        "failing".to_string()
    }
}

fn windows_line(ip: Ipv4Addr) -> String {
    format!("  {:<20} 00-1a-2b-3c-4d-5e     dynamic", ip)
}

#[test]
fn test_multicast_line_excluded() {
    let table = "  224.0.0.1   01-00-5e-00-00-01   static\n  192.168.0.8   00-11-22-33-44-55   dynamic\n";
    let discovery = NeighborDiscovery::new(Box::new(Simulated(table.to_string())), TableFormat::Windows);

    let found = discovery.discover();
    let expected: HashSet<NeighborEntry> =
        [NeighborEntry::new(Ipv4Addr::new(192, 168, 0, 8))].into_iter().collect();
    assert_eq!(found, expected);
}

#[test]
fn test_duplicates_collapse() {
    let line = windows_line(Ipv4Addr::new(10, 1, 1, 1));
    let table = format!("{}\n{}\n{}\n", line, line, line);
    let found = parse_neighbor_table(&table, TableFormat::Windows);
    assert_eq!(found.len(), 1);
}

#[test]
fn test_command_failure_yields_empty_set() {
    let discovery = NeighborDiscovery::new(Box::new(Failing), TableFormat::Windows);
    assert!(matches!(
        discovery.try_discover(),
        Err(DiscoveryError::CommandFailed { .. })
    ));
    assert!(discovery.discover().is_empty());
}

#[test]
fn test_missing_command_yields_empty_set() {
    let config = DiscoveryConfig {
        command: "cityguard-test-missing-arp".to_string(),
        args: vec!["-a".to_string()],
        format: Some(TableFormat::Bsd),
    };
    let discovery = NeighborDiscovery::from_config(&config);
    assert_eq!(discovery.format(), TableFormat::Bsd);
    assert!(discovery.discover().is_empty());
}

#[test]
fn test_boundary_discover_neighbors_never_panics() {
    // Whatever the host's table holds, filtered ranges never appear
    for entry in cityguard::discover_neighbors() {
        assert!(is_reportable(entry.ip));
    }
}

proptest! {
    #[test]
    fn prop_filtered_ranges_never_reported(addrs in prop::collection::vec(any::<[u8; 4]>(), 0..64)) {
        let ips: Vec<Ipv4Addr> = addrs.into_iter().map(Ipv4Addr::from).collect();
        let table: String = ips.iter().map(|ip| windows_line(*ip) + "\n").collect();

        let found = parse_neighbor_table(&table, TableFormat::Windows);

        for entry in &found {
            prop_assert!(!matches!(entry.ip.octets()[0], 224 | 239 | 255));
        }
        let expected: HashSet<NeighborEntry> = ips
            .into_iter()
            .filter(|ip| is_reportable(*ip))
            .map(NeighborEntry::new)
            .collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn prop_bsd_filtered_ranges_never_reported(addrs in prop::collection::vec(any::<[u8; 4]>(), 0..64)) {
        let table: String = addrs
            .iter()
            .map(|a| format!("? ({}) at aa:bb:cc:dd:ee:ff on en0 ifscope [ethernet]\n", Ipv4Addr::from(*a)))
            .collect();

        for entry in parse_neighbor_table(&table, TableFormat::Bsd) {
            prop_assert!(is_reportable(entry.ip));
        }
    }
}
