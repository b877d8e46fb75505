//! Port lists for exposure probing

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Ports checked by a default exposure scan, in display order
const EXPOSURE_PORTS: [u16; 10] = [21, 22, 23, 80, 135, 139, 443, 445, 3306, 3389];

/// Well-known TCP service names used when rendering open ports
static SERVICE_NAMES: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    let mut services = HashMap::new();

    // Exposure list
    services.insert(21, "ftp");
    services.insert(22, "ssh");
    services.insert(23, "telnet");
    services.insert(80, "http");
    services.insert(135, "msrpc");
    services.insert(139, "netbios-ssn");
    services.insert(443, "https");
    services.insert(445, "microsoft-ds");
    services.insert(3306, "mysql");
    services.insert(3389, "rdp");

    // Other common services
    services.insert(25, "smtp");
    services.insert(53, "domain");
    services.insert(110, "pop3");
    services.insert(143, "imap");
    services.insert(1433, "mssql");
    services.insert(1883, "mqtt");
    services.insert(5432, "postgresql");
    services.insert(5900, "vnc");
    services.insert(6379, "redis");
    services.insert(8080, "http-proxy");
    services.insert(8443, "https-alt");
    services.insert(27017, "mongodb");

    services
});

/// Ports probed when the operator does not choose any
pub fn exposure_ports() -> Vec<u16> {
    EXPOSURE_PORTS.to_vec()
}

/// Look up the conventional service name of a TCP port
pub fn service_name(port: u16) -> Option<&'static str> {
    SERVICE_NAMES.get(&port).copied()
}

/// Parse a port list such as `22,80,443` or `1-1024,3389`.
///
/// Order of first appearance is kept and duplicates are dropped.
pub fn parse_port_list(input: &str) -> Result<Vec<u16>, ValidationError> {
    let mut ports = Vec::new();
    let mut seen = HashSet::new();

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let start = parse_port(start.trim())?;
            let end = parse_port(end.trim())?;
            let (low, high) = if start <= end { (start, end) } else { (end, start) };
            ports.extend((low..=high).filter(|port| seen.insert(*port)));
        } else {
            let port = parse_port(part)?;
            if seen.insert(port) {
                ports.push(port);
            }
        }
    }

    if ports.is_empty() {
        return Err(ValidationError::EmptyPortList);
    }

    Ok(ports)
}

fn parse_port(token: &str) -> Result<u16, ValidationError> {
    let value: u32 = token.parse().map_err(|_| ValidationError::NonNumeric {
        position: 0,
        value: token.to_string(),
    })?;

    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ValidationError::InvalidPort(value)),
    }
}
