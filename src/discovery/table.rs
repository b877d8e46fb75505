//! Neighbor table parsing.
//!
//! All knowledge about table layouts lives here; adding a layout means adding
//! a [`TableFormat`] variant and a line parser.

use super::NeighborEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// `? (192.168.1.1) at aa:bb:cc:dd:ee:ff [ether] on eth0`
static BSD_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\((\d{1,3}(?:\.\d{1,3}){3})\)\s+at\s+(\S+)").expect("static regex is valid")
});

/// Layout of the `arp -a` output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// `  192.168.1.1    aa-bb-cc-dd-ee-ff     dynamic`
    Windows,
    /// `? (192.168.1.1) at aa:bb:cc:dd:ee:ff on en0`, Linux net-tools and macOS
    Bsd,
}

impl TableFormat {
    /// Layout produced by `arp -a` on the running OS
    pub fn native() -> Self {
        if cfg!(windows) {
            TableFormat::Windows
        } else {
            TableFormat::Bsd
        }
    }
}

impl std::str::FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windows" | "win" => Ok(TableFormat::Windows),
            "bsd" | "unix" | "linux" | "macos" => Ok(TableFormat::Bsd),
            _ => Err(format!("Unknown table format: {}", s)),
        }
    }
}

/// Multicast (224.x, 239.x) and broadcast (255.x) addresses are not devices
pub fn is_reportable(ip: Ipv4Addr) -> bool {
    !matches!(ip.octets()[0], 224 | 239 | 255)
}

/// Parse neighbor table text into a deduplicated set of neighbors
pub fn parse_neighbor_table(text: &str, format: TableFormat) -> HashSet<NeighborEntry> {
    let parse_line = match format {
        TableFormat::Windows => parse_windows_line,
        TableFormat::Bsd => parse_bsd_line,
    };

    text.lines()
        .filter_map(parse_line)
        .filter(|ip| is_reportable(*ip))
        .map(NeighborEntry::new)
        .collect()
}

// A neighbor line carries a hyphenated MAC; its first token is the address.
// The "Interface: 10.0.0.5 --- 0xb" header also has hyphens but starts with a word.
fn parse_windows_line(line: &str) -> Option<Ipv4Addr> {
    if !line.contains('-') {
        return None;
    }

    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    tokens.next()?;
    first.parse().ok()
}

fn parse_bsd_line(line: &str) -> Option<Ipv4Addr> {
    let captures = BSD_LINE.captures(line)?;
    let hw_addr = captures.get(2)?.as_str();
    if hw_addr.contains("incomplete") {
        return None;
    }
    captures.get(1)?.as_str().parse().ok()
}
