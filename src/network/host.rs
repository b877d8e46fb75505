//! Local host information and name resolution

use crate::GuardError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use sysinfo::System;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Device information shown next to an exposure scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub hostname: String,
    pub ip_address: Ipv4Addr,
    pub os: String,
    pub os_version: String,
    pub arch: String,
    /// CPU brand string, empty when the platform does not report one
    pub cpu: String,
    pub cpus: usize,
    pub total_memory_bytes: u64,
}

impl DeviceInfo {
    /// Gather information about the machine we are running on
    pub fn collect() -> Self {
        let sys = System::new_all();
        let cpu = sys
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .unwrap_or_default();

        Self {
            hostname: hostname().unwrap_or_else(|| "unknown".to_string()),
            ip_address: local_ipv4().unwrap_or(Ipv4Addr::LOCALHOST),
            os: std::env::consts::OS.to_string(),
            os_version: System::long_os_version()
                .or_else(System::os_version)
                .unwrap_or_else(|| "unknown".to_string()),
            arch: std::env::consts::ARCH.to_string(),
            cpu,
            cpus: num_cpus::get(),
            total_memory_bytes: sys.total_memory(),
        }
    }

    /// Total RAM in GiB, rounded to two decimals
    pub fn total_memory_gib(&self) -> f64 {
        (self.total_memory_bytes as f64 / BYTES_PER_GIB * 100.0).round() / 100.0
    }

    /// Rows for a two-column table, in display order
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let cpu = if self.cpu.is_empty() {
            self.arch.clone()
        } else {
            self.cpu.clone()
        };

        vec![
            ("Hostname", self.hostname.clone()),
            ("IP Address", self.ip_address.to_string()),
            ("OS", self.os.clone()),
            ("OS Version", self.os_version.clone()),
            ("Architecture", self.arch.clone()),
            ("CPU", cpu),
            ("CPUs", self.cpus.to_string()),
            ("RAM", format!("{:.2} GB", self.total_memory_gib())),
        ]
    }
}

/// Primary IPv4 address of this machine.
///
/// Connecting a UDP socket sends nothing; it only makes the kernel pick the
/// outbound interface, whose address we read back.
pub fn local_ipv4() -> crate::Result<Ipv4Addr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;

    match socket.local_addr()?.ip() {
        IpAddr::V4(ipv4) if !ipv4.is_unspecified() => Ok(ipv4),
        IpAddr::V4(_) => Err(GuardError::InvalidTarget("no routable IPv4 address".to_string())),
        IpAddr::V6(_) => Err(GuardError::InvalidTarget("IPv6 not supported".to_string())),
    }
}

/// Resolve a host name or dotted address to its first IPv4 address
pub async fn resolve_ipv4(host: &str) -> crate::Result<Ipv4Addr> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }

    let addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| GuardError::InvalidTarget(format!("{}: {}", host, e)))?;

    addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| GuardError::InvalidTarget(format!("{}: no IPv4 address", host)))
}

#[cfg(unix)]
fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is writable for buf.len() bytes and gethostname never writes past it
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..end]).into_owned();
    (!name.is_empty()).then_some(name)
}

#[cfg(not(unix))]
fn hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}
