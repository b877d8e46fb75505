//! Port exposure probing engine

use crate::config::ScannerConfig;
use crate::error::{ProbeError, ValidationError};
use crate::network::{local_ipv4, resolve_ipv4, Connector, ProbeResult, TcpConnector};
use crate::scanner::{ProbeTarget, ScanReport};
use crate::utils::Logger;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;

const DEFAULT_MAX_CONCURRENCY: usize = 256;

/// Concurrent TCP-connect prober.
///
/// Every port gets its own task; all tasks are started together and the call
/// returns once each has connected, failed or hit its deadline.
#[derive(Clone)]
pub struct PortProber {
    connector: Arc<dyn Connector>,
    max_concurrency: usize,
}

impl PortProber {
    /// Create a prober on top of an arbitrary connector
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Prober using real TCP connections
    pub fn tcp() -> Self {
        Self::new(Arc::new(TcpConnector::new()))
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::tcp().with_max_concurrency(config.max_concurrency)
    }

    /// Set how many probes may be in flight at once (at least one)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn connector_name(&self) -> &str {
        self.connector.name()
    }

    /// Probe every port of the target. One result per port, in request order.
    pub async fn probe_all(&self, target: &ProbeTarget) -> Vec<ProbeResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let deadline = target.timeout();

        let mut handles = Vec::with_capacity(target.ports().len());
        for &port in target.ports() {
            let connector = Arc::clone(&self.connector);
            let semaphore = Arc::clone(&semaphore);
            let addr = SocketAddr::new(IpAddr::V4(target.host()), port);

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return ProbeResult::closed(port),
                };
                probe_port(connector.as_ref(), addr, deadline).await
            }));
        }

        let joined = futures::future::join_all(handles).await;

        joined
            .into_iter()
            .zip(target.ports())
            .map(|(outcome, &port)| match outcome {
                Ok(result) => result,
                Err(e) => {
                    log::debug!("Probe task for port {} did not finish: {}", port, e);
                    ProbeResult::closed(port)
                }
            })
            .collect()
    }

    /// Set of ports on the target that accepted a connection
    pub async fn scan(&self, target: &ProbeTarget) -> HashSet<u16> {
        let start = Instant::now();
        Logger::log_scan_start(&target.host().to_string(), target.ports().len(), self.connector_name());

        let open: HashSet<u16> = self
            .probe_all(target)
            .await
            .into_iter()
            .filter(|result| result.open)
            .map(|result| result.port)
            .collect();

        Logger::log_scan_complete(start.elapsed(), open.len(), target.ports().len());
        open
    }

    /// Scan `host` given as a dotted address or a resolvable name.
    ///
    /// A name that does not resolve counts as every port closed.
    pub async fn scan_host(
        &self,
        host: &str,
        ports: &[u16],
        deadline: Duration,
    ) -> Result<HashSet<u16>, ValidationError> {
        if ports.is_empty() {
            return Err(ValidationError::EmptyPortList);
        }

        let ip = match resolve_ipv4(host).await {
            Ok(ip) => ip,
            Err(e) => {
                log::warn!("Could not resolve {}: {}. Reporting no open ports.", host, e);
                return ProbeTarget::new(Ipv4Addr::UNSPECIFIED, ports, deadline).map(|_| HashSet::new());
            }
        };

        let target = ProbeTarget::new(ip, ports, deadline)?;
        Ok(self.scan(&target).await)
    }

    /// Scan this machine's own primary address (loopback when there is none)
    pub async fn scan_local(&self, ports: &[u16], deadline: Duration) -> Result<HashSet<u16>, ValidationError> {
        let target = ProbeTarget::new(local_address(), ports, deadline)?;
        Ok(self.scan(&target).await)
    }

    /// Scan and wrap the outcome into a report
    pub async fn report(&self, target: &ProbeTarget) -> ScanReport {
        let started_at = chrono::Utc::now();
        let start = Instant::now();
        let open = self.scan(target).await;
        ScanReport::new(target, open, started_at, start.elapsed())
    }
}

impl Default for PortProber {
    fn default() -> Self {
        Self::tcp()
    }
}

/// Address used when the operator does not name a host
pub fn local_address() -> Ipv4Addr {
    match local_ipv4() {
        Ok(ip) => ip,
        Err(e) => {
            log::debug!("No routable local address ({}), using loopback", e);
            Ipv4Addr::LOCALHOST
        }
    }
}

async fn probe_port(connector: &dyn Connector, addr: SocketAddr, deadline: Duration) -> ProbeResult {
    let outcome = match timeout(deadline, connector.connect(addr)).await {
        Ok(result) => result,
        Err(elapsed) => Err(ProbeError::from(elapsed)),
    };

    match outcome {
        Ok(()) => ProbeResult::new(addr.port(), true),
        Err(e) => {
            log::trace!("{} closed: {}", addr, e);
            ProbeResult::closed(addr.port())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts a fixed port set, refuses the rest
    struct StaticConnector {
        open: Vec<u16>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Connector for StaticConnector {
        async fn connect(&self, addr: SocketAddr) -> Result<(), ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.open.contains(&addr.port()) {
                Ok(())
            } else {
                Err(ProbeError::Refused)
            }
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    /// Never answers
    struct BlackHole;

    #[async_trait]
    impl Connector for BlackHole {
        async fn connect(&self, _addr: SocketAddr) -> Result<(), ProbeError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        fn name(&self) -> &str {
            "black hole"
        }
    }

    fn target(ports: &[u16], timeout_ms: u64) -> ProbeTarget {
        ProbeTarget::new(Ipv4Addr::new(10, 0, 0, 7), ports, Duration::from_millis(timeout_ms)).unwrap()
    }

    #[tokio::test]
    async fn test_only_accepting_port_is_open() {
        let connector = Arc::new(StaticConnector { open: vec![80], calls: AtomicUsize::new(0) });
        let prober = PortProber::new(connector.clone());

        let open = prober.scan(&target(&[21, 80, 443], 50)).await;
        assert_eq!(open, [80].into_iter().collect());
        assert_eq!(connector.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_probe_all_keeps_request_order() {
        let connector = Arc::new(StaticConnector { open: vec![22, 3389], calls: AtomicUsize::new(0) });
        let prober = PortProber::new(connector);

        let results = prober.probe_all(&target(&[3389, 21, 22], 50)).await;
        let ports: Vec<u16> = results.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![3389, 21, 22]);
        assert_eq!(results.iter().filter(|r| r.open).count(), 2);
    }

    #[tokio::test]
    async fn test_deadline_is_per_probe_not_per_port_count() {
        let prober = PortProber::new(Arc::new(BlackHole));
        let ports: Vec<u16> = (1000..1200).collect();

        let start = Instant::now();
        let open = prober.scan(&target(&ports, 50)).await;

        assert!(open.is_empty());
        assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_at_least_one() {
        let prober = PortProber::new(Arc::new(BlackHole)).with_max_concurrency(0);
        let open = prober.scan(&target(&[1, 2], 10)).await;
        assert!(open.is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_host_reports_nothing_open() {
        let prober = PortProber::new(Arc::new(StaticConnector { open: vec![80], calls: AtomicUsize::new(0) }));
        let open = prober
            .scan_host("no-such-host.invalid", &[80], Duration::from_millis(50))
            .await
            .unwrap();
        assert!(open.is_empty());

        let err = prober
            .scan_host("no-such-host.invalid", &[], Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyPortList);
    }
}
