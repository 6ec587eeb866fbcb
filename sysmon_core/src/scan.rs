//! TCP connect scan over a port range with a bounded number of dials in flight.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::MonitorConfig;
use crate::console::Console;

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub timeout: Duration,
    pub concurrency: usize,
}

impl From<&MonitorConfig> for ScanOptions {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            timeout: config.scan_timeout(),
            concurrency: config.scan_concurrency,
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

/// Dial every port in `ports` on `addr`, printing `Port N is open` as each
/// connection succeeds. Returns the open ports in discovery order once every
/// attempt has finished or timed out.
pub async fn scan_ports<I>(addr: IpAddr, ports: I, opts: ScanOptions, console: &Console) -> Vec<u16>
where
    I: IntoIterator<Item = u16>,
{
    let mut attempts = stream::iter(ports)
        .map(|port| async move {
            let open = probe_port(SocketAddr::new(addr, port), opts.timeout).await;
            (port, open)
        })
        .buffer_unordered(opts.concurrency.max(1));

    let mut open = Vec::new();
    while let Some((port, is_open)) = attempts.next().await {
        if is_open {
            console.line(format!("Port {port} is open"));
            open.push(port);
        }
    }
    open
}

/// True if a TCP connection completes within `limit`. The connection is
/// closed straight away.
async fn probe_port(addr: SocketAddr, limit: Duration) -> bool {
    matches!(timeout(limit, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_monitor_config() {
        let opts = ScanOptions::default();
        let config = MonitorConfig::default();
        assert_eq!(opts.timeout, config.scan_timeout());
        assert_eq!(opts.concurrency, config.scan_concurrency);

        let tuned = MonitorConfig {
            scan_timeout_ms: 250,
            scan_concurrency: 8,
            ..MonitorConfig::default()
        };
        let opts = ScanOptions::from(&tuned);
        assert_eq!(opts.timeout, Duration::from_millis(250));
        assert_eq!(opts.concurrency, 8);
    }
}
