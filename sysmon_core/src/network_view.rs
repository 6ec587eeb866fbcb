//! Network views: port scan, ping loop and traceroute.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::console::Console;
use crate::probe::{resolve_host, Hop, HopProber, Pinger, SystemPing, SystemTraceroute};
use crate::scan::{scan_ports, ScanOptions};
use crate::supervisor::{Selection, ViewSet};

pub const NETWORK_PROMPT: &str =
    "Enter option to sort. 0: exit, 1: scan port, 2: ping host, 3: traceroute => ";
pub const HOST_PROMPT: &str = "Enter host => ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkView {
    ScanPorts(String),
    Ping(String),
    Traceroute(String),
}

/// View workers of the network monitor.
///
/// Ping loops stop at their next interval once cancelled. Traceroute and port
/// scans run to completion; they are bounded by the per-hop wait and the dial
/// timeout respectively.
pub struct NetworkViews {
    console: Console,
    pinger: Arc<dyn Pinger>,
    prober: Arc<dyn HopProber>,
    ping_count: u32,
    ping_interval: Duration,
    scan: ScanOptions,
    scan_ports: RangeInclusive<u16>,
}

impl NetworkViews {
    /// Views backed by the system `ping` and `traceroute` tools.
    pub fn new(console: Console, config: &MonitorConfig) -> Self {
        let prober = SystemTraceroute {
            max_hops: config.traceroute_max_hops,
            wait_secs: config.traceroute_wait_secs,
        };
        Self::with_probes(console, config, Arc::new(SystemPing), Arc::new(prober))
    }

    pub fn with_probes(
        console: Console,
        config: &MonitorConfig,
        pinger: Arc<dyn Pinger>,
        prober: Arc<dyn HopProber>,
    ) -> Self {
        Self {
            console,
            pinger,
            prober,
            ping_count: config.ping_count,
            ping_interval: config.ping_interval(),
            scan: ScanOptions::from(config),
            scan_ports: config.scan_ports(),
        }
    }
}

impl ViewSet for NetworkViews {
    type Request = NetworkView;

    fn prompt(&self) -> &'static str {
        NETWORK_PROMPT
    }

    fn select(&self, selector: u32) -> Option<Selection<NetworkView>> {
        let build: fn(String) -> NetworkView = match selector {
            0 => return Some(Selection::Exit),
            1 => NetworkView::ScanPorts,
            2 => NetworkView::Ping,
            3 => NetworkView::Traceroute,
            _ => return None,
        };
        Some(Selection::Ask {
            prompt: HOST_PROMPT,
            build,
        })
    }

    fn launch(&self, view: NetworkView, gate: CancellationToken) -> JoinHandle<()> {
        let console = self.console.clone();
        match view {
            NetworkView::Ping(host) => tokio::spawn(ping_loop(
                host,
                self.pinger.clone(),
                self.ping_count,
                self.ping_interval,
                console,
                gate,
            )),
            NetworkView::Traceroute(host) => {
                tokio::spawn(traceroute(host, self.prober.clone(), console))
            }
            NetworkView::ScanPorts(host) => {
                tokio::spawn(port_scan(host, self.scan_ports.clone(), self.scan, console))
            }
        }
    }
}

async fn ping_loop(
    host: String,
    pinger: Arc<dyn Pinger>,
    count: u32,
    period: Duration,
    console: Console,
    gate: CancellationToken,
) {
    loop {
        if gate.is_cancelled() {
            break;
        }
        match pinger.ping(&host, count).await {
            Ok(stats) => {
                if gate.is_cancelled() {
                    break;
                }
                console.line(format!(
                    "Packets transmitted: {}, packets received: {}, packet loss: {:.6}%",
                    stats.transmitted,
                    stats.received,
                    stats.loss_percent()
                ));
            }
            Err(e) => {
                warn!("ping {host}: {e}");
                console.line(format!("ping {host} failed: {e}"));
                return;
            }
        }
        tokio::select! {
            _ = gate.cancelled() => break,
            _ = sleep(period) => {}
        }
    }
    debug!("ping loop for {host} stopped");
}

async fn traceroute(host: String, prober: Arc<dyn HopProber>, console: Console) {
    let target = match resolve_host(&host).await {
        Ok(ip) => ip,
        Err(e) => {
            console.line(format!("Failed to resolve IP address: {e}"));
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel::<Hop>(16);
    let printer = {
        let console = console.clone();
        tokio::spawn(async move {
            while let Some(hop) = rx.recv().await {
                console.line(hop.render());
            }
        })
    };

    if let Err(e) = prober.trace(target, tx).await {
        console.line(format!("Error: {e}"));
    }
    // sender is gone once trace returns; printer drains what is left
    let _ = printer.await;
    console.line("");
}

async fn port_scan(host: String, ports: RangeInclusive<u16>, opts: ScanOptions, console: Console) {
    let addr = match resolve_host(&host).await {
        Ok(ip) => ip,
        Err(e) => {
            console.line(format!("Failed to resolve IP address: {e}"));
            return;
        }
    };
    info!(%addr, first = ports.start(), last = ports.end(), "port scan started");
    let open = scan_ports(addr, ports, opts, &console).await;
    info!(%addr, open = open.len(), "port scan finished");
}
