//! Network monitor views driven through the supervisor with scripted probes.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sysmon_core::console::Captured;
use sysmon_core::network_view::{NetworkViews, HOST_PROMPT};
use sysmon_core::probe::{Hop, HopProber, PingStats, Pinger};
use sysmon_core::supervisor::INVALID_OPTION;
use sysmon_core::{start_network_monitor, Console, Error, MonitorConfig, Result};
use tokio::io::{duplex, AsyncWriteExt, BufReader, DuplexStream};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

struct ScriptedPinger {
    calls: Arc<AtomicU32>,
    fail: bool,
}

#[async_trait]
impl Pinger for ScriptedPinger {
    async fn ping(&self, host: &str, count: u32) -> Result<PingStats> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Probe {
                tool: "ping",
                reason: format!("{host}: Name or service not known"),
            });
        }
        Ok(PingStats {
            transmitted: count,
            received: count - 1,
        })
    }
}

struct ScriptedProber {
    hops: Vec<Hop>,
    fail: bool,
}

#[async_trait]
impl HopProber for ScriptedProber {
    async fn trace(&self, _target: IpAddr, tx: mpsc::Sender<Hop>) -> Result<()> {
        for hop in &self.hops {
            let _ = tx.send(hop.clone()).await;
        }
        if self.fail {
            return Err(Error::Probe {
                tool: "traceroute",
                reason: "network is unreachable".into(),
            });
        }
        Ok(())
    }
}

fn views(
    console: Console,
    config: &MonitorConfig,
    ping_fails: bool,
    prober: ScriptedProber,
) -> (NetworkViews, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let pinger = ScriptedPinger {
        calls: calls.clone(),
        fail: ping_fails,
    };
    (
        NetworkViews::with_probes(console, config, Arc::new(pinger), Arc::new(prober)),
        calls,
    )
}

fn no_hops() -> ScriptedProber {
    ScriptedProber {
        hops: Vec::new(),
        fail: false,
    }
}

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        ping_interval_ms: 20,
        ..MonitorConfig::default()
    }
}

async fn wait_until(out: &Captured, what: impl Fn(&str) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let text = out.contents();
        if what(&text) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out, output so far:\n{text}");
        sleep(Duration::from_millis(5)).await;
    }
}

async fn send(tx: &mut DuplexStream, text: &str) {
    tx.write_all(text.as_bytes()).await.unwrap();
}

#[tokio::test]
async fn ping_loop_reports_until_exit() {
    let (console, out) = Console::capture();
    let (views, calls) = views(console.clone(), &fast_config(), false, no_hops());
    let (mut tx, rx) = duplex(1024);
    let handle = start_network_monitor(views, BufReader::new(rx), console);

    send(&mut tx, "2\nexample.test\n").await;
    let line = "Packets transmitted: 3, packets received: 2, packet loss: 33.333333%";
    wait_until(&out, |t| t.matches(line).count() >= 2).await;
    assert!(out.contents().contains(HOST_PROMPT));

    send(&mut tx, "0\n").await;
    timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("monitor exits")
        .unwrap();

    sleep(Duration::from_millis(30)).await;
    let pinged = calls.load(Ordering::SeqCst);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), pinged, "ping loop kept running");
}

#[tokio::test]
async fn ping_failure_is_reported_not_fatal() {
    let (console, out) = Console::capture();
    let (views, calls) = views(console.clone(), &fast_config(), true, no_hops());
    let (mut tx, rx) = duplex(1024);
    let handle = start_network_monitor(views, BufReader::new(rx), console);

    send(&mut tx, "2\nbad.host\n").await;
    wait_until(&out, |t| t.contains("ping bad.host failed:")).await;
    assert!(out.contents().contains("Name or service not known"));

    // the failed worker ends and is not retried
    sleep(Duration::from_millis(80)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    send(&mut tx, "7\n").await;
    wait_until(&out, |t| t.contains(INVALID_OPTION)).await;
    send(&mut tx, "0\n").await;
    timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("monitor exits")
        .unwrap();
}

#[tokio::test]
async fn traceroute_prints_each_hop() {
    let (console, out) = Console::capture();
    let prober = ScriptedProber {
        hops: vec![
            Hop {
                ttl: 1,
                address: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
                host: Some("router".into()),
                elapsed: Some(Duration::from_micros(1500)),
            },
            Hop {
                ttl: 2,
                address: None,
                host: None,
                elapsed: None,
            },
            Hop {
                ttl: 3,
                address: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                host: None,
                elapsed: Some(Duration::from_millis(2)),
            },
        ],
        fail: false,
    };
    let (views, _) = views(console.clone(), &fast_config(), false, prober);
    let (mut tx, rx) = duplex(1024);
    let handle = start_network_monitor(views, BufReader::new(rx), console);

    send(&mut tx, "3\n127.0.0.1\n").await;
    wait_until(&out, |t| t.contains("127.0.0.1 (127.0.0.1)")).await;
    let text = out.contents();
    assert!(text.contains("1   router (10.0.0.1)  1.5ms\n2   *\n3   127.0.0.1 (127.0.0.1)  2ms\n"));

    send(&mut tx, "0\n").await;
    timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("monitor exits")
        .unwrap();
}

#[tokio::test]
async fn traceroute_probe_error_is_reported() {
    let (console, out) = Console::capture();
    let prober = ScriptedProber {
        hops: Vec::new(),
        fail: true,
    };
    let (views, _) = views(console.clone(), &fast_config(), false, prober);
    let (mut tx, rx) = duplex(1024);
    let handle = start_network_monitor(views, BufReader::new(rx), console);

    send(&mut tx, "3\n127.0.0.1\n").await;
    wait_until(&out, |t| t.contains("Error: traceroute failed: network is unreachable")).await;

    send(&mut tx, "0\n").await;
    timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("monitor exits")
        .unwrap();
}

#[tokio::test]
async fn port_scan_view_reports_open_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = MonitorConfig {
        scan_first_port: port,
        scan_last_port: port,
        scan_timeout_ms: 500,
        ..MonitorConfig::default()
    };

    let (console, out) = Console::capture();
    let (views, _) = views(console.clone(), &config, false, no_hops());
    let (mut tx, rx) = duplex(1024);
    let handle = start_network_monitor(views, BufReader::new(rx), console);

    send(&mut tx, "1\n127.0.0.1\n").await;
    wait_until(&out, |t| t.contains(&format!("Port {port} is open"))).await;

    send(&mut tx, "0\n").await;
    timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("monitor exits")
        .unwrap();
}
