//! Port scan against loopback listeners.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use sysmon_core::scan::{scan_ports, ScanOptions};
use sysmon_core::Console;
use tokio::net::TcpListener;

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn reports_only_the_listening_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap().port();
    let mut ports = vec![open];
    for _ in 0..4 {
        ports.push(free_port().await);
    }

    let (console, out) = Console::capture();
    let opts = ScanOptions {
        timeout: Duration::from_millis(500),
        concurrency: 2,
    };
    let found = scan_ports(IpAddr::V4(Ipv4Addr::LOCALHOST), ports, opts, &console).await;

    assert_eq!(found, vec![open]);
    let text = out.contents();
    assert_eq!(text.matches(" is open").count(), 1);
    assert!(text.contains(&format!("Port {open} is open\n")));
}

#[tokio::test]
async fn empty_range_finishes_silently() {
    let (console, out) = Console::capture();
    let found = scan_ports(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        std::iter::empty(),
        ScanOptions::default(),
        &console,
    )
    .await;
    assert!(found.is_empty());
    assert!(out.contents().is_empty());
}
