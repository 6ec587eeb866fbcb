//! Network probe collaborators: host resolution, ICMP echo bursts and hop
//! probing. The default implementations drive the system `ping` and
//! `traceroute` binaries (which carry the raw-socket privileges) and parse
//! their output.

use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};

/// Resolve `host` to one address, preferring IPv4.
pub async fn resolve_host(host: &str) -> Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let resolve_err = |reason: String| Error::Resolve {
        host: host.to_string(),
        reason,
    };
    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| resolve_err(e.to_string()))?
        .map(|sa| sa.ip())
        .collect();
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| resolve_err("no addresses found".into()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingStats {
    pub transmitted: u32,
    pub received: u32,
}

impl PingStats {
    pub fn loss_percent(&self) -> f64 {
        if self.transmitted == 0 {
            return 0.0;
        }
        let lost = self.transmitted.saturating_sub(self.received);
        f64::from(lost) / f64::from(self.transmitted) * 100.0
    }
}

/// One traceroute hop as reported by the prober.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub ttl: u8,
    pub address: Option<IpAddr>,
    /// Reverse-resolved name, when it differs from the address.
    pub host: Option<String>,
    pub elapsed: Option<Duration>,
}

impl Hop {
    pub fn success(&self) -> bool {
        self.address.is_some()
    }

    /// `ttl host (addr)  elapsed` or `ttl *`.
    pub fn render(&self) -> String {
        match self.address {
            Some(addr) => {
                let addr = addr.to_string();
                let name = self.host.as_deref().unwrap_or(&addr);
                let elapsed = self.elapsed.unwrap_or_default();
                format!("{:<3} {} ({})  {:?}", self.ttl, name, addr, elapsed)
            }
            None => format!("{:<3} *", self.ttl),
        }
    }
}

#[async_trait]
pub trait Pinger: Send + Sync {
    /// Send `count` echo requests to `host` and wait for the burst to finish.
    async fn ping(&self, host: &str, count: u32) -> Result<PingStats>;
}

#[async_trait]
pub trait HopProber: Send + Sync {
    /// Probe with increasing hop limits, sending each hop as it arrives.
    /// Returns once the destination is reached or probing gives up.
    async fn trace(&self, target: IpAddr, hops: mpsc::Sender<Hop>) -> Result<()>;
}

/// `ping -c <count>` from the host system.
#[derive(Debug, Default, Clone)]
pub struct SystemPing;

#[async_trait]
impl Pinger for SystemPing {
    async fn ping(&self, host: &str, count: u32) -> Result<PingStats> {
        let mut cmd = Command::new("ping");
        cmd.arg("-c").arg(count.max(1).to_string());
        // per-reply wait in seconds; BSD ping spells this differently
        #[cfg(target_os = "linux")]
        cmd.arg("-W").arg("1");
        cmd.arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .map_err(|e| Error::probe("ping", format!("cannot run ping: {e}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        // non-zero exit with a summary just means replies were lost
        parse_ping_summary(&stdout).ok_or_else(|| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.trim();
            Error::probe(
                "ping",
                if reason.is_empty() {
                    format!("no statistics in output ({})", output.status)
                } else {
                    reason.to_string()
                },
            )
        })
    }
}

/// Parse `3 packets transmitted, 2 received, 33.3333% packet loss` (Linux)
/// or `3 packets transmitted, 3 packets received, 0.0% packet loss` (BSD).
fn parse_ping_summary(output: &str) -> Option<PingStats> {
    let line = output.lines().find(|l| l.contains("packets transmitted"))?;
    let mut parts = line.split(',');
    let transmitted = leading_number(parts.next()?)?;
    let received = leading_number(parts.next()?)?;
    Some(PingStats {
        transmitted,
        received,
    })
}

fn leading_number(s: &str) -> Option<u32> {
    s.split_whitespace().next()?.parse().ok()
}

/// `traceroute -q 1` from the host system.
#[derive(Debug, Clone)]
pub struct SystemTraceroute {
    pub max_hops: u8,
    pub wait_secs: u64,
}

impl Default for SystemTraceroute {
    fn default() -> Self {
        Self {
            max_hops: 30,
            wait_secs: 1,
        }
    }
}

#[async_trait]
impl HopProber for SystemTraceroute {
    async fn trace(&self, target: IpAddr, hops: mpsc::Sender<Hop>) -> Result<()> {
        let mut child = Command::new("traceroute")
            .arg("-q")
            .arg("1")
            .arg("-w")
            .arg(self.wait_secs.max(1).to_string())
            .arg("-m")
            .arg(self.max_hops.max(1).to_string())
            .arg(target.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::probe("traceroute", format!("cannot run traceroute: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::probe("traceroute", "stdout not captured"))?;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_hop_line(&line) {
                Some(hop) => {
                    if hops.send(hop).await.is_err() {
                        debug!("hop receiver dropped, stopping traceroute");
                        break;
                    }
                }
                None => debug!("ignoring traceroute line: {line}"),
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut err) = child.stderr.take() {
                let _ = err.read_to_string(&mut stderr).await;
            }
            let reason = stderr.trim();
            return Err(Error::probe(
                "traceroute",
                if reason.is_empty() {
                    status.to_string()
                } else {
                    reason.to_string()
                },
            ));
        }
        Ok(())
    }
}

/// Parse one hop line of `traceroute -q 1` output:
/// ` 1  gateway (192.168.1.1)  0.512 ms`, ` 3  10.0.0.1  3.100 ms` or ` 2  *`.
/// The `traceroute to ...` banner and other lines yield `None`.
fn parse_hop_line(line: &str) -> Option<Hop> {
    let mut tokens = line.split_whitespace();
    let ttl: u8 = tokens.next()?.parse().ok()?;
    let first = tokens.next()?;
    if first == "*" {
        return Some(Hop {
            ttl,
            address: None,
            host: None,
            elapsed: None,
        });
    }

    let rest: Vec<&str> = tokens.collect();
    let (address, host, after) = match rest.first() {
        Some(tok) if tok.starts_with('(') && tok.ends_with(')') => {
            let addr: IpAddr = tok.trim_matches(|c| c == '(' || c == ')').parse().ok()?;
            let host = (first != addr.to_string()).then(|| first.to_string());
            (addr, host, &rest[1..])
        }
        _ => (first.parse().ok()?, None, &rest[..]),
    };
    let elapsed = match after {
        [ms, unit, ..] if *unit == "ms" => ms
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| Duration::from_nanos((v * 1_000_000.0).round() as u64)),
        _ => None,
    };
    Some(Hop {
        ttl,
        address: Some(address),
        host,
        elapsed,
    })
}
