//! Per-process socket endpoints.
//!
//! Linux: sockets come from /proc/net/{tcp,tcp6,udp,udp6} keyed by inode, and
//! are attributed to a process through the `socket:[inode]` links under
//! /proc/<pid>/fd. Other platforms report no endpoints.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::types::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Proto {
    Tcp,
    Udp,
}

/// Sockets visible to this process for one sampling tick.
#[derive(Debug, Default)]
pub struct SocketTable {
    by_inode: HashMap<u64, Endpoint>,
}

impl SocketTable {
    /// Read the system socket tables. Unreadable tables are skipped.
    #[cfg(target_os = "linux")]
    pub fn load() -> Self {
        let mut by_inode = HashMap::new();
        for (path, proto) in [
            ("/proc/net/tcp", Proto::Tcp),
            ("/proc/net/tcp6", Proto::Tcp),
            ("/proc/net/udp", Proto::Udp),
            ("/proc/net/udp6", Proto::Udp),
        ] {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    // first line is the column header
                    for line in content.lines().skip(1) {
                        if let Some((inode, ep)) = parse_socket_line(line, proto) {
                            by_inode.insert(inode, ep);
                        }
                    }
                }
                Err(e) => tracing::debug!("skipping {path}: {e}"),
            }
        }
        Self { by_inode }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn load() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_inode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_inode.is_empty()
    }

    /// Endpoints owned by `pid`, in file-descriptor order. Empty when the
    /// fd directory is unreadable (process gone, or owned by another user).
    #[cfg(target_os = "linux")]
    pub fn endpoints_for(&self, pid: u32) -> Vec<Endpoint> {
        if self.by_inode.is_empty() {
            return Vec::new();
        }
        let Ok(dir) = std::fs::read_dir(format!("/proc/{pid}/fd")) else {
            return Vec::new();
        };
        let mut fds: Vec<(u32, u64)> = dir
            .flatten()
            .filter_map(|entry| {
                let fd = entry.file_name().to_str()?.parse::<u32>().ok()?;
                let link = std::fs::read_link(entry.path()).ok()?;
                let inode = socket_inode(link.to_str()?)?;
                Some((fd, inode))
            })
            .collect();
        fds.sort_unstable();
        fds.into_iter()
            .filter_map(|(_, inode)| self.by_inode.get(&inode).cloned())
            .collect()
    }

    #[cfg(not(target_os = "linux"))]
    pub fn endpoints_for(&self, _pid: u32) -> Vec<Endpoint> {
        Vec::new()
    }
}

/// `socket:[12345]` -> 12345
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// One row of /proc/net/{tcp,udp}[6]:
/// `sl local_address rem_address st tx_queue:rx_queue tr:tm->when retrnsmt uid timeout inode ...`
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_socket_line(line: &str, proto: Proto) -> Option<(u64, Endpoint)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return None;
    }
    let (local, local_port) = parse_hex_addr(fields[1])?;
    let (remote, remote_port) = parse_hex_addr(fields[2])?;
    let st = u8::from_str_radix(fields[3], 16).ok()?;
    let inode: u64 = fields[9].parse().ok()?;
    if inode == 0 {
        return None;
    }
    let state = match proto {
        Proto::Tcp => tcp_state_name(st),
        Proto::Udp => "NONE",
    };
    Some((
        inode,
        Endpoint {
            local_address: local.to_string(),
            local_port,
            remote_address: remote.to_string(),
            remote_port,
            state: state.to_string(),
        },
    ))
}

/// `0100007F:1F90` -> 127.0.0.1:8080. Address words are printed by the kernel
/// in host byte order.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_hex_addr(s: &str) -> Option<(IpAddr, u16)> {
    let (addr_hex, port_hex) = s.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let addr = match addr_hex.len() {
        8 => {
            let word = u32::from_str_radix(addr_hex, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(word.to_ne_bytes()))
        }
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
                let word = u32::from_str_radix(addr_hex.get(i * 8..i * 8 + 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };
    Some((addr, port))
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn tcp_state_name(state: u8) -> &'static str {
    match state {
        0x01 => "ESTABLISHED",
        0x02 => "SYN_SENT",
        0x03 => "SYN_RECV",
        0x04 => "FIN_WAIT1",
        0x05 => "FIN_WAIT2",
        0x06 => "TIME_WAIT",
        0x07 => "CLOSE",
        0x08 => "CLOSE_WAIT",
        0x09 => "LAST_ACK",
        0x0A => "LISTEN",
        0x0B => "CLOSING",
        _ => "UNKNOWN",
    }
}
