//! Timing and sizing knobs for the monitors. Loaded from the `monitor`
//! section of the config file; a few can be overridden via `SYSMON_*` env vars.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sample_interval_ms: u64,
    pub view_interval_ms: u64,
    pub ping_interval_ms: u64,
    pub ping_count: u32,
    pub scan_timeout_ms: u64,
    /// Dial attempts in flight at once during a port scan.
    pub scan_concurrency: usize,
    pub scan_first_port: u16,
    pub scan_last_port: u16,
    pub traceroute_max_hops: u8,
    pub traceroute_wait_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 5_000,
            view_interval_ms: 7_000,
            ping_interval_ms: 4_000,
            ping_count: 3,
            scan_timeout_ms: 1_000,
            scan_concurrency: 512,
            scan_first_port: 1,
            scan_last_port: 65_535,
            traceroute_max_hops: 30,
            traceroute_wait_secs: 1,
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl MonitorConfig {
    /// Apply `SYSMON_*` overrides on top of the current values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_u64("SYSMON_SAMPLE_INTERVAL_MS") {
            self.sample_interval_ms = v;
        }
        if let Some(v) = env_u64("SYSMON_VIEW_INTERVAL_MS") {
            self.view_interval_ms = v;
        }
        if let Some(v) = env_u64("SYSMON_PING_INTERVAL_MS") {
            self.ping_interval_ms = v;
        }
        if let Some(v) = env_u64("SYSMON_SCAN_TIMEOUT_MS") {
            self.scan_timeout_ms = v;
        }
        if let Some(v) = env_u64("SYSMON_SCAN_CONCURRENCY") {
            self.scan_concurrency = v as usize;
        }
        self
    }

    // Zero intervals would spin; clamp to 1ms.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }

    pub fn view_interval(&self) -> Duration {
        Duration::from_millis(self.view_interval_ms.max(1))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms.max(1))
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms.max(1))
    }

    pub fn scan_ports(&self) -> RangeInclusive<u16> {
        self.scan_first_port.max(1)..=self.scan_last_port
    }
}
