//! Process collection using sysinfo (plus /proc on Linux for threads and sockets).

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

use crate::connections::SocketTable;
use crate::error::{Error, Result};
use crate::types::Entity;

/// Source of live process records for the sampler. Implementations block.
pub trait ProcessSource: Send + 'static {
    /// Enumerate all live processes. An unreadable attribute of one process
    /// is left at its zero value; only a failure to list processes at all is
    /// an error.
    fn collect(&mut self) -> Result<Vec<Entity>>;
}

/// Live system processes. Keeps one `System` across ticks so per-process CPU%
/// is computed over the interval between two samples.
pub struct SystemSource {
    sys: System,
}

impl SystemSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh_kind());
        Self { sys }
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
fn refresh_kind() -> ProcessRefreshKind {
    // thread counts are read from /proc/<pid>/status instead of task lists
    ProcessRefreshKind::nothing().with_cpu().with_memory()
}

#[cfg(not(target_os = "linux"))]
fn refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing()
        .with_cpu()
        .with_memory()
        .with_tasks()
}

impl ProcessSource for SystemSource {
    fn collect(&mut self) -> Result<Vec<Entity>> {
        self.sys.refresh_memory();
        self.sys
            .refresh_processes_specifics(ProcessesToUpdate::All, true, refresh_kind());

        let procs = self.sys.processes();
        if procs.is_empty() {
            return Err(Error::Enumerate("process table is empty".into()));
        }

        let total_mem = self.sys.total_memory();
        let sockets = SocketTable::load();
        debug!(processes = procs.len(), sockets = sockets.len(), "collected process table");

        let entities = procs
            .values()
            .map(|p| {
                let pid = p.pid().as_u32();
                let memory_percent = if total_mem > 0 {
                    (p.memory() as f64 / total_mem as f64 * 100.0) as f32
                } else {
                    0.0
                };
                Entity {
                    name: p.name().to_string_lossy().into_owned(),
                    id: pid,
                    cpu_percent: p.cpu_usage(),
                    memory_percent,
                    thread_count: thread_count(p, pid).unwrap_or(0),
                    endpoints: sockets.endpoints_for(pid),
                }
            })
            .collect();
        Ok(entities)
    }
}

#[cfg(target_os = "linux")]
fn thread_count(_p: &sysinfo::Process, pid: u32) -> Option<u32> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    parse_threads(&status)
}

#[cfg(not(target_os = "linux"))]
fn thread_count(p: &sysinfo::Process, _pid: u32) -> Option<u32> {
    p.tasks().map(|t| t.len().max(1) as u32)
}

/// `Threads:` line of /proc/<pid>/status.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_threads(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|l| l.strip_prefix("Threads:"))
        .and_then(|v| v.trim().parse().ok())
}
