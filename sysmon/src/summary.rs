//! Whole-host summary printed when no subcommand is given.

use std::path::Path;
use std::time::Duration;

use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use sysmon_core::Console;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Window each CPU reading is averaged over.
const CPU_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostUsage {
    pub cpu: Option<f32>,
    pub memory: Option<f64>,
    pub disk: Option<f64>,
}

impl HostUsage {
    pub fn render(&self) -> String {
        format!(
            "CPU: {}, Memory: {}, Disk: {} ",
            percent(self.cpu.map(f64::from)),
            percent(self.memory),
            percent(self.disk)
        )
    }
}

fn percent(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.2}%"),
        None => "N/A".into(),
    }
}

fn used_percent(used: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| used as f64 / total as f64 * 100.0)
}

struct HostSampler {
    sys: System,
    disks: Disks,
}

impl HostSampler {
    fn new() -> Self {
        let mut sys = System::new();
        // prime the counters so the first window has a baseline
        sys.refresh_cpu_usage();
        Self {
            sys,
            disks: Disks::new_with_refreshed_list(),
        }
    }

    /// Finish a CPU window started by the previous refresh and read the rest.
    fn finish(&mut self) -> HostUsage {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        self.disks.refresh(true);

        let cpu = (!self.sys.cpus().is_empty()).then(|| self.sys.global_cpu_usage());
        let memory = used_percent(self.sys.used_memory(), self.sys.total_memory());
        let disk = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .and_then(|d| used_percent(d.total_space().saturating_sub(d.available_space()), d.total_space()));
        if disk.is_none() {
            warn!("no root filesystem in disk list");
        }
        HostUsage { cpu, memory, disk }
    }
}

/// Print one summary line per CPU window until `stop` fires.
pub async fn run(console: Console, stop: CancellationToken) {
    let mut sampler = HostSampler::new();
    let window = CPU_WINDOW.max(MINIMUM_CPU_UPDATE_INTERVAL);
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = sleep(window) => {}
        }
        let usage = sampler.finish();
        console.line(usage.render());
    }
    debug!("summary loop stopped");
}
