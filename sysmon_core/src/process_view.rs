//! Process views: sorted and filtered tables redrawn on a fixed period.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::console::Console;
use crate::state::SnapshotStore;
use crate::supervisor::{Selection, ViewSet};
use crate::types::{Entity, Snapshot};

pub const PROCESS_PROMPT: &str =
    "Enter option to sort. 0: exit, 1: CPU usage, 2: Memory usage, 3: Name, 4: Find process => ";
pub const FILTER_PROMPT: &str = "Enter process name to filter => ";

const RULE: &str = "-----------------------------------------------------------";
const HEADER: &str = "Name\t\tPID\tCPU%\tMemory%\tThreads\tLocal Address\tRemote Address";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessView {
    SortByCpu,
    SortByMemory,
    SortByName,
    /// Case-sensitive substring match on the process name.
    Filter(String),
}

impl ProcessView {
    /// Rows for this view over one snapshot. Sorts are stable, so ties keep
    /// snapshot order; filtering keeps snapshot order.
    pub fn apply<'a>(&self, snapshot: &'a Snapshot) -> Vec<&'a Entity> {
        let mut rows: Vec<&Entity> = snapshot.iter().collect();
        match self {
            ProcessView::SortByCpu => rows.sort_by(|a, b| desc(a.cpu_percent, b.cpu_percent)),
            ProcessView::SortByMemory => {
                rows.sort_by(|a, b| desc(a.memory_percent, b.memory_percent))
            }
            ProcessView::SortByName => rows.sort_by(|a, b| a.name.cmp(&b.name)),
            ProcessView::Filter(needle) => rows.retain(|e| e.name.contains(needle.as_str())),
        }
        rows
    }
}

// NaN readings sort last
fn desc(a: f32, b: f32) -> Ordering {
    let key = |v: f32| if v.is_nan() { f32::NEG_INFINITY } else { v };
    key(b).total_cmp(&key(a))
}

/// The process table, rule lines included, as one block of text.
pub fn render_table(rows: &[&Entity]) -> String {
    let mut out = String::with_capacity(128 + rows.len() * 96);
    out.push_str(RULE);
    out.push('\n');
    out.push_str(HEADER);
    out.push('\n');
    out.push_str(RULE);
    out.push('\n');
    for e in rows {
        let _ = write!(
            out,
            "{}\t{}\t{:.2}\t{:.2}\t{}\t",
            e.name, e.id, e.cpu_percent, e.memory_percent, e.thread_count
        );
        if e.endpoints.is_empty() {
            out.push_str("N/A");
        } else {
            for (i, ep) in e.endpoints.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(
                    out,
                    "{}:{} → {}:{}",
                    ep.local_address, ep.local_port, ep.remote_address, ep.remote_port
                );
            }
        }
        out.push('\n');
    }
    out.push_str(RULE);
    out
}

/// View workers of the process monitor.
pub struct ProcessViews {
    store: SnapshotStore,
    console: Console,
    period: Duration,
}

impl ProcessViews {
    pub fn new(store: SnapshotStore, console: Console, period: Duration) -> Self {
        Self {
            store,
            console,
            period,
        }
    }
}

impl ViewSet for ProcessViews {
    type Request = ProcessView;

    fn prompt(&self) -> &'static str {
        PROCESS_PROMPT
    }

    fn select(&self, selector: u32) -> Option<Selection<ProcessView>> {
        match selector {
            0 => Some(Selection::Exit),
            1 => Some(Selection::Start(ProcessView::SortByCpu)),
            2 => Some(Selection::Start(ProcessView::SortByMemory)),
            3 => Some(Selection::Start(ProcessView::SortByName)),
            4 => Some(Selection::Ask {
                prompt: FILTER_PROMPT,
                build: ProcessView::Filter,
            }),
            _ => None,
        }
    }

    fn launch(&self, view: ProcessView, gate: CancellationToken) -> JoinHandle<()> {
        let store = self.store.clone();
        let console = self.console.clone();
        let period = self.period;
        tokio::spawn(async move {
            loop {
                if gate.is_cancelled() {
                    break;
                }
                let snapshot = store.read();
                let table = render_table(&view.apply(&snapshot));
                if gate.is_cancelled() {
                    break;
                }
                console.line(table);
                tokio::select! {
                    _ = gate.cancelled() => break,
                    _ = sleep(period) => {}
                }
            }
            debug!(?view, "process view stopped");
        })
    }
}
