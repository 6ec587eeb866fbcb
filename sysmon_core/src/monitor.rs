//! Process and network monitors: a supervisor over operator input plus, for
//! processes, the background sampler feeding it.

use tokio::io::AsyncBufRead;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::MonitorConfig;
use crate::console::Console;
use crate::error::Result;
use crate::metrics::ProcessSource;
use crate::network_view::NetworkViews;
use crate::process_view::ProcessViews;
use crate::sampler::spawn_sampler;
use crate::state::SnapshotStore;
use crate::supervisor::{Supervisor, ViewSet};

/// A running monitor.
pub struct MonitorHandle {
    stop: CancellationToken,
    supervisor: JoinHandle<Result<()>>,
    sampler: Option<JoinHandle<()>>,
    store: Option<SnapshotStore>,
}

impl MonitorHandle {
    /// Ask the whole monitor to stop; the supervisor leaves its prompt and
    /// cancels the active view.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Snapshot store of a process monitor.
    pub fn store(&self) -> Option<&SnapshotStore> {
        self.store.as_ref()
    }

    /// Wait for the supervisor to exit, then for the sampler.
    pub async fn wait(self) -> Result<()> {
        let result = self.supervisor.await?;
        if let Some(sampler) = self.sampler {
            if let Err(e) = sampler.await {
                warn!("sampler task ended abnormally: {e}");
            }
        }
        result
    }
}

fn spawn_supervisor<V, R>(views: V, console: Console, stop: CancellationToken, input: R) -> JoinHandle<Result<()>>
where
    V: ViewSet,
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(Supervisor::new(views, console, stop).run(input))
}

/// Start sampling `source` and serving the process views over `input`.
pub fn start_process_monitor<S, R>(
    source: S,
    input: R,
    console: Console,
    config: &MonitorConfig,
) -> MonitorHandle
where
    S: ProcessSource,
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let stop = CancellationToken::new();
    let store = SnapshotStore::new();
    let sampler = spawn_sampler(source, store.clone(), config.sample_interval(), stop.clone());
    let views = ProcessViews::new(store.clone(), console.clone(), config.view_interval());
    let supervisor = spawn_supervisor(views, console, stop.clone(), input);
    MonitorHandle {
        stop,
        supervisor,
        sampler: Some(sampler),
        store: Some(store),
    }
}

/// Serve the network views over `input`.
pub fn start_network_monitor<R>(views: NetworkViews, input: R, console: Console) -> MonitorHandle
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let stop = CancellationToken::new();
    let supervisor = spawn_supervisor(views, console, stop.clone(), input);
    MonitorHandle {
        stop,
        supervisor,
        sampler: None,
        store: None,
    }
}
