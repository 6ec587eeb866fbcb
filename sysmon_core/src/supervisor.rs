//! Command supervisor: reads operator selections and keeps at most one view
//! worker running.
//!
//! The running worker is held as an [`ActiveView`] owned by the supervisor
//! loop alone. Replacing it cancels the old gate and drops the join handle
//! without waiting; the new worker always gets a fresh gate.

use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::console::Console;
use crate::error::Result;

pub const INVALID_OPTION: &str = "Invalid input. Please enter a valid option.";

/// What a numeric selector maps to.
pub enum Selection<R> {
    Exit,
    Start(R),
    /// Needs one more line of input (trimmed) to build the request.
    Ask {
        prompt: &'static str,
        build: fn(String) -> R,
    },
}

/// A family of view workers a supervisor can start.
pub trait ViewSet: Send + Sync + 'static {
    type Request: fmt::Debug + Send + 'static;

    fn prompt(&self) -> &'static str;

    /// `None` for selectors outside the recognised range.
    fn select(&self, selector: u32) -> Option<Selection<Self::Request>>;

    /// Start a worker for `request`. It must stop at its next polling
    /// boundary once `gate` is cancelled (one-shot variants may ignore it).
    fn launch(&self, request: Self::Request, gate: CancellationToken) -> JoinHandle<()>;
}

struct ActiveView {
    gate: CancellationToken,
    task: JoinHandle<()>,
}

pub struct Supervisor<V: ViewSet> {
    views: V,
    console: Console,
    stop: CancellationToken,
    active: Option<ActiveView>,
}

impl<V: ViewSet> Supervisor<V> {
    /// `stop` is the monitor-wide signal; it is cancelled when the supervisor
    /// exits and may be cancelled from outside to end the supervisor.
    pub fn new(views: V, console: Console, stop: CancellationToken) -> Self {
        Self {
            views,
            console,
            stop,
            active: None,
        }
    }

    /// Serve operator input until `exit`, end of input, or an external stop.
    /// The active worker's gate and the monitor stop signal are always
    /// cancelled on return.
    pub async fn run<R: AsyncBufRead + Unpin>(mut self, mut input: R) -> Result<()> {
        let result = self.serve(&mut input).await;
        self.shutdown();
        result
    }

    async fn serve<R: AsyncBufRead + Unpin>(&mut self, input: &mut R) -> Result<()> {
        loop {
            self.console.print(self.views.prompt());
            let Some(line) = self.next_line(input).await? else {
                return Ok(());
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let selection = trimmed
                .parse::<u32>()
                .ok()
                .and_then(|n| self.views.select(n));
            let request = match selection {
                None => {
                    self.console.line(INVALID_OPTION);
                    continue;
                }
                Some(Selection::Exit) => {
                    info!("exit requested");
                    return Ok(());
                }
                Some(Selection::Start(request)) => {
                    self.retire_active();
                    request
                }
                Some(Selection::Ask { prompt, build }) => {
                    self.retire_active();
                    self.console.line("");
                    self.console.print(prompt);
                    let Some(arg) = self.next_line(input).await? else {
                        return Ok(());
                    };
                    build(arg.trim().to_string())
                }
            };
            self.start(request);
        }
    }

    /// Next operator line; `None` on end of input or external stop. Bytes
    /// that are not UTF-8 are replaced, so they fail selector parsing like
    /// any other bad input.
    async fn next_line<R: AsyncBufRead + Unpin>(&self, input: &mut R) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let read = tokio::select! {
            _ = self.stop.cancelled() => {
                debug!("monitor stopped while waiting for input");
                return Ok(None);
            }
            read = input.read_until(b'\n', &mut buf) => read?,
        };
        if read == 0 {
            info!("operator input closed");
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn start(&mut self, request: V::Request) {
        debug!(?request, "starting view");
        let gate = self.stop.child_token();
        let task = self.views.launch(request, gate.clone());
        self.active = Some(ActiveView { gate, task });
    }

    /// Signal the running worker, if any, without waiting for it.
    fn retire_active(&mut self) {
        if let Some(old) = self.active.take() {
            if !old.task.is_finished() {
                debug!("cancelling previous view");
            }
            old.gate.cancel();
        }
    }

    fn shutdown(&mut self) {
        self.retire_active();
        self.stop.cancel();
    }
}
