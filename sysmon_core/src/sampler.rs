//! Background sampler: periodically collects the process table and installs
//! it into the snapshot store, so view workers only ever read.

use tokio::task::{spawn_blocking, JoinHandle};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::metrics::ProcessSource;
use crate::state::SnapshotStore;
use crate::types::Snapshot;

/// Spawn the sampling loop. The first tick fires immediately; the loop ends
/// when `stop` is cancelled, checked before each collection and again before
/// installing its result.
pub fn spawn_sampler<S: ProcessSource>(
    mut source: S,
    store: SnapshotStore,
    period: Duration,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if stop.is_cancelled() {
                break;
            }

            // sysinfo and /proc reads block; keep them off the async workers
            let collected = spawn_blocking(move || {
                let result = source.collect();
                (source, result)
            })
            .await;
            let result = match collected {
                Ok((back, result)) => {
                    source = back;
                    result
                }
                Err(e) => {
                    error!("process collection panicked, sampler exiting: {e}");
                    return;
                }
            };

            match result {
                Ok(entities) => {
                    if stop.is_cancelled() {
                        break;
                    }
                    let snapshot: Snapshot = entities.into_iter().collect();
                    debug!(entities = snapshot.len(), "installing snapshot");
                    store.install(snapshot);
                }
                Err(e) => warn!("skipping sample: {e}"),
            }
        }
        debug!("sampler stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::types::Entity;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails on every odd call, otherwise returns one entity named after the call number.
    struct Flaky {
        calls: Arc<AtomicU32>,
    }

    impl ProcessSource for Flaky {
        fn collect(&mut self) -> Result<Vec<Entity>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 1 {
                return Err(Error::Enumerate("simulated".into()));
            }
            Ok(vec![Entity::new(1, format!("tick-{n}"))])
        }
    }

    #[tokio::test]
    async fn failed_ticks_keep_the_previous_snapshot() {
        let calls = Arc::new(AtomicU32::new(0));
        let store = SnapshotStore::new();
        let stop = CancellationToken::new();
        let handle = spawn_sampler(
            Flaky {
                calls: calls.clone(),
            },
            store.clone(),
            Duration::from_millis(5),
            stop.clone(),
        );

        while calls.load(Ordering::SeqCst) < 6 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        stop.cancel();
        handle.await.unwrap();

        // only even calls install; one in flight at cancel time may be dropped
        let successes = u64::from(calls.load(Ordering::SeqCst).div_ceil(2));
        let installs = store.installs();
        assert!(installs == successes || installs + 1 == successes);
        let name = store.read().get(1).map(|e| e.name.clone()).unwrap();
        assert!(name.starts_with("tick-"));
    }

    #[tokio::test]
    async fn stops_without_collecting_when_cancelled_first() {
        let calls = Arc::new(AtomicU32::new(0));
        let stop = CancellationToken::new();
        stop.cancel();
        let store = SnapshotStore::new();
        spawn_sampler(
            Flaky {
                calls: calls.clone(),
            },
            store.clone(),
            Duration::from_millis(5),
            stop,
        )
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.installs(), 0);
    }
}
