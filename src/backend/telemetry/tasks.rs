/**
 * Background Task Supervision
 *
 * Owns the fire-and-forget work spawned per request (history lookup, diff,
 * emission). Tasks run detached from the request/response cycle, but the
 * supervisor keeps their handles so that shutdown can wait for them within a
 * bound and abort whatever is left.
 *
 * Task bodies run under `catch_unwind`: a panic is logged at the task
 * boundary and never reaches the request path.
 */
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};

#[derive(Default)]
struct Inner {
    active: JoinSet<()>,
    // sets that outlived a bounded flush; drained by the next flush
    parked: Vec<JoinSet<()>>,
}

/// Handle to the set of in-flight background tasks
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Mutex<Inner>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` on the current runtime under supervision
    pub fn spawn<F>(&self, label: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.lock();
        while let Some(finished) = inner.active.try_join_next() {
            log_join(finished);
        }
        inner.active.spawn(async move {
            if AssertUnwindSafe(future).catch_unwind().await.is_err() {
                tracing::error!(task = label, "Background telemetry task panicked");
            }
        });
    }

    /// Number of tasks not yet reaped, finished or not
    pub fn pending(&self) -> usize {
        let inner = self.lock();
        inner.active.len() + inner.parked.iter().map(JoinSet::len).sum::<usize>()
    }

    /// Wait up to `timeout` for every task spawned so far.
    ///
    /// Returns `true` when all of them completed. Tasks still running at the
    /// deadline keep running.
    pub async fn flush(&self, timeout: Duration) -> bool {
        self.drain(timeout, false).await
    }

    /// Like `flush`, but aborts whatever is still running at the deadline
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.drain(timeout, true).await
    }

    async fn drain(&self, timeout: Duration, abort: bool) -> bool {
        let mut sets = {
            let mut inner = self.lock();
            let mut sets = std::mem::take(&mut inner.parked);
            sets.push(std::mem::take(&mut inner.active));
            sets
        };

        let deadline = tokio::time::Instant::now() + timeout;
        let mut complete = true;

        for mut set in sets.drain(..) {
            loop {
                let next = tokio::time::timeout_at(deadline, set.join_next()).await;
                match next {
                    Ok(Some(finished)) => log_join(finished),
                    Ok(None) => break,
                    Err(_) => {
                        complete = false;
                        if abort {
                            tracing::warn!(remaining = set.len(), "Aborting telemetry tasks still running at shutdown");
                            set.abort_all();
                        } else {
                            self.lock().parked.push(set);
                        }
                        break;
                    }
                }
            }
        }

        complete
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(err) = result {
        if err.is_cancelled() {
            tracing::debug!("Background telemetry task cancelled");
        } else {
            tracing::error!(error = %err, "Background telemetry task failed");
        }
    }
}
