//! # Deferred Tasks
//!
//! One-shot work that runs after a delay: pruning an unresolved handshake
//! at its deadline, checking for missing confirmations before escalating.
//! Each scheduled task is a tokio task sleeping until its delay elapses;
//! cancelling aborts it. The [`Scheduler`] remembers the tasks it started
//! so a node can cancel everything on shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};

/// Handle to one deferred task.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Stop the task if it has not run yet. A no-op once it finished.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to finish. Returns `false` if it was cancelled.
    pub async fn join(self) -> bool {
        self.handle.await.is_ok()
    }
}

/// Starts deferred tasks and tracks them for bulk cancellation.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    tasks: Arc<Mutex<Vec<AbortHandle>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once, after `delay`.
    pub fn run_after<F>(&self, delay: Duration, task: F) -> ScheduledTask
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle.abort_handle());
        ScheduledTask { handle }
    }

    /// Tasks scheduled and not yet finished or cancelled.
    pub fn pending(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.is_finished()).count()
    }

    /// Cancel every task that has not run yet.
    pub fn cancel_all(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for t in tasks {
            t.abort();
        }
        tracing::debug!("cancelled all scheduled tasks");
    }
}
