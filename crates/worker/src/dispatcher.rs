//! Fixed-size pool of workers for fire-and-forget tasks.
//!
//! Tasks are queued on one unbounded channel that `pool_size` workers pull
//! from, so at most `pool_size` tasks run at the same time. A task is a future
//! resolving to `Result<(), E>`; errors and panics are logged with the task's
//! label and never reach the submitter.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tokio_util::task::TaskTracker;

use crate::registry::panic_message;

/// Pool size used when none is configured.
pub const DEFAULT_POOL_SIZE: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Dispatcher is shut down")]
    Closed,
}

/// Counters since the dispatcher was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub panicked: u64,
}

struct Task {
    label: String,
    future: BoxFuture<'static, Result<(), String>>,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    /// Submitted tasks that have not finished yet.
    outstanding: AtomicUsize,
    idle: Notify,
}

impl Counters {
    fn finish(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Release);
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

pub struct BoundedDispatcher {
    sender: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    workers: TaskTracker,
    counters: Arc<Counters>,
    pool_size: usize,
}

impl BoundedDispatcher {
    /// Spawn `pool_size` workers on the current Tokio runtime.
    ///
    /// Must be called from within a runtime. A size of zero is raised to one.
    pub fn new(pool_size: usize) -> Self {
        let pool_size = if pool_size == 0 {
            tracing::warn!("Dispatcher pool size 0 requested, using 1");
            1
        } else {
            pool_size
        };

        let (sender, receiver) = mpsc::unbounded_channel::<Task>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let counters = Arc::new(Counters::default());
        let workers = TaskTracker::new();

        for worker in 0..pool_size {
            let receiver = Arc::clone(&receiver);
            let counters = Arc::clone(&counters);
            workers.spawn(async move {
                loop {
                    // The lock is released before the task runs.
                    let next = receiver.lock().await.recv().await;
                    let Some(task) = next else { break };
                    run_task(worker, task, &counters).await;
                }
                tracing::debug!(worker, "Dispatcher worker stopped");
            });
        }
        workers.close();

        tracing::info!(pool_size, "Dispatcher started");
        Self {
            sender: Mutex::new(Some(sender)),
            workers,
            counters,
            pool_size,
        }
    }

    /// Queue a task and return immediately.
    pub fn submit<F, E>(&self, label: impl Into<String>, future: F) -> Result<(), DispatchError>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        let task = Task {
            label: label.into(),
            future: future.map(|r| r.map_err(|e| e.to_string())).boxed(),
        };

        let sender = self.sender();
        let sender = sender.as_ref().ok_or(DispatchError::Closed)?;

        // Counted before the send so a finished task is never ahead of them.
        self.counters.submitted.fetch_add(1, Ordering::AcqRel);
        self.counters.outstanding.fetch_add(1, Ordering::AcqRel);
        if sender.send(task).is_err() {
            self.counters.outstanding.fetch_sub(1, Ordering::AcqRel);
            self.counters.submitted.fetch_sub(1, Ordering::AcqRel);
            return Err(DispatchError::Closed);
        }
        Ok(())
    }

    /// Wait until every task submitted so far has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.counters.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.counters.outstanding.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Close the queue, let the workers drain it, and wait for them.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let was_open = self.sender().take().is_some();
        self.workers.wait().await;
        if was_open {
            let stats = self.stats();
            tracing::info!(
                submitted = stats.submitted,
                completed = stats.completed,
                failed = stats.failed,
                panicked = stats.panicked,
                "Dispatcher drained",
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender().is_none()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn stats(&self) -> DispatcherStats {
        // Finished counts are read first so they never exceed `submitted`.
        let completed = self.counters.completed.load(Ordering::Acquire);
        let failed = self.counters.failed.load(Ordering::Acquire);
        let panicked = self.counters.panicked.load(Ordering::Acquire);
        DispatcherStats {
            submitted: self.counters.submitted.load(Ordering::Acquire),
            completed,
            failed,
            panicked,
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Task>>> {
        self.sender.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn run_task(worker: usize, task: Task, counters: &Counters) {
    let Task { label, future } = task;

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => counters.finish(&counters.completed),
        Ok(Err(e)) => {
            tracing::error!(worker, task = %label, error = %e, "Dispatched task failed");
            counters.finish(&counters.failed);
        }
        Err(panic) => {
            tracing::error!(
                worker,
                task = %label,
                panic = %panic_message(&*panic),
                "Dispatched task panicked",
            );
            counters.finish(&counters.panicked);
        }
    }
}
