//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Worker and timer contracts, with Tokio-backed and deterministic
//! implementations.
//!
//! The proxy core runs on a fixed set of I/O workers, each driving a disjoint
//! set of sessions, plus a scheduler for delayed work such as heartbeats and
//! hand-off timeouts. Both are expressed as traits so the core can be driven
//! by a real runtime ([`TokioWorkers`], [`TokioScheduler`]) or stepped by hand
//! in tests ([`InlineWorkers`], [`ManualScheduler`]).

use crate::transport::WorkerId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::warn;

/// A unit of work handed to a worker or scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a task submitted to a [`Scheduler`].
pub struct ScheduledTask {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl ScheduledTask {
    fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    /// Cancels the task if it has not started. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Runs tasks after a delay.
///
/// Implementations must never run the task on the calling thread before
/// `schedule` returns, even for a zero delay; callers may hold locks while
/// scheduling.
pub trait Scheduler: Send + Sync {
    /// Runs `task` once `delay` has elapsed, unless cancelled first.
    fn schedule(&self, delay: Duration, task: Task) -> ScheduledTask;
}

/// [`Scheduler`] backed by Tokio timers.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> ScheduledTask {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::Acquire) {
                task();
            }
        });
        ScheduledTask::new(cancelled, Some(handle.abort_handle()))
    }
}

struct ManualEntry {
    delay: Duration,
    task: Task,
    cancelled: Arc<AtomicBool>,
}

/// [`Scheduler`] that only runs tasks when told to.
///
/// Tasks run in submission order. Every requested delay is recorded so tests
/// can assert on backoff sequences.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<Vec<ManualEntry>>,
    history: Mutex<Vec<Duration>>,
}

impl ManualScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scheduled tasks that are neither run nor cancelled.
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .iter()
            .filter(|entry| !entry.cancelled.load(Ordering::Acquire))
            .count()
    }

    /// Every delay ever requested, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.history.lock().clone()
    }

    /// Delay of the oldest live task.
    pub fn next_delay(&self) -> Option<Duration> {
        self.queue
            .lock()
            .iter()
            .find(|entry| !entry.cancelled.load(Ordering::Acquire))
            .map(|entry| entry.delay)
    }

    /// Runs the oldest live task. Returns `false` if none was pending.
    pub fn run_next(&self) -> bool {
        loop {
            let entry = {
                let mut queue = self.queue.lock();
                if queue.is_empty() {
                    return false;
                }
                queue.remove(0)
            };
            if !entry.cancelled.load(Ordering::Acquire) {
                (entry.task)();
                return true;
            }
        }
    }

    /// Runs tasks until none remain or `limit` have run. Returns the count run.
    pub fn run_until_idle(&self, limit: usize) -> usize {
        let mut ran = 0;
        while ran < limit && self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> ScheduledTask {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.history.lock().push(delay);
        self.queue.lock().push(ManualEntry {
            delay,
            task,
            cancelled: cancelled.clone(),
        });
        ScheduledTask::new(cancelled, None)
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

/// A fixed set of I/O workers.
pub trait IoWorkers: Send + Sync {
    /// Number of workers. Worker IDs range over `0..worker_count()`.
    fn worker_count(&self) -> usize;

    /// Runs `job` on `worker`.
    fn execute(&self, worker: WorkerId, job: Task);
}

/// [`IoWorkers`] implemented as one Tokio task per worker, each draining its
/// own job queue in order.
pub struct TokioWorkers {
    queues: Vec<mpsc::UnboundedSender<Task>>,
}

impl TokioWorkers {
    /// Spawns `count` worker loops on the current Tokio runtime.
    pub fn new(count: usize) -> Self {
        let queues = (0..count.max(1))
            .map(|_| {
                let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
                tokio::spawn(async move {
                    while let Some(job) = rx.recv().await {
                        job();
                    }
                });
                tx
            })
            .collect();
        Self { queues }
    }
}

impl IoWorkers for TokioWorkers {
    fn worker_count(&self) -> usize {
        self.queues.len()
    }

    fn execute(&self, worker: WorkerId, job: Task) {
        let Some(queue) = self.queues.get(worker.index()) else {
            warn!(%worker, "dropping job for unknown worker");
            return;
        };
        if queue.send(job).is_err() {
            warn!(%worker, "worker loop has stopped, dropping job");
        }
    }
}

impl fmt::Debug for TokioWorkers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioWorkers")
            .field("workers", &self.queues.len())
            .finish()
    }
}

/// [`IoWorkers`] that runs every job synchronously on the calling thread.
#[derive(Debug, Clone, Copy)]
pub struct InlineWorkers {
    count: usize,
}

impl InlineWorkers {
    /// Creates `count` inline workers.
    pub fn new(count: usize) -> Self {
        Self {
            count: count.max(1),
        }
    }
}

impl IoWorkers for InlineWorkers {
    fn worker_count(&self) -> usize {
        self.count
    }

    fn execute(&self, _worker: WorkerId, job: Task) {
        job();
    }
}
