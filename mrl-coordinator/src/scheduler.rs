use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use common::store::IntermediateStore;
use common::task::{TaskAssignment, TaskId};

use crate::jobs::{Job, Phase, Reclaimed};

/// Everything guarded by the job-wide lock.
#[derive(Debug)]
struct State {
    job: Job,

    /// Watchdogs of running tasks, cancelled when the task completes.
    watchdogs: HashMap<TaskId, CancellationToken>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    store: IntermediateStore,
    timeout: Duration,
}

/// Assigns tasks to workers and reclaims the work of tasks that time out.
///
/// Cheap to clone; clones share the same job.
#[derive(Debug, Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create the scheduler for a job over `splits`.
    ///
    /// `store` is where map tasks write their output, so that lost attempts
    /// can be cleaned up. A task that runs longer than `timeout` is presumed
    /// lost.
    pub fn new(
        splits: Vec<String>,
        n_reduce: u32,
        store: IntermediateStore,
        timeout: Duration,
    ) -> Result<Self> {
        let job = Job::new(splits, n_reduce)?;
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    job,
                    watchdogs: HashMap::new(),
                }),
                store,
                timeout,
            }),
        })
    }

    /// Record that `finished` (if any) completed, then hand out the next
    /// task, `Wait` or `JobDone`.
    ///
    /// The whole exchange is one critical section.
    pub async fn request_task(&self, finished: Option<TaskId>) -> TaskAssignment {
        let mut state = self.inner.state.lock().await;

        if let Some(id) = finished {
            if state.job.complete(id) {
                if let Some(watchdog) = state.watchdogs.remove(&id) {
                    watchdog.cancel();
                }
            }
        }

        let assignment = state.job.next_assignment();
        if let Some(id) = assignment.task_id() {
            let token = CancellationToken::new();
            state.watchdogs.insert(id, token.clone());
            tokio::spawn(watchdog(self.inner.clone(), id, token));
            info!("Assigned task {}", id);
        }

        assignment
    }

    /// Whether every partition has been reduced.
    pub async fn is_done(&self) -> bool {
        self.inner.state.lock().await.job.is_done()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.state.lock().await.job.phase()
    }

    /// Poll [`Scheduler::is_done`] every `interval` until it holds.
    pub async fn wait_until_done(&self, interval: Duration) {
        while !self.is_done().await {
            tokio::time::sleep(interval).await;
        }
    }
}

/// Wait out the timeout of task `id`, then reclaim its work unless it
/// completed in the meantime.
async fn watchdog(inner: Arc<Inner>, id: TaskId, token: CancellationToken) {
    select! {
        _ = token.cancelled() => {
            debug!("Watchdog of task {} cancelled", id);
            return;
        }
        _ = tokio::time::sleep(inner.timeout) => {}
    }

    let mut state = inner.state.lock().await;
    state.watchdogs.remove(&id);

    // A completion may have won the race for the lock.
    let Some(reclaimed) = state.job.time_out(id) else {
        return;
    };

    if let Reclaimed::Split { producer, .. } = reclaimed {
        let n_reduce = state.job.n_reduce();
        match inner.store.remove_producer(producer, n_reduce) {
            Ok(removed) => debug!("Removed {} files of lost task {}", removed, producer),
            Err(e) => warn!("Failed to clean up after task {}: {:#}", producer, e),
        }
    }
}
