use std::time::Duration;

use anyhow::{Context, Result};
use tonic::transport::Channel;
use tracing::{debug, info};

use common::rpc::{CoordinatorClient, RequestTaskArgs};
use common::store::IntermediateStore;
use common::task::{TaskAssignment, TaskId};
use common::Workload;

use crate::{map, reduce};

/// Where a worker gets its tasks from.
#[tonic::async_trait]
pub trait TaskSource: Send {
    /// Report `finished` (the task just completed, if any) and ask for the
    /// next assignment.
    async fn request_task(&mut self, finished: Option<TaskId>) -> Result<TaskAssignment>;
}

#[tonic::async_trait]
impl TaskSource for CoordinatorClient<Channel> {
    async fn request_task(&mut self, finished: Option<TaskId>) -> Result<TaskAssignment> {
        let request = tonic::Request::new(RequestTaskArgs::report(finished));
        let reply = CoordinatorClient::request_task(self, request).await?.into_inner();
        TaskAssignment::try_from(reply)
    }
}

/// A worker: one sequential loop of request, execute, report.
pub struct MRWorker<S> {
    source: S,
    workload: Workload,
    store: IntermediateStore,
    wait: Duration,
}

impl<S: TaskSource> MRWorker<S> {
    pub fn new(source: S, workload: Workload, store: IntermediateStore, wait: Duration) -> Self {
        Self {
            source,
            workload,
            store,
            wait,
        }
    }

    /// Run tasks until the coordinator says the job is done.
    ///
    /// Any error is fatal: the worker stops without telling the coordinator,
    /// which reassigns the task once it times out.
    pub async fn run(mut self) -> Result<()> {
        let mut finished: Option<TaskId> = None;

        loop {
            let assignment = self
                .source
                .request_task(finished)
                .await
                .context("failed to request a task from the coordinator")?;

            match assignment {
                TaskAssignment::JobDone => {
                    info!("Job done, no more tasks");
                    return Ok(());
                }
                TaskAssignment::Wait => {
                    debug!("No task available, waiting {:?}", self.wait);
                    tokio::time::sleep(self.wait).await;
                }
                TaskAssignment::Map {
                    id,
                    input_file,
                    n_reduce,
                } => {
                    execute(self.store.clone(), self.workload, move |store, workload| {
                        map::perform_map(store, workload, id, &input_file, n_reduce)
                    })
                    .await
                    .with_context(|| format!("map task {id} failed"))?;
                    finished = Some(id);
                }
                TaskAssignment::Reduce {
                    id,
                    partition,
                    map_tasks,
                } => {
                    execute(self.store.clone(), self.workload, move |store, workload| {
                        reduce::perform_reduce(store, workload, id, partition, &map_tasks)
                            .map(|_| ())
                    })
                    .await
                    .with_context(|| format!("reduce task {id} failed"))?;
                    finished = Some(id);
                }
            }
        }
    }
}

/// Run a task body on the blocking pool; task bodies do plain file I/O.
async fn execute<F>(store: IntermediateStore, workload: Workload, body: F) -> Result<()>
where
    F: FnOnce(&IntermediateStore, &Workload) -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(move || body(&store, &workload)).await?
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;
    use bytes::Bytes;

    use super::*;

    /// Replays canned assignments and records what the worker reported.
    struct Script {
        replies: VecDeque<TaskAssignment>,
        reports: Arc<Mutex<Vec<Option<TaskId>>>>,
    }

    #[tonic::async_trait]
    impl TaskSource for Script {
        async fn request_task(&mut self, finished: Option<TaskId>) -> Result<TaskAssignment> {
            self.reports.lock().unwrap().push(finished);
            self.replies
                .pop_front()
                .ok_or_else(|| anyhow!("connection refused"))
        }
    }

    fn script(replies: Vec<TaskAssignment>) -> (Script, Arc<Mutex<Vec<Option<TaskId>>>>) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let script = Script {
            replies: replies.into(),
            reports: reports.clone(),
        };
        (script, reports)
    }

    fn count_map(_: &str, contents: Bytes) -> common::MapOutput {
        let words: Vec<Result<common::KeyValue>> = String::from_utf8(contents.to_vec())?
            .split_whitespace()
            .map(|w| Ok(common::KeyValue::new(w.to_string(), "1")))
            .collect();
        Ok(Box::new(words.into_iter()))
    }

    fn count_reduce(_: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
        Ok(Bytes::from(values.count().to_string()))
    }

    const COUNT: Workload = Workload {
        map_fn: count_map,
        reduce_fn: count_reduce,
    };

    #[tokio::test]
    async fn reports_each_finished_task() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        std::fs::write(&input, "b a b").unwrap();

        let (source, reports) = script(vec![
            TaskAssignment::Wait,
            TaskAssignment::Map {
                id: 1,
                input_file: input.to_string_lossy().into_owned(),
                n_reduce: 1,
            },
            TaskAssignment::Wait,
            TaskAssignment::Reduce {
                id: 2,
                partition: 0,
                map_tasks: vec![1],
            },
            TaskAssignment::JobDone,
        ]);
        let store = IntermediateStore::new(dir.path());
        let worker = MRWorker::new(source, COUNT, store.clone(), Duration::from_millis(1));

        worker.run().await.unwrap();

        assert_eq!(
            *reports.lock().unwrap(),
            vec![None, None, Some(1), Some(1), Some(2)]
        );
        let output = std::fs::read_to_string(store.output_path(0)).unwrap();
        assert_eq!(output, "a 1\nb 2\n");
    }

    #[tokio::test]
    async fn missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (source, reports) = script(vec![
            TaskAssignment::Map {
                id: 1,
                input_file: dir.path().join("absent.txt").to_string_lossy().into_owned(),
                n_reduce: 1,
            },
            TaskAssignment::JobDone,
        ]);
        let worker = MRWorker::new(
            source,
            COUNT,
            IntermediateStore::new(dir.path()),
            Duration::from_millis(1),
        );

        assert!(worker.run().await.is_err());
        // The failure is never reported.
        assert_eq!(*reports.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn transport_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (source, _) = script(vec![TaskAssignment::Wait]);
        let worker = MRWorker::new(
            source,
            COUNT,
            IntermediateStore::new(dir.path()),
            Duration::from_millis(1),
        );

        assert!(worker.run().await.is_err());
    }
}
