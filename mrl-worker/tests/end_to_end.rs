use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use common::rpc::{CoordinatorClient, RequestTaskArgs};
use common::store::IntermediateStore;
use common::task::TaskAssignment;
use mrl_coordinator::{serve, Scheduler};
use mrl_worker::MRWorker;

const WAIT: Duration = Duration::from_millis(20);

struct Cluster {
    address: String,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<Result<(), tonic::transport::Error>>,
}

impl Cluster {
    async fn start(dir: &Path, files: Vec<String>, n_reduce: u32, timeout: Duration) -> Cluster {
        let scheduler =
            Scheduler::new(files, n_reduce, IntermediateStore::new(dir), timeout).unwrap();
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());

        let (shutdown, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(scheduler, listener, async move {
            let _ = rx.await;
        }));

        Cluster {
            address,
            shutdown,
            server,
        }
    }

    async fn client(&self) -> CoordinatorClient<tonic::transport::Channel> {
        CoordinatorClient::connect(self.address.clone()).await.unwrap()
    }

    async fn worker(&self, dir: &Path) -> JoinHandle<anyhow::Result<()>> {
        let worker = MRWorker::new(
            self.client().await,
            workload::named("wc").unwrap(),
            IntermediateStore::new(dir),
            WAIT,
        );
        tokio::spawn(worker.run())
    }

    async fn stop(self) {
        self.shutdown.send(()).unwrap();
        self.server.await.unwrap().unwrap();
    }
}

fn write_inputs(dir: &Path, contents: &[&str]) -> Vec<String> {
    contents
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let path = dir.join(format!("pg-{i}.txt"));
            fs::write(&path, text).unwrap();
            path.to_string_lossy().into_owned()
        })
        .collect()
}

#[tokio::test]
async fn two_splits_one_partition() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_inputs(dir.path(), &["a", "a"]);
    let cluster = Cluster::start(dir.path(), files, 1, Duration::from_secs(10)).await;

    cluster.worker(dir.path()).await.await.unwrap().unwrap();
    cluster.stop().await;

    let output = fs::read_to_string(dir.path().join("mr-out-0")).unwrap();
    assert_eq!(output, "a 2\n");
}

#[tokio::test]
async fn lost_map_is_redone_and_its_output_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let store = IntermediateStore::new(dir.path());
    let files = write_inputs(dir.path(), &["a", "a"]);
    let cluster = Cluster::start(dir.path(), files, 1, Duration::from_millis(300)).await;

    // A worker takes a split, writes part of its output and vanishes.
    let mut zombie = cluster.client().await;
    let reply = zombie
        .request_task(RequestTaskArgs::report(None))
        .await
        .unwrap()
        .into_inner();
    let TaskAssignment::Map { id: lost, .. } = TaskAssignment::try_from(reply).unwrap() else {
        panic!("expected a map task");
    };
    // A truncated record: any reader of this file fails.
    fs::write(store.intermediate_path(lost, 0), [0, 0, 0, 9, b'a']).unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!store.intermediate_path(lost, 0).exists());

    // It wakes up after being reclaimed and writes again.
    fs::write(store.intermediate_path(lost, 0), [0, 0, 0, 9, b'a']).unwrap();
    drop(zombie);

    cluster.worker(dir.path()).await.await.unwrap().unwrap();
    cluster.stop().await;

    let output = fs::read_to_string(store.output_path(0)).unwrap();
    assert_eq!(output, "a 2\n");
}

#[tokio::test]
async fn several_workers_match_a_sequential_count() {
    let dir = tempfile::tempdir().unwrap();
    let texts = [
        "It was the best of times, it was the worst of times",
        "it was the age of wisdom, it was the age of foolishness",
        "Call me Ishmael. Some years ago, never mind how long precisely",
        "the the the, and a cat",
        "",
    ];
    let files = write_inputs(dir.path(), &texts);
    let n_reduce = 3;
    let cluster = Cluster::start(dir.path(), files, n_reduce, Duration::from_secs(10)).await;

    let mut workers = Vec::new();
    for _ in 0..3 {
        workers.push(cluster.worker(dir.path()).await);
    }
    for worker in workers {
        worker.await.unwrap().unwrap();
    }
    cluster.stop().await;

    let mut expected: BTreeMap<String, u64> = BTreeMap::new();
    for text in texts {
        for word in text.split(|c: char| !c.is_alphabetic()).filter(|w| !w.is_empty()) {
            *expected.entry(word.to_string()).or_default() += 1;
        }
    }

    let mut actual = BTreeMap::new();
    for p in 0..n_reduce {
        let output = fs::read_to_string(dir.path().join(format!("mr-out-{p}"))).unwrap();
        let mut previous: Option<String> = None;
        for line in output.lines() {
            let (word, count) = line.split_once(' ').unwrap();
            assert_eq!(common::partition(word.as_bytes(), n_reduce), p);
            if let Some(previous) = &previous {
                assert!(previous.as_str() < word, "{previous} before {word}");
            }
            previous = Some(word.to_string());
            assert!(actual
                .insert(word.to_string(), count.parse::<u64>().unwrap())
                .is_none());
        }
    }
    assert_eq!(actual, expected);
}
