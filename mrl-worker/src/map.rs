use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Error};
use bytes::Bytes;
use tracing::info;

use common::store::IntermediateStore;
use common::task::{Partition, TaskId};
use common::{partition, KeyValue, Workload};

type Buckets = BTreeMap<Partition, Vec<KeyValue>>;

/// Run the map function of `workload` over `input_file` and append its
/// output, bucketed by partition, to the intermediate store under `task`.
///
/// Nothing is committed atomically: a crash leaves partial files behind,
/// which the coordinator deletes when it reclaims the task.
pub fn perform_map(
    store: &IntermediateStore,
    workload: &Workload,
    task: TaskId,
    input_file: &str,
    n_reduce: u32,
) -> Result<(), Error> {
    info!("Starting map task {} over `{}`", task, input_file);

    let contents =
        fs::read(input_file).with_context(|| format!("cannot read input file {input_file}"))?;

    let map_fn = workload.map_fn;
    let mut buckets = Buckets::new();
    for item in map_fn(input_file, Bytes::from(contents))? {
        let kv = item?;
        buckets
            .entry(partition(&kv.key, n_reduce))
            .or_default()
            .push(kv);
    }

    for (bucket, records) in &buckets {
        store.append(task, *bucket, records)?;
    }

    info!(
        "Map task {} wrote {} partitions",
        task,
        buckets.len()
    );
    Ok(())
}
