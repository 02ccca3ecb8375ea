use std::path::PathBuf;

use anyhow::Error;
use bytes::{BufMut, BytesMut};
use itertools::Itertools;
use tracing::info;

use common::store::IntermediateStore;
use common::task::{Partition, TaskId};
use common::{KeyValue, Workload};

/// Reduce `partition` over the output of `map_tasks` and write the result
/// to `mr-out-<partition>`, one `"<key> <output>"` line per key in
/// ascending key order.
pub fn perform_reduce(
    store: &IntermediateStore,
    workload: &Workload,
    task: TaskId,
    partition: Partition,
    map_tasks: &[TaskId],
) -> Result<PathBuf, Error> {
    info!(
        "Starting reduce task {} for partition {} over {} map outputs",
        task,
        partition,
        map_tasks.len()
    );

    let mut records = store.read_partition(partition, map_tasks)?;
    // Stable, so the values of a key keep their encounter order.
    records.sort_by(|a, b| a.key.cmp(&b.key));

    let reduce_fn = workload.reduce_fn;
    let mut out = BytesMut::new();
    let mut keys = 0usize;
    for (key, group) in &records.into_iter().chunk_by(KeyValue::key) {
        let values = group.map(KeyValue::into_value);
        let output = reduce_fn(key.clone(), Box::new(values))?;

        out.put_slice(&key);
        out.put_u8(b' ');
        out.put_slice(&output);
        out.put_u8(b'\n');
        keys += 1;
    }

    let path = store.write_output(partition, task, &out)?;
    info!("Reduce task {} wrote {} keys to {}", task, keys, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use bytes::Bytes;

    use super::*;

    fn unused_map(_: &str, _: Bytes) -> common::MapOutput {
        unreachable!()
    }

    /// Joins the values so their order is visible.
    fn join(_: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> anyhow::Result<Bytes> {
        let values: Vec<String> = values
            .map(|v| String::from_utf8_lossy(&v).into_owned())
            .collect();
        Ok(Bytes::from(values.join(",")))
    }

    fn failing(_: Bytes, _: Box<dyn Iterator<Item = Bytes> + '_>) -> anyhow::Result<Bytes> {
        anyhow::bail!("cannot reduce")
    }

    fn kv(key: &str, value: &str) -> KeyValue {
        KeyValue::new(key.to_string(), value.to_string())
    }

    #[test]
    fn groups_sorted_keys_in_encounter_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntermediateStore::new(dir.path());
        store
            .append(1, 2, &[kv("pear", "1"), kv("apple", "2"), kv("pear", "3")])
            .unwrap();
        store.append(3, 2, &[kv("apple", "4"), kv("fig", "5")]).unwrap();
        let workload = Workload {
            map_fn: unused_map,
            reduce_fn: join,
        };

        let path = perform_reduce(&store, &workload, 9, 2, &[1, 3]).unwrap();

        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "apple 2,4\nfig 5\npear 1,3\n"
        );
    }

    #[test]
    fn ignores_producers_outside_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntermediateStore::new(dir.path());
        store.append(1, 0, &[kv("a", "kept")]).unwrap();
        // Output of a lost attempt that was never accepted.
        store.append(2, 0, &[kv("a", "stale")]).unwrap();
        let workload = Workload {
            map_fn: unused_map,
            reduce_fn: join,
        };

        let path = perform_reduce(&store, &workload, 5, 0, &[1]).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "a kept\n");
    }

    #[test]
    fn empty_partition_writes_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntermediateStore::new(dir.path());
        let workload = Workload {
            map_fn: unused_map,
            reduce_fn: join,
        };

        let path = perform_reduce(&store, &workload, 5, 1, &[1, 2]).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn reduce_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntermediateStore::new(dir.path());
        store.append(1, 0, &[kv("a", "1")]).unwrap();
        let workload = Workload {
            map_fn: unused_map,
            reduce_fn: failing,
        };

        assert!(perform_reduce(&store, &workload, 5, 0, &[1]).is_err());
        assert!(!store.output_path(0).exists());
    }
}
