//! The intermediate store: map output and reduce output on a shared
//! filesystem.
//!
//! Map output lives in `mr-<producer>-<partition>`, one file per map
//! attempt and partition, written only by that attempt. Reduce output lives
//! in `mr-out-<partition>`. Readers never discover files by scanning: a
//! reduce task is told which producers to read.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::codec::{decode_records, encode_records};
use crate::task::{Partition, TaskId};
use crate::KeyValue;

const PREFIX: &str = "mr-";
const OUTPUT_PREFIX: &str = "mr-out-";

/// A file found in the store, parsed from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StoreEntry {
    /// Map output of `producer` for `partition`.
    Intermediate {
        producer: TaskId,
        partition: Partition,
    },
    /// Final output for `partition`.
    Output { partition: Partition },
}

impl StoreEntry {
    /// Parse a file name. Anything that is not exactly a store name is `None`.
    pub fn parse(name: &str) -> Option<StoreEntry> {
        if let Some(rest) = name.strip_prefix(OUTPUT_PREFIX) {
            let partition = parse_number(rest)?;
            return Some(StoreEntry::Output { partition });
        }
        let rest = name.strip_prefix(PREFIX)?;
        let (producer, partition) = rest.split_once('-')?;
        Some(StoreEntry::Intermediate {
            producer: parse_number(producer)?,
            partition: parse_number(partition)?,
        })
    }
}

// Only plain decimal digits; rejects signs and whitespace `str::parse` allows.
fn parse_number<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Handle on the directory holding intermediate and output files.
#[derive(Debug, Clone)]
pub struct IntermediateStore {
    root: PathBuf,
}

impl IntermediateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the map output of `producer` for `partition`.
    pub fn intermediate_path(&self, producer: TaskId, partition: Partition) -> PathBuf {
        self.root.join(format!("{PREFIX}{producer}-{partition}"))
    }

    /// Path of the final output for `partition`.
    pub fn output_path(&self, partition: Partition) -> PathBuf {
        self.root.join(format!("{OUTPUT_PREFIX}{partition}"))
    }

    /// Append `records` to the file of (`producer`, `partition`), creating it
    /// if absent.
    pub fn append(&self, producer: TaskId, partition: Partition, records: &[KeyValue]) -> Result<()> {
        let path = self.intermediate_path(producer, partition);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        file.write_all(&encode_records(records))
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(())
    }

    /// Read every record of `partition` produced by `producers`, in producer
    /// order and then append order. A producer that emitted nothing for this
    /// partition simply has no file.
    pub fn read_partition(&self, partition: Partition, producers: &[TaskId]) -> Result<Vec<KeyValue>> {
        let mut records = Vec::new();
        for &producer in producers {
            let path = self.intermediate_path(producer, partition);
            let buf = match fs::read(&path) {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("cannot read {}", path.display())),
            };
            let decoded = decode_records(Bytes::from(buf))
                .with_context(|| format!("corrupt intermediate file {}", path.display()))?;
            records.extend(decoded);
        }
        Ok(records)
    }

    /// Delete every intermediate file written by `producer`.
    ///
    /// Returns the number of files removed. Files that do not exist are not
    /// an error; the first other failure is returned after trying them all.
    pub fn remove_producer(&self, producer: TaskId, n_reduce: u32) -> Result<usize> {
        let mut removed = 0;
        let mut first_error = None;
        for partition in 0..n_reduce {
            let path = self.intermediate_path(producer, partition);
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to remove {}: {}", path.display(), e);
                    first_error.get_or_insert_with(|| {
                        anyhow::Error::new(e).context(format!("cannot remove {}", path.display()))
                    });
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Write the final output of `partition` for reduce task `task`.
    ///
    /// The lines go to a file private to the task which is then renamed into
    /// place, so readers see either the whole output or none of it.
    pub fn write_output(&self, partition: Partition, task: TaskId, lines: &[u8]) -> Result<PathBuf> {
        let target = self.output_path(partition);
        let staging = self.root.join(format!(".{OUTPUT_PREFIX}{partition}.{task}"));
        {
            let mut file = fs::File::create(&staging)
                .with_context(|| format!("cannot create {}", staging.display()))?;
            file.write_all(lines)
                .with_context(|| format!("cannot write {}", staging.display()))?;
            file.sync_all()?;
        }
        fs::rename(&staging, &target)
            .with_context(|| format!("cannot move output into {}", target.display()))?;
        Ok(target)
    }

    /// Everything currently in the store, sorted.
    pub fn list(&self) -> Result<Vec<StoreEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("cannot list {}", self.root.display()))?
        {
            let entry = entry?;
            if let Some(parsed) = entry.file_name().to_str().and_then(StoreEntry::parse) {
                entries.push(parsed);
            }
        }
        entries.sort();
        Ok(entries)
    }
}
