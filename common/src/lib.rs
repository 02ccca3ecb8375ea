//! Shared pieces of the MapReduce (lite) system.
//!
//! A coordinator hands out map and reduce tasks to workers that pull work
//! over gRPC. Intermediate data lives on a shared filesystem, see [`store`].

use std::fmt;
use std::fmt::Formatter;
use std::hash::Hasher;
use std::time::Duration;

use bytes::Bytes;

pub mod codec;
pub mod rpc;
pub mod store;
pub mod task;
pub mod utils;

/// Port the coordinator listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 8030;

/// How long a task may run before the coordinator presumes its worker dead.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a worker sleeps after being told to wait.
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(1);

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// A map function takes the name of an input file and its full contents.
///
/// It returns an iterator that yields intermediate key-value pairs.
pub type MapFn = fn(filename: &str, contents: Bytes) -> MapOutput;

/// A reduce function takes in a key and an iterator over every value
/// emitted for that key. It returns the output value for the key.
pub type ReduceFn =
    fn(key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> anyhow::Result<Bytes>;

/// A map reduce application.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KeyValue {
    /// The key.
    pub key: Bytes,

    /// The value.
    pub value: Bytes,
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            String::from_utf8_lossy(&self.key),
            String::from_utf8_lossy(&self.value)
        )
    }
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the key of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn key(&self) -> Bytes {
        self.key.clone()
    }

    /// Get the value of this key-value pair.
    #[inline]
    pub fn value(&self) -> Bytes {
        self.value.clone()
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> Bytes {
        self.value
    }
}

/// Hashes an intermediate key. Compute a reduce bucket for a given key
/// by calculating `ihash(key) % n_reduce`.
///
/// FNV-1a over the raw key bytes, so every worker agrees on the bucket.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(key);
    (hasher.finish() & 0x7fff_ffff) as u32
}

/// The reduce partition a key belongs to.
#[inline]
pub fn partition(key: &[u8], n_reduce: u32) -> u32 {
    ihash(key) % n_reduce
}
