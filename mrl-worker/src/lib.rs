//! Worker side of MapReduce (lite): pulls tasks from the coordinator and
//! runs them against the intermediate store.

pub mod core;
pub mod map;
pub mod reduce;

pub use crate::core::{MRWorker, TaskSource};
