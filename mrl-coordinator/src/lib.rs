//! Coordinator side of MapReduce (lite): the scheduler, its failure
//! detector and the gRPC service workers talk to.

pub mod core;
pub mod jobs;
pub mod scheduler;
pub mod tasks;

pub use crate::core::{serve, MRCoordinator};
pub use crate::scheduler::Scheduler;
