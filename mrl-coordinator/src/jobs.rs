use std::collections::{HashMap, VecDeque};

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use common::task::{Partition, TaskAssignment, TaskId};

use crate::tasks::{Task, TaskIdVendor, TaskKind, TaskStatus};

/// Coarse state of the job. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Map tasks are outstanding.
    Mapping,

    /// Every split is mapped, reduce tasks are outstanding.
    Reducing,

    /// Every partition is reduced.
    Done,
}

/// Scheduling state of one reduce partition.
///
/// A zone whose task completed stays `Assigned`; completion is tracked by
/// the outstanding counter and the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    Pending,
    Assigned,
    Failed,
}

/// Work handed back to the job after a task timed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reclaimed {
    /// The split is queued again; files written by `producer` must go.
    Split { producer: TaskId, input_file: String },

    /// The partition can be assigned again.
    Zone { partition: Partition },
}

/// A job context: all scheduling state of one MapReduce run.
///
/// Not synchronized; the scheduler wraps it in a single lock.
#[derive(Debug)]
pub struct Job {
    /// The current phase of the job.
    phase: Phase,

    /// Number of reduce partitions.
    n_reduce: u32,

    /// Input splits not handed to any running map task, in FIFO order.
    pending_splits: VecDeque<String>,

    /// Per-partition scheduling state.
    zones: Vec<ZoneState>,

    /// Map tasks still to complete before reducing starts.
    outstanding_maps: usize,

    /// Reduce tasks still to complete before the job is done.
    outstanding_reduces: usize,

    /// Ids of the accepted map attempts, one per split.
    completed_maps: Vec<TaskId>,

    /// Every task dispatched so far.
    tasks: HashMap<TaskId, Task>,

    task_vendor: TaskIdVendor,
}

impl Job {
    /// Create a job over `splits`, hashing map output into `n_reduce`
    /// partitions.
    pub fn new(splits: Vec<String>, n_reduce: u32) -> Result<Self> {
        if n_reduce == 0 {
            bail!("a job needs at least one reduce partition");
        }

        info!(
            "The coordinator has {} splits and {} reduce zones",
            splits.len(),
            n_reduce
        );

        let mut job = Self {
            phase: Phase::Mapping,
            n_reduce,
            outstanding_maps: splits.len(),
            outstanding_reduces: n_reduce as usize,
            pending_splits: splits.into(),
            zones: vec![ZoneState::Pending; n_reduce as usize],
            completed_maps: Vec::new(),
            tasks: HashMap::new(),
            task_vendor: TaskIdVendor::default(),
        };
        // A job without input has nothing to map.
        job.advance_phase();
        Ok(job)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn n_reduce(&self) -> u32 {
        self.n_reduce
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Accept a completion report for task `id`.
    ///
    /// Only a running task can complete. Reports for unknown, already
    /// completed or timed out tasks are ignored and `false` is returned.
    pub fn complete(&mut self, id: TaskId) -> bool {
        let Some(task) = self.tasks.get_mut(&id) else {
            warn!("Ignoring completion of unknown task {}", id);
            return false;
        };

        if !task.is_running() {
            debug!("Ignoring stale completion of task {} ({:?})", id, task.status);
            return false;
        }

        task.status = TaskStatus::Completed;
        match &task.kind {
            TaskKind::Map { input_file } => {
                self.outstanding_maps -= 1;
                self.completed_maps.push(id);
                info!(
                    "Map task {} over {} completed, {} remaining",
                    id, input_file, self.outstanding_maps
                );
            }
            TaskKind::Reduce { partition } => {
                self.outstanding_reduces -= 1;
                info!(
                    "Reduce task {} for zone {} completed, {} remaining",
                    id, partition, self.outstanding_reduces
                );
            }
        }

        self.advance_phase();
        true
    }

    /// Decide what the next caller gets: a new task, `Wait` or `JobDone`.
    pub fn next_assignment(&mut self) -> TaskAssignment {
        match self.phase {
            Phase::Mapping => match self.pending_splits.pop_front() {
                Some(input_file) => {
                    let id = self.dispatch(TaskKind::Map {
                        input_file: input_file.clone(),
                    });
                    TaskAssignment::Map {
                        id,
                        input_file,
                        n_reduce: self.n_reduce,
                    }
                }
                // Every split is with a running map task.
                None => TaskAssignment::Wait,
            },
            Phase::Reducing => {
                let eligible = self
                    .zones
                    .iter()
                    .position(|zone| matches!(zone, ZoneState::Pending | ZoneState::Failed));

                match eligible {
                    Some(index) => {
                        self.zones[index] = ZoneState::Assigned;
                        let partition = index as Partition;
                        let id = self.dispatch(TaskKind::Reduce { partition });
                        TaskAssignment::Reduce {
                            id,
                            partition,
                            map_tasks: self.completed_maps.clone(),
                        }
                    }
                    // Every zone is assigned but not all are complete yet.
                    None => TaskAssignment::Wait,
                }
            }
            Phase::Done => TaskAssignment::JobDone,
        }
    }

    /// Declare task `id` lost and hand its work back to the job.
    ///
    /// Returns `None` when the task already completed (or is unknown), in
    /// which case nothing changes.
    pub fn time_out(&mut self, id: TaskId) -> Option<Reclaimed> {
        let task = self.tasks.get_mut(&id)?;
        if !task.is_running() {
            return None;
        }

        task.status = TaskStatus::TimedOut;
        let reclaimed = match &task.kind {
            TaskKind::Map { input_file } => {
                self.pending_splits.push_back(input_file.clone());
                Reclaimed::Split {
                    producer: id,
                    input_file: input_file.clone(),
                }
            }
            TaskKind::Reduce { partition } => {
                self.zones[*partition as usize] = ZoneState::Failed;
                Reclaimed::Zone {
                    partition: *partition,
                }
            }
        };
        warn!("Task {} was regarded as dead, reclaimed {:?}", id, reclaimed);
        Some(reclaimed)
    }

    fn dispatch(&mut self, kind: TaskKind) -> TaskId {
        let id = self.task_vendor.create_task();
        debug!("Assigned task {}: {:?}", id, kind);
        self.tasks.insert(id, Task::new(id, kind));
        id
    }

    fn advance_phase(&mut self) {
        if self.phase == Phase::Mapping && self.outstanding_maps == 0 {
            self.phase = Phase::Reducing;
            info!("Map tasks completed, moved into reduce phase");
        }
        if self.phase == Phase::Reducing && self.outstanding_reduces == 0 {
            self.phase = Phase::Done;
            info!("Reduce tasks completed, job done");
        }
    }
}
