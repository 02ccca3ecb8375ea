//! Task descriptors exchanged between the coordinator and its workers.

/// Identifier of one dispatch. Retried work always gets a fresh id.
pub type TaskId = u64;

/// Index of a reduce partition.
pub type Partition = u32;

/// What the coordinator tells a worker to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAssignment {
    /// Nothing to hand out right now, ask again shortly.
    Wait,

    /// The job is finished, the worker should stop.
    JobDone,

    /// Run the map function over one input split.
    Map {
        id: TaskId,
        input_file: String,
        n_reduce: u32,
    },

    /// Reduce one partition, reading the output of the listed map attempts.
    Reduce {
        id: TaskId,
        partition: Partition,
        map_tasks: Vec<TaskId>,
    },
}

impl TaskAssignment {
    /// The id of the dispatched task, if this is one.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            TaskAssignment::Map { id, .. } | TaskAssignment::Reduce { id, .. } => Some(*id),
            TaskAssignment::Wait | TaskAssignment::JobDone => None,
        }
    }
}
