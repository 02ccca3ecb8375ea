//! gRPC stubs and the glue between them and [`TaskAssignment`].

use anyhow::{anyhow, bail};

use crate::task::{TaskAssignment, TaskId};

pub mod coordinator {
    tonic::include_proto!("coordinator");
}

pub use coordinator::coordinator_client::CoordinatorClient;
pub use coordinator::coordinator_server::{Coordinator, CoordinatorServer};
pub use coordinator::{RequestTaskArgs, RequestTaskReply, TaskKind};

impl RequestTaskArgs {
    /// Build the request arguments. `previous` is the task the caller just
    /// finished, or `None` on the very first call.
    pub fn report(previous: Option<TaskId>) -> Self {
        Self {
            previous_task_id: previous.unwrap_or_default(),
            previous_finished: previous.is_some(),
        }
    }

    /// The finished task being reported, if any.
    pub fn finished_task(&self) -> Option<TaskId> {
        self.previous_finished.then_some(self.previous_task_id)
    }
}

impl From<TaskAssignment> for RequestTaskReply {
    fn from(assignment: TaskAssignment) -> Self {
        match assignment {
            TaskAssignment::Wait => Self {
                wait: true,
                ..Default::default()
            },
            TaskAssignment::JobDone => Self {
                done: true,
                ..Default::default()
            },
            TaskAssignment::Map {
                id,
                input_file,
                n_reduce,
            } => Self {
                task_id: id,
                kind: TaskKind::Map as i32,
                input_file,
                n_reduce,
                ..Default::default()
            },
            TaskAssignment::Reduce {
                id,
                partition,
                map_tasks,
            } => Self {
                task_id: id,
                kind: TaskKind::Reduce as i32,
                partition_index: partition,
                map_task_ids: map_tasks,
                ..Default::default()
            },
        }
    }
}

impl TryFrom<RequestTaskReply> for TaskAssignment {
    type Error = anyhow::Error;

    fn try_from(reply: RequestTaskReply) -> Result<Self, Self::Error> {
        if reply.wait && reply.done {
            bail!("reply asks to both wait and stop");
        }
        if reply.done {
            return Ok(TaskAssignment::JobDone);
        }
        if reply.wait {
            return Ok(TaskAssignment::Wait);
        }

        let kind = TaskKind::try_from(reply.kind)
            .map_err(|_| anyhow!("unknown task kind {}", reply.kind))?;
        let assignment = match kind {
            TaskKind::Map => {
                if reply.n_reduce == 0 {
                    bail!("map task {} has no reduce partitions", reply.task_id);
                }
                TaskAssignment::Map {
                    id: reply.task_id,
                    input_file: reply.input_file,
                    n_reduce: reply.n_reduce,
                }
            }
            TaskKind::Reduce => TaskAssignment::Reduce {
                id: reply.task_id,
                partition: reply.partition_index,
                map_tasks: reply.map_task_ids,
            },
        };
        Ok(assignment)
    }
}
