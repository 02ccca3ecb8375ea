use common::task::{Partition, TaskId};

/// What a dispatched task works on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Map over one input split.
    Map { input_file: String },

    /// Reduce one partition.
    Reduce { partition: Partition },
}

/// Lifecycle of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
    TimedOut,
}

/// One dispatched unit of work.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(id: TaskId, kind: TaskKind) -> Self {
        Self {
            id,
            kind,
            status: TaskStatus::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, TaskStatus::Running)
    }
}

/// Hands out task ids. Ids are never recycled, the intermediate store names
/// files after them.
#[derive(Debug)]
pub struct TaskIdVendor {
    next_task_id: TaskId,
}

impl Default for TaskIdVendor {
    fn default() -> Self {
        Self { next_task_id: 1 }
    }
}

impl TaskIdVendor {
    /// Returns a fresh task ID.
    pub fn create_task(&mut self) -> TaskId {
        let id = self.next_task_id;
        self.next_task_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_never_reused() {
        let mut vendor = TaskIdVendor::default();
        let ids: Vec<_> = (0..5).map(|_| vendor.create_task()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }
}
