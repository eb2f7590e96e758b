//! Status transition resolution.
//!
//! Maps a collision result to the status the dragged task would get. Hovering
//! a column of the task's own status (or one of its siblings) yields no
//! pending transition, which is what separates a reorder candidate from a
//! status change while the gesture is still in flight.

use crate::task::{TaskCollection, TaskId, TaskStatus};

use super::collision::DropTarget;

/// What a drop on `target` would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropIntent {
    StatusChange { to: TaskStatus },
    Reorder { over: TaskId },
    NoOp,
}

/// Status implied by a target: columns directly, tasks by their own status.
pub fn implied_status(target: &DropTarget, tasks: &TaskCollection) -> Option<TaskStatus> {
    match target {
        DropTarget::Column(status) => Some(*status),
        DropTarget::Task(id) => tasks.get(id).map(|task| task.status),
    }
}

/// Pending transition for a hover, `None` when it would keep `origin`.
pub fn pending_status(
    target: &DropTarget,
    origin: TaskStatus,
    tasks: &TaskCollection,
) -> Option<TaskStatus> {
    implied_status(target, tasks).filter(|status| *status != origin)
}

pub fn classify_drop(
    active: &TaskId,
    origin: TaskStatus,
    target: &DropTarget,
    tasks: &TaskCollection,
) -> DropIntent {
    if let Some(to) = pending_status(target, origin, tasks) {
        return DropIntent::StatusChange { to };
    }
    match target {
        DropTarget::Task(over)
            if over != active
                && tasks.get(over).map(|task| task.status) == Some(origin) =>
        {
            DropIntent::Reorder { over: over.clone() }
        }
        _ => DropIntent::NoOp,
    }
}
