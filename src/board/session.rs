//! Drag session controller.
//!
//! Lifecycle of one drag gesture:
//!
//! ```text
//! Idle --press--> Armed --threshold met--> Dragging --release/cancel--> Idle
//!                   |                         |
//!                   +--abort / release--> Idle +--hover: update cursor only
//! ```
//!
//! Hover updates only touch the session's [`HoverCursor`]. The store is left
//! alone until release so fast pointer movement causes no list churn. The
//! cursor is read once, at commit time.

use std::time::Instant;

use tracing::{debug, warn};

use crate::task::{TaskCollection, TaskId, TaskStatus};

use super::collision::{CollisionChain, CollisionInput, DropRegion, DropTarget};
use super::geometry::Point;
use super::profile::{Activation, ActivationPolicy, GestureCandidate, InputModality};
use super::transition::{classify_drop, pending_status, DropIntent};

/// Last hover result of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoverCursor {
    target: Option<DropTarget>,
    pending_status: Option<TaskStatus>,
}

impl HoverCursor {
    pub fn target(&self) -> Option<&DropTarget> {
        self.target.as_ref()
    }

    /// `None` whenever the hovered target keeps the origin status.
    pub fn pending_status(&self) -> Option<TaskStatus> {
        self.pending_status
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    active_task_id: TaskId,
    origin_status: TaskStatus,
    modality: InputModality,
    snapshot: TaskCollection,
    cursor: HoverCursor,
}

impl DragSession {
    pub fn active_task_id(&self) -> &TaskId {
        &self.active_task_id
    }

    pub fn origin_status(&self) -> TaskStatus {
        self.origin_status
    }

    pub fn modality(&self) -> InputModality {
        self.modality
    }

    /// Collection as it was when the drag started.
    pub fn snapshot(&self) -> &TaskCollection {
        &self.snapshot
    }

    pub fn cursor(&self) -> &HoverCursor {
        &self.cursor
    }
}

/// Read-only projection of the task being dragged, for floating previews.
#[derive(Debug, Clone, PartialEq)]
pub struct DragPreview {
    pub task_id: TaskId,
    pub origin_status: TaskStatus,
    pub pending_status: Option<TaskStatus>,
    pub target: Option<DropTarget>,
}

/// A status change released by a session, ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedDrop {
    pub task_id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub snapshot: TaskCollection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PressOutcome {
    Armed,
    /// A session is already dragging; the press is ignored.
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Started,
    Rejected,
    UnknownTask,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Idle,
    Pending,
    Aborted,
    Activated,
    Dragging,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    /// Nothing was pressed or dragging.
    Ignored,
    /// Released before the activation thresholds were met.
    Click { task_id: TaskId },
    /// Released with no drop target.
    Cancelled { task_id: TaskId },
    /// Released where nothing changes.
    NoOp { task_id: TaskId },
    StatusChange(CommittedDrop),
    Reorder {
        task_id: TaskId,
        over: TaskId,
        snapshot: TaskCollection,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Armed(GestureCandidate),
    Dragging(DragSession),
}

#[derive(Debug, Clone)]
pub struct DragController {
    phase: Phase,
    pointer_chain: CollisionChain,
    touch_chain: CollisionChain,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    pub fn new() -> Self {
        Self::with_chains(CollisionChain::pointer(), CollisionChain::touch())
    }

    pub fn with_chains(pointer_chain: CollisionChain, touch_chain: CollisionChain) -> Self {
        Self {
            phase: Phase::Idle,
            pointer_chain,
            touch_chain,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, Phase::Dragging(_))
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.phase {
            Phase::Dragging(session) => Some(session),
            _ => None,
        }
    }

    pub fn candidate(&self) -> Option<&GestureCandidate> {
        match &self.phase {
            Phase::Armed(candidate) => Some(candidate),
            _ => None,
        }
    }

    pub fn preview(&self) -> Option<DragPreview> {
        self.session().map(|session| DragPreview {
            task_id: session.active_task_id.clone(),
            origin_status: session.origin_status,
            pending_status: session.cursor.pending_status,
            target: session.cursor.target.clone(),
        })
    }

    /// Arms a candidate gesture on `task_id`.
    pub fn press(
        &mut self,
        task_id: TaskId,
        point: Point,
        modality: InputModality,
        policy: ActivationPolicy,
        now: Instant,
    ) -> PressOutcome {
        if self.is_dragging() {
            debug!(%task_id, "press ignored: drag session already active");
            return PressOutcome::Rejected;
        }
        debug!(%task_id, ?modality, "gesture armed");
        self.phase = Phase::Armed(GestureCandidate::new(task_id, point, now, modality, policy));
        PressOutcome::Armed
    }

    /// Feeds pointer travel to an armed candidate.
    pub fn track(&mut self, point: Point, now: Instant, tasks: &TaskCollection) -> TrackOutcome {
        let candidate = match &self.phase {
            Phase::Idle => return TrackOutcome::Idle,
            Phase::Dragging(_) => return TrackOutcome::Dragging,
            Phase::Armed(candidate) => candidate,
        };
        match candidate.evaluate(point, now) {
            Activation::Pending => TrackOutcome::Pending,
            Activation::Abort => {
                debug!(task_id = %candidate.task_id, "gesture aborted before activation");
                self.phase = Phase::Idle;
                TrackOutcome::Aborted
            }
            Activation::Activate => {
                let task_id = candidate.task_id.clone();
                let modality = candidate.modality;
                self.phase = Phase::Idle;
                match self.begin(task_id, modality, tasks) {
                    StartOutcome::Started => TrackOutcome::Activated,
                    StartOutcome::Rejected | StartOutcome::UnknownTask => TrackOutcome::Aborted,
                }
            }
        }
    }

    /// Opens a drag session immediately, skipping activation thresholds.
    pub fn begin(
        &mut self,
        task_id: TaskId,
        modality: InputModality,
        tasks: &TaskCollection,
    ) -> StartOutcome {
        if self.is_dragging() {
            debug!(%task_id, "start rejected: drag session already active");
            return StartOutcome::Rejected;
        }
        let Some(task) = tasks.get(&task_id) else {
            warn!(%task_id, "drag start on a task that is not in the collection");
            self.phase = Phase::Idle;
            return StartOutcome::UnknownTask;
        };
        debug!(%task_id, origin = %task.status, "drag session started");
        self.phase = Phase::Dragging(DragSession {
            origin_status: task.status,
            active_task_id: task_id,
            modality,
            snapshot: tasks.clone(),
            cursor: HoverCursor::default(),
        });
        StartOutcome::Started
    }

    /// Re-resolves the drop target and updates the hover cursor.
    ///
    /// Returns the pending status; `None` also when not dragging.
    pub fn hover(
        &mut self,
        input: &CollisionInput,
        regions: &[DropRegion],
        tasks: &TaskCollection,
    ) -> Option<TaskStatus> {
        let Phase::Dragging(session) = &mut self.phase else {
            return None;
        };
        let chain = match session.modality {
            InputModality::Pointer => &self.pointer_chain,
            InputModality::Touch => &self.touch_chain,
        };
        let target = chain.resolve(input, regions).map(|region| region.target.clone());
        let pending = target
            .as_ref()
            .and_then(|target| pending_status(target, session.origin_status, tasks));
        session.cursor = HoverCursor {
            target,
            pending_status: pending,
        };
        pending
    }

    /// Ends the gesture and reports what the drop means.
    pub fn release(&mut self, tasks: &TaskCollection) -> ReleaseOutcome {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => ReleaseOutcome::Ignored,
            Phase::Armed(candidate) => ReleaseOutcome::Click {
                task_id: candidate.task_id,
            },
            Phase::Dragging(session) => Self::resolve_release(session, tasks),
        }
    }

    /// Drops the gesture without effect. Returns whether anything was active.
    pub fn cancel(&mut self) -> bool {
        let previous = std::mem::replace(&mut self.phase, Phase::Idle);
        if let Phase::Dragging(session) = &previous {
            debug!(task_id = %session.active_task_id, "drag session cancelled");
        }
        !matches!(previous, Phase::Idle)
    }

    fn resolve_release(session: DragSession, tasks: &TaskCollection) -> ReleaseOutcome {
        let DragSession {
            active_task_id,
            origin_status,
            snapshot,
            cursor,
            ..
        } = session;

        let Some(target) = cursor.target else {
            debug!(task_id = %active_task_id, "released without a drop target");
            return ReleaseOutcome::Cancelled {
                task_id: active_task_id,
            };
        };

        if let Some(to) = cursor.pending_status {
            debug!(task_id = %active_task_id, from = %origin_status, %to, "released on a new status");
            return ReleaseOutcome::StatusChange(CommittedDrop {
                task_id: active_task_id,
                from: origin_status,
                to,
                snapshot,
            });
        }

        match classify_drop(&active_task_id, origin_status, &target, tasks) {
            DropIntent::Reorder { over } => {
                debug!(task_id = %active_task_id, %over, "released over a sibling");
                ReleaseOutcome::Reorder {
                    task_id: active_task_id,
                    over,
                    snapshot,
                }
            }
            // The last hover decides; a status that appeared after it is ignored.
            DropIntent::StatusChange { .. } | DropIntent::NoOp => ReleaseOutcome::NoOp {
                task_id: active_task_id,
            },
        }
    }
}
