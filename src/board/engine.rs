//! Board engine: the store, a drag controller and the mutation manager wired
//! together behind one set of input handlers.
//!
//! Sprint and backlog boards are the same engine with a different
//! [`BoardLayout`]. Renderers feed it presses, moves and releases together
//! with the drop regions they laid out, dispatch the returned
//! [`PendingUpdate`]s, and feed the answers back through
//! [`BoardEngine::confirm`].

use std::time::Instant;

use tracing::debug;

use crate::config::{BoardConfig, Config, InputConfig};
use crate::error::Error;
use crate::notify::{Notification, NotificationSink};
use crate::store::TaskStore;
use crate::task::{Scope, TaskCollection, TaskId, TaskStatus};

use super::collision::{CollisionInput, DropRegion};
use super::geometry::Point;
use super::mutation::{ConfirmOutcome, MutationManager, PendingUpdate, RollbackPolicy, Ticket};
use super::partition::{partition, BoardLayout, ColumnPartition};
use super::profile::{ActivationPolicy, InputModality};
use super::session::{
    CommittedDrop, DragController, DragPreview, PressOutcome, ReleaseOutcome, StartOutcome,
    TrackOutcome,
};
use super::transition::implied_status;

/// What a release did to the board.
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    Ignored,
    Click { task_id: TaskId },
    Cancelled { task_id: TaskId },
    NoOp { task_id: TaskId },
    Reordered { task_id: TaskId, over: TaskId },
    /// Applied locally; dispatch the update and confirm it later.
    Committed(PendingUpdate),
    /// The drop no longer matched the store and was dropped.
    Rejected { task_id: TaskId },
}

pub struct BoardEngine<S: NotificationSink> {
    store: TaskStore,
    board: BoardConfig,
    layout: BoardLayout,
    input: InputConfig,
    controller: DragController,
    mutations: MutationManager,
    sink: S,
}

impl<S: NotificationSink> BoardEngine<S> {
    pub fn new(store: TaskStore, config: &Config, sink: S) -> Self {
        let layout = config.layout(store.scope());
        Self {
            store,
            board: config.board.clone(),
            layout,
            input: config.input.clone(),
            controller: DragController::new(),
            mutations: MutationManager::new(config.sync.rollback),
            sink,
        }
    }

    pub fn with_policy(mut self, policy: RollbackPolicy) -> Self {
        self.mutations = MutationManager::new(policy);
        self
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// For subscribing to store changes.
    pub fn store_mut(&mut self) -> &mut TaskStore {
        &mut self.store
    }

    pub fn tasks(&self) -> &TaskCollection {
        self.store.tasks()
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn controller(&self) -> &DragController {
        &self.controller
    }

    pub fn mutations(&self) -> &MutationManager {
        &self.mutations
    }

    pub fn modality(&self) -> InputModality {
        self.input.modality
    }

    pub fn set_modality(&mut self, modality: InputModality) {
        self.input.modality = modality;
    }

    pub fn is_dragging(&self) -> bool {
        self.controller.is_dragging()
    }

    /// The "currently dragging" projection.
    pub fn dragging(&self) -> Option<DragPreview> {
        self.controller.preview()
    }

    /// Status of the hovered drop target, for highlighting its column.
    pub fn hovered_status(&self) -> Option<TaskStatus> {
        let session = self.controller.session()?;
        let target = session.cursor().target()?;
        implied_status(target, self.store.tasks())
    }

    pub fn partition(&self) -> ColumnPartition<'_> {
        partition(self.store.tasks(), &self.layout, self.hovered_status())
    }

    /// Replaces the collection, switching layout when the scope changes.
    ///
    /// An active drag is cancelled; callers defer reloads while dragging.
    pub fn load(&mut self, scope: Scope, tasks: TaskCollection) {
        if self.controller.cancel() {
            debug!("drag cancelled by reload");
        }
        if &scope != self.store.scope() {
            self.layout = self.board.layout(&scope);
        }
        self.store.load(scope, tasks);
    }

    pub fn press(&mut self, task_id: TaskId, point: Point, now: Instant) -> PressOutcome {
        let modality = self.input.modality;
        let policy = ActivationPolicy::for_modality(modality, &self.input);
        self.controller.press(task_id, point, modality, policy, now)
    }

    /// Starts a drag right away, bypassing activation thresholds.
    pub fn begin(&mut self, task_id: TaskId) -> StartOutcome {
        let modality = self.input.modality;
        self.controller.begin(task_id, modality, self.store.tasks())
    }

    /// Feeds a pointer move: activation first, then hover resolution.
    pub fn pointer_moved(
        &mut self,
        input: &CollisionInput,
        regions: &[DropRegion],
        now: Instant,
    ) -> TrackOutcome {
        let outcome = self.controller.track(input.pointer, now, self.store.tasks());
        if matches!(outcome, TrackOutcome::Activated | TrackOutcome::Dragging) {
            self.controller.hover(input, regions, self.store.tasks());
        }
        outcome
    }

    pub fn hover(&mut self, input: &CollisionInput, regions: &[DropRegion]) -> Option<TaskStatus> {
        self.controller.hover(input, regions, self.store.tasks())
    }

    pub fn release(&mut self) -> DropOutcome {
        match self.controller.release(self.store.tasks()) {
            ReleaseOutcome::Ignored => DropOutcome::Ignored,
            ReleaseOutcome::Click { task_id } => DropOutcome::Click { task_id },
            ReleaseOutcome::Cancelled { task_id } => DropOutcome::Cancelled { task_id },
            ReleaseOutcome::NoOp { task_id } => DropOutcome::NoOp { task_id },
            ReleaseOutcome::Reorder { task_id, over, .. } => {
                self.mutations.apply_reorder(&task_id, &over, &mut self.store);
                DropOutcome::Reordered { task_id, over }
            }
            ReleaseOutcome::StatusChange(drop) => self.commit(drop),
        }
    }

    pub fn cancel(&mut self) -> bool {
        self.controller.cancel()
    }

    /// Moves a task without a gesture, through the same commit path.
    pub fn transition(&mut self, task_id: &TaskId, status: TaskStatus) -> DropOutcome {
        let Some(from) = self.store.get(task_id).map(|task| task.status) else {
            self.sink.notify(Notification::validation(format!(
                "Task {task_id} not found in {}",
                self.store.scope()
            )));
            return DropOutcome::Rejected {
                task_id: task_id.clone(),
            };
        };
        if from == status {
            return DropOutcome::NoOp {
                task_id: task_id.clone(),
            };
        }
        self.commit(CommittedDrop {
            task_id: task_id.clone(),
            from,
            to: status,
            snapshot: self.store.snapshot(),
        })
    }

    pub fn confirm(&mut self, ticket: Ticket, result: Result<(), Error>) -> ConfirmOutcome {
        self.mutations
            .confirm(ticket, result, &mut self.store, &mut self.sink)
    }

    fn commit(&mut self, drop: CommittedDrop) -> DropOutcome {
        let task_id = drop.task_id.clone();
        match self.mutations.commit(drop, &mut self.store, &mut self.sink) {
            Some(update) => DropOutcome::Committed(update),
            None => DropOutcome::Rejected { task_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::geometry::Rect;
    use crate::notify::NotificationKind;
    use crate::task::Task;
    use std::time::Duration;

    fn engine() -> BoardEngine<Vec<Notification>> {
        let tasks = TaskCollection::new(vec![
            Task::new("A", "a", TaskStatus::ToDo),
            Task::new("B", "b", TaskStatus::InProgress),
            Task::new("C", "c", TaskStatus::Done),
        ])
        .unwrap();
        BoardEngine::new(
            TaskStore::new(Scope::Sprint("s1".to_string()), tasks),
            &Config::default(),
            Vec::new(),
        )
    }

    fn regions() -> Vec<DropRegion> {
        vec![
            DropRegion::column(TaskStatus::ToDo, Rect::new(0.0, 0.0, 20.0, 30.0)),
            DropRegion::column(TaskStatus::InProgress, Rect::new(20.0, 0.0, 20.0, 30.0)),
            DropRegion::column(TaskStatus::Review, Rect::new(40.0, 0.0, 20.0, 30.0)),
            DropRegion::column(TaskStatus::Done, Rect::new(60.0, 0.0, 20.0, 30.0)),
        ]
    }

    fn at(x: f64, y: f64) -> CollisionInput {
        CollisionInput {
            pointer: Point::new(x, y),
            dragged: Rect::new(x - 5.0, y - 1.0, 18.0, 3.0),
        }
    }

    #[test]
    fn gesture_drives_commit_and_confirmation() {
        let mut engine = engine();
        let now = Instant::now();
        engine.press("A".into(), Point::new(5.0, 2.0), now);
        assert_eq!(
            engine.pointer_moved(&at(25.0, 10.0), &regions(), now + Duration::from_millis(10)),
            TrackOutcome::Activated
        );
        assert_eq!(engine.hovered_status(), Some(TaskStatus::InProgress));
        assert!(engine.partition().column(TaskStatus::InProgress).unwrap().hovered);
        // Hovering never touches the store.
        assert_eq!(engine.store().version(), 0);

        let DropOutcome::Committed(update) = engine.release() else {
            panic!("expected a commit");
        };
        assert_eq!(update.status, TaskStatus::InProgress);
        engine.confirm(update.ticket, Ok(()));
        assert_eq!(
            engine.store().get(&"A".into()).unwrap().status,
            TaskStatus::InProgress
        );
        assert_eq!(engine.sink()[0].kind, NotificationKind::TransitionSucceeded);
    }

    #[test]
    fn transition_rejects_unknown_task() {
        let mut engine = engine();
        assert_eq!(
            engine.transition(&"Z".into(), TaskStatus::Done),
            DropOutcome::Rejected { task_id: "Z".into() }
        );
        assert_eq!(engine.sink()[0].kind, NotificationKind::Validation);
    }

    #[test]
    fn transition_to_same_status_is_noop() {
        let mut engine = engine();
        assert_eq!(
            engine.transition(&"C".into(), TaskStatus::Done),
            DropOutcome::NoOp { task_id: "C".into() }
        );
        assert_eq!(engine.mutations().pending(), 0);
    }

    #[test]
    fn load_switches_layout_with_scope() {
        let mut engine = engine();
        assert_eq!(engine.layout(), &BoardLayout::sprint());
        engine.load(Scope::Backlog, TaskCollection::empty());
        assert_eq!(engine.layout(), &BoardLayout::backlog());
        assert!(engine.tasks().is_empty());
    }

    #[test]
    fn load_cancels_active_drag() {
        let mut engine = engine();
        engine.begin("A".into());
        let tasks = engine.tasks().clone();
        engine.load(Scope::Sprint("s1".to_string()), tasks);
        assert!(!engine.is_dragging());
    }
}
