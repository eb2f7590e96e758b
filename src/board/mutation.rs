//! Optimistic mutation manager.
//!
//! A status drop is applied to the store immediately and handed out as a
//! [`PendingUpdate`] for the backend. The backend's answer comes back through
//! [`MutationManager::confirm`], which either forgets the ticket or rolls the
//! change back according to the configured [`RollbackPolicy`].
//!
//! Several tickets may be in flight at once and confirmations arrive in any
//! order. Each rollback only acts on its own commit, and never outlives the
//! scope it was committed in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::notify::{Notification, NotificationSink};
use crate::store::TaskStore;
use crate::task::{Scope, TaskCollection, TaskId, TaskStatus};

use super::session::CommittedDrop;

pub type Ticket = u64;

/// How a failed confirmation is undone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackPolicy {
    /// Always restore the whole collection captured when the drag started.
    Snapshot,
    /// Revert only the affected task, and only if nothing touched it since.
    Patch,
    /// Full restore while the store is untouched since the commit, patch otherwise.
    #[default]
    Guarded,
}

/// A committed status change waiting for the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub ticket: Ticket,
    pub task_id: TaskId,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackKind {
    Snapshot,
    Patch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed {
        task_id: TaskId,
        status: TaskStatus,
    },
    RolledBack {
        task_id: TaskId,
        status: TaskStatus,
        kind: RollbackKind,
    },
    /// The task or its scope changed after the commit; the failed change was
    /// left alone.
    Superseded { task_id: TaskId },
    UnknownTicket,
}

#[derive(Debug, Clone)]
struct InFlight {
    task_id: TaskId,
    scope: Scope,
    from: TaskStatus,
    to: TaskStatus,
    origin_index: usize,
    snapshot: TaskCollection,
    committed_version: u64,
    committed_revision: u64,
}

#[derive(Debug, Default)]
pub struct MutationManager {
    policy: RollbackPolicy,
    next_ticket: Ticket,
    in_flight: HashMap<Ticket, InFlight>,
}

impl MutationManager {
    pub fn new(policy: RollbackPolicy) -> Self {
        Self {
            policy,
            next_ticket: 1,
            in_flight: HashMap::new(),
        }
    }

    pub fn policy(&self) -> RollbackPolicy {
        self.policy
    }

    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_pending(&self, task_id: &TaskId) -> bool {
        self.in_flight.values().any(|entry| &entry.task_id == task_id)
    }

    /// Applies a released status change and returns the update to dispatch.
    ///
    /// Returns `None` after a validation notification when the drop no
    /// longer matches the store.
    pub fn commit(
        &mut self,
        drop: CommittedDrop,
        store: &mut TaskStore,
        sink: &mut dyn NotificationSink,
    ) -> Option<PendingUpdate> {
        let CommittedDrop {
            task_id,
            from,
            to,
            snapshot,
        } = drop;

        let Some(current) = store.get(&task_id).map(|task| task.status) else {
            warn!(%task_id, "commit for a task that left the store");
            sink.notify(Notification::validation(format!(
                "Task {task_id} no longer exists"
            )));
            return None;
        };
        if current != from {
            warn!(%task_id, expected = %from, %current, "commit for a task whose status changed");
            sink.notify(Notification::validation(format!(
                "Task {task_id} changed to {} while it was being moved",
                current.label()
            )));
            return None;
        }
        if from == to {
            debug!(%task_id, "commit without a status change");
            return None;
        }

        let origin_index = store
            .tasks()
            .position(&task_id)
            .or_else(|| snapshot.position(&task_id))
            .unwrap_or(0);
        let snapshot = match self.policy {
            RollbackPolicy::Snapshot => snapshot,
            RollbackPolicy::Patch | RollbackPolicy::Guarded => store.snapshot(),
        };

        if let Err(err) = store.set_status(&task_id, to) {
            warn!(%task_id, error = %err, "optimistic apply failed");
            sink.notify(Notification::validation(err.to_string()));
            return None;
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        info!(ticket, %task_id, %from, %to, "status change committed");
        self.in_flight.insert(
            ticket,
            InFlight {
                task_id: task_id.clone(),
                scope: store.scope().clone(),
                from,
                to,
                origin_index,
                snapshot,
                committed_version: store.version(),
                committed_revision: store.revision(&task_id),
            },
        );
        Some(PendingUpdate {
            ticket,
            task_id,
            status: to,
        })
    }

    /// Moves `task_id` into the slot of a same-status sibling.
    ///
    /// Reorders stay local; nothing is dispatched for them.
    pub fn apply_reorder(&mut self, task_id: &TaskId, over: &TaskId, store: &mut TaskStore) -> bool {
        let moved = store.move_over(task_id, over);
        debug!(%task_id, %over, moved, "reorder applied");
        moved
    }

    /// Reconciles a backend answer for `ticket`.
    pub fn confirm(
        &mut self,
        ticket: Ticket,
        result: Result<(), Error>,
        store: &mut TaskStore,
        sink: &mut dyn NotificationSink,
    ) -> ConfirmOutcome {
        let Some(entry) = self.in_flight.remove(&ticket) else {
            warn!(ticket, "confirmation for an unknown ticket ignored");
            return ConfirmOutcome::UnknownTicket;
        };

        match result {
            Ok(()) => {
                info!(ticket, task_id = %entry.task_id, status = %entry.to, "status change confirmed");
                sink.notify(Notification::succeeded(format!(
                    "Moved {} to {}",
                    entry.task_id,
                    entry.to.label()
                )));
                ConfirmOutcome::Confirmed {
                    task_id: entry.task_id,
                    status: entry.to,
                }
            }
            Err(err) => self.roll_back(ticket, entry, &err, store, sink),
        }
    }

    fn roll_back(
        &self,
        ticket: Ticket,
        entry: InFlight,
        err: &Error,
        store: &mut TaskStore,
        sink: &mut dyn NotificationSink,
    ) -> ConfirmOutcome {
        let untouched = store.version() == entry.committed_version;
        let same_scope = store.scope() == &entry.scope;
        let kind = match self.policy {
            _ if !same_scope => None,
            RollbackPolicy::Snapshot => Some(RollbackKind::Snapshot),
            RollbackPolicy::Guarded if untouched => Some(RollbackKind::Snapshot),
            RollbackPolicy::Guarded | RollbackPolicy::Patch => {
                self.patch_allowed(&entry, store).then_some(RollbackKind::Patch)
            }
        };

        let Some(kind) = kind else {
            if same_scope {
                warn!(ticket, task_id = %entry.task_id, error = %err, "status change failed but task changed since; keeping it");
            } else {
                warn!(ticket, task_id = %entry.task_id, scope = %entry.scope, error = %err, "status change failed after leaving its scope; nothing to restore");
            }
            sink.notify(Notification::failed(format!(
                "Failed to move {} to {}: {err}",
                entry.task_id,
                entry.to.label()
            )));
            return ConfirmOutcome::Superseded {
                task_id: entry.task_id,
            };
        };

        match kind {
            RollbackKind::Snapshot => store.restore(entry.snapshot),
            RollbackKind::Patch => {
                if let Err(restore_err) = store.set_status(&entry.task_id, entry.from) {
                    warn!(ticket, task_id = %entry.task_id, error = %restore_err, "patch rollback failed");
                }
                store.move_to_index(&entry.task_id, entry.origin_index);
            }
        }
        warn!(ticket, task_id = %entry.task_id, error = %err, ?kind, "status change rolled back");
        sink.notify(Notification::failed(format!(
            "Failed to move {} to {}: {err}",
            entry.task_id,
            entry.to.label()
        )));
        ConfirmOutcome::RolledBack {
            task_id: entry.task_id,
            status: entry.from,
            kind,
        }
    }

    fn patch_allowed(&self, entry: &InFlight, store: &TaskStore) -> bool {
        store.revision(&entry.task_id) == entry.committed_revision
            && store.get(&entry.task_id).map(|task| task.status) == Some(entry.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotificationKind, Severity};
    use crate::task::{Scope, Task};

    fn store() -> TaskStore {
        let tasks = TaskCollection::new(vec![
            Task::new("A", "a", TaskStatus::ToDo),
            Task::new("B", "b", TaskStatus::InProgress),
            Task::new("C", "c", TaskStatus::Done),
        ])
        .unwrap();
        TaskStore::new(Scope::Backlog, tasks)
    }

    fn drop_of(store: &TaskStore, id: &str, to: TaskStatus) -> CommittedDrop {
        let task_id = TaskId::from(id);
        CommittedDrop {
            from: store.get(&task_id).unwrap().status,
            task_id,
            to,
            snapshot: store.snapshot(),
        }
    }

    fn status(store: &TaskStore, id: &str) -> TaskStatus {
        store.get(&id.into()).unwrap().status
    }

    #[test]
    fn commit_applies_before_confirmation() {
        let mut store = store();
        let mut manager = MutationManager::new(RollbackPolicy::Guarded);
        let mut sink = Vec::new();

        let drop = drop_of(&store, "A", TaskStatus::InProgress);
        let update = manager.commit(drop, &mut store, &mut sink).unwrap();
        assert_eq!(update.ticket, 1);
        assert_eq!(update.status, TaskStatus::InProgress);
        assert_eq!(status(&store, "A"), TaskStatus::InProgress);
        assert!(manager.is_pending(&"A".into()));
        assert!(sink.is_empty());
    }

    #[test]
    fn success_keeps_change_and_notifies() {
        let mut store = store();
        let mut manager = MutationManager::new(RollbackPolicy::Guarded);
        let mut sink = Vec::new();

        let drop = drop_of(&store, "A", TaskStatus::InProgress);
        let update = manager.commit(drop, &mut store, &mut sink).unwrap();
        let outcome = manager.confirm(update.ticket, Ok(()), &mut store, &mut sink);

        assert!(matches!(outcome, ConfirmOutcome::Confirmed { .. }));
        assert_eq!(status(&store, "A"), TaskStatus::InProgress);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].kind, NotificationKind::TransitionSucceeded);
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn failure_restores_snapshot() {
        let mut store = store();
        let before = store.snapshot();
        let mut manager = MutationManager::new(RollbackPolicy::Guarded);
        let mut sink = Vec::new();

        let drop = drop_of(&store, "A", TaskStatus::InProgress);
        let update = manager.commit(drop, &mut store, &mut sink).unwrap();
        let outcome = manager.confirm(
            update.ticket,
            Err(Error::Backend("rejected".to_string())),
            &mut store,
            &mut sink,
        );

        assert_eq!(
            outcome,
            ConfirmOutcome::RolledBack {
                task_id: "A".into(),
                status: TaskStatus::ToDo,
                kind: RollbackKind::Snapshot,
            }
        );
        assert_eq!(store.tasks(), &before);
        assert_eq!(sink[0].severity, Severity::Error);
    }

    #[test]
    fn stale_drop_is_rejected_with_validation() {
        let mut store = store();
        let mut manager = MutationManager::new(RollbackPolicy::Guarded);
        let mut sink = Vec::new();

        let drop = drop_of(&store, "A", TaskStatus::Review);
        store.set_status(&"A".into(), TaskStatus::Done).unwrap();
        assert!(manager.commit(drop, &mut store, &mut sink).is_none());
        assert_eq!(sink[0].kind, NotificationKind::Validation);

        let mut ghost = drop_of(&store, "B", TaskStatus::Done);
        ghost.task_id = "Z".into();
        assert!(manager.commit(ghost, &mut store, &mut sink).is_none());
        assert_eq!(sink.len(), 2);
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn guarded_failure_spares_later_commits() {
        let mut store = store();
        let mut manager = MutationManager::new(RollbackPolicy::Guarded);
        let mut sink = Vec::new();

        let first = drop_of(&store, "A", TaskStatus::InProgress);
        let a = manager.commit(first, &mut store, &mut sink).unwrap();
        let second = drop_of(&store, "B", TaskStatus::Review);
        let b = manager.commit(second, &mut store, &mut sink).unwrap();

        manager.confirm(b.ticket, Ok(()), &mut store, &mut sink);
        let outcome = manager.confirm(
            a.ticket,
            Err(Error::BackendTimeout(50)),
            &mut store,
            &mut sink,
        );

        assert!(matches!(
            outcome,
            ConfirmOutcome::RolledBack {
                kind: RollbackKind::Patch,
                ..
            }
        ));
        assert_eq!(status(&store, "A"), TaskStatus::ToDo);
        assert_eq!(status(&store, "B"), TaskStatus::Review);
        assert_eq!(store.tasks().position(&"A".into()), Some(0));
    }

    #[test]
    fn snapshot_policy_reverts_everything() {
        let mut store = store();
        let mut manager = MutationManager::new(RollbackPolicy::Snapshot);
        let mut sink = Vec::new();

        let first = drop_of(&store, "A", TaskStatus::InProgress);
        let a = manager.commit(first, &mut store, &mut sink).unwrap();
        let second = drop_of(&store, "B", TaskStatus::Review);
        let b = manager.commit(second, &mut store, &mut sink).unwrap();

        manager.confirm(b.ticket, Ok(()), &mut store, &mut sink);
        manager.confirm(a.ticket, Err(Error::Backend("down".into())), &mut store, &mut sink);

        assert_eq!(status(&store, "A"), TaskStatus::ToDo);
        assert_eq!(status(&store, "B"), TaskStatus::InProgress);
    }

    #[test]
    fn patch_skips_task_changed_after_commit() {
        let mut store = store();
        let mut manager = MutationManager::new(RollbackPolicy::Patch);
        let mut sink = Vec::new();

        let drop = drop_of(&store, "A", TaskStatus::InProgress);
        let update = manager.commit(drop, &mut store, &mut sink).unwrap();
        store.set_status(&"A".into(), TaskStatus::Closed).unwrap();

        let outcome = manager.confirm(
            update.ticket,
            Err(Error::Backend("rejected".into())),
            &mut store,
            &mut sink,
        );
        assert_eq!(outcome, ConfirmOutcome::Superseded { task_id: "A".into() });
        assert_eq!(status(&store, "A"), TaskStatus::Closed);
        assert_eq!(sink.last().unwrap().kind, NotificationKind::TransitionFailed);
    }

    #[test]
    fn failure_after_scope_change_keeps_loaded_tasks() {
        for policy in [RollbackPolicy::Snapshot, RollbackPolicy::Patch, RollbackPolicy::Guarded] {
            let mut store = store();
            let mut manager = MutationManager::new(policy);
            let mut sink = Vec::new();

            let drop = drop_of(&store, "A", TaskStatus::Done);
            let update = manager.commit(drop, &mut store, &mut sink).unwrap();
            let sprint = TaskCollection::new(vec![Task::new("X", "x", TaskStatus::ToDo)]).unwrap();
            store.load(Scope::Sprint("2".to_string()), sprint.clone());

            let outcome = manager.confirm(
                update.ticket,
                Err(Error::Backend("rejected".into())),
                &mut store,
                &mut sink,
            );
            assert_eq!(outcome, ConfirmOutcome::Superseded { task_id: "A".into() }, "{policy:?}");
            assert_eq!(store.tasks(), &sprint, "{policy:?}");
            assert_eq!(store.scope(), &Scope::Sprint("2".to_string()));
            assert_eq!(sink.last().unwrap().kind, NotificationKind::TransitionFailed);
        }
    }

    #[test]
    fn unknown_ticket_is_ignored() {
        let mut store = store();
        let version = store.version();
        let mut manager = MutationManager::new(RollbackPolicy::Guarded);
        let mut sink = Vec::new();
        assert_eq!(
            manager.confirm(42, Ok(()), &mut store, &mut sink),
            ConfirmOutcome::UnknownTicket
        );
        assert_eq!(store.version(), version);
        assert!(sink.is_empty());
    }

    #[test]
    fn reorder_moves_without_ticket() {
        let mut store = TaskStore::new(
            Scope::Backlog,
            TaskCollection::new(vec![
                Task::new("A", "a", TaskStatus::ToDo),
                Task::new("B", "b", TaskStatus::ToDo),
            ])
            .unwrap(),
        );
        let mut manager = MutationManager::new(RollbackPolicy::Guarded);
        assert!(manager.apply_reorder(&"A".into(), &"B".into(), &mut store));
        let order: Vec<_> = store.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
        assert_eq!(manager.pending(), 0);
    }
}
