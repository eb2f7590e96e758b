//! Task collection store.
//!
//! The store owns the [`TaskCollection`] of the scope being viewed and is the
//! only place it is mutated. Every mutation bumps a store-wide version and the
//! revision of each task it touched, then notifies subscribers. Renderers
//! subscribe to learn when to recompute the column partition.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::task::{Scope, Task, TaskCollection, TaskId, TaskStatus};

pub type SubscriptionId = u64;

/// What changed in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    Loaded { scope: Scope, count: usize },
    StatusChanged {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
    Reordered { task_id: TaskId },
    Restored,
    Upserted { task_id: TaskId },
    Removed { task_id: TaskId },
}

type Subscriber = Box<dyn FnMut(&StoreChange)>;

pub struct TaskStore {
    scope: Scope,
    tasks: TaskCollection,
    version: u64,
    revisions: HashMap<TaskId, u64>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: SubscriptionId,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("scope", &self.scope)
            .field("tasks", &self.tasks)
            .field("version", &self.version)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl TaskStore {
    pub fn new(scope: Scope, tasks: TaskCollection) -> Self {
        Self {
            scope,
            tasks,
            version: 0,
            revisions: HashMap::new(),
            subscribers: Vec::new(),
            next_subscription: 1,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn tasks(&self) -> &TaskCollection {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Store-wide version, bumped on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Version at which `id` was last modified (0 when never touched).
    pub fn revision(&self, id: &TaskId) -> u64 {
        self.revisions.get(id).copied().unwrap_or(0)
    }

    /// Full copy of the current collection.
    pub fn snapshot(&self) -> TaskCollection {
        self.tasks.clone()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&StoreChange) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        before != self.subscribers.len()
    }

    /// Replaces the collection, e.g. on scope change or an external refresh.
    pub fn load(&mut self, scope: Scope, tasks: TaskCollection) {
        let previous = std::mem::replace(&mut self.tasks, tasks);
        self.version += 1;
        if scope != self.scope {
            self.revisions.clear();
            self.scope = scope.clone();
        } else {
            self.touch_differences(&previous);
        }
        let count = self.tasks.len();
        self.publish(StoreChange::Loaded { scope, count });
    }

    /// Returns the previous status. Setting the current status is a no-op.
    pub fn set_status(&mut self, id: &TaskId, status: TaskStatus) -> Result<TaskStatus> {
        let current = self
            .tasks
            .get(id)
            .map(|task| task.status)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        if current == status {
            return Ok(current);
        }
        self.tasks.set_status(id, status);
        self.bump(id);
        self.publish(StoreChange::StatusChanged {
            task_id: id.clone(),
            from: current,
            to: status,
        });
        Ok(current)
    }

    /// Moves `id` into the slot held by `over`.
    pub fn move_over(&mut self, id: &TaskId, over: &TaskId) -> bool {
        if !self.tasks.move_over(id, over) {
            return false;
        }
        self.bump(id);
        self.publish(StoreChange::Reordered { task_id: id.clone() });
        true
    }

    pub fn move_to_index(&mut self, id: &TaskId, index: usize) -> bool {
        if !self.tasks.move_to_index(id, index) {
            return false;
        }
        self.bump(id);
        self.publish(StoreChange::Reordered { task_id: id.clone() });
        true
    }

    /// Puts back a previously captured collection wholesale.
    pub fn restore(&mut self, snapshot: TaskCollection) {
        let previous = std::mem::replace(&mut self.tasks, snapshot);
        self.version += 1;
        self.touch_differences(&previous);
        self.publish(StoreChange::Restored);
    }

    pub fn upsert(&mut self, task: Task) -> Result<()> {
        let task_id = task.id.clone();
        self.tasks.upsert(task)?;
        self.bump(&task_id);
        self.publish(StoreChange::Upserted { task_id });
        Ok(())
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let removed = self.tasks.remove(id)?;
        self.bump(id);
        self.publish(StoreChange::Removed { task_id: id.clone() });
        Some(removed)
    }

    fn bump(&mut self, id: &TaskId) {
        self.version += 1;
        self.revisions.insert(id.clone(), self.version);
    }

    /// Marks every task whose record or position differs from `previous`.
    fn touch_differences(&mut self, previous: &TaskCollection) {
        let version = self.version;
        for (index, task) in self.tasks.iter().enumerate() {
            let unchanged = previous.position(&task.id) == Some(index)
                && previous.get(&task.id) == Some(task);
            if !unchanged {
                self.revisions.insert(task.id.clone(), version);
            }
        }
        for task in previous.iter() {
            if !self.tasks.contains(&task.id) {
                self.revisions.insert(task.id.clone(), version);
            }
        }
    }

    fn publish(&mut self, change: StoreChange) {
        debug!(version = self.version, ?change, "task store changed");
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store() -> TaskStore {
        let tasks = TaskCollection::new(vec![
            Task::new("A", "a", TaskStatus::ToDo),
            Task::new("B", "b", TaskStatus::InProgress),
            Task::new("C", "c", TaskStatus::Done),
        ])
        .unwrap();
        TaskStore::new(Scope::Backlog, tasks)
    }

    #[test]
    fn set_status_notifies_subscribers() {
        let mut store = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        let previous = store.set_status(&"A".into(), TaskStatus::Review).unwrap();
        assert_eq!(previous, TaskStatus::ToDo);
        assert_eq!(store.version(), 1);
        assert_eq!(store.revision(&"A".into()), 1);
        assert_eq!(store.revision(&"B".into()), 0);
        assert_eq!(
            seen.borrow().as_slice(),
            &[StoreChange::StatusChanged {
                task_id: "A".into(),
                from: TaskStatus::ToDo,
                to: TaskStatus::Review,
            }]
        );
    }

    #[test]
    fn same_status_is_silent() {
        let mut store = store();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        store.subscribe(move |_| *counter.borrow_mut() += 1);

        store.set_status(&"B".into(), TaskStatus::InProgress).unwrap();
        assert_eq!(store.version(), 0);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn unknown_task_is_an_error() {
        let mut store = store();
        let err = store.set_status(&"Z".into(), TaskStatus::Done).unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(_)));
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let mut store = store();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let id = store.subscribe(move |_| *counter.borrow_mut() += 1);
        store.set_status(&"A".into(), TaskStatus::Done).unwrap();
        assert!(store.unsubscribe(id));
        store.set_status(&"A".into(), TaskStatus::ToDo).unwrap();
        assert_eq!(*calls.borrow(), 1);
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn restore_touches_only_changed_tasks() {
        let mut store = store();
        let snapshot = store.snapshot();
        store.set_status(&"A".into(), TaskStatus::Done).unwrap();
        let after_commit = store.version();

        store.restore(snapshot.clone());
        assert_eq!(store.tasks(), &snapshot);
        assert_eq!(store.revision(&"A".into()), after_commit + 1);
        assert_eq!(store.revision(&"C".into()), 0);
    }

    #[test]
    fn reload_same_scope_keeps_unchanged_revisions() {
        let mut store = store();
        store.set_status(&"B".into(), TaskStatus::Review).unwrap();
        let b_revision = store.revision(&"B".into());

        let mut next = store.snapshot().into_vec();
        next[0].status = TaskStatus::InProgress;
        store.load(Scope::Backlog, TaskCollection::new(next).unwrap());

        assert_eq!(store.revision(&"B".into()), b_revision);
        assert_eq!(store.revision(&"A".into()), store.version());
    }
}
