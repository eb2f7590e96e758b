//! Column partition view.
//!
//! A pure projection of the collection into the configured columns. It
//! borrows the tasks and keeps their relative order, so recomputing it after
//! every store change is cheap and always agrees with the store.

use serde::{Deserialize, Serialize};

use crate::task::{Scope, Task, TaskCollection, TaskStatus};

/// Ordered columns shown by a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLayout {
    pub columns: Vec<TaskStatus>,
}

impl BoardLayout {
    pub fn new(columns: Vec<TaskStatus>) -> Self {
        Self { columns }
    }

    pub fn sprint() -> Self {
        Self::new(vec![
            TaskStatus::ToDo,
            TaskStatus::InProgress,
            TaskStatus::Review,
            TaskStatus::Done,
        ])
    }

    pub fn backlog() -> Self {
        Self::new(vec![
            TaskStatus::ToDo,
            TaskStatus::InProgress,
            TaskStatus::Done,
            TaskStatus::Closed,
        ])
    }

    /// Layout for a scope using the built-in defaults.
    pub fn for_scope(scope: &Scope) -> Self {
        match scope {
            Scope::Backlog => Self::backlog(),
            Scope::Sprint(_) => Self::sprint(),
        }
    }

    pub fn contains(&self, status: TaskStatus) -> bool {
        self.columns.contains(&status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column<'a> {
    pub status: TaskStatus,
    pub tasks: Vec<&'a Task>,
    pub hovered: bool,
}

impl Column<'_> {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPartition<'a> {
    pub columns: Vec<Column<'a>>,
    /// Tasks whose status has no column in the layout.
    pub hidden: usize,
}

impl<'a> ColumnPartition<'a> {
    pub fn column(&self, status: TaskStatus) -> Option<&Column<'a>> {
        self.columns.iter().find(|column| column.status == status)
    }
}

pub fn partition<'a>(
    tasks: &'a TaskCollection,
    layout: &BoardLayout,
    hovered: Option<TaskStatus>,
) -> ColumnPartition<'a> {
    let mut columns: Vec<Column<'a>> = layout
        .columns
        .iter()
        .map(|status| Column {
            status: *status,
            tasks: Vec::new(),
            hovered: hovered == Some(*status),
        })
        .collect();

    let mut hidden = 0;
    for task in tasks.iter() {
        match columns.iter_mut().find(|column| column.status == task.status) {
            Some(column) => column.tasks.push(task),
            None => hidden += 1,
        }
    }

    ColumnPartition { columns, hidden }
}
