//! Task model for boardflow.
//!
//! Tasks are fetched per scope (a sprint or the backlog) and held in a
//! [`TaskCollection`], an ordered list with unique ids. Order only matters
//! among tasks sharing a status; it drives manual reordering inside a column.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifecycle stage of a task. Every status may be shown as a board column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    ToDo,
    InProgress,
    Review,
    Done,
    Closed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::ToDo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Done,
        TaskStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "to-do",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
            TaskStatus::Closed => "closed",
        }
    }

    /// Column heading used by renderers.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Review => "Review",
            TaskStatus::Done => "Done",
            TaskStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .map(|ch| match ch {
                '_' | ' ' => '-',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "to-do" | "todo" => Ok(TaskStatus::ToDo),
            "in-progress" | "inprogress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "done" => Ok(TaskStatus::Done),
            "closed" => Ok(TaskStatus::Closed),
            _ => Err(Error::InvalidArgument(format!(
                "unknown status '{value}' (expected to-do|in-progress|review|done|closed)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Story,
    #[default]
    Task,
    Bug,
    Epic,
    Subtask,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Lowest,
    Low,
    #[default]
    Medium,
    High,
    Highest,
}

/// Stable task identifier, unique within a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub title: String,
    pub status: TaskStatus,
    #[serde(default, rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_code: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status,
            task_type: TaskType::default(),
            priority: Priority::default(),
            story_points: None,
            assigned_to: None,
            display_code: None,
        }
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_story_points(mut self, points: f64) -> Self {
        self.story_points = Some(points);
        self
    }

    pub fn with_assignee(mut self, user: impl Into<String>) -> Self {
        self.assigned_to = Some(user.into());
        self
    }

    pub fn with_display_code(mut self, code: impl Into<String>) -> Self {
        self.display_code = Some(code.into());
        self
    }

    /// Short label for cards: the display code when present, else the id.
    pub fn card_code(&self) -> &str {
        self.display_code.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_blank() {
            return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
        }
        if let Some(points) = self.story_points {
            if !points.is_finite() || points < 0.0 {
                return Err(Error::InvalidArgument(format!(
                    "task {}: story points must be a non-negative number (got {points})",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Where a task lives: the product backlog or one sprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    Backlog,
    Sprint(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Backlog => f.write_str("backlog"),
            Scope::Sprint(id) => write!(f, "sprint:{id}"),
        }
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("backlog") {
            return Ok(Scope::Backlog);
        }
        if let Some(id) = trimmed.strip_prefix("sprint:") {
            let id = id.trim();
            if id.is_empty() {
                return Err(Error::InvalidArgument(
                    "sprint scope needs an id (sprint:<id>)".to_string(),
                ));
            }
            return Ok(Scope::Sprint(id.to_string()));
        }
        Err(Error::InvalidArgument(format!(
            "invalid scope '{value}' (expected backlog or sprint:<id>)"
        )))
    }
}

impl TryFrom<String> for Scope {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

/// Ordered tasks of one scope. Ids are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskCollection {
    tasks: Vec<Task>,
}

impl TaskCollection {
    pub fn new(tasks: Vec<Task>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(tasks.len());
        for task in &tasks {
            task.validate()?;
            if !seen.insert(task.id.clone()) {
                return Err(Error::DuplicateTask(task.id.to_string()));
            }
        }
        Ok(Self { tasks })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| &task.id == id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.position(id).is_some()
    }

    pub fn into_vec(self) -> Vec<Task> {
        self.tasks
    }

    /// Returns the previous status when the task exists.
    pub(crate) fn set_status(&mut self, id: &TaskId, status: TaskStatus) -> Option<TaskStatus> {
        let task = self.tasks.iter_mut().find(|task| &task.id == id)?;
        let previous = task.status;
        task.status = status;
        Some(previous)
    }

    /// Moves `id` into the slot currently held by `over`.
    pub(crate) fn move_over(&mut self, id: &TaskId, over: &TaskId) -> bool {
        let (Some(from), Some(to)) = (self.position(id), self.position(over)) else {
            return false;
        };
        if from == to {
            return false;
        }
        let task = self.tasks.remove(from);
        self.tasks.insert(to, task);
        true
    }

    /// Moves `id` to `index`, clamped to the end of the list.
    pub(crate) fn move_to_index(&mut self, id: &TaskId, index: usize) -> bool {
        let Some(from) = self.position(id) else {
            return false;
        };
        let task = self.tasks.remove(from);
        let to = index.min(self.tasks.len());
        self.tasks.insert(to, task);
        from != to
    }

    pub(crate) fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let index = self.position(id)?;
        Some(self.tasks.remove(index))
    }

    /// Replaces a task with the same id in place, or appends it.
    pub(crate) fn upsert(&mut self, task: Task) -> Result<()> {
        task.validate()?;
        match self.position(&task.id) {
            Some(index) => self.tasks[index] = task,
            None => self.tasks.push(task),
        }
        Ok(())
    }
}
