//! Storage layer for boardflow
//!
//! # Directory Structure
//!
//! ```text
//! <root>/
//!   .boardflow.toml          # Configuration
//!   .boardflow/
//!     tasks.json             # Tasks of every scope
//!     tasks.json.lock        # Writer lock
//! ```
//!
//! `tasks.json` is only replaced atomically while holding the lock.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CONFIG_FILE;
use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};
use crate::task::{Priority, Scope, Task, TaskCollection, TaskId, TaskStatus, TaskType};

/// Name of the data directory under the board root
pub const DATA_DIR: &str = ".boardflow";

pub const TASKS_FILE: &str = "tasks.json";

pub const TASKS_SCHEMA_VERSION: &str = "boardflow.tasks.v1";

/// A task together with the scope it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTask {
    pub scope: Scope,
    #[serde(flatten)]
    pub task: Task,
}

/// Contents of `tasks.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardFile {
    pub schema_version: String,
    #[serde(default)]
    pub tasks: Vec<StoredTask>,
}

impl Default for BoardFile {
    fn default() -> Self {
        Self {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            tasks: Vec::new(),
        }
    }
}

impl BoardFile {
    /// Tasks of `scope`, in file order
    pub fn scope_tasks(&self, scope: &Scope) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|stored| &stored.scope == scope)
            .map(|stored| stored.task.clone())
            .collect()
    }

    pub fn scopes(&self) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = Vec::new();
        for stored in &self.tasks {
            if !scopes.contains(&stored.scope) {
                scopes.push(stored.scope.clone());
            }
        }
        scopes
    }

    pub fn set_status(&mut self, scope: &Scope, id: &TaskId, status: TaskStatus) -> Result<()> {
        let stored = self
            .tasks
            .iter_mut()
            .find(|stored| &stored.scope == scope && &stored.task.id == id)
            .ok_or_else(|| Error::TaskNotFound(format!("{id} in {scope}")))?;
        stored.task.status = status;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != TASKS_SCHEMA_VERSION {
            return Err(Error::OperationFailed(format!(
                "unsupported tasks schema '{}' (expected {TASKS_SCHEMA_VERSION})",
                self.schema_version
            )));
        }
        for scope in self.scopes() {
            TaskCollection::new(self.scope_tasks(&scope))?;
        }
        Ok(())
    }

    /// Demo data written by `boardflow init`
    pub fn sample() -> Self {
        let sprint = Scope::Sprint("1".to_string());
        let entries = [
            (
                Scope::Backlog,
                Task::new("t-1", "Sketch onboarding flow", TaskStatus::ToDo)
                    .with_type(TaskType::Story)
                    .with_story_points(3.0)
                    .with_display_code("BF-1"),
            ),
            (
                Scope::Backlog,
                Task::new("t-2", "Fix login redirect loop", TaskStatus::InProgress)
                    .with_type(TaskType::Bug)
                    .with_priority(Priority::High)
                    .with_display_code("BF-2"),
            ),
            (
                Scope::Backlog,
                Task::new("t-3", "Archive old reports", TaskStatus::Closed).with_display_code("BF-3"),
            ),
            (
                sprint.clone(),
                Task::new("t-4", "Board drag and drop", TaskStatus::InProgress)
                    .with_type(TaskType::Story)
                    .with_story_points(5.0)
                    .with_assignee("dana")
                    .with_display_code("BF-4"),
            ),
            (
                sprint.clone(),
                Task::new("t-5", "Toast notifications", TaskStatus::ToDo)
                    .with_story_points(2.0)
                    .with_display_code("BF-5"),
            ),
            (
                sprint.clone(),
                Task::new("t-6", "Column layout config", TaskStatus::ToDo)
                    .with_priority(Priority::Low)
                    .with_display_code("BF-6"),
            ),
            (
                sprint.clone(),
                Task::new("t-7", "Rollback on failed update", TaskStatus::Review)
                    .with_priority(Priority::Highest)
                    .with_assignee("sam")
                    .with_display_code("BF-7"),
            ),
            (
                sprint,
                Task::new("t-8", "Status enum cleanup", TaskStatus::Done).with_display_code("BF-8"),
            ),
        ];
        Self {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            tasks: entries
                .into_iter()
                .map(|(scope, task)| StoredTask { scope, task })
                .collect(),
        }
    }
}

/// Storage manager for one board root
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.data_dir().join(TASKS_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn is_initialized(&self) -> bool {
        self.tasks_file().exists()
    }

    /// Error unless `boardflow init` ran here
    pub fn require_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::BoardNotInitialized(self.root.clone()))
        }
    }

    // =========================================================================
    // Board file
    // =========================================================================

    /// Read `tasks.json`; a missing file is an empty board
    pub fn read_board(&self) -> Result<BoardFile> {
        let path = self.tasks_file();
        if !path.exists() {
            return Ok(BoardFile::default());
        }
        let content = fs::read_to_string(&path)?;
        let board: BoardFile = serde_json::from_str(&content)?;
        board.validate()?;
        Ok(board)
    }

    pub fn write_board(&self, board: &BoardFile) -> Result<()> {
        board.validate()?;
        let path = self.tasks_file();
        lock::with_lock(&path, self.lock_timeout_ms, || write_board_unlocked(&path, board))
    }

    /// Read-modify-write `tasks.json` under the lock
    pub fn update_board<T>(&self, f: impl FnOnce(&mut BoardFile) -> Result<T>) -> Result<T> {
        let path = self.tasks_file();
        lock::with_lock(&path, self.lock_timeout_ms, || {
            let mut board = self.read_board()?;
            let result = f(&mut board)?;
            board.validate()?;
            write_board_unlocked(&path, &board)?;
            Ok(result)
        })
    }

    pub fn load_scope(&self, scope: &Scope) -> Result<Vec<Task>> {
        Ok(self.read_board()?.scope_tasks(scope))
    }

    /// Persist `status` unless `guard` fails once the lock is held
    pub fn set_status_checked(
        &self,
        scope: &Scope,
        id: &TaskId,
        status: TaskStatus,
        guard: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        debug!(%scope, %id, %status, "persisting status");
        self.update_board(|board| {
            guard()?;
            board.set_status(scope, id, status)
        })
    }
}

fn write_board_unlocked(path: &Path, board: &BoardFile) -> Result<()> {
    let json = serde_json::to_string_pretty(board)?;
    lock::write_atomic(path, json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn storage_paths() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        assert_eq!(storage.data_dir(), temp.path().join(".boardflow"));
        assert_eq!(
            storage.tasks_file(),
            temp.path().join(".boardflow").join("tasks.json")
        );
        assert_eq!(storage.config_file(), temp.path().join(".boardflow.toml"));
    }

    #[test]
    fn missing_file_is_empty_board() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        assert!(!storage.is_initialized());
        assert!(storage.load_scope(&Scope::Backlog).unwrap().is_empty());
        assert!(matches!(
            storage.require_initialized(),
            Err(Error::BoardNotInitialized(_))
        ));
    }

    #[test]
    fn sample_round_trips_per_scope() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        storage.write_board(&BoardFile::sample()).unwrap();

        let backlog = storage.load_scope(&Scope::Backlog).unwrap();
        let sprint = storage.load_scope(&Scope::Sprint("1".to_string())).unwrap();
        assert_eq!(backlog.len(), 3);
        assert_eq!(sprint.len(), 5);
        assert_eq!(sprint[0].id.as_str(), "t-4");
        assert_eq!(storage.read_board().unwrap(), BoardFile::sample());
    }

    #[test]
    fn set_status_persists() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        storage.write_board(&BoardFile::sample()).unwrap();

        storage
            .set_status_checked(&Scope::Backlog, &"t-1".into(), TaskStatus::Done, || Ok(()))
            .unwrap();
        let backlog = storage.load_scope(&Scope::Backlog).unwrap();
        assert_eq!(backlog[0].status, TaskStatus::Done);

        let err = storage
            .set_status_checked(&Scope::Backlog, &"t-4".into(), TaskStatus::Done, || Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(_)));
    }

    #[test]
    fn failed_guard_leaves_file_untouched() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path()).with_lock_timeout(100);
        storage.write_board(&BoardFile::sample()).unwrap();
        let before = fs::read_to_string(storage.tasks_file()).unwrap();

        let err = storage
            .set_status_checked(&Scope::Backlog, &"t-1".into(), TaskStatus::Done, || {
                Err(Error::BackendTimeout(100))
            })
            .unwrap_err();
        assert!(matches!(err, Error::BackendTimeout(100)));
        assert_eq!(fs::read_to_string(storage.tasks_file()).unwrap(), before);
    }

    #[test]
    fn stored_task_serializes_flat() {
        let stored = StoredTask {
            scope: Scope::Sprint("7".to_string()),
            task: Task::new("x", "X", TaskStatus::InProgress),
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["scope"], "sprint:7");
        assert_eq!(value["id"], "x");
        assert_eq!(value["status"], "in-progress");
        assert_eq!(value["type"], "task");
    }

    #[test]
    fn duplicate_ids_in_scope_rejected() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        let mut board = BoardFile::sample();
        let copy = board.tasks[0].clone();
        board.tasks.push(copy);
        assert!(matches!(
            storage.write_board(&board),
            Err(Error::DuplicateTask(_))
        ));
    }
}
