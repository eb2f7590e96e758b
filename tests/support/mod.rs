#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use boardflow::config::{Config, CONFIG_FILE};
use boardflow::storage::{BoardFile, Storage};
use boardflow::task::{Scope, TaskId, TaskStatus};
use tempfile::TempDir;

/// Board root in a temp dir, seeded with the sample board.
pub struct TestBoard {
    dir: TempDir,
}

impl TestBoard {
    pub fn init() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        Config::default().save(&dir.path().join(CONFIG_FILE))?;
        Storage::new(dir.path()).write_board(&BoardFile::sample())?;
        Ok(Self { dir })
    }

    pub fn empty() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn storage(&self) -> Storage {
        Storage::new(self.dir.path())
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(CONFIG_FILE);
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn status_of(&self, scope: &Scope, id: &str) -> Option<TaskStatus> {
        let board = self.storage().read_board().ok()?;
        let id = TaskId::from(id);
        board
            .scope_tasks(scope)
            .into_iter()
            .find(|task| task.id == id)
            .map(|task| task.status)
    }
}

pub fn boardflow_cmd() -> Command {
    let mut cmd = Command::cargo_bin("boardflow").expect("binary");
    cmd.env_remove("BOARDFLOW_ROOT");
    cmd.env_remove("RUST_LOG");
    cmd
}

pub fn board_cmd(board: &TestBoard) -> Command {
    let mut cmd = boardflow_cmd();
    cmd.current_dir(board.path());
    cmd
}

pub fn sprint() -> Scope {
    Scope::Sprint("1".to_string())
}
