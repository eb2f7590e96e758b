//! boardflow init command implementation
//!
//! Creates `.boardflow.toml` and a sample `.boardflow/tasks.json`.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::{BoardFile, Storage};

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    tasks: bool,
}

pub fn run(root: &Path, force: bool, output: OutputOptions) -> Result<()> {
    if root.exists() && !root.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "board root is not a directory: {}",
            root.display()
        )));
    }
    let storage = Storage::new(root);

    let created_config = write_if_needed(&storage.config_file(), force, |path| {
        Config::default().save(path)
    })?;
    let created_tasks = write_if_needed(&storage.tasks_file(), force, |_| {
        storage.write_board(&BoardFile::sample())
    })?;

    let report = InitReport {
        root: root.to_path_buf(),
        created: InitCreated {
            config: created_config,
            tasks: created_tasks,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(".boardflow.toml");
    }
    if created_tasks {
        created_items.push(".boardflow/tasks.json");
    }

    let header = if created_items.is_empty() {
        "boardflow init: nothing to do".to_string()
    } else {
        "boardflow init: initialized board".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    if !created_items.is_empty() {
        human.push_next_step("boardflow board --scope sprint:1");
        human.push_next_step("boardflow columns --scope backlog");
    } else if !force {
        human.push_next_step("boardflow init --force (overwrites existing files)");
    }

    emit_success(output, "init", &report, Some(&human))
}

fn write_if_needed(
    path: &Path,
    force: bool,
    write: impl FnOnce(&Path) -> Result<()>,
) -> Result<bool> {
    if path.exists() {
        if !path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{} exists but is not a file",
                path.display()
            )));
        }
        if !force {
            return Ok(false);
        }
    }
    write(path)?;
    Ok(true)
}
