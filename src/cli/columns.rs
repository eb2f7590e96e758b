//! boardflow columns command implementation

use std::path::Path;

use serde::Serialize;

use crate::board::{partition, BoardLayout};
use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::source::{FileTaskSource, TaskSource};
use crate::storage::Storage;
use crate::task::{Priority, Scope, TaskStatus, TaskType};

#[derive(Serialize)]
struct ColumnsReport {
    scope: Scope,
    columns: Vec<ColumnReport>,
    hidden: usize,
}

#[derive(Serialize)]
struct ColumnReport {
    status: TaskStatus,
    label: &'static str,
    tasks: Vec<CardReport>,
}

#[derive(Serialize)]
struct CardReport {
    id: String,
    code: String,
    title: String,
    #[serde(rename = "type")]
    task_type: TaskType,
    priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    story_points: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_to: Option<String>,
}

pub fn run(root: &Path, scope: Scope, verbose: bool, output: OutputOptions) -> Result<()> {
    let storage = Storage::new(root);
    storage.require_initialized()?;
    let config = Config::load_from_root(root)?;
    let tasks = FileTaskSource::new(storage).collection(&scope)?;
    let layout: BoardLayout = config.layout(&scope);
    let view = partition(&tasks, &layout, None);

    let report = ColumnsReport {
        scope: scope.clone(),
        columns: view
            .columns
            .iter()
            .map(|column| ColumnReport {
                status: column.status,
                label: column.status.label(),
                tasks: column
                    .tasks
                    .iter()
                    .map(|task| CardReport {
                        id: task.id.to_string(),
                        code: task.card_code().to_string(),
                        title: task.title.clone(),
                        task_type: task.task_type,
                        priority: task.priority,
                        story_points: task.story_points,
                        assigned_to: task.assigned_to.clone(),
                    })
                    .collect(),
            })
            .collect(),
        hidden: view.hidden,
    };

    let mut human = HumanOutput::new(format!("boardflow columns: {scope}"));
    for column in &report.columns {
        human.push_summary(column.label, column.tasks.len().to_string());
    }
    for column in &report.columns {
        for card in &column.tasks {
            let mut line = format!("[{}] {} {}", column.status, card.code, card.title);
            if verbose {
                line.push_str(&format!(" ({:?}, {:?}", card.task_type, card.priority));
                if let Some(points) = card.story_points {
                    line.push_str(&format!(", {points} pts"));
                }
                if let Some(user) = &card.assigned_to {
                    line.push_str(&format!(", @{user}"));
                }
                line.push(')');
            }
            human.push_detail(line);
        }
    }
    if view.hidden > 0 {
        human.push_warning(format!(
            "{} task(s) have a status without a column on this board",
            view.hidden
        ));
    }

    emit_success(output, "columns", &report, Some(&human))
}
