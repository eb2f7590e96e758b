//! boardflow move command implementation
//!
//! Runs a status change through the same optimistic path as a drag: apply to
//! the in-memory store, dispatch to the backend, then confirm or roll back.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::backend::{spawn_dispatcher, FileBackend};
use crate::board::{BoardEngine, ConfirmOutcome, DropOutcome};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::notify::{EventDestination, JsonlSink, Notification, NotificationSink};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::source::{FileTaskSource, TaskSource};
use crate::storage::Storage;
use crate::store::TaskStore;
use crate::task::{Scope, TaskId, TaskStatus};

pub struct MoveOptions {
    pub root: PathBuf,
    pub task: String,
    pub status: String,
    pub scope: Scope,
    pub events: Option<String>,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct MoveReport {
    task_id: TaskId,
    scope: Scope,
    from: TaskStatus,
    to: TaskStatus,
    changed: bool,
}

/// Collects notifications and mirrors them to `--events` when given.
struct MoveSink {
    seen: Vec<Notification>,
    events: Option<JsonlSink>,
}

impl NotificationSink for MoveSink {
    fn notify(&mut self, notification: Notification) {
        if let Some(events) = self.events.as_mut() {
            events.notify(notification.clone());
        }
        self.seen.push(notification);
    }
}

pub fn run(options: MoveOptions) -> Result<()> {
    let storage = Storage::new(&options.root);
    storage.require_initialized()?;
    let config = Config::load_from_root(&options.root)?;
    let status: TaskStatus = options.status.parse()?;
    let task_id = TaskId::new(options.task.trim());
    let scope = options.scope;

    let tasks = FileTaskSource::new(storage.clone()).collection(&scope)?;
    let from = tasks
        .get(&task_id)
        .map(|task| task.status)
        .ok_or_else(|| Error::TaskNotFound(format!("{task_id} in {scope}")))?;

    let events = match EventDestination::parse(options.events.as_deref()) {
        Some(destination) => Some(destination.open()?),
        None => None,
    };
    let sink = MoveSink {
        seen: Vec::new(),
        events,
    };
    let mut engine = BoardEngine::new(TaskStore::new(scope.clone(), tasks), &config, sink);

    let changed = match engine.transition(&task_id, status) {
        DropOutcome::Committed(update) => {
            let backend = Arc::new(FileBackend::new(storage, scope.clone(), &config.backend));
            let (confirm_tx, confirm_rx) = mpsc::channel();
            let dispatcher = spawn_dispatcher(
                backend,
                Duration::from_millis(config.backend.timeout_ms),
                confirm_tx,
            )?;
            dispatcher.dispatch(update)?;
            let confirmation = confirm_rx
                .recv()
                .map_err(|_| Error::OperationFailed("backend worker stopped".to_string()))?;
            dispatcher.shutdown();

            let reason = confirmation.result.as_ref().err().map(|err| err.to_string());
            match engine.confirm(confirmation.ticket, confirmation.result) {
                ConfirmOutcome::Confirmed { .. } => {
                    info!(%task_id, %from, to = %status, "move confirmed");
                    true
                }
                ConfirmOutcome::RolledBack { .. } | ConfirmOutcome::Superseded { .. } => {
                    return Err(Error::Backend(format!(
                        "{}; {task_id} stays {from}",
                        reason.unwrap_or_else(|| "update failed".to_string())
                    )));
                }
                ConfirmOutcome::UnknownTicket => {
                    return Err(Error::OperationFailed(format!(
                        "confirmation for {task_id} did not match its update"
                    )));
                }
            }
        }
        DropOutcome::Rejected { .. } => {
            let message = engine
                .sink()
                .seen
                .last()
                .map(|n| n.message.clone())
                .unwrap_or_else(|| format!("cannot move {task_id}"));
            return Err(Error::InvalidArgument(message));
        }
        _ => false,
    };

    let report = MoveReport {
        task_id: task_id.clone(),
        scope: scope.clone(),
        from,
        to: status,
        changed,
    };

    let header = if changed {
        format!("boardflow move: {task_id} {from} -> {status}")
    } else {
        format!("boardflow move: {task_id} already {status}")
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("scope", scope.to_string());
    for notification in &engine.sink().seen {
        human.push_detail(notification.message.clone());
    }

    emit_success(options.output, "move", &report, Some(&human))
}
