//! Status update backend.
//!
//! Committed status changes are sent to a [`StatusBackend`] off the UI
//! thread. [`spawn_dispatcher`] starts a worker thread running a
//! current-thread tokio runtime; each update becomes its own task carrying a
//! [`Deadline`], so answers come back in whatever order the backend produces
//! them. Answers are delivered as [`Confirmation`]s on a std channel that the
//! UI loop drains.
//!
//! A backend must not apply an update once its deadline has passed: the
//! dispatcher reports such calls as timed out and the board rolls them back.
//! A backend that ignores its deadline is abandoned after
//! [`ABANDON_GRACE_MS`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::board::mutation::{PendingUpdate, Ticket};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::task::{Scope, TaskId, TaskStatus};

/// Extra time past the deadline before the dispatcher stops waiting.
pub const ABANDON_GRACE_MS: u64 = 500;

/// Point in time after which an update must not be applied.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_none()
    }

    pub fn timeout_error(&self) -> Error {
        Error::BackendTimeout(self.budget.as_millis() as u64)
    }
}

#[async_trait]
pub trait StatusBackend: Send + Sync {
    /// Applies `status` to `id`, or fails with [`Error::BackendTimeout`]
    /// without applying it once `deadline` has passed.
    async fn update_status(&self, id: &TaskId, status: TaskStatus, deadline: Deadline)
        -> Result<()>;
}

/// Persists status changes into the board data file.
#[derive(Debug)]
pub struct FileBackend {
    storage: Storage,
    scope: Scope,
    latency: Duration,
    fail_every: u64,
    calls: AtomicU64,
}

impl FileBackend {
    pub fn new(storage: Storage, scope: Scope, config: &BackendConfig) -> Self {
        Self {
            storage,
            scope,
            latency: Duration::from_millis(config.latency_ms),
            fail_every: config.fail_every,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusBackend for FileBackend {
    async fn update_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        deadline: Deadline,
    ) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_every > 0 && call % self.fail_every == 0 {
            return Err(Error::Backend(format!(
                "simulated failure on call {call}"
            )));
        }

        let storage = self.storage.clone();
        let scope = self.scope.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || write_before(storage, &scope, &id, status, deadline))
            .await
            .map_err(|err| Error::OperationFailed(format!("status writer panicked: {err}")))?
    }
}

/// Persists `status` only if the lock is taken and the write starts before
/// `deadline`.
fn write_before(
    storage: Storage,
    scope: &Scope,
    id: &TaskId,
    status: TaskStatus,
    deadline: Deadline,
) -> Result<()> {
    let remaining = deadline.remaining().ok_or_else(|| deadline.timeout_error())?;
    let storage = storage.with_lock_timeout(remaining.as_millis() as u64 + 1);
    let result = storage.set_status_checked(scope, id, status, || {
        if deadline.expired() {
            debug!(%scope, %id, "deadline passed while waiting for the board lock");
            return Err(deadline.timeout_error());
        }
        Ok(())
    });
    match result {
        Err(Error::LockFailed(_)) if deadline.expired() => Err(deadline.timeout_error()),
        other => other,
    }
}

/// Backend answer for one dispatched update.
#[derive(Debug)]
pub struct Confirmation {
    pub ticket: Ticket,
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub result: Result<()>,
}

/// Handle for sending updates to the backend worker.
///
/// Dropping it lets in-flight calls finish and stops the worker.
pub struct Dispatcher {
    tx: Option<mpsc::UnboundedSender<PendingUpdate>>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn dispatch(&self, update: PendingUpdate) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| Error::OperationFailed("backend dispatcher stopped".to_string()))?;
        debug!(ticket = update.ticket, task_id = %update.task_id, "dispatching status update");
        tx.send(update)
            .map_err(|_| Error::OperationFailed("backend worker is gone".to_string()))
    }

    /// Waits for every dispatched call to be answered.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("backend worker panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn spawn_dispatcher(
    backend: Arc<dyn StatusBackend>,
    timeout: Duration,
    confirm_tx: std_mpsc::Sender<Confirmation>,
) -> Result<Dispatcher> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (tx, mut rx) = mpsc::unbounded_channel::<PendingUpdate>();

    let worker = thread::Builder::new()
        .name("boardflow-backend".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let mut calls = JoinSet::new();
                while let Some(update) = rx.recv().await {
                    let backend = Arc::clone(&backend);
                    let confirm_tx = confirm_tx.clone();
                    calls.spawn(async move {
                        let result = call_with_timeout(backend.as_ref(), &update, timeout).await;
                        let _ = confirm_tx.send(Confirmation {
                            ticket: update.ticket,
                            task_id: update.task_id,
                            status: update.status,
                            result,
                        });
                    });
                }
                while calls.join_next().await.is_some() {}
            });
        })?;

    Ok(Dispatcher {
        tx: Some(tx),
        worker: Some(worker),
    })
}

async fn call_with_timeout(
    backend: &dyn StatusBackend,
    update: &PendingUpdate,
    timeout: Duration,
) -> Result<()> {
    let deadline = Deadline::after(timeout);
    let call = backend.update_status(&update.task_id, update.status, deadline);
    match tokio::time::timeout(timeout + Duration::from_millis(ABANDON_GRACE_MS), call).await {
        Ok(Err(Error::BackendTimeout(ms))) => {
            warn!(ticket = update.ticket, "backend call timed out");
            Err(Error::BackendTimeout(ms))
        }
        Ok(result) => {
            if let Err(err) = &result {
                warn!(ticket = update.ticket, error = %err, "backend rejected status update");
            }
            result
        }
        Err(_) => {
            warn!(ticket = update.ticket, "backend ignored its deadline; call abandoned");
            Err(deadline.timeout_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{lock_path_for, FileLock};
    use crate::storage::BoardFile;
    use tempfile::TempDir;

    struct Scripted {
        delays: Vec<(TaskId, Duration)>,
        honor_deadline: bool,
    }

    impl Scripted {
        fn new(delays: Vec<(TaskId, Duration)>) -> Self {
            Self {
                delays,
                honor_deadline: true,
            }
        }
    }

    #[async_trait]
    impl StatusBackend for Scripted {
        async fn update_status(
            &self,
            id: &TaskId,
            _status: TaskStatus,
            deadline: Deadline,
        ) -> Result<()> {
            let delay = self
                .delays
                .iter()
                .find(|(task, _)| task == id)
                .map(|(_, delay)| *delay)
                .unwrap_or_default();
            if !self.honor_deadline {
                tokio::time::sleep(delay).await;
                return Ok(());
            }
            let left = deadline.remaining().unwrap_or_default();
            tokio::time::timeout(left, tokio::time::sleep(delay))
                .await
                .map_err(|_| deadline.timeout_error())
        }
    }

    fn update(ticket: Ticket, id: &str) -> PendingUpdate {
        PendingUpdate {
            ticket,
            task_id: id.into(),
            status: TaskStatus::Done,
        }
    }

    fn board() -> (TempDir, Storage) {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        storage.write_board(&BoardFile::sample()).unwrap();
        (temp, storage)
    }

    fn soon() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    fn backlog_status(storage: &Storage, id: &str) -> TaskStatus {
        storage
            .load_scope(&Scope::Backlog)
            .unwrap()
            .into_iter()
            .find(|task| task.id.as_str() == id)
            .map(|task| task.status)
            .unwrap()
    }

    #[test]
    fn deadline_expires() {
        let deadline = Deadline::after(Duration::from_millis(20));
        assert!(deadline.remaining().is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(deadline.expired());
        assert!(matches!(deadline.timeout_error(), Error::BackendTimeout(20)));
    }

    #[tokio::test]
    async fn file_backend_persists_status() {
        let (_temp, storage) = board();
        let backend = FileBackend::new(storage.clone(), Scope::Backlog, &BackendConfig::default());

        backend
            .update_status(&"t-1".into(), TaskStatus::Review, soon())
            .await
            .unwrap();
        assert_eq!(backlog_status(&storage, "t-1"), TaskStatus::Review);
    }

    #[tokio::test]
    async fn file_backend_fails_on_schedule() {
        let (_temp, storage) = board();
        let config = BackendConfig {
            fail_every: 2,
            ..BackendConfig::default()
        };
        let backend = FileBackend::new(storage.clone(), Scope::Backlog, &config);

        assert!(backend
            .update_status(&"t-1".into(), TaskStatus::Done, soon())
            .await
            .is_ok());
        let err = backend
            .update_status(&"t-2".into(), TaskStatus::Done, soon())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
        assert_eq!(backend.calls(), 2);

        assert_eq!(backlog_status(&storage, "t-2"), TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn file_backend_unknown_task_fails() {
        let (_temp, storage) = board();
        let backend = FileBackend::new(storage, Scope::Backlog, &BackendConfig::default());
        let err = backend
            .update_status(&"nope".into(), TaskStatus::Done, soon())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn file_backend_skips_write_after_deadline() {
        let (_temp, storage) = board();
        let config = BackendConfig {
            latency_ms: 60,
            ..BackendConfig::default()
        };
        let backend = FileBackend::new(storage.clone(), Scope::Backlog, &config);

        let err = backend
            .update_status(&"t-1".into(), TaskStatus::Done, Deadline::after(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BackendTimeout(20)));
        assert_eq!(backlog_status(&storage, "t-1"), TaskStatus::ToDo);
    }

    #[tokio::test]
    async fn file_backend_gives_up_on_held_lock() {
        let (_temp, storage) = board();
        let backend = FileBackend::new(storage.clone(), Scope::Backlog, &BackendConfig::default());
        let held = FileLock::acquire(lock_path_for(&storage.tasks_file()), 1_000).unwrap();

        let err = backend
            .update_status(&"t-1".into(), TaskStatus::Done, Deadline::after(Duration::from_millis(80)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BackendTimeout(80)));

        drop(held);
        assert_eq!(backlog_status(&storage, "t-1"), TaskStatus::ToDo);
    }

    #[test]
    fn timed_out_update_never_reaches_disk() {
        let (_temp, storage) = board();
        let backend = Arc::new(FileBackend::new(
            storage.clone(),
            Scope::Backlog,
            &BackendConfig::default(),
        ));
        let (confirm_tx, confirm_rx) = std_mpsc::channel();
        let dispatcher =
            spawn_dispatcher(backend, Duration::from_millis(100), confirm_tx).unwrap();
        let held = FileLock::acquire(lock_path_for(&storage.tasks_file()), 1_000).unwrap();

        dispatcher
            .dispatch(PendingUpdate {
                ticket: 3,
                task_id: "t-1".into(),
                status: TaskStatus::Done,
            })
            .unwrap();
        let confirmation = confirm_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(confirmation.ticket, 3);
        assert!(matches!(confirmation.result, Err(Error::BackendTimeout(100))));

        drop(held);
        std::thread::sleep(Duration::from_millis(300));
        dispatcher.shutdown();
        assert_eq!(backlog_status(&storage, "t-1"), TaskStatus::ToDo);
    }

    #[test]
    fn dispatcher_answers_out_of_order() {
        let backend = Arc::new(Scripted::new(vec![
            ("slow".into(), Duration::from_millis(150)),
            ("fast".into(), Duration::from_millis(5)),
        ]));
        let (confirm_tx, confirm_rx) = std_mpsc::channel();
        let dispatcher =
            spawn_dispatcher(backend, Duration::from_secs(5), confirm_tx).unwrap();

        dispatcher.dispatch(update(1, "slow")).unwrap();
        dispatcher.dispatch(update(2, "fast")).unwrap();
        dispatcher.shutdown();

        let tickets: Vec<_> = confirm_rx.iter().map(|c| c.ticket).collect();
        assert_eq!(tickets, vec![2, 1]);
    }

    #[test]
    fn dispatcher_times_out_slow_calls() {
        let backend = Arc::new(Scripted::new(vec![("slow".into(), Duration::from_secs(5))]));
        let (confirm_tx, confirm_rx) = std_mpsc::channel();
        let dispatcher =
            spawn_dispatcher(backend, Duration::from_millis(30), confirm_tx).unwrap();

        dispatcher.dispatch(update(7, "slow")).unwrap();
        let confirmation = confirm_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(confirmation.ticket, 7);
        assert!(matches!(confirmation.result, Err(Error::BackendTimeout(30))));
    }

    #[test]
    fn dispatcher_abandons_backend_ignoring_deadline() {
        let backend = Arc::new(Scripted {
            delays: vec![("stuck".into(), Duration::from_secs(5))],
            honor_deadline: false,
        });
        let (confirm_tx, confirm_rx) = std_mpsc::channel();
        let dispatcher =
            spawn_dispatcher(backend, Duration::from_millis(30), confirm_tx).unwrap();

        dispatcher.dispatch(update(9, "stuck")).unwrap();
        let confirmation = confirm_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(confirmation.result, Err(Error::BackendTimeout(30))));
    }
}
