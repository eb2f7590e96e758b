use std::cell::Cell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use tracing::{debug, warn};

use crate::backend::{spawn_dispatcher, Confirmation, Dispatcher, FileBackend};
use crate::board::geometry::{Point, Rect as PlaneRect};
use crate::board::session::PressOutcome;
use crate::board::{
    BoardEngine, CollisionInput, DropOutcome, InputModality, PendingUpdate, TrackOutcome,
};
use crate::config::Config;
use crate::error::Result;
use crate::notify::Toasts;
use crate::source::{FileTaskSource, TaskSource};
use crate::storage::Storage;
use crate::store::TaskStore;
use crate::task::{Scope, TaskId};

use super::layout::{to_plane, BoardGeometry};
use super::view;

const EVENT_POLL_MS: u64 = 120;
const WATCH_DEBOUNCE_MS: u64 = 200;

enum UiMsg {
    Changed,
    WatchError(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StatusKind {
    Error,
    Info,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum KeyAction {
    Continue,
    Reload,
    Quit,
}

/// Card being held by the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Grab {
    /// Pointer position relative to the card's top-left corner.
    offset: Point,
    /// Where the card is drawn while it follows the pointer.
    pub(crate) rect: PlaneRect,
}

pub(crate) struct BoardApp {
    pub(crate) engine: BoardEngine<Toasts>,
    pub(crate) geometry: BoardGeometry,
    pub(crate) grab: Option<Grab>,
    pub(crate) selected: Option<TaskId>,
    pub(crate) status: Option<(String, StatusKind)>,
    reload_pending: bool,
    store_dirty: Rc<Cell<bool>>,
}

struct Channels {
    source: FileTaskSource,
    dispatcher: Dispatcher,
    confirm_rx: Receiver<Confirmation>,
    ui_rx: Receiver<UiMsg>,
}

pub fn run(root: &Path, scope: Scope, touch: bool) -> Result<()> {
    let storage = Storage::new(root);
    storage.require_initialized()?;
    let mut config = Config::load_from_root(root)?;
    if touch {
        config.input.modality = InputModality::Touch;
    }

    let source = FileTaskSource::new(storage.clone());
    let tasks = source.collection(&scope)?;
    let toasts = Toasts::new(Duration::from_millis(config.notifications.ttl_ms));
    let engine = BoardEngine::new(TaskStore::new(scope.clone(), tasks), &config, toasts);

    let backend = Arc::new(FileBackend::new(storage.clone(), scope, &config.backend));
    let (confirm_tx, confirm_rx) = mpsc::channel();
    let dispatcher = spawn_dispatcher(
        backend,
        Duration::from_millis(config.backend.timeout_ms),
        confirm_tx,
    )?;

    let (ui_tx, ui_rx) = mpsc::channel();
    spawn_watch(storage.data_dir(), ui_tx);

    let mut app = BoardApp::new(engine);
    let channels = Channels {
        source,
        dispatcher,
        confirm_rx,
        ui_rx,
    };
    run_terminal(&mut app, channels)
}

fn run_terminal(app: &mut BoardApp, channels: Channels) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableFocusChange
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app, &channels);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    // Waits for in-flight updates before the process exits.
    channels.dispatcher.shutdown();
    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut BoardApp,
    channels: &Channels,
) -> Result<()> {
    let mut dirty = true;
    loop {
        while let Ok(confirmation) = channels.confirm_rx.try_recv() {
            app.confirm(confirmation);
            dirty = true;
        }
        while let Ok(msg) = channels.ui_rx.try_recv() {
            app.handle_ui_msg(msg);
            dirty = true;
        }
        if app.take_reload() {
            reload(app, &channels.source);
            dirty = true;
        }
        if app.engine.sink_mut().prune(Instant::now()) {
            dirty = true;
        }
        if app.store_dirty.replace(false) {
            dirty = true;
        }

        if dirty {
            terminal.draw(|frame| view::render(frame, app))?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(EVENT_POLL_MS))? {
            match event::read()? {
                Event::Key(key) => match app.handle_key(key) {
                    KeyAction::Quit => break,
                    KeyAction::Reload => app.request_reload(),
                    KeyAction::Continue => {}
                },
                Event::Mouse(mouse) => {
                    if let Some(update) = app.handle_mouse(mouse, Instant::now()) {
                        dispatch(app, &channels.dispatcher, update);
                    }
                }
                Event::FocusLost => app.focus_lost(),
                _ => {}
            }
            dirty = true;
        }
    }
    Ok(())
}

fn dispatch(app: &mut BoardApp, dispatcher: &Dispatcher, update: PendingUpdate) {
    let ticket = update.ticket;
    if let Err(err) = dispatcher.dispatch(update) {
        warn!(error = %err, "dispatch failed");
        app.engine.confirm(ticket, Err(err));
    }
}

fn reload(app: &mut BoardApp, source: &FileTaskSource) {
    let scope = app.engine.store().scope().clone();
    match source.collection(&scope) {
        Ok(tasks) => {
            debug!(%scope, count = tasks.len(), "board reloaded");
            app.engine.load(scope, tasks);
        }
        Err(err) => app.set_status(format!("Reload failed: {err}"), StatusKind::Error),
    }
}

impl BoardApp {
    pub(crate) fn new(mut engine: BoardEngine<Toasts>) -> Self {
        let store_dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&store_dirty);
        engine.store_mut().subscribe(move |_| flag.set(true));
        Self {
            engine,
            geometry: BoardGeometry::default(),
            grab: None,
            selected: None,
            status: None,
            reload_pending: false,
            store_dirty,
        }
    }

    /// Recomputes card and column cells for the board area.
    pub(crate) fn relayout(&mut self, area: Rect) {
        let geometry = BoardGeometry::compute(area, &self.engine.partition());
        self.geometry = geometry;
    }

    pub(crate) fn set_status(&mut self, message: impl Into<String>, kind: StatusKind) {
        self.status = Some((message.into(), kind));
    }

    pub(crate) fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) -> Option<PendingUpdate> {
        let point = Point::new(mouse.column as f64, mouse.row as f64);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let card = self.geometry.card_at(mouse.column, mouse.row)?.clone();
                let rect = to_plane(card.area);
                if matches!(
                    self.engine.press(card.task_id, point, now),
                    PressOutcome::Armed
                ) {
                    self.grab = Some(Grab {
                        offset: Point::new(point.x - rect.x, point.y - rect.y),
                        rect,
                    });
                }
                None
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let grab = self.grab.as_mut()?;
                grab.rect = grab
                    .rect
                    .moved_to(point.offset(-grab.offset.x, -grab.offset.y));
                let input = CollisionInput {
                    pointer: point,
                    dragged: grab.rect,
                };
                let regions = self.geometry.drop_regions();
                if matches!(
                    self.engine.pointer_moved(&input, &regions, now),
                    TrackOutcome::Idle | TrackOutcome::Aborted
                ) {
                    self.grab = None;
                }
                None
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.grab = None;
                match self.engine.release() {
                    DropOutcome::Committed(update) => {
                        self.selected = Some(update.task_id.clone());
                        return Some(update);
                    }
                    DropOutcome::Click { task_id } => {
                        self.selected = Some(task_id);
                    }
                    DropOutcome::Reordered { task_id, over } => {
                        self.set_status(format!("Moved {task_id} next to {over}"), StatusKind::Info);
                    }
                    DropOutcome::Cancelled { .. }
                    | DropOutcome::NoOp { .. }
                    | DropOutcome::Rejected { .. }
                    | DropOutcome::Ignored => {}
                }
                None
            }
            _ => None,
        }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.kind != KeyEventKind::Press {
            return KeyAction::Continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.cancel_drag();
            return KeyAction::Quit;
        }
        match key.code {
            KeyCode::Esc => {
                if self.cancel_drag() {
                    self.set_status("Drag cancelled", StatusKind::Info);
                } else {
                    self.selected = None;
                }
                KeyAction::Continue
            }
            KeyCode::Char('q') => {
                self.cancel_drag();
                KeyAction::Quit
            }
            KeyCode::Char('r') => KeyAction::Reload,
            KeyCode::Char('t') => {
                let next = match self.engine.modality() {
                    InputModality::Pointer => InputModality::Touch,
                    InputModality::Touch => InputModality::Pointer,
                };
                self.engine.set_modality(next);
                self.set_status(format!("Input: {}", modality_label(next)), StatusKind::Info);
                KeyAction::Continue
            }
            _ => KeyAction::Continue,
        }
    }

    pub(crate) fn focus_lost(&mut self) {
        if self.cancel_drag() {
            self.set_status("Drag cancelled (focus lost)", StatusKind::Info);
        }
    }

    fn cancel_drag(&mut self) -> bool {
        self.grab = None;
        self.engine.cancel()
    }

    fn confirm(&mut self, confirmation: Confirmation) {
        self.engine.confirm(confirmation.ticket, confirmation.result);
    }

    fn handle_ui_msg(&mut self, msg: UiMsg) {
        match msg {
            UiMsg::Changed => self.request_reload(),
            UiMsg::WatchError(err) => self.set_status(format!("Watch error: {err}"), StatusKind::Error),
        }
    }

    pub(crate) fn request_reload(&mut self) {
        self.reload_pending = true;
    }

    /// Reloads wait until no drag or update is in flight.
    pub(crate) fn take_reload(&mut self) -> bool {
        if !self.reload_pending
            || !self.engine.controller().is_idle()
            || self.engine.mutations().pending() > 0
        {
            return false;
        }
        self.reload_pending = false;
        true
    }
}

pub(crate) fn modality_label(modality: InputModality) -> &'static str {
    match modality {
        InputModality::Pointer => "pointer",
        InputModality::Touch => "touch",
    }
}

fn spawn_watch(data_dir: PathBuf, ui_tx: Sender<UiMsg>) {
    if !data_dir.exists() {
        return;
    }

    thread::spawn(move || {
        let (event_tx, event_rx) = mpsc::channel();
        let watcher: notify::Result<RecommendedWatcher> = notify::recommended_watcher(move |res| {
            let _ = event_tx.send(res);
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(err) => {
                let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
                return;
            }
        };
        if let Err(err) = watcher.watch(&data_dir, RecursiveMode::NonRecursive) {
            let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
            return;
        }

        let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
        let mut pending: Option<Instant> = None;

        loop {
            let timeout = pending
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(3600));
            match event_rx.recv_timeout(timeout) {
                Ok(Ok(event)) => {
                    if touches_board(&event) {
                        pending = Some(Instant::now() + debounce);
                    }
                }
                Ok(Err(err)) => {
                    let _ = ui_tx.send(UiMsg::WatchError(err.to_string()));
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if pending.is_some() {
                        pending = None;
                        if ui_tx.send(UiMsg::Changed).is_err() {
                            break;
                        }
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });
}

/// Lock files and plain reads do not change the board.
fn touches_board(event: &notify::Event) -> bool {
    !event.kind.is_access()
        && event
            .paths
            .iter()
            .any(|path| path.extension().map_or(true, |ext| ext != "lock"))
}
