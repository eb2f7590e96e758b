//! boardflow - kanban drag-and-drop task-status reconciliation
//!
//! Tasks on a board move between status columns through drag gestures.
//! A status change is applied to the in-memory store at once, sent to a
//! backend, and either confirmed or rolled back when the answer arrives.
//!
//! # Module Organization
//!
//! - `board`: drag engine (activation, collision, sessions, commit/rollback)
//! - `store`: observable in-memory task store
//! - `task`: task, status and scope types
//! - `notify`: transient notifications and JSONL event output
//! - `backend`: async status backend and the dispatcher thread
//! - `source`: task loading seam
//! - `storage`: `.boardflow/tasks.json` persistence
//! - `lock`: file locking and atomic writes
//! - `config`: `.boardflow.toml` loading
//! - `ui`: terminal board
//! - `cli`: command-line interface using clap
//! - `output`: human and JSON command output
//! - `error`: error types and result aliases

pub mod backend;
pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod notify;
pub mod output;
pub mod source;
pub mod storage;
pub mod store;
pub mod task;
pub mod ui;

pub use error::{Error, Result};
