//! Command-line interface for boardflow
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::output::OutputOptions;
use crate::task::Scope;

mod board;
mod columns;
mod init;
mod move_task;

/// boardflow - kanban board with optimistic drag-and-drop status changes
#[derive(Parser, Debug)]
#[command(name = "boardflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Board root holding `.boardflow.toml` and `.boardflow/` (defaults to current directory)
    #[arg(long, global = true, env = "BOARDFLOW_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create `.boardflow.toml` and a sample task file
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Interactive terminal board (mouse drag and drop)
    Board {
        /// Scope to show: backlog or sprint:<id>
        #[arg(long, default_value = "sprint:1", value_parser = parse_scope)]
        scope: Scope,

        /// Use touch activation thresholds
        #[arg(long)]
        touch: bool,
    },

    /// Print the column partition of a scope
    Columns {
        /// Scope to show: backlog or sprint:<id>
        #[arg(long, default_value = "sprint:1", value_parser = parse_scope)]
        scope: Scope,
    },

    /// Change a task's status through the optimistic commit path
    Move {
        /// Task id
        task: String,

        /// New status (to-do, in-progress, review, done, closed)
        status: String,

        /// Scope of the task: backlog or sprint:<id>
        #[arg(long, default_value = "sprint:1", value_parser = parse_scope)]
        scope: Scope,

        /// Write notifications as JSON lines to a file or `-` for stdout
        #[arg(long)]
        events: Option<String>,
    },
}

fn parse_scope(raw: &str) -> std::result::Result<Scope, String> {
    raw.parse::<Scope>().map_err(|err| err.to_string())
}

impl Cli {
    /// True when `move --events -` owns stdout
    pub fn events_to_stdout(&self) -> bool {
        match &self.command {
            Commands::Move { events, .. } => events
                .as_deref()
                .map(|value| value.trim() == "-")
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let root = match self.root {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        match self.command {
            Commands::Init { force } => init::run(&root, force, output),
            Commands::Board { scope, touch } => board::run(&root, scope, touch),
            Commands::Columns { scope } => columns::run(&root, scope, self.verbose, output),
            Commands::Move {
                task,
                status,
                scope,
                events,
            } => move_task::run(move_task::MoveOptions {
                root,
                task,
                status,
                scope,
                events,
                output,
            }),
        }
    }
}
