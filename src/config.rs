//! Configuration loading and management
//!
//! Handles parsing of `.boardflow.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::board::mutation::RollbackPolicy;
use crate::board::partition::BoardLayout;
use crate::board::profile::InputModality;
use crate::error::{Error, Result};
use crate::task::{Scope, TaskStatus};

pub const CONFIG_FILE: &str = ".boardflow.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Column layouts per board kind
    #[serde(default)]
    pub board: BoardConfig,

    /// Gesture activation thresholds
    #[serde(default)]
    pub input: InputConfig,

    /// Status update backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Reconciliation of failed updates
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "default_sprint_layout")]
    pub sprint: LayoutConfig,

    #[serde(default = "default_backlog_layout")]
    pub backlog: LayoutConfig,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            sprint: default_sprint_layout(),
            backlog: default_backlog_layout(),
        }
    }
}

impl BoardConfig {
    pub fn layout(&self, scope: &Scope) -> BoardLayout {
        let columns = match scope {
            Scope::Backlog => &self.backlog.columns,
            Scope::Sprint(_) => &self.sprint.columns,
        };
        BoardLayout::new(columns.clone())
    }
}

/// Ordered columns of one board kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub columns: Vec<TaskStatus>,
}

fn default_sprint_layout() -> LayoutConfig {
    LayoutConfig {
        columns: BoardLayout::sprint().columns,
    }
}

fn default_backlog_layout() -> LayoutConfig {
    LayoutConfig {
        columns: BoardLayout::backlog().columns,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Modality assumed for presses (terminals cannot tell them apart)
    #[serde(default)]
    pub modality: InputModality,

    #[serde(default = "default_pointer_activation")]
    pub pointer: ActivationConfig,

    #[serde(default = "default_touch_activation")]
    pub touch: ActivationConfig,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            modality: InputModality::default(),
            pointer: default_pointer_activation(),
            touch: default_touch_activation(),
        }
    }
}

/// Activation thresholds, in renderer units and milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationConfig {
    pub min_distance: f64,
    #[serde(default)]
    pub hold_delay_ms: u64,
    #[serde(default)]
    pub tolerance: f64,
}

fn default_pointer_activation() -> ActivationConfig {
    ActivationConfig {
        min_distance: 2.0,
        hold_delay_ms: 0,
        tolerance: 0.0,
    }
}

fn default_touch_activation() -> ActivationConfig {
    ActivationConfig {
        min_distance: 4.0,
        hold_delay_ms: 250,
        tolerance: 1.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Simulated round-trip latency
    #[serde(default)]
    pub latency_ms: u64,

    /// Calls slower than this are failures
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Fail every Nth call (0 disables)
    #[serde(default)]
    pub fail_every: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            latency_ms: 0,
            timeout_ms: default_timeout_ms(),
            fail_every: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub rollback: RollbackPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// How long toasts stay on screen
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

fn default_ttl_ms() -> u64 {
    4_000
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `.boardflow.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the board root, or return defaults when absent
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn layout(&self, scope: &Scope) -> BoardLayout {
        self.board.layout(scope)
    }

    fn validate(&self) -> Result<()> {
        self.board.sprint.validate("board.sprint")?;
        self.board.backlog.validate("board.backlog")?;
        self.input.validate()?;
        if self.backend.timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "backend.timeout_ms must be > 0".to_string(),
            ));
        }
        if self.notifications.ttl_ms == 0 {
            return Err(Error::InvalidConfig(
                "notifications.ttl_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl LayoutConfig {
    fn validate(&self, field: &str) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{field}.columns cannot be empty"
            )));
        }
        let mut seen = HashSet::new();
        for status in &self.columns {
            if !seen.insert(*status) {
                return Err(Error::InvalidConfig(format!(
                    "{field}.columns has duplicate entry '{status}'"
                )));
            }
        }
        Ok(())
    }
}

impl InputConfig {
    fn validate(&self) -> Result<()> {
        self.pointer.validate("input.pointer")?;
        self.touch.validate("input.touch")?;
        if self.touch.min_distance < self.pointer.min_distance {
            return Err(Error::InvalidConfig(
                "input.touch.min_distance must be >= input.pointer.min_distance".to_string(),
            ));
        }
        if self.touch.hold_delay_ms < self.pointer.hold_delay_ms {
            return Err(Error::InvalidConfig(
                "input.touch.hold_delay_ms must be >= input.pointer.hold_delay_ms".to_string(),
            ));
        }
        Ok(())
    }
}

impl ActivationConfig {
    fn validate(&self, field: &str) -> Result<()> {
        if !self.min_distance.is_finite() || self.min_distance < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "{field}.min_distance must be a non-negative number"
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "{field}.tolerance must be a non-negative number"
            )));
        }
        if self.tolerance > self.min_distance {
            return Err(Error::InvalidConfig(format!(
                "{field}.tolerance must be <= {field}.min_distance"
            )));
        }
        Ok(())
    }
}
