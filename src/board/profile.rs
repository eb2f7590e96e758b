//! Device interaction profiles.
//!
//! A press does not start a drag by itself. It arms a [`GestureCandidate`]
//! that is promoted once the modality's activation policy is met, so clicks
//! stay clicks and touch scrolling is not hijacked.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::{ActivationConfig, InputConfig};
use crate::task::TaskId;

use super::geometry::Point;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputModality {
    /// Fine pointer (mouse, pen).
    #[default]
    Pointer,
    /// Coarse pointer (finger).
    Touch,
}

/// Thresholds a candidate gesture must meet before it becomes a drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationPolicy {
    /// Travel from the press point required to activate.
    pub min_distance: f64,
    /// How long the press must be held before travel may activate.
    pub hold_delay: Duration,
    /// Travel allowed while the hold delay is still running.
    pub tolerance: f64,
}

impl ActivationPolicy {
    pub const POINTER: ActivationPolicy = ActivationPolicy {
        min_distance: 2.0,
        hold_delay: Duration::ZERO,
        tolerance: 0.0,
    };

    pub const TOUCH: ActivationPolicy = ActivationPolicy {
        min_distance: 4.0,
        hold_delay: Duration::from_millis(250),
        tolerance: 1.0,
    };

    pub fn for_modality(modality: InputModality, input: &InputConfig) -> Self {
        match modality {
            InputModality::Pointer => Self::from(&input.pointer),
            InputModality::Touch => Self::from(&input.touch),
        }
    }
}

impl From<&ActivationConfig> for ActivationPolicy {
    fn from(config: &ActivationConfig) -> Self {
        Self {
            min_distance: config.min_distance,
            hold_delay: Duration::from_millis(config.hold_delay_ms),
            tolerance: config.tolerance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Thresholds not met yet; keep waiting.
    Pending,
    /// Promote the candidate to a drag session.
    Activate,
    /// Moved too early; the gesture belongs to someone else (scroll).
    Abort,
}

/// A press that may become a drag.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureCandidate {
    pub task_id: TaskId,
    pub origin: Point,
    pub pressed_at: Instant,
    pub modality: InputModality,
    pub policy: ActivationPolicy,
}

impl GestureCandidate {
    pub fn new(
        task_id: TaskId,
        origin: Point,
        pressed_at: Instant,
        modality: InputModality,
        policy: ActivationPolicy,
    ) -> Self {
        Self {
            task_id,
            origin,
            pressed_at,
            modality,
            policy,
        }
    }

    pub fn evaluate(&self, point: Point, now: Instant) -> Activation {
        let travel = self.origin.distance_to(point);
        let held = now.saturating_duration_since(self.pressed_at);
        if held < self.policy.hold_delay {
            if travel > self.policy.tolerance {
                Activation::Abort
            } else {
                Activation::Pending
            }
        } else if travel >= self.policy.min_distance {
            Activation::Activate
        } else {
            Activation::Pending
        }
    }
}
