//! Collision resolution: what is the dragged card over?
//!
//! A [`CollisionChain`] runs its strategies in order and returns the first
//! hit. No single test holds up across pointer speeds and card sizes:
//! containment misses regions skipped in a fast frame, and closest-center is
//! imprecise near column edges, so the pointer chain falls back from the
//! precise tests to the always-answering one.

use tracing::trace;

use crate::task::{TaskId, TaskStatus};

use super::geometry::{Point, Rect};
use super::profile::InputModality;

/// Something a card can be dropped on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DropTarget {
    Column(TaskStatus),
    Task(TaskId),
}

/// A registered droppable region. Registration order is the tie-break.
#[derive(Debug, Clone, PartialEq)]
pub struct DropRegion {
    pub target: DropTarget,
    pub rect: Rect,
}

impl DropRegion {
    pub fn column(status: TaskStatus, rect: Rect) -> Self {
        Self {
            target: DropTarget::Column(status),
            rect,
        }
    }

    pub fn task(id: impl Into<TaskId>, rect: Rect) -> Self {
        Self {
            target: DropTarget::Task(id.into()),
            rect,
        }
    }
}

/// Where the pointer is and where the dragged card currently sits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionInput {
    pub pointer: Point,
    pub dragged: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionStrategy {
    /// Regions containing the pointer, nearest corners first.
    PointerWithin,
    /// Regions overlapping the dragged rect, largest overlap ratio first.
    RectIntersection,
    /// Region whose center is nearest the dragged rect's center.
    ClosestCenter,
    /// Region whose corners are nearest the dragged rect's corners.
    ClosestCorners,
}

impl CollisionStrategy {
    pub fn detect<'r>(&self, input: &CollisionInput, regions: &'r [DropRegion]) -> Option<&'r DropRegion> {
        match self {
            CollisionStrategy::PointerWithin => best_scored(regions, |region| {
                region
                    .rect
                    .contains(input.pointer)
                    .then(|| corner_distance_sum(input.pointer, &region.rect))
            }),
            CollisionStrategy::RectIntersection => best_scored(regions, |region| {
                let ratio = region.rect.overlap_ratio(&input.dragged);
                (ratio > 0.0).then_some(-ratio)
            }),
            CollisionStrategy::ClosestCenter => {
                let center = input.dragged.center();
                best_scored(regions, |region| Some(center.distance_to(region.rect.center())))
            }
            CollisionStrategy::ClosestCorners => {
                let dragged = input.dragged.corners();
                best_scored(regions, |region| {
                    let corners = region.rect.corners();
                    Some(
                        dragged
                            .iter()
                            .zip(corners.iter())
                            .map(|(a, b)| a.distance_to(*b))
                            .sum(),
                    )
                })
            }
        }
    }
}

/// Ordered fallback of collision strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionChain {
    strategies: Vec<CollisionStrategy>,
}

impl CollisionChain {
    pub fn new(strategies: Vec<CollisionStrategy>) -> Self {
        Self { strategies }
    }

    /// Containment, then intersection, then closest center.
    pub fn pointer() -> Self {
        Self::new(vec![
            CollisionStrategy::PointerWithin,
            CollisionStrategy::RectIntersection,
            CollisionStrategy::ClosestCenter,
        ])
    }

    /// Closest corners only; stable under finger jitter.
    pub fn touch() -> Self {
        Self::new(vec![CollisionStrategy::ClosestCorners])
    }

    pub fn for_modality(modality: InputModality) -> Self {
        match modality {
            InputModality::Pointer => Self::pointer(),
            InputModality::Touch => Self::touch(),
        }
    }

    pub fn strategies(&self) -> &[CollisionStrategy] {
        &self.strategies
    }

    pub fn resolve<'r>(&self, input: &CollisionInput, regions: &'r [DropRegion]) -> Option<&'r DropRegion> {
        self.resolve_with_strategy(input, regions)
            .map(|(_, region)| region)
    }

    /// Like [`resolve`](Self::resolve), also reporting which strategy hit.
    pub fn resolve_with_strategy<'r>(
        &self,
        input: &CollisionInput,
        regions: &'r [DropRegion],
    ) -> Option<(CollisionStrategy, &'r DropRegion)> {
        for strategy in &self.strategies {
            if let Some(region) = strategy.detect(input, regions) {
                trace!(?strategy, target = ?region.target, "collision resolved");
                return Some((*strategy, region));
            }
        }
        None
    }
}

/// Lowest score wins; the earliest region keeps ties.
fn best_scored<'r>(
    regions: &'r [DropRegion],
    score: impl Fn(&DropRegion) -> Option<f64>,
) -> Option<&'r DropRegion> {
    let mut best: Option<(f64, &'r DropRegion)> = None;
    for region in regions {
        let Some(value) = score(region) else {
            continue;
        };
        if value.is_nan() {
            continue;
        }
        match best {
            Some((current, _)) if value >= current => {}
            _ => best = Some((value, region)),
        }
    }
    best.map(|(_, region)| region)
}

fn corner_distance_sum(point: Point, rect: &Rect) -> f64 {
    rect.corners()
        .iter()
        .map(|corner| point.distance_to(*corner))
        .sum()
}
