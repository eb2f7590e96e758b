//! Cell geometry of the terminal board.
//!
//! Computed from the column partition on every draw and kept for hit
//! testing and drop-region registration between draws.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

use crate::board::geometry::{Point, Rect as PlaneRect};
use crate::board::{ColumnPartition, DropRegion};
use crate::task::{TaskId, TaskStatus};

pub(crate) const CARD_HEIGHT: u16 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnSlot {
    pub status: TaskStatus,
    pub area: Rect,
    pub inner: Rect,
    /// Cards that did not fit.
    pub overflow: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CardSlot {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub area: Rect,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct BoardGeometry {
    pub columns: Vec<ColumnSlot>,
    pub cards: Vec<CardSlot>,
}

impl BoardGeometry {
    pub fn compute(area: Rect, partition: &ColumnPartition<'_>) -> Self {
        if partition.columns.is_empty() || area.width == 0 || area.height == 0 {
            return Self::default();
        }
        let count = partition.columns.len() as u32;
        let constraints: Vec<Constraint> = (0..count).map(|_| Constraint::Ratio(1, count)).collect();
        let areas = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        let mut geometry = Self::default();
        for (column, column_area) in partition.columns.iter().zip(areas.iter()) {
            let inner = inset(*column_area);
            let fits = (inner.height / CARD_HEIGHT) as usize;
            for (index, task) in column.tasks.iter().take(fits).enumerate() {
                geometry.cards.push(CardSlot {
                    task_id: task.id.clone(),
                    status: column.status,
                    area: Rect::new(
                        inner.x,
                        inner.y + index as u16 * CARD_HEIGHT,
                        inner.width,
                        CARD_HEIGHT,
                    ),
                });
            }
            geometry.columns.push(ColumnSlot {
                status: column.status,
                area: *column_area,
                inner,
                overflow: column.tasks.len().saturating_sub(fits),
            });
        }
        geometry
    }

    pub fn card_at(&self, column: u16, row: u16) -> Option<&CardSlot> {
        let point = Point::new(column as f64, row as f64);
        self.cards
            .iter()
            .find(|card| to_plane(card.area).contains(point))
    }

    pub fn card(&self, task_id: &TaskId) -> Option<&CardSlot> {
        self.cards.iter().find(|card| &card.task_id == task_id)
    }

    /// Cards first, then columns.
    pub fn drop_regions(&self) -> Vec<DropRegion> {
        let cards = self
            .cards
            .iter()
            .map(|card| DropRegion::task(card.task_id.clone(), to_plane(card.area)));
        let columns = self
            .columns
            .iter()
            .map(|column| DropRegion::column(column.status, to_plane(column.area)));
        cards.chain(columns).collect()
    }
}

pub(crate) fn to_plane(rect: Rect) -> PlaneRect {
    PlaneRect::new(
        rect.x as f64,
        rect.y as f64,
        rect.width as f64,
        rect.height as f64,
    )
}

/// Plane rect snapped to cells and clipped to `bounds`.
pub(crate) fn to_cells(rect: PlaneRect, bounds: Rect) -> Rect {
    let x = rect.x.round().max(bounds.x as f64) as u16;
    let y = rect.y.round().max(bounds.y as f64) as u16;
    let right = (rect.right().round() as i64).min(bounds.right() as i64).max(x as i64) as u16;
    let bottom = (rect.bottom().round() as i64).min(bounds.bottom() as i64).max(y as i64) as u16;
    Rect::new(x, y, right - x, bottom - y)
}

fn inset(area: Rect) -> Rect {
    Rect::new(
        area.x.saturating_add(1),
        area.y.saturating_add(1),
        area.width.saturating_sub(2),
        area.height.saturating_sub(2),
    )
}
