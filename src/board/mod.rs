//! Drag-and-drop board engine.
//!
//! - `geometry`: points and rects in renderer units
//! - `profile`: per-modality gesture activation
//! - `collision`: strategy chain deciding what a card is over
//! - `transition`: collision result to pending status
//! - `session`: single drag gesture lifecycle and hover cursor
//! - `mutation`: optimistic commit, confirmation and rollback
//! - `partition`: per-column projection used for rendering
//! - `engine`: all of the above behind one facade
//!
//! Nothing here depends on a renderer.

pub mod collision;
pub mod engine;
pub mod geometry;
pub mod mutation;
pub mod partition;
pub mod profile;
pub mod session;
pub mod transition;

pub use collision::{CollisionChain, CollisionInput, CollisionStrategy, DropRegion, DropTarget};
pub use engine::{BoardEngine, DropOutcome};
pub use geometry::{Point, Rect};
pub use mutation::{ConfirmOutcome, PendingUpdate, RollbackPolicy, Ticket};
pub use partition::{partition, BoardLayout, Column, ColumnPartition};
pub use profile::{ActivationPolicy, InputModality};
pub use session::{DragController, DragPreview, TrackOutcome};
