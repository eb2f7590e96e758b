//! boardflow board command implementation

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::task::Scope;
use crate::ui;

pub fn run(root: &Path, scope: Scope, touch: bool) -> Result<()> {
    info!(%scope, touch, "opening board");
    ui::board::run(root, scope, touch)
}
