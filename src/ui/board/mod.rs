//! Interactive terminal board: columns of cards moved with mouse drags.

mod app;
mod layout;
mod view;

pub use app::run;
