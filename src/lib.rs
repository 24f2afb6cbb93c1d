/// The top-level application module.
mod app;
pub use app::{App, AppState, AppView};

/// Views for each "screen".
pub mod views;
pub use views::*;

pub mod common;
pub mod config;
mod constants;
pub mod logging;
pub mod session;
pub mod state;
pub mod sync;
mod utils;
