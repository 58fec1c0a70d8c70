pub mod error;
pub mod tui;

pub use tui::{Tui, run_tui};
