pub mod input_panel;
pub mod markdown;
pub mod message_list;
pub mod status_bar;
pub mod wrap;

pub use input_panel::{InputPanel, InputPanelState};
pub use status_bar::StatusBar;
