// Core parley functionality without terminal or HTTP-server dependencies

pub mod api;
pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod input;
pub mod render;
pub mod test_utils;
pub mod tools;
pub mod utils;
