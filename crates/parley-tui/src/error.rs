//! Error types for the parley-tui crate

use std::io;
use thiserror::Error;

use parley_core::client::{ControllerError, TransportError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Terminal I/O errors
    #[error("Terminal I/O error: {0}")]
    Io(#[from] io::Error),

    /// The chat endpoint could not be reached or configured
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Clipboard error: {0}")]
    Clipboard(String),
}
