use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

use super::RenderError;

/// What a failed render shows instead of its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    pub title: &'static str,
    pub message: &'static str,
    pub retry_label: &'static str,
}

pub const FALLBACK: Fallback = Fallback {
    title: "Something went wrong",
    message: "An error occurred while rendering the chat interface.",
    retry_label: "Try Again",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<T> {
    Ok(T),
    Fallback(Fallback),
}

impl<T> Rendered<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Rendered::Ok(value) => Some(value),
            Rendered::Fallback(_) => None,
        }
    }
}

/// Catches panics from a render step and substitutes [`FALLBACK`].
///
/// A failure sticks until [`RenderBoundary::retry`] is called, so a broken
/// view is not re-attempted on every frame.
#[derive(Debug, Default)]
pub struct RenderBoundary {
    failure: Option<RenderError>,
}

impl RenderBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render<T>(&mut self, render: impl FnOnce() -> T) -> Rendered<T> {
        if self.failure.is_some() {
            return Rendered::Fallback(FALLBACK);
        }

        match catch_unwind(AssertUnwindSafe(render)) {
            Ok(value) => Rendered::Ok(value),
            Err(payload) => {
                let failure = RenderError::Panicked(panic_message(payload.as_ref()));
                error!(target: "render::boundary", error = %failure, "Render failed");
                self.failure = Some(failure);
                Rendered::Fallback(FALLBACK)
            }
        }
    }

    pub fn failure(&self) -> Option<&RenderError> {
        self.failure.as_ref()
    }

    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Clear the failure so the next `render` runs again.
    pub fn retry(&mut self) {
        self.failure = None;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
