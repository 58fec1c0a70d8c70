use parley_core::render::{Clipboard, ClipboardError};
use tracing::debug;

/// System clipboard, opened on first use so a headless session only fails
/// when a copy is actually attempted.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.inner.is_none() {
            debug!(target: "tui.clipboard", "Opening system clipboard");
            let clipboard = arboard::Clipboard::new().map_err(|e| ClipboardError(e.to_string()))?;
            self.inner = Some(clipboard);
        }
        let Some(clipboard) = self.inner.as_mut() else {
            return Err(ClipboardError("clipboard unavailable".to_string()));
        };
        clipboard
            .set_text(text.to_string())
            .map_err(|e| ClipboardError(e.to_string()))
    }
}
