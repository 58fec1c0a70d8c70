use ratatui::crossterm::{
    event::{
        DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
        KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
        supports_keyboard_enhancement,
    },
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Which terminal modes are currently enabled. Cleanup consults these so it
/// is idempotent across the exit, panic and early-return paths.
struct TerminalModes {
    raw: AtomicBool,
    alt_screen: AtomicBool,
    bracketed_paste: AtomicBool,
    keyboard_flags: AtomicBool,
    mouse_capture: AtomicBool,
}

static MODES: TerminalModes = TerminalModes {
    raw: AtomicBool::new(false),
    alt_screen: AtomicBool::new(false),
    bracketed_paste: AtomicBool::new(false),
    keyboard_flags: AtomicBool::new(false),
    mouse_capture: AtomicBool::new(false),
};

/// Enter raw mode and the alternate screen.
///
/// Keyboard enhancement is requested only where the terminal supports it;
/// without it Shift+Enter is indistinguishable from Enter and Alt+Enter is
/// the newline fallback.
pub fn setup<W: Write>(w: &mut W) -> io::Result<()> {
    enable_raw_mode()?;
    MODES.raw.store(true, Ordering::Relaxed);

    execute!(w, EnterAlternateScreen)?;
    MODES.alt_screen.store(true, Ordering::Relaxed);

    execute!(w, EnableBracketedPaste)?;
    MODES.bracketed_paste.store(true, Ordering::Relaxed);

    if supports_keyboard_enhancement().unwrap_or(false) {
        execute!(
            w,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )?;
        MODES.keyboard_flags.store(true, Ordering::Relaxed);
    } else {
        debug!(target: "tui.terminal", "Keyboard enhancement unsupported");
    }

    execute!(w, EnableMouseCapture)?;
    MODES.mouse_capture.store(true, Ordering::Relaxed);

    Ok(())
}

pub fn cleanup_with_writer<W: Write>(writer: &mut W) {
    if MODES.keyboard_flags.swap(false, Ordering::Relaxed) {
        let _ = execute!(writer, PopKeyboardEnhancementFlags);
    }
    if MODES.mouse_capture.swap(false, Ordering::Relaxed) {
        let _ = execute!(writer, DisableMouseCapture);
    }
    if MODES.bracketed_paste.swap(false, Ordering::Relaxed) {
        let _ = execute!(writer, DisableBracketedPaste);
    }
    if MODES.alt_screen.swap(false, Ordering::Relaxed) {
        let _ = execute!(writer, LeaveAlternateScreen);
    }
    if MODES.raw.swap(false, Ordering::Relaxed) {
        let _ = disable_raw_mode();
    }
    let _ = writer.flush();
}

pub fn cleanup() {
    let mut out = io::stdout();
    cleanup_with_writer(&mut out);
}

/// Restores the terminal when dropped unless disarmed.
pub struct SetupGuard {
    armed: bool,
}

impl Default for SetupGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SetupGuard {
    pub fn new() -> Self {
        Self { armed: true }
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SetupGuard {
    fn drop(&mut self) {
        if self.armed {
            cleanup();
        }
    }
}

/// Set while a render boundary is running; its panics are recovered, so
/// the terminal must stay up.
static RECOVERABLE: AtomicBool = AtomicBool::new(false);

/// Run `f` with panics marked recoverable.
pub fn recoverable<T>(f: impl FnOnce() -> T) -> T {
    struct Reset;
    impl Drop for Reset {
        fn drop(&mut self) {
            RECOVERABLE.store(false, Ordering::Relaxed);
        }
    }

    RECOVERABLE.store(true, Ordering::Relaxed);
    let _reset = Reset;
    f()
}

/// Restore the terminal before the default hook reports a panic.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if RECOVERABLE.load(Ordering::Relaxed) {
            tracing::error!(
                target: "tui.terminal",
                panic = %info,
                "Recovered panic while rendering"
            );
            return;
        }
        cleanup();
        previous(info);
    }));
}
