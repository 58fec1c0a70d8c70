use std::io;
use std::path::PathBuf;

use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

use super::paths::AppPaths;

const DEFAULT_FILTER: &str = "info";

/// Where log output goes.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Human-readable output on stderr, for the server.
    Stderr,
    /// Daily-rotated files in the given directory, for the terminal client
    /// whose screen must stay clean.
    File(PathBuf),
}

impl LogTarget {
    pub fn default_file() -> Self {
        LogTarget::File(AppPaths::log_dir())
    }
}

/// Initialize the global subscriber. The filter comes from `RUST_LOG`,
/// defaulting to `info`.
pub fn init_tracing(target: LogTarget) -> io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match target {
        LogTarget::Stderr => {
            let subscriber = tracing_subscriber::registry()
                .with(
                    fmt::Layer::default()
                        .with_writer(io::stderr)
                        .with_target(true),
                )
                .with(filter);
            tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;
            tracing::debug!(
                target: "parley::utils::tracing",
                "Tracing initialized with stderr output"
            );
        }
        LogTarget::File(dir) => {
            std::fs::create_dir_all(&dir)?;
            let file_appender = rolling::daily(&dir, "parley.log");
            let subscriber = tracing_subscriber::registry()
                .with(
                    fmt::Layer::new()
                        .with_writer(file_appender)
                        .with_ansi(false)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter);
            tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;
            tracing::debug!(
                target: "parley::utils::tracing",
                path = %dir.display(),
                "Tracing initialized with file output"
            );
        }
    }

    Ok(())
}
