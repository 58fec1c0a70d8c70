use clap::Parser;
use eyre::{Result, WrapErr};

use parley::cli::{Cli, Commands};
use parley::commands::{Command, export::ExportCommand, serve::ServeCommand};
use parley_core::utils::tracing::{LogTarget, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre for better error reports
    color_eyre::install()?;

    let cli = Cli::parse();

    // Load .env file if it exists
    parley_core::config::load_env();

    // If no subcommand specified, default to TUI
    let cmd = cli.command.unwrap_or_default();

    // The terminal client owns the screen, so its logs go to a file.
    let log_target = match cmd {
        Commands::Tui { .. } => LogTarget::default_file(),
        Commands::Serve { .. } | Commands::Export { .. } => LogTarget::Stderr,
    };
    init_tracing(log_target).wrap_err("Failed to initialize logging")?;

    match cmd {
        Commands::Tui {
            endpoint,
            context,
            load,
        } => {
            #[cfg(feature = "ui")]
            {
                parley::commands::tui::TuiCommand {
                    endpoint,
                    context,
                    load,
                }
                .execute()
                .await
            }
            #[cfg(not(feature = "ui"))]
            {
                let _ = (endpoint, context, load);
                Err(eyre::eyre!(
                    "The terminal client is not available. Rebuild with the `ui` feature."
                ))
            }
        }
        Commands::Serve { port, bind } => ServeCommand { port, bind }.execute().await,
        Commands::Export { input, output } => ExportCommand { input, output }.execute().await,
    }
}
