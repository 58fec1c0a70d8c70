use clap::{Parser, Subcommand};
use parley_core::config::ContextMode;
use std::path::PathBuf;

/// A streaming chat assistant with weather and temperature tools.
#[derive(Parser)]
#[command(version, about, long_about = None, author)]
pub struct Cli {
    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Launch the interactive terminal client (default)
    Tui {
        /// Chat endpoint to talk to (overrides PARLEY_ENDPOINT)
        #[arg(long)]
        endpoint: Option<String>,
        /// Which messages accompany each request: "full" or "latest-turn"
        #[arg(long, value_name = "MODE")]
        context: Option<ContextMode>,
        /// Start from a saved transcript (JSON)
        #[arg(long, value_name = "PATH")]
        load: Option<PathBuf>,
    },
    /// Serve the chat endpoint over HTTP
    Serve {
        /// Port to listen on
        #[arg(long, env = "PARLEY_PORT", default_value_t = 3000)]
        port: u16,
        /// Address to bind to
        #[arg(long, env = "PARLEY_BIND", default_value = "127.0.0.1")]
        bind: String,
    },
    /// Render a saved transcript to a standalone HTML page
    Export {
        /// Transcript to read: a message array or a `{"messages": [...]}` body
        #[arg(long, short, value_name = "PATH")]
        input: PathBuf,
        /// Where to write the page (stdout if omitted)
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Tui {
            endpoint: None,
            context: None,
            load: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_tui() {
        let cli = Cli::try_parse_from(["parley"]).unwrap();
        assert_eq!(cli.command.unwrap_or_default(), Commands::default());
    }

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from(["parley", "serve", "--port", "8080", "--bind", "0.0.0.0"])
            .unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Serve {
                port: 8080,
                bind: "0.0.0.0".to_string(),
            })
        );
    }

    #[test]
    fn parses_context_mode() {
        let cli = Cli::try_parse_from(["parley", "tui", "--context", "latest-turn"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Tui {
                endpoint: None,
                context: Some(ContextMode::LatestTurnOnly),
                load: None,
            })
        );
        assert!(Cli::try_parse_from(["parley", "tui", "--context", "everything"]).is_err());
    }

    #[test]
    fn export_requires_input() {
        assert!(Cli::try_parse_from(["parley", "export"]).is_err());
    }
}
