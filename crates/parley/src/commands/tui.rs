use async_trait::async_trait;
use eyre::Result;
use std::path::PathBuf;

use parley_core::config::{ClientConfig, ContextMode};

use super::Command;
use crate::transcript::load_transcript;

pub struct TuiCommand {
    pub endpoint: Option<String>,
    pub context: Option<ContextMode>,
    pub load: Option<PathBuf>,
}

impl TuiCommand {
    /// Environment settings with command-line overrides applied.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_env()?;
        if let Some(endpoint) = &self.endpoint {
            config.endpoint.clone_from(endpoint);
        }
        if let Some(context) = self.context {
            config.context_mode = context;
        }
        Ok(config)
    }
}

#[async_trait]
impl Command for TuiCommand {
    async fn execute(&self) -> Result<()> {
        let config = self.client_config()?;
        let transcript = match &self.load {
            Some(path) => load_transcript(path)?,
            None => Vec::new(),
        };
        parley_tui::run_tui(config, transcript).await?;
        Ok(())
    }
}
