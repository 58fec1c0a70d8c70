use async_trait::async_trait;
use eyre::{Result, WrapErr};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use parley_core::render::render_transcript_html;

use super::Command;
use crate::transcript::load_transcript;

pub struct ExportCommand {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
}

#[async_trait]
impl Command for ExportCommand {
    async fn execute(&self) -> Result<()> {
        let messages = load_transcript(&self.input)?;
        let html = render_transcript_html(&messages);

        match &self.output {
            Some(path) => {
                std::fs::write(path, &html)
                    .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
                info!(messages = messages.len(), path = %path.display(), "Exported transcript");
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(html.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}
