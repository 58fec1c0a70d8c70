use async_trait::async_trait;
use eyre::Result;

pub mod export;
pub mod serve;
#[cfg(feature = "ui")]
pub mod tui;

#[async_trait]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}
