use async_trait::async_trait;
use eyre::{Result, eyre};
use std::net::SocketAddr;
use tracing::info;

use parley_core::config::ServerConfig;
use parley_server::{AppState, ServiceHost, shutdown_signal};

use super::Command;

pub struct ServeCommand {
    pub port: u16,
    pub bind: String,
}

impl ServeCommand {
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| eyre!("Invalid bind address: {}", e))
    }
}

#[async_trait]
impl Command for ServeCommand {
    async fn execute(&self) -> Result<()> {
        let addr = self.addr()?;
        let config = ServerConfig::from_env()?;
        let state = AppState::from_config(&config)?;
        let host = ServiceHost::bind(addr, state).await?;
        info!("Chat endpoint at http://{}/api/chat", host.local_addr()?);

        host.serve(shutdown_signal()).await?;
        info!("Server shutdown complete");
        Ok(())
    }
}
