use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{Result, ServerError};
use crate::routes::router;
use crate::state::AppState;

/// A bound listener plus the router it serves.
pub struct ServiceHost {
    listener: TcpListener,
    router: Router,
}

impl ServiceHost {
    pub async fn bind(addr: SocketAddr, state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self {
            listener,
            router: router(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then let in-flight requests finish.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(target: "parley_server::service_host", %addr, "Listening");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!(target: "parley_server::service_host", "Server shut down");
        Ok(())
    }
}

/// Resolves on Ctrl+C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(target: "parley_server::service_host", "Shutdown signal received"),
        Err(e) => error!(
            target: "parley_server::service_host",
            error = %e,
            "Failed to listen for Ctrl+C"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::test_utils::ScriptedProvider;
    use parley_core::tools::ToolRegistry;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn serves_health_check_and_shuts_down() {
        let state = AppState::new(
            Arc::new(ScriptedProvider::new()),
            ToolRegistry::builtin(),
            "test-model",
            5,
            Duration::from_secs(5),
        );
        let host = ServiceHost::bind("127.0.0.1:0".parse().unwrap(), state)
            .await
            .unwrap();
        let addr = host.local_addr().unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(host.serve(async {
            let _ = stop_rx.await;
        }));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
