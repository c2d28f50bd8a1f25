//! Control server listener
//!
//! Binds the HTTP control API and runs the catalog refresh task for as long
//! as the server is up.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::Result;
use crate::matrix::RoutingEngine;
use crate::server::config::ServerConfig;
use crate::server::routes;

/// HTTP control server
pub struct ControlServer {
    config: ServerConfig,
    engine: Arc<RoutingEngine>,
}

impl ControlServer {
    /// Create a new server for the given engine
    pub fn new(config: ServerConfig, engine: Arc<RoutingEngine>) -> Self {
        Self { config, engine }
    }

    /// Get a reference to the routing engine
    pub fn engine(&self) -> &Arc<RoutingEngine> {
        &self.engine
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    ///
    /// In-flight requests finish, then capture loops are stopped.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, cors = self.config.cors_enabled, "Control server listening");

        // Prime the catalog so the first request sees sources
        if let Err(e) = self.engine.catalog().refresh().await {
            tracing::warn!(error = %e, "Initial source discovery failed");
        }
        let refresh_handle = self.engine.catalog().spawn_refresh_task();

        let app = routes::app(Arc::clone(&self.engine), &self.config);
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        // Stop background work on shutdown
        refresh_handle.abort();
        self.engine.shutdown().await;

        result.map_err(Into::into)
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
