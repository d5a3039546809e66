//! ServerBuilder: assembles state and routes from an [`AppConfig`]

use super::router::build_router;
use super::state::AppState;
use crate::config::{AppConfig, BootstrapAdmin};
use crate::core::entity::Record;
use crate::core::error::ManagerResult;
use crate::core::query::{FilterOperator, FilterRequest};
use crate::core::service::ResourceService;
use crate::core::auth::ADMIN_SCOPE;
use crate::entities::{User, UserCreate};
use crate::lifecycle::{OsProcessHost, ProcessHost};
use anyhow::Result;
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for the HTTP server
///
/// # Example
///
/// ```ignore
/// let config = AppConfig::from_yaml_file("acc-manager.yaml")?;
/// ServerBuilder::new(config).serve().await?;
/// ```
pub struct ServerBuilder {
    config: AppConfig,
    process_host: Arc<dyn ProcessHost>,
}

impl ServerBuilder {
    /// Create a builder spawning real OS processes
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            process_host: Arc::new(OsProcessHost::new()),
        }
    }

    /// Replace the process host (tests use stubs)
    pub fn with_process_host(mut self, host: impl ProcessHost + 'static) -> Self {
        self.process_host = Arc::new(host);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Build the shared state and create the bootstrap admin if configured
    pub async fn build_state(&self) -> ManagerResult<AppState> {
        let state = AppState::open(&self.config, self.process_host.clone()).await?;
        if let Some(admin) = &self.config.bootstrap_admin {
            ensure_admin(&state.users, admin).await?;
        }
        Ok(state)
    }

    /// Build the router together with its state
    pub async fn build(&self) -> ManagerResult<(Router, AppState)> {
        let state = self.build_state().await?;
        let router = build_router(state.clone(), &self.config.server);
        Ok((router, state))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Handles SIGTERM and SIGINT (Ctrl+C).
    pub async fn serve(self) -> Result<()> {
        let (app, _state) = self.build().await?;
        let addr = &self.config.server.bind_address;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Create an enabled admin account unless a user with that mail exists
async fn ensure_admin(users: &ResourceService<User>, admin: &BootstrapAdmin) -> ManagerResult<()> {
    let request = FilterRequest::new()
        .filter("mail", FilterOperator::Eq, json!(admin.mail))
        .page(0, 1);
    if users.filter(&request).await?.total_count > 0 {
        tracing::debug!(mail = %admin.mail, "bootstrap admin already present");
        return Ok(());
    }

    let created = users
        .create(UserCreate {
            mail: admin.mail.clone(),
            password: admin.password.clone(),
            password_confirm: admin.password.clone(),
            scopes: ADMIN_SCOPE.to_string(),
            is_enabled: true,
        })
        .await?;
    tracing::info!(user_id = created.id(), mail = %created.mail, "created bootstrap admin");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
