//! Start/stop state machine for server configs
//!
//! ```text
//! Stopped ──start──▶ Running ──stop──▶ Stopped
//!    ▲                  │
//!    └────refresh───────┘   (process found dead)
//! ```
//!
//! A transition reads the record, performs the external action and only
//! then persists the outcome. If the action fails the record is left
//! exactly as it was. All transitions and guarded edits of one server
//! config are serialized by a per-id lock; different ids proceed
//! concurrently.
//!
//! Once a spawn or kill has been issued it runs to completion in a detached
//! task that also records the result, so a caller going away mid-request
//! cannot leave an untracked process behind.

use crate::config::ProcessConfig;
use crate::core::entity::Record;
use crate::core::error::{EntityError, LifecycleError, ManagerError, ManagerResult};
use crate::core::query::{FilterRequest, FilterResponse};
use crate::core::service::{Resource, ResourceService};
use crate::entities::{
    Configuration, Event, ServerConfig, ServerConfigCreate, ServerConfigUpdate, ServerConfigView,
    Settings,
};
use crate::lifecycle::host::{LaunchSpec, ProcessHost};
use crate::lifecycle::launch::LaunchFiles;
use crate::lifecycle::locks::KeyedLocks;
use crate::lifecycle::references::BlobReferences;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Owns the run state of every server config
pub struct LifecycleController {
    server_configs: ResourceService<ServerConfig>,
    configurations: ResourceService<Configuration>,
    settings: ResourceService<Settings>,
    events: ResourceService<Event>,
    host: Arc<dyn ProcessHost>,
    references: Arc<BlobReferences>,
    launch_files: LaunchFiles,
    executable: PathBuf,
    args: Vec<String>,
    locks: KeyedLocks,
}

impl LifecycleController {
    pub fn new(
        server_configs: ResourceService<ServerConfig>,
        configurations: ResourceService<Configuration>,
        settings: ResourceService<Settings>,
        events: ResourceService<Event>,
        host: Arc<dyn ProcessHost>,
        references: Arc<BlobReferences>,
        process: &ProcessConfig,
    ) -> Self {
        Self {
            server_configs,
            configurations,
            settings,
            events,
            host,
            references,
            launch_files: LaunchFiles::new(&process.work_dir),
            executable: process.executable.clone(),
            args: process.args.clone(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn launch_files(&self) -> &LaunchFiles {
        &self.launch_files
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Create a server config after checking its three references
    pub async fn create(&self, payload: ServerConfigCreate) -> ManagerResult<ServerConfig> {
        let _shared = self.references.share().await;
        self.check_references(payload.configuration_id, payload.settings_id, payload.event_id)
            .await?;
        self.server_configs.create(payload).await
    }

    pub async fn get(&self, id: i64) -> ManagerResult<ServerConfig> {
        self.server_configs.get(id).await
    }

    pub async fn filter(&self, request: &FilterRequest) -> ManagerResult<FilterResponse<ServerConfig>> {
        self.server_configs.filter(request).await
    }

    /// Edit name, references or the enabled flag of a stopped instance
    pub async fn update(&self, id: i64, payload: ServerConfigUpdate) -> ManagerResult<ServerConfig> {
        let _guard = self.locks.lock(id).await;
        let _shared = self.references.share().await;
        let mut config = self.server_configs.get(id).await?;
        if config.process_is_running {
            warn!(id, "rejected update of a running server config");
            return Err(LifecycleError::AlreadyRunning { id }.into());
        }
        if payload.changes_references() {
            self.check_references(
                payload.configuration_id.unwrap_or(config.configuration_id),
                payload.settings_id.unwrap_or(config.settings_id),
                payload.event_id.unwrap_or(config.event_id),
            )
            .await?;
        }
        config.apply_update(payload)?;
        self.server_configs.save(config).await
    }

    /// Delete a stopped instance; running instances are refused
    pub async fn delete(&self, id: i64) -> ManagerResult<()> {
        let _guard = self.locks.lock(id).await;
        let config = self.server_configs.get(id).await?;
        if config.process_is_running {
            warn!(id, "rejected delete of a running server config");
            return Err(LifecycleError::AlreadyRunning { id }.into());
        }
        self.server_configs.delete(id).await
    }

    /// Embed the referenced blobs for a response
    pub async fn view(&self, config: ServerConfig) -> ManagerResult<ServerConfigView> {
        Ok(ServerConfigView {
            configuration: self.configurations.store().get(config.configuration_id).await?,
            settings: self.settings.store().get(config.settings_id).await?,
            event: self.events.store().get(config.event_id).await?,
            server_config: config,
        })
    }

    async fn check_references(
        &self,
        configuration_id: i64,
        settings_id: i64,
        event_id: i64,
    ) -> ManagerResult<()> {
        let checks = [
            (
                Configuration::resource_name(),
                "configuration_id",
                configuration_id,
                self.configurations.store().exists(configuration_id).await?,
            ),
            (
                Settings::resource_name(),
                "settings_id",
                settings_id,
                self.settings.store().exists(settings_id).await?,
            ),
            (
                Event::resource_name(),
                "event_id",
                event_id,
                self.events.store().exists(event_id).await?,
            ),
        ];
        for (entity_type, field, id, exists) in checks {
            if !exists {
                return Err(EntityError::InvalidReference {
                    entity_type: entity_type.to_string(),
                    field: field.to_string(),
                    id,
                }
                .into());
            }
        }
        Ok(())
    }

    async fn load_reference<T: Resource>(
        service: &ResourceService<T>,
        field: &str,
        id: i64,
    ) -> ManagerResult<T> {
        service.store().get(id).await?.ok_or_else(|| {
            EntityError::InvalidReference {
                entity_type: T::resource_name().to_string(),
                field: field.to_string(),
                id,
            }
            .into()
        })
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Materialize the launch files and spawn the server process.
    ///
    /// Fails with `AlreadyRunning`, `Disabled`, `InvalidReference`,
    /// `LaunchFileFailed` or `SpawnFailed`; in every failure case the record
    /// is unchanged.
    pub async fn start(&self, id: i64) -> ManagerResult<ServerConfig> {
        let guard = self.locks.lock(id).await;
        // Held until the running state is recorded so blob edits see it
        let shared = self.references.share().await;
        let config = self.server_configs.get(id).await?;

        if config.process_is_running {
            warn!(id, pid = ?config.process_id, "start rejected: already running");
            return Err(LifecycleError::AlreadyRunning { id }.into());
        }
        if !config.is_enabled {
            warn!(id, "start rejected: server config is disabled");
            return Err(LifecycleError::Disabled { id }.into());
        }

        let configuration =
            Self::load_reference(&self.configurations, "configuration_id", config.configuration_id).await?;
        let settings = Self::load_reference(&self.settings, "settings_id", config.settings_id).await?;
        let event = Self::load_reference(&self.events, "event_id", config.event_id).await?;

        let working_dir = self
            .launch_files
            .write(id, &configuration, &settings, &event)
            .await
            .map_err(|e| LifecycleError::LaunchFileFailed {
                id,
                message: format!("{:#}", e),
            })?;

        let spec = LaunchSpec {
            executable: self.executable.clone(),
            args: self.args.clone(),
            working_dir,
        };
        let host = self.host.clone();
        let store = self.server_configs.clone();

        // Past this point the spawn is not retractable
        let task: JoinHandle<ManagerResult<ServerConfig>> = tokio::spawn(async move {
            let _guard = guard;
            let _shared = shared;
            let pid = host.spawn(&spec).await.map_err(|e| {
                warn!(id, error = %e, "spawn failed");
                LifecycleError::SpawnFailed {
                    id,
                    message: e.to_string(),
                }
            })?;

            let mut updated = config;
            updated.mark_started(i64::from(pid), Utc::now());
            match store.save(updated).await {
                Ok(saved) => {
                    info!(id, pid, "server started");
                    Ok(saved)
                }
                Err(e) => {
                    error!(id, pid, error = %e, "failed to record start; terminating process");
                    if let Err(kill_err) = host.kill(pid).await {
                        error!(id, pid, error = %kill_err, "failed to terminate unrecorded process");
                    }
                    Err(e)
                }
            }
        });

        task.await
            .map_err(|e| ManagerError::Internal(format!("start task failed: {}", e)))?
    }

    /// Signal the server process to terminate.
    ///
    /// Fails with `NotRunning` or `StopFailed`; on failure the record is
    /// unchanged and the caller decides whether to retry.
    pub async fn stop(&self, id: i64) -> ManagerResult<ServerConfig> {
        let guard = self.locks.lock(id).await;
        let config = self.server_configs.get(id).await?;

        let pid = match (config.process_is_running, config.process_id) {
            (true, Some(pid)) => pid,
            _ => {
                warn!(id, "stop rejected: not running");
                return Err(LifecycleError::NotRunning { id }.into());
            }
        };
        let os_pid = u32::try_from(pid).map_err(|_| LifecycleError::StopFailed {
            id,
            message: format!("recorded pid {} is not a valid process id", pid),
        })?;

        let host = self.host.clone();
        let store = self.server_configs.clone();

        let task: JoinHandle<ManagerResult<ServerConfig>> = tokio::spawn(async move {
            let _guard = guard;
            host.kill(os_pid).await.map_err(|e| {
                warn!(id, pid, error = %e, "kill failed");
                LifecycleError::StopFailed {
                    id,
                    message: e.to_string(),
                }
            })?;

            let mut updated = config;
            updated.mark_stopped(stop_time(&updated));
            let saved = store.save(updated).await?;
            info!(id, pid, "server stopped");
            Ok(saved)
        });

        task.await
            .map_err(|e| ManagerError::Internal(format!("stop task failed: {}", e)))?
    }

    /// Reconcile the record with process liveness.
    ///
    /// A record marked running whose process no longer exists is moved to
    /// stopped. Any other record is returned unchanged.
    pub async fn refresh(&self, id: i64) -> ManagerResult<ServerConfig> {
        let _guard = self.locks.lock(id).await;
        let config = self.server_configs.get(id).await?;

        let Some(pid) = config.process_id.filter(|_| config.process_is_running) else {
            return Ok(config);
        };
        let alive = match u32::try_from(pid) {
            Ok(os_pid) => self.host.is_alive(os_pid).await?,
            Err(_) => false,
        };
        if alive {
            return Ok(config);
        }

        let mut updated = config;
        updated.mark_stopped(stop_time(&updated));
        let saved = self.server_configs.save(updated).await?;
        info!(id, pid, "server process gone; marked stopped");
        Ok(saved)
    }
}

/// Stop timestamp strictly after the recorded start, even if the wall clock
/// stepped back
fn stop_time(config: &ServerConfig) -> DateTime<Utc> {
    let now = Utc::now();
    match config.process_last_start {
        Some(start) if now <= start => start + Duration::nanoseconds(1),
        _ => now,
    }
}
