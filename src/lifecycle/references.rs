//! Blob references held by server configs
//!
//! Configurations, settings and events are launch parameters of the server
//! configs pointing at them. A referenced blob cannot be deleted, and a blob
//! referenced by a running server config cannot be edited.
//!
//! Operations that attach or read blobs for a server config (create, update,
//! start) take the shared side of one lock; blob edits and deletes take the
//! exclusive side, so a check cannot race a concurrent attach or start.

use crate::core::entity::Record;
use crate::core::error::{EntityError, ManagerResult};
use crate::core::query::{FilterOperator, FilterRequest, SortDirection};
use crate::core::service::{GuardLock, ReferenceGuard, ResourceService};
use crate::entities::ServerConfig;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tracing::warn;

pub struct BlobReferences {
    server_configs: ResourceService<ServerConfig>,
    lock: Arc<RwLock<()>>,
}

impl BlobReferences {
    pub fn new(server_configs: ResourceService<ServerConfig>) -> Self {
        Self {
            server_configs,
            lock: Arc::new(RwLock::new(())),
        }
    }

    /// Shared hold for operations that attach or read blobs
    pub async fn share(&self) -> OwnedRwLockReadGuard<()> {
        self.lock.clone().read_owned().await
    }

    /// Lowest-id server config referencing `resource` `id`
    async fn first_dependent(
        &self,
        resource: &str,
        id: i64,
        running_only: bool,
    ) -> ManagerResult<Option<ServerConfig>> {
        let field = format!("{}_id", resource);
        if ServerConfig::fields().lookup(&field).is_none() {
            return Ok(None);
        }

        let mut request = FilterRequest::new().filter(&field, FilterOperator::Eq, json!(id));
        if running_only {
            request = request.filter("process_is_running", FilterOperator::Eq, json!(true));
        }
        let page = self
            .server_configs
            .filter(&request.sort_by("id", SortDirection::Asc).page(0, 1))
            .await?;
        Ok(page.items.into_iter().next())
    }

    fn in_use(resource: &str, id: i64, config: &ServerConfig) -> EntityError {
        EntityError::InUse {
            entity_type: resource.to_string(),
            id,
            server_config_id: config.id,
            running: config.process_is_running,
        }
    }
}

#[async_trait]
impl ReferenceGuard for BlobReferences {
    async fn guard_update(&self, resource: &'static str, id: i64) -> ManagerResult<GuardLock> {
        let lock = self.lock.clone().write_owned().await;
        if let Some(config) = self.first_dependent(resource, id, true).await? {
            warn!(resource, id, server_config_id = config.id, "rejected edit of a blob in use");
            return Err(Self::in_use(resource, id, &config).into());
        }
        Ok(lock)
    }

    async fn guard_delete(&self, resource: &'static str, id: i64) -> ManagerResult<GuardLock> {
        let lock = self.lock.clone().write_owned().await;
        if let Some(config) = self.first_dependent(resource, id, false).await? {
            warn!(resource, id, server_config_id = config.id, "rejected delete of a referenced blob");
            return Err(Self::in_use(resource, id, &config).into());
        }
        Ok(lock)
    }
}
