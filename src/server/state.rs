//! Shared application state

use crate::config::{AppConfig, StorageConfig};
use crate::core::auth::TokenService;
use crate::core::error::ManagerResult;
use crate::core::query::QueryEngine;
use crate::core::service::{Resource, ResourceService};
use crate::core::store::RecordStore;
use crate::entities::{Configuration, Event, ServerConfig, Settings, User};
use crate::lifecycle::{BlobReferences, LifecycleController, ProcessHost};
use crate::storage::{InMemoryStore, SqliteStore, open_database};
use axum::extract::FromRef;
use sqlx::SqlitePool;
use std::sync::Arc;

/// State shared across handlers
///
/// Handlers pull the piece they need through `State<Arc<...>>`; each field
/// is cheap to clone.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub users: Arc<ResourceService<User>>,
    pub configurations: Arc<ResourceService<Configuration>>,
    pub settings: Arc<ResourceService<Settings>>,
    pub events: Arc<ResourceService<Event>>,
    pub tokens: Arc<TokenService>,
    /// Sole owner of server config records and their run state
    pub lifecycle: Arc<LifecycleController>,
}

/// One store per resource
struct Stores {
    users: Arc<dyn RecordStore<User>>,
    configurations: Arc<dyn RecordStore<Configuration>>,
    settings: Arc<dyn RecordStore<Settings>>,
    events: Arc<dyn RecordStore<Event>>,
    server_configs: Arc<dyn RecordStore<ServerConfig>>,
}

impl Stores {
    fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryStore::new()),
            configurations: Arc::new(InMemoryStore::new()),
            settings: Arc::new(InMemoryStore::new()),
            events: Arc::new(InMemoryStore::new()),
            server_configs: Arc::new(InMemoryStore::new()),
        }
    }

    async fn sqlite(pool: SqlitePool) -> ManagerResult<Self> {
        Ok(Self {
            users: sqlite_store(&pool).await?,
            configurations: sqlite_store(&pool).await?,
            settings: sqlite_store(&pool).await?,
            events: sqlite_store(&pool).await?,
            server_configs: sqlite_store(&pool).await?,
        })
    }
}

async fn sqlite_store<T: Resource>(pool: &SqlitePool) -> ManagerResult<Arc<dyn RecordStore<T>>> {
    Ok(Arc::new(SqliteStore::<T>::open(pool.clone()).await?))
}

impl AppState {
    /// Build the state over the backend named in `config.storage`
    pub async fn open(config: &AppConfig, host: Arc<dyn ProcessHost>) -> ManagerResult<Self> {
        let stores = match &config.storage {
            StorageConfig::Memory => {
                tracing::warn!("using in-memory storage; records are lost on restart");
                Stores::in_memory()
            }
            StorageConfig::Sqlite { path } => Stores::sqlite(open_database(path).await?).await?,
        };
        Ok(Self::assemble(config, host, stores))
    }

    /// Build the state over in-memory stores
    pub fn in_memory(config: &AppConfig, host: Arc<dyn ProcessHost>) -> Self {
        Self::assemble(config, host, Stores::in_memory())
    }

    fn assemble(config: &AppConfig, host: Arc<dyn ProcessHost>, stores: Stores) -> Self {
        let engine = QueryEngine::new(config.query.max_items_per_page);

        let server_configs = ResourceService::new(stores.server_configs, engine);
        let references = Arc::new(BlobReferences::new(server_configs.clone()));

        let configurations =
            ResourceService::new(stores.configurations, engine).with_guard(references.clone());
        let settings = ResourceService::new(stores.settings, engine).with_guard(references.clone());
        let events = ResourceService::new(stores.events, engine).with_guard(references.clone());

        let lifecycle = LifecycleController::new(
            server_configs,
            configurations.clone(),
            settings.clone(),
            events.clone(),
            host,
            references,
            &config.process,
        );

        Self {
            users: Arc::new(ResourceService::new(stores.users, engine)),
            configurations: Arc::new(configurations),
            settings: Arc::new(settings),
            events: Arc::new(events),
            tokens: Arc::new(TokenService::new(
                &config.auth.jwt_secret,
                config.auth.token_ttl_secs,
            )),
            lifecycle: Arc::new(lifecycle),
        }
    }
}
