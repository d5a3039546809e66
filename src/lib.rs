//! # ACC Server Manager
//!
//! Configuration records and process lifecycle for dedicated racing game
//! servers, exposed over an authenticated REST API.
//!
//! ## Features
//!
//! - **Declarative search**: every resource answers `POST /{resource}/_filter`
//!   with a filter, sort and page request validated against a static field
//!   registry before any store is touched
//! - **Process lifecycle**: start, stop and refresh dedicated server
//!   instances, each with its own launch directory and a per-record lock
//! - **Scoped access**: HS256 bearer tokens carrying scopes, `admin`
//!   satisfying every check
//! - **Durable records**: one SQLite table per resource, so run state
//!   survives a manager restart
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use acc_server_manager::prelude::*;
//!
//! let config = AppConfig::from_yaml_file("acc-manager.yaml")?.apply_env_overrides();
//! config.validate()?;
//! ServerBuilder::new(config).serve().await?;
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod lifecycle;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        auth::{AuthContext, TokenService},
        entity::Record,
        error::{ManagerError, ManagerResult},
        extractors::Validated,
        field::{FieldKind, FieldSet, FieldValue},
        query::{FilterOperator, FilterRequest, FilterResponse, QueryEngine, SortDirection},
        service::{Resource, ResourceService},
        store::RecordStore,
    };

    // === Entities ===
    pub use crate::entities::{Configuration, Event, ServerConfig, Session, Settings, User};

    // === Lifecycle ===
    pub use crate::lifecycle::{LaunchSpec, LifecycleController, OsProcessHost, ProcessHost};

    // === Storage ===
    pub use crate::storage::{InMemoryStore, SqliteStore};

    // === Config ===
    pub use crate::config::{AppConfig, StorageConfig};

    // === Server ===
    pub use crate::server::{AppState, ServerBuilder};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
}
