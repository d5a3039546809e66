//! A dedicated server instance: references to its three blobs plus run state
//!
//! Run-state fields (`process_*`) are written only by the lifecycle
//! controller. They are absent from the update payload, which rejects
//! unknown keys.

use crate::core::error::ManagerResult;
use crate::core::service::Resource;
use crate::core::store::Document;
use crate::entities::{Configuration, Event, Settings};
use crate::impl_record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub name: String,
    pub configuration_id: i64,
    pub settings_id: i64,
    pub event_id: i64,
    pub is_enabled: bool,
    pub process_is_running: bool,
    pub process_last_start: Option<DateTime<Utc>>,
    pub process_last_stop: Option<DateTime<Utc>>,
    pub process_id: Option<i64>,
}

impl_record!(ServerConfig, "server_config",
    fields {
        id: Integer,
        created: DateTime,
        name: Text,
        configuration_id: Integer,
        settings_id: Integer,
        event_id: Integer,
        is_enabled: Boolean,
        process_is_running: Boolean,
    }
    nullable {
        process_last_start: DateTime,
        process_last_stop: DateTime,
        process_id: Integer,
    }
);

impl ServerConfig {
    /// Record a successful spawn
    pub fn mark_started(&mut self, pid: i64, at: DateTime<Utc>) {
        self.process_id = Some(pid);
        self.process_is_running = true;
        self.process_last_start = Some(at);
    }

    /// Record an accepted kill or an observed exit
    pub fn mark_stopped(&mut self, at: DateTime<Utc>) {
        self.process_id = None;
        self.process_is_running = false;
        self.process_last_stop = Some(at);
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServerConfigCreate {
    #[validate(length(min = 1))]
    pub name: String,
    pub configuration_id: i64,
    pub settings_id: i64,
    pub event_id: i64,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ServerConfigUpdate {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub configuration_id: Option<i64>,
    pub settings_id: Option<i64>,
    pub event_id: Option<i64>,
    pub is_enabled: Option<bool>,
}

impl ServerConfigUpdate {
    /// Whether the payload changes any of the three blob references
    pub fn changes_references(&self) -> bool {
        self.configuration_id.is_some() || self.settings_id.is_some() || self.event_id.is_some()
    }
}

impl Document for ServerConfig {}

impl Resource for ServerConfig {
    const SCOPE: &'static str = "server_config";

    type Create = ServerConfigCreate;
    type Update = ServerConfigUpdate;

    fn from_create(p: ServerConfigCreate, now: DateTime<Utc>) -> ManagerResult<Self> {
        Ok(ServerConfig {
            id: 0,
            created: now,
            name: p.name,
            configuration_id: p.configuration_id,
            settings_id: p.settings_id,
            event_id: p.event_id,
            is_enabled: p.is_enabled,
            process_is_running: false,
            process_last_start: None,
            process_last_stop: None,
            process_id: None,
        })
    }

    fn apply_update(&mut self, p: ServerConfigUpdate) -> ManagerResult<()> {
        if let Some(v) = p.name {
            self.name = v;
        }
        if let Some(v) = p.configuration_id {
            self.configuration_id = v;
        }
        if let Some(v) = p.settings_id {
            self.settings_id = v;
        }
        if let Some(v) = p.event_id {
            self.event_id = v;
        }
        if let Some(v) = p.is_enabled {
            self.is_enabled = v;
        }
        Ok(())
    }
}

/// Response shape: the record with its referenced blobs embedded.
///
/// A reference whose target was deleted renders as `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfigView {
    #[serde(flatten)]
    pub server_config: ServerConfig,
    pub configuration: Option<Configuration>,
    pub settings: Option<Settings>,
    pub event: Option<Event>,
}
