//! Network configuration blob (`cfg/configuration.json`)

use crate::core::error::ManagerResult;
use crate::core::service::Resource;
use crate::core::store::Document;
use crate::impl_record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub name: String,
    /// Port clients use to establish a connection
    pub tcp_port: i64,
    /// Port used for car position streaming and the ping test
    pub udp_port: i64,
    pub register_to_lobby: bool,
    pub max_connections: i64,
    pub lan_discovery: bool,
    pub config_version: String,
    #[serde(rename = "publicIP")]
    pub public_ip: String,
}

impl_record!(Configuration, "configuration",
    fields {
        id: Integer,
        created: DateTime,
        name: Text,
        tcp_port: Integer,
        udp_port: Integer,
        register_to_lobby: Boolean,
        max_connections: Integer,
        lan_discovery: Boolean,
        config_version: Text,
        public_ip: Text,
    }
);

impl Configuration {
    /// Body of the launch file read by the dedicated server
    pub fn launch_document(&self) -> Value {
        let mut doc = json!({
            "tcpPort": self.tcp_port,
            "udpPort": self.udp_port,
            "registerToLobby": u8::from(self.register_to_lobby),
            "maxConnections": self.max_connections,
            "lanDiscovery": u8::from(self.lan_discovery),
            "configVersion": self.config_version,
        });
        if !self.public_ip.is_empty() {
            doc["publicIP"] = json!(self.public_ip);
        }
        doc
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationCreate {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 1, max = 65535))]
    pub tcp_port: i64,
    #[validate(range(min = 1, max = 65535))]
    pub udp_port: i64,
    pub register_to_lobby: bool,
    #[validate(range(min = 1))]
    pub max_connections: i64,
    pub lan_discovery: bool,
    pub config_version: String,
    #[serde(rename = "publicIP", default)]
    pub public_ip: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationUpdate {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[validate(range(min = 1, max = 65535))]
    pub tcp_port: Option<i64>,
    #[validate(range(min = 1, max = 65535))]
    pub udp_port: Option<i64>,
    pub register_to_lobby: Option<bool>,
    #[validate(range(min = 1))]
    pub max_connections: Option<i64>,
    pub lan_discovery: Option<bool>,
    pub config_version: Option<String>,
    #[serde(rename = "publicIP")]
    pub public_ip: Option<String>,
}

impl Document for Configuration {}

impl Resource for Configuration {
    const SCOPE: &'static str = "configuration";

    type Create = ConfigurationCreate;
    type Update = ConfigurationUpdate;

    fn from_create(payload: ConfigurationCreate, now: DateTime<Utc>) -> ManagerResult<Self> {
        Ok(Configuration {
            id: 0,
            created: now,
            name: payload.name,
            tcp_port: payload.tcp_port,
            udp_port: payload.udp_port,
            register_to_lobby: payload.register_to_lobby,
            max_connections: payload.max_connections,
            lan_discovery: payload.lan_discovery,
            config_version: payload.config_version,
            public_ip: payload.public_ip,
        })
    }

    fn apply_update(&mut self, payload: ConfigurationUpdate) -> ManagerResult<()> {
        let ConfigurationUpdate {
            name,
            tcp_port,
            udp_port,
            register_to_lobby,
            max_connections,
            lan_discovery,
            config_version,
            public_ip,
        } = payload;

        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = tcp_port {
            self.tcp_port = v;
        }
        if let Some(v) = udp_port {
            self.udp_port = v;
        }
        if let Some(v) = register_to_lobby {
            self.register_to_lobby = v;
        }
        if let Some(v) = max_connections {
            self.max_connections = v;
        }
        if let Some(v) = lan_discovery {
            self.lan_discovery = v;
        }
        if let Some(v) = config_version {
            self.config_version = v;
        }
        if let Some(v) = public_ip {
            self.public_ip = v;
        }
        Ok(())
    }
}
