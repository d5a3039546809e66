//! Configuration loading and management
//!
//! The application is configured from a YAML file, optionally overridden by
//! environment variables:
//!
//! ```yaml
//! server:
//!   bind_address: "0.0.0.0:8000"
//! auth:
//!   jwt_secret: "change-me"
//! process:
//!   executable: "/opt/acc/accServer"
//!   work_dir: "/var/lib/acc-manager/instances"
//! storage:
//!   backend: sqlite
//!   path: "/var/lib/acc-manager/manager.db"
//! bootstrap_admin:
//!   mail: "admin@example.com"
//!   password: "admin"
//! ```

use crate::core::error::{ConfigError, ManagerResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Override for `server.bind_address`
pub const ENV_BIND: &str = "ACC_MANAGER_BIND";
/// Override for `auth.jwt_secret`
pub const ENV_JWT_SECRET: &str = "ACC_MANAGER_JWT_SECRET";
/// Override for `process.executable`
pub const ENV_SERVER_EXE: &str = "ACC_MANAGER_SERVER_EXE";
/// Override for `process.work_dir`
pub const ENV_WORK_DIR: &str = "ACC_MANAGER_WORK_DIR";
/// Selects the SQLite backend at this path
pub const ENV_DATABASE: &str = "ACC_MANAGER_DATABASE";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: HttpConfig,

    pub auth: AuthConfig,

    #[serde(default)]
    pub process: ProcessConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Admin account created at startup if no user with this mail exists
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Origins allowed by the CORS layer
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for signing access tokens
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

/// Dedicated server process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    /// Root under which every server config gets its own instance directory
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            args: Vec::new(),
            work_dir: default_work_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_max_items_per_page")]
    pub max_items_per_page: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_items_per_page: default_max_items_per_page(),
        }
    }
}

/// Where records live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Nothing survives a restart; for tests and throwaway runs
    Memory,
    /// One SQLite database file, created on first start
    Sqlite {
        #[serde(default = "default_database_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub mail: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:8080".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn default_token_ttl() -> u64 {
    86_400
}

fn default_executable() -> PathBuf {
    PathBuf::from("accServer")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./instances")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("acc-manager.db")
}

fn default_max_items_per_page() -> u32 {
    100
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ManagerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: format!("{}: {}", path.display(), e),
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                file: Some(path.display().to_string()),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> ManagerResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply `ACC_MANAGER_*` environment overrides
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (used by tests)
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup(ENV_BIND) {
            self.server.bind_address = v;
        }
        if let Some(v) = lookup(ENV_JWT_SECRET) {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = lookup(ENV_SERVER_EXE) {
            self.process.executable = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_WORK_DIR) {
            self.process.work_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_DATABASE) {
            self.storage = StorageConfig::Sqlite {
                path: PathBuf::from(v),
            };
        }
        self
    }

    /// Check values that deserialization alone cannot
    pub fn validate(&self) -> ManagerResult<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "auth.jwt_secret".to_string(),
            }
            .into());
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "auth.token_ttl_secs".to_string(),
                value: "0".to_string(),
                message: "must be positive".to_string(),
            }
            .into());
        }
        if self.query.max_items_per_page == 0 {
            return Err(ConfigError::InvalidValue {
                field: "query.max_items_per_page".to_string(),
                value: "0".to_string(),
                message: "must be positive".to_string(),
            }
            .into());
        }
        if self.process.executable.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "process.executable".to_string(),
            }
            .into());
        }
        if let StorageConfig::Sqlite { path } = &self.storage
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::MissingField {
                field: "storage.path".to_string(),
            }
            .into());
        }
        if let Some(admin) = &self.bootstrap_admin
            && (admin.mail.is_empty() || admin.password.is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "bootstrap_admin".to_string(),
                value: admin.mail.clone(),
                message: "mail and password are required".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
