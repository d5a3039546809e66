//! Typed error handling for the server manager
//!
//! Every failure surfaced to a caller is a [`ManagerError`]. Each category
//! knows its HTTP status and a stable error code so the boundary layer can
//! translate errors without inspecting messages.
//!
//! # Error Categories
//!
//! - [`QueryError`]: malformed filter/sort/page requests
//! - [`EntityError`]: missing or dangling records
//! - [`ValidationError`]: request bodies that fail validation
//! - [`RequestError`]: authentication and authorization failures
//! - [`LifecycleError`]: start/stop/refresh of server processes
//! - [`ConfigError`]: configuration loading
//!
//! # Example
//!
//! ```rust,ignore
//! match controller.start(id).await {
//!     Ok(config) => println!("running as pid {:?}", config.process_id),
//!     Err(ManagerError::Lifecycle(LifecycleError::AlreadyRunning { id })) => {
//!         println!("server config {} is already running", id);
//!     }
//!     Err(e) => eprintln!("start failed: {}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// The main error type of the server manager
#[derive(Debug)]
pub enum ManagerError {
    /// Filter/sort/pagination errors
    Query(QueryError),

    /// Record lookup errors
    Entity(EntityError),

    /// Request body validation errors
    Validation(ValidationError),

    /// Authentication/authorization errors
    Request(RequestError),

    /// Process lifecycle errors
    Lifecycle(LifecycleError),

    /// Configuration errors
    Config(ConfigError),

    /// Internal errors (store failures, poisoned locks)
    Internal(String),
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerError::Query(e) => write!(f, "{}", e),
            ManagerError::Entity(e) => write!(f, "{}", e),
            ManagerError::Validation(e) => write!(f, "{}", e),
            ManagerError::Request(e) => write!(f, "{}", e),
            ManagerError::Lifecycle(e) => write!(f, "{}", e),
            ManagerError::Config(e) => write!(f, "{}", e),
            ManagerError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManagerError::Query(e) => Some(e),
            ManagerError::Entity(e) => Some(e),
            ManagerError::Validation(e) => Some(e),
            ManagerError::Request(e) => Some(e),
            ManagerError::Lifecycle(e) => Some(e),
            ManagerError::Config(e) => Some(e),
            ManagerError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ManagerError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ManagerError::Query(_) => StatusCode::BAD_REQUEST,
            ManagerError::Entity(e) => e.status_code(),
            ManagerError::Validation(e) => e.status_code(),
            ManagerError::Request(e) => e.status_code(),
            ManagerError::Lifecycle(e) => e.status_code(),
            ManagerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ManagerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ManagerError::Query(e) => e.error_code(),
            ManagerError::Entity(e) => e.error_code(),
            ManagerError::Validation(e) => e.error_code(),
            ManagerError::Request(e) => e.error_code(),
            ManagerError::Lifecycle(e) => e.error_code(),
            ManagerError::Config(_) => "CONFIG_ERROR",
            ManagerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ManagerError::Entity(EntityError::NotFound { entity_type, id }) => {
                Some(serde_json::json!({ "entity_type": entity_type, "id": id }))
            }
            ManagerError::Entity(EntityError::InUse {
                entity_type,
                id,
                server_config_id,
                ..
            }) => Some(serde_json::json!({
                "entity_type": entity_type,
                "id": id,
                "server_config_id": server_config_id
            })),
            ManagerError::Query(QueryError::InvalidField { field, .. })
            | ManagerError::Query(QueryError::UnsupportedOperator { field, .. })
            | ManagerError::Query(QueryError::InvalidValue { field, .. }) => {
                Some(serde_json::json!({ "field": field }))
            }
            ManagerError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            _ => None,
        }
    }

    /// Shorthand for a missing record
    pub fn not_found(entity_type: &str, id: i64) -> Self {
        ManagerError::Entity(EntityError::NotFound {
            entity_type: entity_type.to_string(),
            id,
        })
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ManagerError::Request(RequestError::Unauthorized {
            message: message.into(),
        })
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ManagerError::Request(RequestError::Forbidden {
            message: message.into(),
        })
    }
}

impl IntoResponse for ManagerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors raised while compiling a filter request. All are caller errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Unknown field '{field}' for {resource}")]
    InvalidField { resource: String, field: String },

    #[error("Operator '{operator}' is not supported on field '{field}'")]
    UnsupportedOperator { field: String, operator: String },

    #[error("Invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid page window: {message}")]
    InvalidPageWindow { message: String },
}

impl QueryError {
    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::InvalidField { .. } => "INVALID_FIELD",
            QueryError::UnsupportedOperator { .. } => "UNSUPPORTED_OPERATOR",
            QueryError::InvalidValue { .. } => "INVALID_VALUE",
            QueryError::InvalidPageWindow { .. } => "INVALID_PAGE_WINDOW",
        }
    }
}

impl From<QueryError> for ManagerError {
    fn from(err: QueryError) -> Self {
        ManagerError::Query(err)
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

/// Errors related to record lookups
#[derive(Debug)]
pub enum EntityError {
    /// Record was not found
    NotFound { entity_type: String, id: i64 },

    /// A foreign id points at a record that does not exist
    InvalidReference {
        entity_type: String,
        field: String,
        id: i64,
    },

    /// A server config depends on the record
    InUse {
        entity_type: String,
        id: i64,
        server_config_id: i64,
        running: bool,
    },
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::NotFound { entity_type, id } => {
                write!(f, "{} with id '{}' not found", entity_type, id)
            }
            EntityError::InvalidReference {
                entity_type,
                field,
                id,
            } => {
                write!(
                    f,
                    "Field '{}' references {} '{}' which does not exist",
                    field, entity_type, id
                )
            }
            EntityError::InUse {
                entity_type,
                id,
                server_config_id,
                running,
            } => {
                let state = if *running { "running " } else { "" };
                write!(
                    f,
                    "{} '{}' is used by {}server config {}",
                    entity_type, id, state, server_config_id
                )
            }
        }
    }
}

impl std::error::Error for EntityError {}

impl EntityError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EntityError::NotFound { .. } => StatusCode::NOT_FOUND,
            EntityError::InvalidReference { .. } => StatusCode::BAD_REQUEST,
            EntityError::InUse { .. } => StatusCode::CONFLICT,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EntityError::NotFound { .. } => "ENTITY_NOT_FOUND",
            EntityError::InvalidReference { .. } => "INVALID_REFERENCE",
            EntityError::InUse { .. } => "ENTITY_IN_USE",
        }
    }
}

impl From<EntityError> for ManagerError {
    fn from(err: EntityError) -> Self {
        ManagerError::Entity(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to input validation
#[derive(Debug)]
pub enum ValidationError {
    /// Single field validation error
    FieldError { field: String, message: String },

    /// Multiple field validation errors
    FieldErrors(Vec<FieldValidationError>),

    /// Body is not valid JSON for the target type
    InvalidJson { message: String },
}

/// A single field validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::FieldError { field, message } => {
                write!(f, "Validation error for field '{}': {}", field, message)
            }
            ValidationError::FieldErrors(errors) => {
                let msgs: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect();
                write!(f, "Validation errors: {}", msgs.join(", "))
            }
            ValidationError::InvalidJson { message } => {
                write!(f, "Invalid JSON: {}", message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ValidationError::InvalidJson { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::InvalidJson { .. } => "INVALID_JSON",
            _ => "VALIDATION_ERROR",
        }
    }
}

impl From<ValidationError> for ManagerError {
    fn from(err: ValidationError) -> Self {
        ManagerError::Validation(err)
    }
}

impl From<validator::ValidationErrors> for ManagerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldValidationError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldValidationError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        if fields.is_empty() {
            // Only nested (list or struct) errors were reported
            return ManagerError::Validation(ValidationError::FieldError {
                field: "body".to_string(),
                message: errors.to_string(),
            });
        }
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ManagerError::Validation(ValidationError::FieldErrors(fields))
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to the caller's credentials
#[derive(Debug)]
pub enum RequestError {
    /// Missing, malformed or expired credentials
    Unauthorized { message: String },

    /// Valid credentials without the required scope
    Forbidden { message: String },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
            RequestError::Forbidden { message } => write!(f, "Forbidden: {}", message),
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            RequestError::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::Unauthorized { .. } => "UNAUTHORIZED",
            RequestError::Forbidden { .. } => "FORBIDDEN",
        }
    }
}

impl From<RequestError> for ManagerError {
    fn from(err: RequestError) -> Self {
        ManagerError::Request(err)
    }
}

// =============================================================================
// Lifecycle Errors
// =============================================================================

/// Errors raised by the process lifecycle controller.
///
/// None of these leave a partial write behind: the record is persisted only
/// after the external action succeeded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Server config {id} is already running")]
    AlreadyRunning { id: i64 },

    #[error("Server config {id} is not running")]
    NotRunning { id: i64 },

    #[error("Server config {id} is disabled")]
    Disabled { id: i64 },

    #[error("Failed to write launch files for server config {id}: {message}")]
    LaunchFileFailed { id: i64, message: String },

    #[error("Failed to spawn server process for config {id}: {message}")]
    SpawnFailed { id: i64, message: String },

    #[error("Failed to stop server process for config {id}: {message}")]
    StopFailed { id: i64, message: String },
}

impl LifecycleError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LifecycleError::AlreadyRunning { .. }
            | LifecycleError::NotRunning { .. }
            | LifecycleError::Disabled { .. } => StatusCode::CONFLICT,
            LifecycleError::LaunchFileFailed { .. }
            | LifecycleError::SpawnFailed { .. }
            | LifecycleError::StopFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            LifecycleError::AlreadyRunning { .. } => "ALREADY_RUNNING",
            LifecycleError::NotRunning { .. } => "NOT_RUNNING",
            LifecycleError::Disabled { .. } => "DISABLED",
            LifecycleError::LaunchFileFailed { .. } => "LAUNCH_FILE_FAILED",
            LifecycleError::SpawnFailed { .. } => "SPAWN_FAILED",
            LifecycleError::StopFailed { .. } => "STOP_FAILED",
        }
    }
}

impl From<LifecycleError> for ManagerError {
    fn from(err: LifecycleError) -> Self {
        ManagerError::Lifecycle(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to parse configuration file
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Missing required field in configuration
    MissingField { field: String },

    /// Invalid value in configuration
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    /// IO error while reading configuration
    IoError { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError { file, message } => {
                if let Some(file) = file {
                    write!(f, "Failed to parse config file '{}': {}", file, message)
                } else {
                    write!(f, "Failed to parse config: {}", message)
                }
            }
            ConfigError::MissingField { field } => {
                write!(f, "Missing required config field '{}'", field)
            }
            ConfigError::InvalidValue {
                field,
                value,
                message,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for field '{}': {}",
                    value, field, message
                )
            }
            ConfigError::IoError { message } => {
                write!(f, "IO error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for ManagerError {
    fn from(err: ConfigError) -> Self {
        ManagerError::Config(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for ManagerError {
    fn from(err: serde_json::Error) -> Self {
        ManagerError::Validation(ValidationError::InvalidJson {
            message: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for ManagerError {
    fn from(err: serde_yaml::Error) -> Self {
        ManagerError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

impl From<anyhow::Error> for ManagerError {
    fn from(err: anyhow::Error) -> Self {
        ManagerError::Internal(err.to_string())
    }
}

/// A specialized Result type for server manager operations
pub type ManagerResult<T> = Result<T, ManagerError>;
