//! Persisted resources
//!
//! Each module defines a record, its create and update payloads and its
//! queryable field set.

pub mod macros;
pub mod configuration;
pub mod event;
pub mod server_config;
pub mod settings;
pub mod user;

pub use configuration::{Configuration, ConfigurationCreate, ConfigurationUpdate};
pub use event::{Event, EventCreate, EventUpdate, Session, SessionCreate, SessionUpdate};
pub use server_config::{ServerConfig, ServerConfigCreate, ServerConfigUpdate, ServerConfigView};
pub use settings::{Settings, SettingsCreate, SettingsUpdate};
pub use user::{User, UserCreate, UserUpdate};

use crate::core::error::{ManagerError, ManagerResult};
use serde::Serialize;
use serde_json::{Map, Value};

/// Bookkeeping keys that the dedicated server does not read
const MANAGER_KEYS: &[&str] = &["id", "created"];

/// Render a record as the dedicated server expects it in its `cfg/` files.
///
/// Drops manager bookkeeping keys and writes booleans as `0`/`1`, recursing
/// into nested objects and arrays.
pub fn launch_document<T: Serialize>(record: &T) -> ManagerResult<Value> {
    let value = serde_json::to_value(record)
        .map_err(|e| ManagerError::Internal(format!("Failed to serialize launch file: {}", e)))?;
    Ok(to_launch_value(value))
}

fn to_launch_value(value: Value) -> Value {
    match value {
        Value::Bool(b) => Value::from(u8::from(b)),
        Value::Array(items) => Value::Array(items.into_iter().map(to_launch_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !MANAGER_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k, to_launch_value(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_launch_value_conversion() {
        let doc = to_launch_value(json!({
            "id": 4,
            "created": "2024-05-01T10:00:00Z",
            "track": "spa",
            "isFixedConditionQualification": false,
            "sessions": [{ "id": 1, "sessionType": "R", "hourOfDay": 14 }]
        }));
        assert_eq!(
            doc,
            json!({
                "track": "spa",
                "isFixedConditionQualification": 0,
                "sessions": [{ "sessionType": "R", "hourOfDay": 14 }]
            })
        );
    }
}
