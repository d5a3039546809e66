//! Race weekend definition (`cfg/event.json`) and its sessions
//!
//! Sessions belong to exactly one event. They are created, replaced and
//! deleted together with it and are never addressed on their own.

use crate::core::error::ManagerResult;
use crate::core::service::Resource;
use crate::core::store::Document;
use crate::entities::launch_document;
use crate::impl_record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use validator::{Validate, ValidationError};

fn validate_session_type(value: &str) -> Result<(), ValidationError> {
    match value {
        "P" | "Q" | "R" => Ok(()),
        _ => Err(ValidationError::new("session_type")
            .with_message("expected P, Q or R".into())),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique within the owning event
    pub id: i64,
    pub created: DateTime<Utc>,
    pub name: String,
    pub hour_of_day: i64,
    /// 1 = Friday, 2 = Saturday, 3 = Sunday
    pub day_of_weekend: i64,
    pub time_multiplier: i64,
    /// P, Q or R
    pub session_type: String,
    pub session_duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub name: String,
    pub track: String,
    pub pre_race_waiting_time_seconds: i64,
    pub session_over_time_seconds: i64,
    pub ambient_temp: i64,
    pub cloud_level: f64,
    pub rain: f64,
    pub weather_randomness: i64,
    pub post_qualy_seconds: i64,
    pub post_race_seconds: i64,
    pub meta_data: String,
    pub simracer_weather_conditions: bool,
    pub is_fixed_condition_qualification: bool,
    pub sessions: Vec<Session>,
}

impl_record!(Event, "event",
    fields {
        id: Integer,
        created: DateTime,
        name: Text,
        track: Text,
        pre_race_waiting_time_seconds: Integer,
        session_over_time_seconds: Integer,
        ambient_temp: Integer,
        cloud_level: Float,
        rain: Float,
        weather_randomness: Integer,
        post_qualy_seconds: Integer,
        post_race_seconds: Integer,
        meta_data: Text,
        simracer_weather_conditions: Boolean,
        is_fixed_condition_qualification: Boolean,
    }
);

impl Event {
    pub fn launch_document(&self) -> ManagerResult<Value> {
        launch_document(self)
    }

    /// Replace all sessions.
    ///
    /// Entries whose id names a current session keep that id and its
    /// creation time; all others get a fresh id.
    pub fn replace_sessions(&mut self, updates: Vec<SessionUpdate>, now: DateTime<Utc>) {
        let existing: HashMap<i64, DateTime<Utc>> =
            self.sessions.iter().map(|s| (s.id, s.created)).collect();
        let mut next_id = existing.keys().copied().max().unwrap_or(0) + 1;
        let mut taken = HashSet::new();

        self.sessions = updates
            .into_iter()
            .map(|update| {
                let id = match update.id {
                    Some(id) if existing.contains_key(&id) && taken.insert(id) => id,
                    _ => {
                        next_id += 1;
                        next_id - 1
                    }
                };
                let created = existing.get(&id).copied().unwrap_or(now);
                update.session.into_session(id, created)
            })
            .collect();
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreate {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 0, max = 23))]
    pub hour_of_day: i64,
    #[validate(range(min = 1, max = 3))]
    pub day_of_weekend: i64,
    #[validate(range(min = 0, max = 24))]
    pub time_multiplier: i64,
    #[validate(custom(function = "validate_session_type"))]
    pub session_type: String,
    #[validate(range(min = 1))]
    pub session_duration_minutes: i64,
}

impl SessionCreate {
    fn into_session(self, id: i64, created: DateTime<Utc>) -> Session {
        Session {
            id,
            created,
            name: self.name,
            hour_of_day: self.hour_of_day,
            day_of_weekend: self.day_of_weekend,
            time_multiplier: self.time_multiplier,
            session_type: self.session_type,
            session_duration_minutes: self.session_duration_minutes,
        }
    }
}

/// A session in an update payload; `id` keeps an existing session
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SessionUpdate {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(flatten)]
    #[validate(nested)]
    pub session: SessionCreate,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventCreate {
    #[validate(length(min = 1))]
    pub name: String,
    pub track: String,
    #[validate(range(min = 30))]
    pub pre_race_waiting_time_seconds: i64,
    #[validate(range(min = 0))]
    pub session_over_time_seconds: i64,
    pub ambient_temp: i64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub cloud_level: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub rain: f64,
    #[validate(range(min = 0))]
    pub weather_randomness: i64,
    pub post_qualy_seconds: i64,
    pub post_race_seconds: i64,
    #[serde(default)]
    pub meta_data: String,
    pub simracer_weather_conditions: bool,
    pub is_fixed_condition_qualification: bool,
    #[serde(default)]
    #[validate(nested)]
    pub sessions: Vec<SessionCreate>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub track: Option<String>,
    #[validate(range(min = 30))]
    pub pre_race_waiting_time_seconds: Option<i64>,
    #[validate(range(min = 0))]
    pub session_over_time_seconds: Option<i64>,
    pub ambient_temp: Option<i64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub cloud_level: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub rain: Option<f64>,
    #[validate(range(min = 0))]
    pub weather_randomness: Option<i64>,
    pub post_qualy_seconds: Option<i64>,
    pub post_race_seconds: Option<i64>,
    pub meta_data: Option<String>,
    pub simracer_weather_conditions: Option<bool>,
    pub is_fixed_condition_qualification: Option<bool>,
    #[validate(nested)]
    pub sessions: Option<Vec<SessionUpdate>>,
}

impl Document for Event {}

impl Resource for Event {
    const SCOPE: &'static str = "event";

    type Create = EventCreate;
    type Update = EventUpdate;

    fn from_create(p: EventCreate, now: DateTime<Utc>) -> ManagerResult<Self> {
        let sessions = p
            .sessions
            .into_iter()
            .zip(1..)
            .map(|(session, id)| session.into_session(id, now))
            .collect();

        Ok(Event {
            id: 0,
            created: now,
            name: p.name,
            track: p.track,
            pre_race_waiting_time_seconds: p.pre_race_waiting_time_seconds,
            session_over_time_seconds: p.session_over_time_seconds,
            ambient_temp: p.ambient_temp,
            cloud_level: p.cloud_level,
            rain: p.rain,
            weather_randomness: p.weather_randomness,
            post_qualy_seconds: p.post_qualy_seconds,
            post_race_seconds: p.post_race_seconds,
            meta_data: p.meta_data,
            simracer_weather_conditions: p.simracer_weather_conditions,
            is_fixed_condition_qualification: p.is_fixed_condition_qualification,
            sessions,
        })
    }

    fn apply_update(&mut self, p: EventUpdate) -> ManagerResult<()> {
        if let Some(v) = p.name {
            self.name = v;
        }
        if let Some(v) = p.track {
            self.track = v;
        }
        if let Some(v) = p.pre_race_waiting_time_seconds {
            self.pre_race_waiting_time_seconds = v;
        }
        if let Some(v) = p.session_over_time_seconds {
            self.session_over_time_seconds = v;
        }
        if let Some(v) = p.ambient_temp {
            self.ambient_temp = v;
        }
        if let Some(v) = p.cloud_level {
            self.cloud_level = v;
        }
        if let Some(v) = p.rain {
            self.rain = v;
        }
        if let Some(v) = p.weather_randomness {
            self.weather_randomness = v;
        }
        if let Some(v) = p.post_qualy_seconds {
            self.post_qualy_seconds = v;
        }
        if let Some(v) = p.post_race_seconds {
            self.post_race_seconds = v;
        }
        if let Some(v) = p.meta_data {
            self.meta_data = v;
        }
        if let Some(v) = p.simracer_weather_conditions {
            self.simracer_weather_conditions = v;
        }
        if let Some(v) = p.is_fixed_condition_qualification {
            self.is_fixed_condition_qualification = v;
        }
        if let Some(sessions) = p.sessions {
            self.replace_sessions(sessions, Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(name: &str, session_type: &str) -> Value {
        json!({
            "name": name,
            "hourOfDay": 14,
            "dayOfWeekend": 3,
            "timeMultiplier": 1,
            "sessionType": session_type,
            "sessionDurationMinutes": 20
        })
    }

    fn event_body() -> Value {
        json!({
            "name": "Spa 24h warmup",
            "track": "spa",
            "preRaceWaitingTimeSeconds": 80,
            "sessionOverTimeSeconds": 120,
            "ambientTemp": 22,
            "cloudLevel": 0.1,
            "rain": 0.0,
            "weatherRandomness": 1,
            "postQualySeconds": 10,
            "postRaceSeconds": 15,
            "simracerWeatherConditions": false,
            "isFixedConditionQualification": false,
            "sessions": [session("Practice", "P"), session("Race", "R")]
        })
    }

    fn created_event() -> Event {
        let create: EventCreate = serde_json::from_value(event_body()).unwrap();
        assert!(create.validate().is_ok());
        Event::from_create(create, Utc::now()).unwrap()
    }

    #[test]
    fn test_create_numbers_sessions() {
        let event = created_event();
        let ids: Vec<i64> = event.sessions.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(event.sessions[1].session_type, "R");
    }

    #[test]
    fn test_range_rules() {
        let mut body = event_body();
        body["preRaceWaitingTimeSeconds"] = json!(10);
        let create: EventCreate = serde_json::from_value(body).unwrap();
        assert!(create.validate().is_err());

        let mut body = event_body();
        body["cloudLevel"] = json!(1.5);
        let create: EventCreate = serde_json::from_value(body).unwrap();
        assert!(create.validate().is_err());

        let mut body = event_body();
        body["sessions"] = json!([session("Bad", "X")]);
        let create: EventCreate = serde_json::from_value(body).unwrap();
        assert!(create.validate().is_err());
    }

    #[test]
    fn test_replace_sessions_keeps_known_ids() {
        let mut event = created_event();
        let race_created = event.sessions[1].created;

        let mut kept = session("Race", "R");
        kept["id"] = json!(2);
        let mut bogus = session("Qualy", "Q");
        bogus["id"] = json!(77);
        let update: EventUpdate = serde_json::from_value(json!({
            "sessions": [kept, bogus, session("Warmup", "P")]
        }))
        .unwrap();
        assert!(update.validate().is_ok());

        event.apply_update(update).unwrap();
        let ids: Vec<i64> = event.sessions.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(event.sessions[0].created, race_created);
        assert_eq!(event.name, "Spa 24h warmup");
    }

    #[test]
    fn test_sessions_not_queryable() {
        use crate::core::entity::Record;
        assert!(Event::fields().lookup("sessions").is_none());
        assert!(Event::fields().lookup("cloud_level").is_some());
    }
}
