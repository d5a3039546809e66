//! Server rules blob (`cfg/settings.json`)

use crate::core::error::ManagerResult;
use crate::core::service::Resource;
use crate::core::store::Document;
use crate::entities::launch_document;
use crate::impl_record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

const CAR_GROUPS: &[&str] = &["FreeForAll", "GT3", "GT4", "GTC"];
const FORMATION_LAP_TYPES: &[i64] = &[0, 1, 3, 4, 5];

fn validate_car_group(value: &str) -> Result<(), ValidationError> {
    if CAR_GROUPS.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("car_group")
            .with_message("expected one of FreeForAll, GT3, GT4, GTC".into()))
    }
}

fn validate_formation_lap_type(value: i64) -> Result<(), ValidationError> {
    if FORMATION_LAP_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("formation_lap_type")
            .with_message("expected one of 0, 1, 3, 4, 5".into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub server_name: String,
    pub admin_password: String,
    pub car_group: String,
    pub track_medals_requirement: i64,
    pub safety_rating_requirement: i64,
    pub racecraft_rating_requirement: i64,
    pub password: String,
    pub spectator_password: String,
    pub max_car_slots: i64,
    pub dump_leaderboards: bool,
    pub dump_entry_list: bool,
    pub is_race_locked: bool,
    pub short_formation_lap: bool,
    pub formation_lap_type: i64,
    pub do_driver_swap_broadcast: bool,
    pub randomize_track_when_empty: bool,
    pub central_entry_list_path: String,
    #[serde(rename = "allowAutoDQ")]
    pub allow_auto_dq: bool,
    pub ignore_premature_disconnects: bool,
    pub config_version: String,
}

// Password fields are not queryable
impl_record!(Settings, "settings",
    fields {
        id: Integer,
        created: DateTime,
        server_name: Text,
        car_group: Text,
        track_medals_requirement: Integer,
        safety_rating_requirement: Integer,
        racecraft_rating_requirement: Integer,
        max_car_slots: Integer,
        dump_leaderboards: Boolean,
        dump_entry_list: Boolean,
        is_race_locked: Boolean,
        short_formation_lap: Boolean,
        formation_lap_type: Integer,
        do_driver_swap_broadcast: Boolean,
        randomize_track_when_empty: Boolean,
        central_entry_list_path: Text,
        allow_auto_dq: Boolean,
        ignore_premature_disconnects: Boolean,
        config_version: Text,
    }
);

impl Settings {
    pub fn launch_document(&self) -> ManagerResult<Value> {
        launch_document(self)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SettingsCreate {
    #[validate(length(min = 1))]
    pub server_name: String,
    #[serde(default)]
    pub admin_password: String,
    #[validate(custom(function = "validate_car_group"))]
    pub car_group: String,
    #[validate(range(min = 0, max = 3))]
    pub track_medals_requirement: i64,
    #[validate(range(min = -1, max = 99))]
    pub safety_rating_requirement: i64,
    #[validate(range(min = -1, max = 99))]
    pub racecraft_rating_requirement: i64,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub spectator_password: String,
    #[validate(range(min = 1))]
    pub max_car_slots: i64,
    pub dump_leaderboards: bool,
    pub dump_entry_list: bool,
    pub is_race_locked: bool,
    pub short_formation_lap: bool,
    #[validate(custom(function = "validate_formation_lap_type"))]
    pub formation_lap_type: i64,
    pub do_driver_swap_broadcast: bool,
    pub randomize_track_when_empty: bool,
    #[serde(default)]
    pub central_entry_list_path: String,
    #[serde(rename = "allowAutoDQ")]
    pub allow_auto_dq: bool,
    pub ignore_premature_disconnects: bool,
    pub config_version: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[validate(length(min = 1))]
    pub server_name: Option<String>,
    pub admin_password: Option<String>,
    #[validate(custom(function = "validate_car_group"))]
    pub car_group: Option<String>,
    #[validate(range(min = 0, max = 3))]
    pub track_medals_requirement: Option<i64>,
    #[validate(range(min = -1, max = 99))]
    pub safety_rating_requirement: Option<i64>,
    #[validate(range(min = -1, max = 99))]
    pub racecraft_rating_requirement: Option<i64>,
    pub password: Option<String>,
    pub spectator_password: Option<String>,
    #[validate(range(min = 1))]
    pub max_car_slots: Option<i64>,
    pub dump_leaderboards: Option<bool>,
    pub dump_entry_list: Option<bool>,
    pub is_race_locked: Option<bool>,
    pub short_formation_lap: Option<bool>,
    #[validate(custom(function = "validate_formation_lap_type"))]
    pub formation_lap_type: Option<i64>,
    pub do_driver_swap_broadcast: Option<bool>,
    pub randomize_track_when_empty: Option<bool>,
    pub central_entry_list_path: Option<String>,
    #[serde(rename = "allowAutoDQ")]
    pub allow_auto_dq: Option<bool>,
    pub ignore_premature_disconnects: Option<bool>,
    pub config_version: Option<String>,
}

impl Document for Settings {}

impl Resource for Settings {
    const SCOPE: &'static str = "settings";

    type Create = SettingsCreate;
    type Update = SettingsUpdate;

    fn from_create(p: SettingsCreate, now: DateTime<Utc>) -> ManagerResult<Self> {
        Ok(Settings {
            id: 0,
            created: now,
            server_name: p.server_name,
            admin_password: p.admin_password,
            car_group: p.car_group,
            track_medals_requirement: p.track_medals_requirement,
            safety_rating_requirement: p.safety_rating_requirement,
            racecraft_rating_requirement: p.racecraft_rating_requirement,
            password: p.password,
            spectator_password: p.spectator_password,
            max_car_slots: p.max_car_slots,
            dump_leaderboards: p.dump_leaderboards,
            dump_entry_list: p.dump_entry_list,
            is_race_locked: p.is_race_locked,
            short_formation_lap: p.short_formation_lap,
            formation_lap_type: p.formation_lap_type,
            do_driver_swap_broadcast: p.do_driver_swap_broadcast,
            randomize_track_when_empty: p.randomize_track_when_empty,
            central_entry_list_path: p.central_entry_list_path,
            allow_auto_dq: p.allow_auto_dq,
            ignore_premature_disconnects: p.ignore_premature_disconnects,
            config_version: p.config_version,
        })
    }

    fn apply_update(&mut self, p: SettingsUpdate) -> ManagerResult<()> {
        macro_rules! patch {
            ($target:ident, $src:ident; $($field:ident),* $(,)?) => {
                $( if let Some(v) = $src.$field { $target.$field = v; } )*
            };
        }
        let target = self;
        patch!(
            target, p;
            server_name,
            admin_password,
            car_group,
            track_medals_requirement,
            safety_rating_requirement,
            racecraft_rating_requirement,
            password,
            spectator_password,
            max_car_slots,
            dump_leaderboards,
            dump_entry_list,
            is_race_locked,
            short_formation_lap,
            formation_lap_type,
            do_driver_swap_broadcast,
            randomize_track_when_empty,
            central_entry_list_path,
            allow_auto_dq,
            ignore_premature_disconnects,
            config_version,
        );
        Ok(())
    }
}
