//! Shared fixtures for integration tests
#![allow(dead_code)]

use acc_server_manager::config::{AppConfig, StorageConfig};
use acc_server_manager::lifecycle::{LaunchSpec, ProcessHost};
use acc_server_manager::server::AppState;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

// =============================================================================
// Stub process host
// =============================================================================

#[derive(Default)]
struct StubState {
    next_pid: AtomicU32,
    fail_spawn: AtomicBool,
    fail_kill: AtomicBool,
    alive: Mutex<HashSet<u32>>,
    spawned: Mutex<Vec<LaunchSpec>>,
    killed: Mutex<Vec<u32>>,
}

/// Process host that records calls and returns scripted outcomes
#[derive(Clone, Default)]
pub struct StubHost {
    state: Arc<StubState>,
}

impl StubHost {
    /// Host whose next spawn returns `pid`
    pub fn with_pid(pid: u32) -> Self {
        let host = Self::default();
        host.state.next_pid.store(pid, Ordering::SeqCst);
        host
    }

    pub fn fail_spawn(&self, fail: bool) {
        self.state.fail_spawn.store(fail, Ordering::SeqCst);
    }

    pub fn fail_kill(&self, fail: bool) {
        self.state.fail_kill.store(fail, Ordering::SeqCst);
    }

    /// Simulate the process exiting on its own
    pub fn exit(&self, pid: u32) {
        self.state.alive.lock().unwrap().remove(&pid);
    }

    pub fn spawned(&self) -> Vec<LaunchSpec> {
        self.state.spawned.lock().unwrap().clone()
    }

    pub fn killed(&self) -> Vec<u32> {
        self.state.killed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessHost for StubHost {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<u32> {
        if self.state.fail_spawn.load(Ordering::SeqCst) {
            return Err(anyhow!("executable not found"));
        }
        let pid = self.state.next_pid.fetch_add(1, Ordering::SeqCst);
        self.state.spawned.lock().unwrap().push(spec.clone());
        self.state.alive.lock().unwrap().insert(pid);
        Ok(pid)
    }

    async fn kill(&self, pid: u32) -> Result<()> {
        if self.state.fail_kill.load(Ordering::SeqCst) {
            return Err(anyhow!("operation not permitted"));
        }
        self.state.killed.lock().unwrap().push(pid);
        self.state.alive.lock().unwrap().remove(&pid);
        Ok(())
    }

    async fn is_alive(&self, pid: u32) -> Result<bool> {
        Ok(self.state.alive.lock().unwrap().contains(&pid))
    }
}

// =============================================================================
// Config and state
// =============================================================================

pub const SECRET: &str = "integration-secret";

pub fn test_config(work_dir: &Path) -> AppConfig {
    let mut config = AppConfig::from_yaml_str(&format!(
        "auth:\n  jwt_secret: {}\nbootstrap_admin:\n  mail: admin@example.com\n  password: admin\n",
        SECRET
    ))
    .unwrap();
    config.process.executable = "accServer".into();
    config.process.work_dir = work_dir.to_path_buf();
    config.storage = StorageConfig::Sqlite {
        path: work_dir.join("manager.db"),
    };
    config
}

pub fn test_state(work_dir: &Path, host: &StubHost) -> AppState {
    AppState::in_memory(&test_config(work_dir), Arc::new(host.clone()))
}

/// State over the SQLite database in `work_dir`
pub async fn open_state(work_dir: &Path, host: &StubHost) -> AppState {
    AppState::open(&test_config(work_dir), Arc::new(host.clone()))
        .await
        .unwrap()
}

// =============================================================================
// Payloads
// =============================================================================

pub fn configuration_payload(name: &str) -> Value {
    json!({
        "name": name,
        "tcpPort": 9231,
        "udpPort": 9232,
        "registerToLobby": true,
        "maxConnections": 85,
        "lanDiscovery": false,
        "configVersion": "1"
    })
}

pub fn settings_payload(name: &str) -> Value {
    json!({
        "serverName": name,
        "carGroup": "GT3",
        "trackMedalsRequirement": 0,
        "safetyRatingRequirement": -1,
        "racecraftRatingRequirement": -1,
        "maxCarSlots": 24,
        "dumpLeaderboards": false,
        "dumpEntryList": false,
        "isRaceLocked": true,
        "shortFormationLap": false,
        "formationLapType": 3,
        "doDriverSwapBroadcast": false,
        "randomizeTrackWhenEmpty": false,
        "allowAutoDQ": false,
        "ignorePrematureDisconnects": true,
        "configVersion": "1"
    })
}

pub fn event_payload(track: &str) -> Value {
    json!({
        "name": format!("{} weekend", track),
        "track": track,
        "preRaceWaitingTimeSeconds": 60,
        "sessionOverTimeSeconds": 120,
        "ambientTemp": 24,
        "cloudLevel": 0.2,
        "rain": 0.0,
        "weatherRandomness": 2,
        "postQualySeconds": 10,
        "postRaceSeconds": 15,
        "simracerWeatherConditions": false,
        "isFixedConditionQualification": false,
        "sessions": [
            { "name": "Quali", "hourOfDay": 12, "dayOfWeekend": 2, "timeMultiplier": 1,
              "sessionType": "Q", "sessionDurationMinutes": 15 },
            { "name": "Race", "hourOfDay": 15, "dayOfWeekend": 3, "timeMultiplier": 1,
              "sessionType": "R", "sessionDurationMinutes": 30 }
        ]
    })
}

/// Create one configuration, settings and event and return their ids
pub async fn seed_blobs(state: &AppState) -> (i64, i64, i64) {
    let configuration = state
        .configurations
        .create(serde_json::from_value(configuration_payload("net")).unwrap())
        .await
        .unwrap();
    let settings = state
        .settings
        .create(serde_json::from_value(settings_payload("League")).unwrap())
        .await
        .unwrap();
    let event = state
        .events
        .create(serde_json::from_value(event_payload("monza")).unwrap())
        .await
        .unwrap();
    (configuration.id, settings.id, event.id)
}
