//! Per-instance launch files
//!
//! Layout under the configured work directory:
//!
//! ```text
//! <work_dir>/server_<id>/cfg/configuration.json
//! <work_dir>/server_<id>/cfg/settings.json
//! <work_dir>/server_<id>/cfg/event.json
//! ```
//!
//! Every instance has its own directory, so concurrent starts of different
//! server configs never touch the same file.

use crate::entities::{Configuration, Event, Settings};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Writes and locates launch files for server instances
#[derive(Debug, Clone)]
pub struct LaunchFiles {
    root: PathBuf,
}

impl LaunchFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Working directory of one instance
    pub fn instance_dir(&self, server_config_id: i64) -> PathBuf {
        self.root.join(format!("server_{}", server_config_id))
    }

    pub fn cfg_dir(&self, server_config_id: i64) -> PathBuf {
        self.instance_dir(server_config_id).join("cfg")
    }

    /// Write all three documents, replacing any previous version.
    ///
    /// Returns the instance directory.
    pub async fn write(
        &self,
        server_config_id: i64,
        configuration: &Configuration,
        settings: &Settings,
        event: &Event,
    ) -> Result<PathBuf> {
        let cfg_dir = self.cfg_dir(server_config_id);
        tokio::fs::create_dir_all(&cfg_dir)
            .await
            .with_context(|| format!("Failed to create {}", cfg_dir.display()))?;

        write_json(&cfg_dir.join("configuration.json"), &configuration.launch_document()).await?;
        write_json(&cfg_dir.join("settings.json"), &settings.launch_document()?).await?;
        write_json(&cfg_dir.join("event.json"), &event.launch_document()?).await?;

        tracing::debug!(server_config_id, dir = %cfg_dir.display(), "wrote launch files");
        Ok(self.instance_dir(server_config_id))
    }
}

/// Write via a temp file and rename so readers never see a partial file
async fn write_json(path: &Path, doc: &Value) -> Result<()> {
    let body = serde_json::to_vec_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");

    tokio::fs::write(&tmp, body)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }
    Ok(())
}
