//! JSON persistence of the constituent history and the dashboard snapshot

use crate::core::model::{DashboardSnapshot, HistoryState};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub trait SnapshotStore: Send + Sync {
    /// Previously persisted history; empty when none was ever written.
    fn load_history(&self) -> Result<HistoryState>;
    fn save_history(&self, history: &HistoryState) -> Result<()>;
    fn save_dashboard(&self, snapshot: &DashboardSnapshot) -> Result<()>;
}

pub struct JsonFileStore {
    history_path: PathBuf,
    dashboard_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(history_path: PathBuf, dashboard_path: PathBuf) -> Self {
        Self {
            history_path,
            dashboard_path,
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

impl SnapshotStore for JsonFileStore {
    fn load_history(&self) -> Result<HistoryState> {
        if !self.history_path.exists() {
            debug!(path = %self.history_path.display(), "No history yet");
            return Ok(HistoryState::new());
        }
        let content = fs::read_to_string(&self.history_path).with_context(|| {
            format!("Failed to read history file: {}", self.history_path.display())
        })?;
        serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse history file: {}", self.history_path.display())
        })
    }

    fn save_history(&self, history: &HistoryState) -> Result<()> {
        write_json(&self.history_path, history)?;
        info!(path = %self.history_path.display(), "Saved history");
        Ok(())
    }

    fn save_dashboard(&self, snapshot: &DashboardSnapshot) -> Result<()> {
        write_json(&self.dashboard_path, snapshot)?;
        info!(path = %self.dashboard_path.display(), "Saved dashboard data");
        Ok(())
    }
}
