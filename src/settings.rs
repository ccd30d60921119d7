use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::session::ActivityProfile;

pub const SETTINGS_PATH_ENV: &str = "PULSEPACER_SETTINGS";
pub const DEBUG_ENV: &str = "PULSEPACER_DEBUG";
const DEFAULT_SETTINGS_FILE: &str = "pulsepacer.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub tick_interval_ms: u64,
    pub pulse_duration_ms: u64,
    pub activity: ActivityProfile,
    /// Start a monitoring session as soon as permission is confirmed.
    pub auto_start_session: bool,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            pulse_duration_ms: 500,
            activity: ActivityProfile::default(),
            auto_start_session: true,
            debug: false,
        }
    }
}

impl Settings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: Settings,
}

impl SettingsStore {
    /// Reads `path` if it exists. A file that fails to parse is logged and
    /// replaced by defaults; only I/O errors are returned.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("ignoring malformed settings in {}: {err}", path.display());
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self { path, data })
    }

    /// Settings path from the environment, else the working directory.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(SETTINGS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
        let mut store = Self::new(path)?;

        let debug_mode = std::env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            store.data.debug = true;
        }
        Ok(store)
    }

    pub fn settings(&self) -> &Settings {
        &self.data
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
