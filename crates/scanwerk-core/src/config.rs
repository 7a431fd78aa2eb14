// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::ScanParameters;

/// Default file name for the persisted service configuration.
pub const CONFIG_FILE: &str = "scanwerk.json";

/// A capture device backed by a directory of image files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderDeviceConfig {
    /// Identifier used on the command line and in logs.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Directory whose image files are served as sheets.
    pub directory: PathBuf,
    /// Device has a sheet feeder.
    #[serde(default = "default_true")]
    pub feeder: bool,
    /// Device can capture both sides of a sheet.
    #[serde(default)]
    pub duplex: bool,
}

fn default_true() -> bool {
    true
}

/// Persistent service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Where captured pages are written before output routing.
    pub working_dir: PathBuf,
    /// Size of the bounded post-processing pool.
    pub post_process_workers: usize,
    /// Parameters used when a batch settings document omits them.
    pub default_params: ScanParameters,
    /// Folder-backed devices.
    pub devices: Vec<FolderDeviceConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("./scans"),
            post_process_workers: 2,
            default_params: ScanParameters::default(),
            devices: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Load the configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        info!(
            path = %path.display(),
            devices = config.devices.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Persist the configuration to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Pool size, never less than one worker.
    pub fn worker_count(&self) -> usize {
        self.post_process_workers.max(1)
    }

    pub fn device(&self, id: &str) -> Option<&FolderDeviceConfig> {
        self.devices.iter().find(|d| d.id == id)
    }
}
