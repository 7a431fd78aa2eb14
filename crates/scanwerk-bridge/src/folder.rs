// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folder-backed sheet feeder.
//
// Each configured device watches a directory. Every capture call serves the
// next image file (by name) that this process has not served yet, so files
// dropped into the folder between scans are picked up by the next call. The
// source files are never modified.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use scanwerk_core::config::FolderDeviceConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{
    CaptureOutcome, DeviceCapabilities, DeviceInfo, PageFormat, RawCapture, ScanArea,
    ScanParameters,
};
use tracing::{debug, info, instrument};

use crate::traits::CapturePort;

#[derive(Default)]
struct FolderState {
    served: HashSet<PathBuf>,
    busy: bool,
}

/// Capture port serving image files from per-device directories.
pub struct FolderFeeder {
    devices: Vec<FolderDeviceConfig>,
    state: Mutex<HashMap<String, FolderState>>,
}

impl FolderFeeder {
    pub fn new(devices: Vec<FolderDeviceConfig>) -> Self {
        info!(devices = devices.len(), "Folder feeder ready");
        Self {
            devices,
            state: Mutex::new(HashMap::new()),
        }
    }

    fn device(&self, device_id: &str) -> Result<&FolderDeviceConfig> {
        self.devices
            .iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| ScanwerkError::DeviceNotFound(device_id.to_string()))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, FolderState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next unserved image file in the device directory.
    fn next_sheet(directory: &Path, served: &HashSet<PathBuf>) -> Result<Option<(PathBuf, PageFormat)>> {
        if !directory.is_dir() {
            return Err(ScanwerkError::DeviceFault(format!(
                "input folder {} is offline",
                directory.display()
            )));
        }
        let mut sheets: Vec<(PathBuf, PageFormat)> = std::fs::read_dir(directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && !served.contains(path))
            .filter_map(|path| {
                let format = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(PageFormat::from_extension)?;
                Some((path, format))
            })
            .collect();
        sheets.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(sheets.into_iter().next())
    }

    fn read_sheet(path: &Path, format: PageFormat) -> Result<RawCapture> {
        let (width, height) = image::image_dimensions(path).map_err(|err| {
            ScanwerkError::Capture(format!("unreadable sheet {}: {err}", path.display()))
        })?;
        let data = std::fs::read(path)?;
        Ok(RawCapture {
            data,
            format,
            width,
            height,
        })
    }
}

impl CapturePort for FolderFeeder {
    fn name(&self) -> &str {
        "folder feeder"
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self
            .devices
            .iter()
            .map(|d| DeviceInfo {
                id: d.id.clone(),
                name: d.name.clone(),
                manufacturer: None,
                model: Some(format!("folder {}", d.directory.display())),
                capabilities: DeviceCapabilities {
                    feeder: d.feeder,
                    duplex: d.duplex,
                    formats: vec![
                        PageFormat::Jpeg,
                        PageFormat::Png,
                        PageFormat::Tiff,
                        PageFormat::Bmp,
                    ],
                    ..Default::default()
                },
            })
            .collect())
    }

    #[instrument(skip(self, _params, _area))]
    fn capture(
        &self,
        device_id: &str,
        _params: &ScanParameters,
        _area: &ScanArea,
    ) -> Result<CaptureOutcome> {
        let device = self.device(device_id)?;

        let served = {
            let mut state = self.lock();
            let entry = state.entry(device_id.to_string()).or_default();
            if entry.busy {
                return Err(ScanwerkError::DeviceBusy(device_id.to_string()));
            }
            entry.busy = true;
            entry.served.clone()
        };

        let result = Self::next_sheet(&device.directory, &served).and_then(|next| {
            next.map(|(path, format)| Self::read_sheet(&path, format).map(|raw| (path, raw)))
                .transpose()
        });

        let mut state = self.lock();
        let entry = state.entry(device_id.to_string()).or_default();
        entry.busy = false;

        match result? {
            Some((path, raw)) => {
                debug!(sheet = %path.display(), bytes = raw.data.len(), "Sheet fed");
                entry.served.insert(path);
                Ok(CaptureOutcome::Page(raw))
            }
            None => {
                debug!("Input folder empty");
                Ok(CaptureOutcome::SourceExhausted)
            }
        }
    }

    fn cancel(&self, device_id: &str) -> Result<()> {
        self.device(device_id)?;
        // Each capture is a single file read; nothing is left running.
        debug!(device = device_id, "Cancel requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn feeder(dir: &Path) -> FolderFeeder {
        FolderFeeder::new(vec![FolderDeviceConfig {
            id: "inbox".into(),
            name: "Inbox".into(),
            directory: dir.to_path_buf(),
            feeder: true,
            duplex: false,
        }])
    }

    fn sheet(dir: &Path, name: &str) {
        RgbImage::from_pixel(12, 16, Rgb([255, 255, 255]))
            .save(dir.join(name))
            .expect("save sheet");
    }

    fn capture(feeder: &FolderFeeder) -> Result<CaptureOutcome> {
        let params = ScanParameters::default();
        feeder.capture("inbox", &params, &params.scan_area(None))
    }

    #[test]
    fn serves_sheets_in_name_order_then_exhausts() {
        let dir = tempfile::tempdir().expect("tempdir");
        sheet(dir.path(), "b.png");
        sheet(dir.path(), "a.png");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");
        let feeder = feeder(dir.path());

        let first = capture(&feeder).expect("first");
        let CaptureOutcome::Page(raw) = first else {
            panic!("expected a page");
        };
        assert_eq!((raw.width, raw.height), (12, 16));
        assert_eq!(raw.format, PageFormat::Png);
        assert_eq!(raw.data, std::fs::read(dir.path().join("a.png")).expect("read"));

        assert!(matches!(capture(&feeder), Ok(CaptureOutcome::Page(_))));
        assert!(matches!(capture(&feeder), Ok(CaptureOutcome::SourceExhausted)));
    }

    #[test]
    fn new_files_are_picked_up_later() {
        let dir = tempfile::tempdir().expect("tempdir");
        let feeder = feeder(dir.path());
        assert!(matches!(capture(&feeder), Ok(CaptureOutcome::SourceExhausted)));
        sheet(dir.path(), "late.png");
        assert!(matches!(capture(&feeder), Ok(CaptureOutcome::Page(_))));
    }

    #[test]
    fn missing_folder_is_a_fault() {
        let dir = tempfile::tempdir().expect("tempdir");
        let feeder = feeder(&dir.path().join("unplugged"));
        assert!(matches!(capture(&feeder), Err(ScanwerkError::DeviceFault(_))));
        // The failed call must not leave the device busy.
        assert!(matches!(capture(&feeder), Err(ScanwerkError::DeviceFault(_))));
    }

    #[test]
    fn unknown_device_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let feeder = feeder(dir.path());
        let params = ScanParameters::default();
        let result = feeder.capture("other", &params, &params.scan_area(None));
        assert!(matches!(result, Err(ScanwerkError::DeviceNotFound(_))));
    }
}
