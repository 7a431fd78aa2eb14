// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scriptable simulated scanner.
//
// Each device replays a script of capture outcomes, one step per `capture`
// call. An exhausted script reports `SourceExhausted`, like an empty feeder.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{
    CaptureOutcome, DeviceCapabilities, DeviceInfo, PageFormat, RawCapture, ScanArea,
    ScanParameters,
};
use tracing::{debug, warn};

use crate::traits::CapturePort;

/// One scripted response to a `capture` call.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Page(RawCapture),
    Exhausted,
    /// Generic capture failure.
    Fail(String),
    /// Explicit hardware fault.
    Fault(String),
}

impl ScriptStep {
    /// A white PNG page with a dark block covering its middle quarter.
    pub fn content_page(width: u32, height: u32) -> Result<Self> {
        let mut img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        for y in height / 4..height * 3 / 4 {
            for x in width / 4..width * 3 / 4 {
                img.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        encode_png(img).map(Self::Page)
    }

    /// An all-white PNG page.
    pub fn blank_page(width: u32, height: u32) -> Result<Self> {
        encode_png(RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))).map(Self::Page)
    }
}

fn encode_png(img: RgbImage) -> Result<RawCapture> {
    let (width, height) = img.dimensions();
    let mut data = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        .map_err(|err| ScanwerkError::ImageError(format!("synthetic page encoding failed: {err}")))?;
    Ok(RawCapture {
        data,
        format: PageFormat::Png,
        width,
        height,
    })
}

struct SimulatedDevice {
    info: DeviceInfo,
    script: VecDeque<ScriptStep>,
    delay: Duration,
    busy: bool,
    captures: u32,
    cancels: u32,
}

/// In-memory capture port driven by per-device scripts.
#[derive(Default)]
pub struct SimulatedScanner {
    devices: Mutex<HashMap<String, SimulatedDevice>>,
}

impl SimulatedScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience `DeviceInfo` for a simulated device.
    pub fn device_info(id: &str, feeder: bool) -> DeviceInfo {
        DeviceInfo {
            id: id.to_string(),
            name: format!("Simulated scanner {id}"),
            manufacturer: Some("Scanwerk".into()),
            model: Some("Simulator".into()),
            capabilities: DeviceCapabilities {
                max_width_mm: 216,
                max_height_mm: 356,
                feeder,
                duplex: feeder,
                ..Default::default()
            },
        }
    }

    /// Register a device with its script.
    pub fn with_device(self, info: DeviceInfo, script: impl IntoIterator<Item = ScriptStep>) -> Self {
        self.lock().insert(
            info.id.clone(),
            SimulatedDevice {
                info,
                script: script.into_iter().collect(),
                delay: Duration::ZERO,
                busy: false,
                captures: 0,
                cancels: 0,
            },
        );
        self
    }

    /// Append steps to a device's script.
    pub fn push_steps(&self, device_id: &str, steps: impl IntoIterator<Item = ScriptStep>) {
        if let Some(device) = self.lock().get_mut(device_id) {
            device.script.extend(steps);
        }
    }

    /// Make every capture on `device_id` take `delay` of wall-clock time.
    pub fn set_capture_delay(&self, device_id: &str, delay: Duration) {
        if let Some(device) = self.lock().get_mut(device_id) {
            device.delay = delay;
        }
    }

    /// Number of `capture` calls the device has received.
    pub fn capture_calls(&self, device_id: &str) -> u32 {
        self.lock().get(device_id).map_or(0, |d| d.captures)
    }

    /// Number of `cancel` calls the device has received.
    pub fn cancel_calls(&self, device_id: &str) -> u32 {
        self.lock().get(device_id).map_or(0, |d| d.cancels)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SimulatedDevice>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CapturePort for SimulatedScanner {
    fn name(&self) -> &str {
        "simulated scanner"
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let mut devices: Vec<DeviceInfo> = self.lock().values().map(|d| d.info.clone()).collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }

    fn capture(
        &self,
        device_id: &str,
        _params: &ScanParameters,
        area: &ScanArea,
    ) -> Result<CaptureOutcome> {
        let delay = {
            let mut devices = self.lock();
            let device = devices
                .get_mut(device_id)
                .ok_or_else(|| ScanwerkError::DeviceNotFound(device_id.to_string()))?;
            if device.busy {
                return Err(ScanwerkError::DeviceBusy(device_id.to_string()));
            }
            device.busy = true;
            device.captures += 1;
            device.delay
        };

        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut devices = self.lock();
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| ScanwerkError::DeviceNotFound(device_id.to_string()))?;
        device.busy = false;
        let step = device.script.pop_front().unwrap_or(ScriptStep::Exhausted);
        debug!(
            device = device_id,
            call = device.captures,
            width_px = area.width_px,
            x_offset_px = area.x_offset_px,
            "Simulated capture"
        );

        match step {
            ScriptStep::Page(raw) => Ok(CaptureOutcome::Page(raw)),
            ScriptStep::Exhausted => Ok(CaptureOutcome::SourceExhausted),
            ScriptStep::Fail(detail) => Err(ScanwerkError::Capture(detail)),
            ScriptStep::Fault(detail) => Err(ScanwerkError::DeviceFault(detail)),
        }
    }

    fn cancel(&self, device_id: &str) -> Result<()> {
        let mut devices = self.lock();
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| ScanwerkError::DeviceNotFound(device_id.to_string()))?;
        device.cancels += 1;
        warn!(device = device_id, "Capture cancelled on simulated scanner");
        Ok(())
    }
}
