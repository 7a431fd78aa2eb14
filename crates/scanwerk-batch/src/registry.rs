// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-device invocation state.
//
// A device is owned by at most one capture invocation at a time. Ownership is
// a `DeviceLease`; dropping the lease returns the device to idle, whichever
// way the invocation ended.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use scanwerk_core::DeviceStatus;
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::debug;

/// Observable state of one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub status: DeviceStatus,
    /// Start of the current (or last) invocation.
    pub started_at: Option<DateTime<Utc>>,
    /// Pages captured by the current (or last) invocation.
    pub pages_captured: u32,
    /// Error that ended the last invocation, if any.
    pub last_error: Option<String>,
}

/// Device states keyed by device id.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Mutex<HashMap<String, DeviceState>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DeviceState>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `device_id` for an invocation.
    ///
    /// Fails with `DeviceBusy` while another lease on the same device is alive.
    pub fn acquire(self: &Arc<Self>, device_id: &str) -> Result<DeviceLease> {
        let mut devices = self.lock();
        let state = devices.entry(device_id.to_string()).or_default();
        if state.status == DeviceStatus::Scanning {
            return Err(ScanwerkError::DeviceBusy(device_id.to_string()));
        }
        *state = DeviceState {
            status: DeviceStatus::Scanning,
            started_at: Some(Utc::now()),
            pages_captured: 0,
            last_error: None,
        };
        debug!(device = device_id, "Device leased");
        Ok(DeviceLease {
            registry: Arc::clone(self),
            device_id: device_id.to_string(),
        })
    }

    /// Snapshot of a device's state; `None` for devices never used.
    pub fn status(&self, device_id: &str) -> Option<DeviceState> {
        self.lock().get(device_id).cloned()
    }
}

/// Exclusive use of one device for the duration of an invocation.
#[derive(Debug)]
pub struct DeviceLease {
    registry: Arc<DeviceRegistry>,
    device_id: String,
}

impl DeviceLease {
    pub fn record_page(&self) {
        if let Some(state) = self.registry.lock().get_mut(&self.device_id) {
            state.pages_captured += 1;
        }
    }

    pub fn record_error(&self, error: &ScanwerkError) {
        if let Some(state) = self.registry.lock().get_mut(&self.device_id) {
            state.last_error = Some(error.to_string());
        }
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        if let Some(state) = self.registry.lock().get_mut(&self.device_id) {
            state.status = DeviceStatus::Idle;
        }
        debug!(device = %self.device_id, "Device released");
    }
}
