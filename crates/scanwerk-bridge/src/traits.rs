// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture port trait.

use scanwerk_core::error::Result;
use scanwerk_core::{CaptureOutcome, DeviceInfo, ScanArea, ScanParameters};

/// One physical capture device family.
///
/// Calls block until the hardware responds; the batch engine runs them on a
/// blocking thread. Implementations must reject a capture on a device that is
/// already mid-operation with `ScanwerkError::DeviceBusy`.
pub trait CapturePort: Send + Sync {
    /// Human-readable backend name (e.g. "folder feeder").
    fn name(&self) -> &str;

    /// Devices currently reachable through this port.
    fn list_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Capture one page.
    ///
    /// Returns `CaptureOutcome::SourceExhausted` when the feeder is empty,
    /// which is not an error. A hardware fault (paper jam, cover open,
    /// offline) is reported as `ScanwerkError::DeviceFault`.
    fn capture(
        &self,
        device_id: &str,
        params: &ScanParameters,
        area: &ScanArea,
    ) -> Result<CaptureOutcome>;

    /// Ask the device to abandon the operation in progress.
    fn cancel(&self, device_id: &str) -> Result<()>;
}
