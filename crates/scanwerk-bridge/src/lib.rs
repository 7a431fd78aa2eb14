// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — Capture device abstractions.
//
// The batch engine talks to hardware only through the `CapturePort` trait.
// Two implementations ship with the workspace: a folder-backed sheet feeder
// for headless use, and a scriptable simulated scanner for tests and demos.

use std::sync::Arc;

use scanwerk_core::ServiceConfig;

pub mod folder;
pub mod simulated;
pub mod traits;

pub use folder::FolderFeeder;
pub use simulated::{ScriptStep, SimulatedScanner};
pub use traits::CapturePort;

/// Build the capture port for the devices listed in the service configuration.
pub fn capture_port(config: &ServiceConfig) -> Arc<dyn CapturePort> {
    Arc::new(FolderFeeder::new(config.devices.clone()))
}
