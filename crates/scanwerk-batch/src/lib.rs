// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-batch — Batch capture orchestration.
//
// The `BatchScanner` decides how many capture invocations to run and routes
// the captured pages to output. Each invocation runs through the
// `CapturePipeline`, which keeps the device feeding while earlier pages are
// written and post-processed on a bounded worker pool.

pub mod cancel;
pub mod orchestrator;
pub mod pipeline;
pub mod placeholders;
pub mod progress;
pub mod registry;
pub mod validation;

pub use cancel::CancelSignal;
pub use orchestrator::BatchScanner;
pub use pipeline::{CapturePipeline, InvocationContext};
pub use progress::{ProgressPhase, ProgressSnapshot};
pub use registry::{DeviceRegistry, DeviceState};
pub use validation::{ValidationReport, validate_parameters};
