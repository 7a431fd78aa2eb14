// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanned-page processing — blank-page detection and the post-processing chain.

pub mod blank;
pub mod postprocess;

pub use blank::BlankPageDetector;
pub use postprocess::{PostProcessor, Processed};
