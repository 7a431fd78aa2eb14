// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document — Page processing for the Scanwerk batch capture engine.
//
// Provides the per-page post-processing chain (blank-page exclusion,
// orientation, scale, crop/stretch, quality re-encoding), the image
// primitives it is built on, and page export to image files or a multi-page
// PDF.

pub mod export;
pub mod image;
pub mod pdf;
pub mod scan;

// Re-export the primary structs so callers can use `scanwerk_document::PageExporter` etc.
pub use export::PageExporter;
pub use crate::image::processor::ImageProcessor;
pub use pdf::reader::PdfReader;
pub use pdf::writer::PdfWriter;
pub use scan::blank::BlankPageDetector;
pub use scan::postprocess::{PostProcessor, Processed};
