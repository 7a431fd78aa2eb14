// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page post-processing chain.
//
// Steps run in a fixed order and only when their parameter is set:
//
//   1. blank-page exclusion (drops the page and deletes its file)
//   2. orientation (rotation, duplex back-side flip)
//   3. integer downscale
//   4. crop or stretch to the configured page size
//   5. quality re-encoding
//
// The page is decoded once and encoded once; intermediate steps work on the
// in-memory image.

use std::path::{Path, PathBuf};

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{CapturedPage, PageFormat, ScanParameters};
use tracing::{debug, info, instrument, warn};

use super::blank::BlankPageDetector;
use crate::image::processor::ImageProcessor;

/// Outcome of post-processing one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    /// The page survives, possibly rewritten (new path, size, format).
    Kept(CapturedPage),
    /// The page was blank; its file has been removed.
    Dropped,
}

/// Applies the configured post-processing steps to captured pages.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    params: ScanParameters,
}

impl PostProcessor {
    pub fn new(params: ScanParameters) -> Self {
        Self { params }
    }

    /// Run the chain on one page. Failures are reported as
    /// [`ScanwerkError::PostProcessing`] for that page.
    #[instrument(skip_all, fields(page = page.page_number, path = %page.path.display()))]
    pub fn process(&self, page: CapturedPage) -> Result<Processed> {
        if !self.params.needs_post_processing() {
            return Ok(Processed::Kept(page));
        }
        let page_number = page.page_number;
        self.apply(page).map_err(|err| ScanwerkError::PostProcessing {
            page: page_number,
            detail: err.to_string(),
        })
    }

    fn apply(&self, page: CapturedPage) -> Result<Processed> {
        let params = &self.params;
        let mut img = ImageProcessor::open(&page.path)?;
        let mut modified = false;

        // 1. Blank-page exclusion.
        if params.blank_pages.exclude {
            let detector = BlankPageDetector::from_settings(&params.blank_pages);
            if detector.is_blank(img.as_dynamic()) {
                info!(page = page.page_number, "Dropping blank page");
                remove_page_file(&page.path);
                return Ok(Processed::Dropped);
            }
        }

        // 2. Orientation.
        let mut degrees = params.rotate_degrees;
        if params.flip_duplexed_pages && params.use_duplex && page.page_number % 2 == 0 {
            degrees += 180.0;
        }
        if degrees.rem_euclid(360.0) != 0.0 {
            img = img.rotate(degrees);
            modified = true;
        }

        // 3. Scale.
        let ratio = params.scale_ratio.divisor();
        if ratio > 1 {
            img = img.scale_down(ratio);
            modified = true;
        }

        // 4. Crop or stretch to page size. Crop wins when both are set.
        if params.crop_to_page_size || params.stretch_to_page_size {
            let (target_w, target_h) = oriented_target(params, img.width(), img.height());
            let before = (img.width(), img.height());
            if params.crop_to_page_size {
                img = img.crop_center(target_w, target_h);
            } else {
                img = img.resize(target_w, target_h);
            }
            modified |= before != (img.width(), img.height());
        }

        // 5. Quality.
        let quality = &params.quality;
        let output_format = if quality.max_quality && page.format.is_lossy() {
            PageFormat::Png
        } else {
            page.format
        };
        let reencode = quality.max_quality || quality.jpeg_quality.is_some() || modified;
        if !reencode {
            return Ok(Processed::Kept(page));
        }

        let bytes = img.encode(output_format, quality.effective_jpeg_quality())?;
        let output_path = if output_format == page.format {
            page.path.clone()
        } else {
            lossless_path(&page.path)
        };
        std::fs::write(&output_path, &bytes)?;
        if output_path != page.path {
            remove_page_file(&page.path);
        }

        debug!(
            page = page.page_number,
            format = ?output_format,
            width = img.width(),
            height = img.height(),
            bytes = bytes.len(),
            "Page re-encoded"
        );

        Ok(Processed::Kept(CapturedPage {
            page_number: page.page_number,
            path: output_path,
            width: img.width(),
            height: img.height(),
            byte_size: bytes.len() as u64,
            format: output_format,
        }))
    }
}

/// Page-size target in pixels, swapped to match the page's orientation.
fn oriented_target(params: &ScanParameters, width: u32, height: u32) -> (u32, u32) {
    let (target_w, target_h) = params.page_pixels();
    let page_landscape = width > height;
    let target_landscape = target_w > target_h;
    if page_landscape != target_landscape {
        (target_h, target_w)
    } else {
        (target_w, target_h)
    }
}

fn remove_page_file(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "Failed to remove page file");
    }
}

/// Path of the file a page will occupy after lossless conversion.
pub fn lossless_path(path: &Path) -> PathBuf {
    path.with_extension(PageFormat::Png.extension())
}
