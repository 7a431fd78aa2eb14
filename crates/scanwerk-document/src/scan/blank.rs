// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blank-page detection.
//
// A page is blank when the share of non-white pixels inside the page (a border
// strip of 1% of the width is ignored on every side) falls below a coverage
// threshold. Whiteness is judged on 8-bit luma with the fixed weights
// 0.299 R + 0.587 G + 0.114 B, computed in integer arithmetic.

use image::DynamicImage;
use scanwerk_core::{
    BlankPageSettings, DEFAULT_BLANK_COVERAGE_THRESHOLD, DEFAULT_BLANK_WHITE_THRESHOLD,
};
use tracing::{debug, instrument};

/// Fraction of the image width ignored along every edge.
const BORDER_FRACTION: f64 = 0.01;

/// Decides whether a scanned page carries any content.
///
/// Pure: the decision depends only on pixel content and the two thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlankPageDetector {
    /// Brightness (0-100) below which a pixel counts as non-white.
    white_threshold: u8,
    /// Non-white coverage (0-100) below which the page counts as blank.
    coverage_threshold: u8,
}

impl Default for BlankPageDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BLANK_WHITE_THRESHOLD, DEFAULT_BLANK_COVERAGE_THRESHOLD)
    }
}

impl BlankPageDetector {
    /// Thresholds above 100 are clamped to 100.
    pub fn new(white_threshold: u8, coverage_threshold: u8) -> Self {
        Self {
            white_threshold: white_threshold.min(100),
            coverage_threshold: coverage_threshold.min(100),
        }
    }

    pub fn from_settings(settings: &BlankPageSettings) -> Self {
        Self::new(settings.white_threshold, settings.coverage_threshold)
    }

    /// Luma (0-255) under which a pixel is non-white.
    fn luma_cutoff(&self) -> u32 {
        1 + (self.white_threshold as f64 / 100.0 * 254.0).round() as u32
    }

    /// Non-white fraction under which a page is blank.
    fn coverage_cutoff(&self) -> f64 {
        self.coverage_threshold as f64 / 100.0 * 0.01
    }

    /// Fraction (0.0-1.0) of non-white pixels inside the border strip.
    pub fn non_white_fraction(&self, image: &DynamicImage) -> f64 {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let margin = (width as f64 * BORDER_FRACTION).floor() as u32;
        let (x0, y0, x1, y1) = if width > 2 * margin && height > 2 * margin {
            (margin, margin, width - margin, height - margin)
        } else {
            (0, 0, width, height)
        };

        let total = (x1 - x0) as u64 * (y1 - y0) as u64;
        if total == 0 {
            return 0.0;
        }

        let cutoff = self.luma_cutoff() * 1000;
        let mut non_white: u64 = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                let weighted = r as u32 * 299 + g as u32 * 587 + b as u32 * 114;
                if weighted < cutoff {
                    non_white += 1;
                }
            }
        }

        non_white as f64 / total as f64
    }

    /// Whether the page should be excluded as blank.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn is_blank(&self, image: &DynamicImage) -> bool {
        let coverage = self.non_white_fraction(image);
        let blank = coverage < self.coverage_cutoff();
        debug!(
            coverage,
            cutoff = self.coverage_cutoff(),
            blank,
            "Blank-page check"
        );
        blank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn white_page() -> RgbImage {
        RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]))
    }

    #[test]
    fn all_white_page_is_blank() {
        let detector = BlankPageDetector::new(70, 15);
        let img = DynamicImage::ImageRgb8(white_page());
        assert!(detector.is_blank(&img));
    }

    #[test]
    fn twenty_percent_black_is_kept() {
        let detector = BlankPageDetector::new(70, 15);
        let mut page = white_page();
        for y in 0..20 {
            for x in 0..100 {
                page.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let img = DynamicImage::ImageRgb8(page);
        assert!(!detector.is_blank(&img));
        // One border row is ignored: 19 of 98 rows inside the strip are black.
        let fraction = detector.non_white_fraction(&img);
        assert!((fraction - 19.0 / 98.0).abs() < 1e-9, "got {fraction}");
    }

    #[test]
    fn border_artifacts_are_ignored() {
        let detector = BlankPageDetector::default();
        let mut page = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        // Dark scanner-lid shadow along the left and top edges (2 px = 1% of 200).
        for i in 0..200 {
            for d in 0..2 {
                page.put_pixel(d, i, Rgb([10, 10, 10]));
                page.put_pixel(i, d, Rgb([10, 10, 10]));
            }
        }
        assert!(detector.is_blank(&DynamicImage::ImageRgb8(page)));
    }

    #[test]
    fn decision_is_repeatable() {
        let detector = BlankPageDetector::new(70, 15);
        let mut page = white_page();
        page.put_pixel(50, 50, Rgb([0, 0, 0]));
        page.put_pixel(51, 50, Rgb([0, 0, 0]));
        let img = DynamicImage::ImageRgb8(page);
        let first = detector.is_blank(&img);
        let second = detector.is_blank(&img);
        assert_eq!(first, second);
    }

    #[test]
    fn white_threshold_moves_the_cutoff() {
        // Light grey (luma 200) is white at 70 (cutoff 179) but not at 90 (cutoff 230).
        let grey = DynamicImage::ImageLuma8(GrayImage::from_pixel(50, 50, Luma([200])));
        assert!(BlankPageDetector::new(70, 15).is_blank(&grey));
        assert!(!BlankPageDetector::new(90, 15).is_blank(&grey));
    }

    #[test]
    fn tiny_image_uses_whole_area() {
        let detector = BlankPageDetector::default();
        let black = DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([0])));
        assert_eq!(detector.non_white_fraction(&black), 1.0);
        assert!(!detector.is_blank(&black));
    }

    #[test]
    fn zero_coverage_threshold_never_drops() {
        let detector = BlankPageDetector::new(70, 0);
        assert!(!detector.is_blank(&DynamicImage::ImageRgb8(white_page())));
    }
}
