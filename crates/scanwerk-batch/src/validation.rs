// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan parameter validation.
//
// Parameters are checked once, before an invocation touches the device.
// Every problem is collected so the caller sees the full list at once.
// Checks against device capabilities only run for the properties the device
// actually reports.

use scanwerk_core::error::{FieldIssue, Result, ScanwerkError};
use scanwerk_core::{DeviceCapabilities, PaperSize, ScanParameters};
use tracing::{debug, info};

const ADJUSTMENT_RANGE: std::ops::RangeInclusive<i32> = -1000..=1000;

/// Outcome of validating one parameter set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Problems that prevent the capture.
    pub issues: Vec<FieldIssue>,
    /// Settings that will work, but probably not as intended.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// `Err(InvalidParameters)` carrying every issue, if there are any.
    pub fn into_result(self) -> Result<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ScanwerkError::InvalidParameters(self.issues))
        }
    }

    fn issue(&mut self, field: &'static str, problem: impl Into<String>) {
        self.issues.push(FieldIssue {
            field,
            problem: problem.into(),
        });
    }
}

/// Validate `params` on their own and, when known, against `caps`.
pub fn validate_parameters(
    params: &ScanParameters,
    caps: Option<&DeviceCapabilities>,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    // -- Intrinsic rules --------------------------------------------------------

    if params.resolution == 0 {
        report.issue("resolution", "must be greater than 0");
    }
    if let PaperSize::Custom {
        width_mm,
        height_mm,
    } = params.page_size
    {
        if width_mm == 0 || height_mm == 0 {
            report.issue("page_size", "custom width and height must be greater than 0");
        }
    }
    if !ADJUSTMENT_RANGE.contains(&params.brightness) {
        report.issue("brightness", "must be between -1000 and 1000");
    }
    if !ADJUSTMENT_RANGE.contains(&params.contrast) {
        report.issue("contrast", "must be between -1000 and 1000");
    }
    if let Some(quality) = params.quality.jpeg_quality {
        if !(1..=100).contains(&quality) {
            report.issue("jpeg_quality", "must be between 1 and 100");
        }
    }
    if params.blank_pages.white_threshold > 100 {
        report.issue("white_threshold", "must be between 0 and 100");
    }
    if params.blank_pages.coverage_threshold > 100 {
        report.issue("coverage_threshold", "must be between 0 and 100");
    }
    if !params.rotate_degrees.is_finite() {
        report.issue("rotate_degrees", "must be a finite number");
    }

    if params.crop_to_page_size && params.stretch_to_page_size {
        report
            .warnings
            .push("both crop and stretch requested; crop takes precedence".into());
    }
    if params.use_duplex && !params.use_feeder {
        report
            .warnings
            .push("duplex capture without the feeder captures one side only".into());
    }

    // -- Device capabilities -------------------------------------------------

    if let Some(caps) = caps {
        if !caps.resolutions.is_empty() && !caps.resolutions.contains(&params.resolution) {
            report.issue(
                "resolution",
                format!(
                    "{} dpi not supported (device offers {:?})",
                    params.resolution, caps.resolutions
                ),
            );
        }
        if !caps.color_modes.is_empty() && !caps.color_modes.contains(&params.color_mode) {
            report.issue(
                "color_mode",
                format!("{:?} not supported by the device", params.color_mode),
            );
        }
        if !caps.formats.is_empty() && !caps.formats.contains(&params.format) {
            report.issue(
                "format",
                format!("{:?} not supported by the device", params.format),
            );
        }
        if params.use_feeder && !caps.feeder {
            report.issue("use_feeder", "device has no document feeder");
        }
        if params.use_duplex && !caps.duplex {
            report.issue("use_duplex", "device cannot capture both sides");
        }

        let (w_mm, h_mm) = params.page_size.dimensions_mm();
        if (caps.max_width_mm > 0 && w_mm > caps.max_width_mm)
            || (caps.max_height_mm > 0 && h_mm > caps.max_height_mm)
        {
            report.warnings.push(format!(
                "page {w_mm}x{h_mm} mm exceeds the scan area {}x{} mm and will be clipped",
                caps.max_width_mm, caps.max_height_mm
            ));
        }
    }

    if report.is_valid() {
        debug!(warnings = report.warnings.len(), "scan parameters valid");
    } else {
        info!(issues = report.issues.len(), "scan parameters rejected");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanwerk_core::{ColorMode, PageFormat, QualitySettings};

    fn flatbed() -> DeviceCapabilities {
        DeviceCapabilities {
            max_width_mm: 216,
            max_height_mm: 297,
            resolutions: vec![150, 300, 600],
            color_modes: vec![ColorMode::Color, ColorMode::Grayscale],
            formats: vec![PageFormat::Jpeg, PageFormat::Png],
            feeder: false,
            duplex: false,
        }
    }

    #[test]
    fn defaults_are_valid() {
        let report = validate_parameters(&ScanParameters::default(), Some(&flatbed()));
        assert!(report.is_valid(), "{:?}", report.issues);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn all_intrinsic_issues_reported_together() {
        let params = ScanParameters {
            resolution: 0,
            brightness: 5000,
            quality: QualitySettings {
                max_quality: false,
                jpeg_quality: Some(0),
            },
            page_size: PaperSize::Custom {
                width_mm: 0,
                height_mm: 100,
            },
            ..Default::default()
        };
        let report = validate_parameters(&params, None);
        let fields: Vec<_> = report.issues.iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["resolution", "page_size", "brightness", "jpeg_quality"]);
    }

    #[test]
    fn capability_mismatches_are_issues() {
        let params = ScanParameters {
            resolution: 1200,
            color_mode: ColorMode::BlackAndWhite,
            format: PageFormat::Tiff,
            use_feeder: true,
            use_duplex: true,
            ..Default::default()
        };
        let report = validate_parameters(&params, Some(&flatbed()));
        let fields: Vec<_> = report.issues.iter().map(|i| i.field).collect();
        assert_eq!(
            fields,
            vec!["resolution", "color_mode", "format", "use_feeder", "use_duplex"]
        );
        assert!(matches!(
            report.into_result(),
            Err(ScanwerkError::InvalidParameters(issues)) if issues.len() == 5
        ));
    }

    #[test]
    fn unknown_capabilities_are_not_checked() {
        let params = ScanParameters {
            resolution: 1200,
            use_feeder: true,
            ..Default::default()
        };
        let caps = DeviceCapabilities {
            feeder: true,
            ..Default::default()
        };
        assert!(validate_parameters(&params, Some(&caps)).is_valid());
    }

    #[test]
    fn oversized_page_is_a_warning() {
        let params = ScanParameters {
            page_size: PaperSize::A3,
            ..Default::default()
        };
        let report = validate_parameters(&params, Some(&flatbed()));
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }
}
