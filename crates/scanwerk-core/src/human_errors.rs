// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for operators at the scanner.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The taxonomy uses three severity levels that drive presentation.

use crate::error::ScanwerkError;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Busy device, interrupted transfer. Trying again is likely to work.
    Transient,
    /// Operator must do something (load paper, clear jam, fix settings).
    ActionRequired,
    /// Cannot be fixed by retrying: damaged image, unwritable format.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the operator should try.
    pub suggestion: String,
    /// Whether the caller may retry automatically.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `ScanwerkError` into a `HumanError`.
///
/// Phase wrappers are unwrapped first so the message describes the actual
/// cause; the phase itself is already part of the technical message.
pub fn humanize_error(err: &ScanwerkError) -> HumanError {
    match err.root() {
        // -- Device / capture --
        ScanwerkError::DeviceBusy(device) => HumanError {
            message: "The scanner is busy.".into(),
            suggestion: format!("Wait for the current scan on {device} to finish, then try again."),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanwerkError::DeviceNotFound(device) => HumanError {
            message: "We couldn't find that scanner.".into(),
            suggestion: format!(
                "Check that {device} is switched on and listed by `scanwerk devices`."
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::DeviceFault(detail) => humanize_fault(detail),

        ScanwerkError::Capture(_) | ScanwerkError::FirstPageCapture { .. } => HumanError {
            message: "The scanner couldn't capture a page.".into(),
            suggestion: "Make sure the document is loaded correctly and the scanner is ready, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanwerkError::NoPagesScanned => HumanError {
            message: "No pages were scanned.".into(),
            suggestion: "Load the pages into the feeder (or onto the glass) and try again. If blank-page removal is on, the pages may have been treated as empty.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::InvalidParameters(issues) => HumanError {
            message: "Some scan settings aren't valid.".into(),
            suggestion: format!(
                "Fix these settings and try again: {}",
                issues
                    .iter()
                    .map(|issue| issue.field)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- Page processing --
        ScanwerkError::PostProcessing { page, .. } => HumanError {
            message: format!("Page {page} couldn't be processed."),
            suggestion: "The other pages were kept. Try scanning that page again.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ScanwerkError::ImageError(_) => HumanError {
            message: "There's a problem with a scanned image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try scanning as JPEG or PNG.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ScanwerkError::PdfError(_) => HumanError {
            message: "The PDF couldn't be created.".into(),
            suggestion: "Try saving to an image format instead, or scan fewer pages at once.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Output --
        ScanwerkError::OutputWrite { path, .. } => HumanError {
            message: "The scanned pages couldn't be saved.".into(),
            suggestion: format!(
                "Check that {} is writable and the disk isn't full. Your scanned pages are still in the working folder.",
                path.display()
            ),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::Cancelled => HumanError {
            message: "Scanning was cancelled.".into(),
            suggestion: "Pages scanned before cancelling have been kept.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- Configuration / storage --
        ScanwerkError::Config(detail) => HumanError {
            message: "The configuration has a problem.".into(),
            suggestion: format!("Check the configuration file. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError {
                message: "A file or folder couldn't be found.".into(),
                suggestion: "It may have been moved or deleted. Check the working folder and save path.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            std::io::ErrorKind::PermissionDenied => HumanError {
                message: "Scanwerk doesn't have permission to use that file.".into(),
                suggestion: "Check the folder permissions, or choose a different save location.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            _ => HumanError {
                message: "There was a problem reading or writing a file.".into(),
                suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                retriable: true,
                severity: Severity::Transient,
            },
        },

        ScanwerkError::Serialization(_) => HumanError {
            message: "A settings file couldn't be read.".into(),
            suggestion: "Check that the file is valid JSON.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // root() never returns a phase wrapper
        ScanwerkError::Input { .. }
        | ScanwerkError::Output { .. }
        | ScanwerkError::InputAndOutput { .. } => HumanError {
            message: "The batch didn't complete.".into(),
            suggestion: err.to_string(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}

/// Parse hardware fault details into operator instructions.
fn humanize_fault(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("jam") {
        HumanError {
            message: "Paper is stuck in the scanner.".into(),
            suggestion: "Open the feeder, gently remove the stuck sheet, and reload the remaining pages.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("cover") || lower.contains("door") {
        HumanError {
            message: "A cover on the scanner is open.".into(),
            suggestion: "Close the scanner lid and feeder cover, then try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("offline") || lower.contains("disconnected") {
        HumanError {
            message: "The scanner is offline.".into(),
            suggestion: "Check that the scanner is switched on and its cable or network connection is working.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else {
        HumanError {
            message: "The scanner reported a problem.".into(),
            suggestion: format!("Check the scanner's display for details. (Detail: {detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_transient() {
        let human = humanize_error(&ScanwerkError::DeviceBusy("adf-1".into()));
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn paper_jam_is_action_required() {
        let human = humanize_error(&ScanwerkError::DeviceFault("paper jam in feeder".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.message.contains("stuck"));
    }

    #[test]
    fn phase_wrapper_is_unwrapped() {
        let err = ScanwerkError::Input {
            invocation: 3,
            source: Box::new(ScanwerkError::NoPagesScanned),
        };
        let human = humanize_error(&err);
        assert_eq!(human.message, "No pages were scanned.");
    }

    #[test]
    fn invalid_parameters_names_fields() {
        let err = ScanwerkError::InvalidParameters(vec![crate::error::FieldIssue {
            field: "resolution",
            problem: "must be greater than 0".into(),
        }]);
        let human = humanize_error(&err);
        assert!(human.suggestion.contains("resolution"));
    }

    #[test]
    fn damaged_image_is_permanent() {
        let human = humanize_error(&ScanwerkError::ImageError("truncated".into()));
        assert_eq!(human.severity, Severity::Permanent);
    }
}
