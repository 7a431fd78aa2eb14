// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use std::path::PathBuf;

use thiserror::Error;

/// A single parameter problem found by up-front validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Parameter name as it appears in the settings document.
    pub field: &'static str,
    /// What is wrong with it.
    pub problem: String,
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Device / capture errors --
    #[error("device {0} is busy")]
    DeviceBusy(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Explicit hardware fault (paper jam, cover open, offline).
    #[error("device fault: {0}")]
    DeviceFault(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("first page capture failed on {device}: {detail}")]
    FirstPageCapture { device: String, detail: String },

    #[error("no pages scanned")]
    NoPagesScanned,

    #[error("invalid scan parameters: {}", join_issues(.0))]
    InvalidParameters(Vec<FieldIssue>),

    // -- Page processing errors --
    #[error("post-processing failed for page {page}: {detail}")]
    PostProcessing { page: u32, detail: String },

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- Output errors --
    #[error("failed to write save target {index} ({}): {detail}", .path.display())]
    OutputWrite {
        index: usize,
        path: PathBuf,
        detail: String,
    },

    // -- Control flow --
    #[error("operation cancelled")]
    Cancelled,

    // -- Batch phase wrappers --
    #[error("input phase failed at scan {invocation}: {source}")]
    Input {
        invocation: u32,
        #[source]
        source: Box<ScanwerkError>,
    },

    #[error("output phase failed: {source}")]
    Output {
        #[source]
        source: Box<ScanwerkError>,
    },

    #[error("input failed: {input}, output failed: {output}")]
    InputAndOutput {
        input: Box<ScanwerkError>,
        output: Box<ScanwerkError>,
    },

    // -- Storage / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanwerkError {
    /// Whether this error (or the phase failure it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Input { source, .. } | Self::Output { source } => source.is_cancelled(),
            Self::InputAndOutput { input, output } => {
                input.is_cancelled() || output.is_cancelled()
            }
            _ => false,
        }
    }

    /// The innermost error, with phase wrappers removed. For a combined
    /// input/output failure the input error is returned.
    pub fn root(&self) -> &ScanwerkError {
        match self {
            Self::Input { source, .. } | Self::Output { source } => source.root(),
            Self::InputAndOutput { input, .. } => input.root(),
            other => other,
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// An error that still carries the work completed before it occurred.
///
/// Returned by operations that accumulate results (a capture invocation, a
/// batch run) so that callers never lose pages that were already captured.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Partial<T: std::fmt::Debug> {
    /// Everything accumulated up to the failure.
    pub value: T,
    /// What went wrong.
    pub error: ScanwerkError,
}

impl<T: std::fmt::Debug> Partial<T> {
    pub fn new(value: T, error: ScanwerkError) -> Self {
        Self { value, error }
    }

    /// Split into the partial value and the error.
    pub fn into_parts(self) -> (T, ScanwerkError) {
        (self.value, self.error)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_seen_through_phase_wrappers() {
        let err = ScanwerkError::Input {
            invocation: 2,
            source: Box::new(ScanwerkError::Cancelled),
        };
        assert!(err.is_cancelled());

        let combined = ScanwerkError::InputAndOutput {
            input: Box::new(err),
            output: Box::new(ScanwerkError::Capture("disk full".into())),
        };
        assert!(combined.is_cancelled());
        assert!(matches!(combined.root(), ScanwerkError::Cancelled));
    }

    #[test]
    fn combined_message_reports_both_phases() {
        let err = ScanwerkError::InputAndOutput {
            input: Box::new(ScanwerkError::DeviceBusy("wia:0".into())),
            output: Box::new(ScanwerkError::PdfError("no pages".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("input failed: device wia:0 is busy"));
        assert!(msg.contains("output failed: PDF operation failed: no pages"));
    }

    #[test]
    fn invalid_parameters_lists_every_issue() {
        let err = ScanwerkError::InvalidParameters(vec![
            FieldIssue {
                field: "resolution",
                problem: "must be greater than 0".into(),
            },
            FieldIssue {
                field: "jpeg_quality",
                problem: "must be between 1 and 100".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "invalid scan parameters: resolution: must be greater than 0; \
             jpeg_quality: must be between 1 and 100"
        );
    }

    #[test]
    fn partial_keeps_value_and_displays_error() {
        let partial = Partial::new(vec![1, 2], ScanwerkError::Cancelled);
        assert_eq!(partial.to_string(), "operation cancelled");
        let (value, error) = partial.into_parts();
        assert_eq!(value, vec![1, 2]);
        assert!(error.is_cancelled());
    }
}
