// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk batch capture engine.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default JPEG quality used whenever a page is re-encoded without an explicit
/// quality factor.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;
/// Default brightness threshold (0-100) for blank-page detection.
pub const DEFAULT_BLANK_WHITE_THRESHOLD: u8 = 70;
/// Default non-white coverage threshold (0-100) for blank-page detection.
pub const DEFAULT_BLANK_COVERAGE_THRESHOLD: u8 = 15;
/// Default capture resolution in DPI.
pub const DEFAULT_RESOLUTION: u32 = 300;

const MM_PER_INCH: f64 = 25.4;

/// Unique identifier for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Batch settings
// ---------------------------------------------------------------------------

/// How many capture invocations a batch performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    /// Exactly one invocation.
    #[default]
    Single,
    /// `scan_count` invocations separated by `scan_interval_seconds`.
    MultipleWithDelay,
    /// One invocation; there is no interactive prompt in a headless service.
    MultipleWithPrompt,
}

/// Where the captured pages go once input is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    /// Return the pages to the caller, no file output.
    #[default]
    Load,
    /// All pages of all scans into one save target.
    SingleFile,
    /// Several save targets, grouped by the save separator.
    MultipleFiles,
}

/// Grouping policy for [`OutputType::MultipleFiles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveSeparator {
    None,
    /// One save target per scan invocation.
    #[default]
    FilePerScan,
    /// One save target per page.
    FilePerPage,
    /// Separation by Patch-T sheet. Not implemented; saved per scan.
    PatchT,
}

/// Batch configuration supplied once per run and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Optional profile name, used only in log output.
    pub profile_name: Option<String>,
    pub scan_type: ScanType,
    /// Number of invocations; only meaningful for `MultipleWithDelay`.
    pub scan_count: u32,
    /// Delay before every invocation except the first.
    pub scan_interval_seconds: f64,
    pub output_type: OutputType,
    pub save_separator: SaveSeparator,
    /// Save path template, see the placeholder list in `scanwerk-batch`.
    pub save_path: String,
    /// Capture configuration applied to every invocation.
    pub scan_params: ScanParameters,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            profile_name: None,
            scan_type: ScanType::Single,
            scan_count: 1,
            scan_interval_seconds: 0.0,
            output_type: OutputType::Load,
            save_separator: SaveSeparator::FilePerScan,
            save_path: String::new(),
            scan_params: ScanParameters::default(),
        }
    }
}

impl BatchSettings {
    /// Inter-scan delay. Negative or non-finite values mean no delay.
    pub fn scan_interval(&self) -> Duration {
        if self.scan_interval_seconds.is_finite() && self.scan_interval_seconds > 0.0 {
            Duration::from_secs_f64(self.scan_interval_seconds)
        } else {
            Duration::ZERO
        }
    }

    /// Number of capture invocations the input phase will attempt.
    pub fn planned_scans(&self) -> u32 {
        match self.scan_type {
            ScanType::MultipleWithDelay => self.scan_count,
            ScanType::Single | ScanType::MultipleWithPrompt => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Scan parameters
// ---------------------------------------------------------------------------

/// Colour mode requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Color,
    Grayscale,
    BlackAndWhite,
}

/// Encoded format of a captured page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFormat {
    #[default]
    Jpeg,
    Png,
    Tiff,
    Bmp,
}

impl PageFormat {
    /// Canonical file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Tiff => "tif",
            Self::Bmp => "bmp",
        }
    }

    /// Whether encoding in this format discards information.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg)
    }

    /// Infer the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperSize {
    Letter,
    Legal,
    #[default]
    A4,
    A3,
    A5,
    B4,
    B5,
    A6,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::A4 => (210, 297),
            Self::A3 => (297, 420),
            Self::A5 => (148, 210),
            Self::B4 => (250, 353),
            Self::B5 => (176, 250),
            Self::A6 => (105, 148),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }

    /// Look up a named size ("A4", "letter", ...). Custom sizes have no name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "letter" => Some(Self::Letter),
            "legal" => Some(Self::Legal),
            "a4" => Some(Self::A4),
            "a3" => Some(Self::A3),
            "a5" => Some(Self::A5),
            "b4" => Some(Self::B4),
            "b5" => Some(Self::B5),
            "a6" => Some(Self::A6),
            _ => None,
        }
    }
}

/// Horizontal placement of the page on the scan bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlign {
    Left,
    Center,
    #[default]
    Right,
}

/// Integer downscale ratio applied after capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ScaleRatio {
    #[default]
    OneToOne,
    OneToTwo,
    OneToFour,
    OneToEight,
}

impl ScaleRatio {
    pub fn divisor(&self) -> u32 {
        match self {
            Self::OneToOne => 1,
            Self::OneToTwo => 2,
            Self::OneToFour => 4,
            Self::OneToEight => 8,
        }
    }
}

impl TryFrom<u32> for ScaleRatio {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::OneToOne),
            2 => Ok(Self::OneToTwo),
            4 => Ok(Self::OneToFour),
            8 => Ok(Self::OneToEight),
            other => Err(format!("scale ratio must be 1, 2, 4 or 8, got {other}")),
        }
    }
}

impl From<ScaleRatio> for u32 {
    fn from(ratio: ScaleRatio) -> Self {
        ratio.divisor()
    }
}

/// Re-encoding options applied as the last post-processing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    /// Lossless output; overrides `jpeg_quality`.
    pub max_quality: bool,
    /// Explicit JPEG quality (1-100).
    pub jpeg_quality: Option<u8>,
}

impl QualitySettings {
    /// Quality factor to use when a lossy re-encode happens.
    pub fn effective_jpeg_quality(&self) -> u8 {
        self.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY)
    }
}

/// Blank-page exclusion thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlankPageSettings {
    pub exclude: bool,
    /// Brightness (0-100) under which a pixel counts as non-white.
    pub white_threshold: u8,
    /// Non-white coverage (0-100) under which a page counts as blank.
    pub coverage_threshold: u8,
}

impl Default for BlankPageSettings {
    fn default() -> Self {
        Self {
            exclude: false,
            white_threshold: DEFAULT_BLANK_WHITE_THRESHOLD,
            coverage_threshold: DEFAULT_BLANK_COVERAGE_THRESHOLD,
        }
    }
}

/// Capture configuration, immutable once an invocation starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParameters {
    /// Resolution in DPI.
    pub resolution: u32,
    pub color_mode: ColorMode,
    /// Format the device is asked to deliver.
    pub format: PageFormat,
    pub page_size: PaperSize,
    pub page_align: HorizontalAlign,
    pub use_feeder: bool,
    pub use_duplex: bool,
    /// Maximum pages per feeder invocation, 0 = until the feeder is empty.
    pub page_count: u32,
    /// Device brightness (-1000..=1000).
    pub brightness: i32,
    /// Device contrast (-1000..=1000).
    pub contrast: i32,
    pub scale_ratio: ScaleRatio,
    pub crop_to_page_size: bool,
    pub stretch_to_page_size: bool,
    pub quality: QualitySettings,
    pub blank_pages: BlankPageSettings,
    /// Clockwise rotation applied to every page.
    pub rotate_degrees: f32,
    /// Turn the back side of duplex sheets right way up.
    pub flip_duplexed_pages: bool,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            color_mode: ColorMode::Color,
            format: PageFormat::Jpeg,
            page_size: PaperSize::A4,
            page_align: HorizontalAlign::Right,
            use_feeder: false,
            use_duplex: false,
            page_count: 0,
            brightness: 0,
            contrast: 0,
            scale_ratio: ScaleRatio::OneToOne,
            crop_to_page_size: false,
            stretch_to_page_size: false,
            quality: QualitySettings::default(),
            blank_pages: BlankPageSettings::default(),
            rotate_degrees: 0.0,
            flip_duplexed_pages: false,
        }
    }
}

/// Convert millimetres to pixels at `dpi`, rounding to the nearest pixel.
pub fn mm_to_pixels(mm: u32, dpi: u32) -> u32 {
    (mm as f64 / MM_PER_INCH * dpi as f64).round() as u32
}

impl ScanParameters {
    /// Page size in pixels at the configured resolution (width, height).
    pub fn page_pixels(&self) -> (u32, u32) {
        let (w_mm, h_mm) = self.page_size.dimensions_mm();
        (
            mm_to_pixels(w_mm, self.resolution),
            mm_to_pixels(h_mm, self.resolution),
        )
    }

    /// Resolve the area the device should capture.
    ///
    /// `max_width_px` is the device's usable width at this resolution; when it
    /// is unknown, an A4-wide bed is assumed.
    pub fn scan_area(&self, max_width_px: Option<u32>) -> ScanArea {
        let (width_px, height_px) = self.page_pixels();
        let max_width =
            max_width_px.unwrap_or_else(|| mm_to_pixels(210, self.resolution));
        let x_offset_px = if max_width > width_px {
            match self.page_align {
                HorizontalAlign::Center => (max_width - width_px) / 2,
                HorizontalAlign::Left => max_width - width_px,
                HorizontalAlign::Right => 0,
            }
        } else {
            0
        };
        ScanArea {
            width_px,
            height_px,
            x_offset_px,
        }
    }

    /// Whether any post-processing step would touch the page.
    pub fn needs_post_processing(&self) -> bool {
        self.blank_pages.exclude
            || self.scale_ratio != ScaleRatio::OneToOne
            || self.crop_to_page_size
            || self.stretch_to_page_size
            || self.quality.max_quality
            || self.quality.jpeg_quality.is_some()
            || self.rotate_degrees.rem_euclid(360.0) != 0.0
            || (self.flip_duplexed_pages && self.use_duplex)
    }
}

/// Capture area in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanArea {
    pub width_px: u32,
    pub height_px: u32,
    /// Horizontal start position derived from the alignment.
    pub x_offset_px: u32,
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// What a device can do, reported by the capture port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceCapabilities {
    /// Maximum scan width in millimetres (0 = unknown).
    pub max_width_mm: u32,
    /// Maximum scan height in millimetres (0 = unknown).
    pub max_height_mm: u32,
    /// Supported resolutions; empty = unknown.
    pub resolutions: Vec<u32>,
    pub color_modes: Vec<ColorMode>,
    pub formats: Vec<PageFormat>,
    pub feeder: bool,
    pub duplex: bool,
}

/// A capture device as reported by the capture port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub capabilities: DeviceCapabilities,
}

/// Per-device activity as tracked by the capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    #[default]
    Idle,
    Scanning,
}

// ---------------------------------------------------------------------------
// Pages and batches
// ---------------------------------------------------------------------------

/// Encoded image bytes handed over by the capture port.
#[derive(Clone, PartialEq, Eq)]
pub struct RawCapture {
    pub data: Vec<u8>,
    pub format: PageFormat,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for RawCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCapture")
            .field("bytes", &self.data.len())
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Result of one call to the capture port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// One physical page.
    Page(RawCapture),
    /// Feeder empty / no more items. Not an error.
    SourceExhausted,
}

/// A page that has been captured and written to the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPage {
    /// 1-based, increasing in capture order within one invocation.
    pub page_number: u32,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub format: PageFormat,
}

/// Pages produced by one capture invocation, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanBatch {
    /// 1-based invocation number within the batch run.
    pub scan_number: u32,
    pub pages: Vec<CapturedPage>,
}

impl ScanBatch {
    pub fn new(scan_number: u32) -> Self {
        Self {
            scan_number,
            pages: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Everything a batch run produced, in invocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: BatchId,
    pub scans: Vec<ScanBatch>,
    /// Files written by the output phase, in save order.
    pub saved_files: Vec<PathBuf>,
}

impl BatchResult {
    pub fn new(batch_id: BatchId) -> Self {
        Self {
            batch_id,
            scans: Vec::new(),
            saved_files: Vec::new(),
        }
    }

    /// Total number of pages across all scans.
    pub fn page_count(&self) -> usize {
        self.scans.iter().map(ScanBatch::len).sum()
    }

    /// All pages flattened in scan order, then capture order.
    pub fn pages(&self) -> impl Iterator<Item = &CapturedPage> {
        self.scans.iter().flat_map(|scan| scan.pages.iter())
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Coarse stage of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Scanning,
    Saving,
}

/// Progress notification delivered to the caller's callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: ProgressStage,
    pub current_scan: u32,
    /// `None` when the number of scans is not known up front.
    pub total_scans: Option<u32>,
    pub current_page: u32,
    /// `None` when the number of pages is not known up front.
    pub total_pages: Option<u32>,
    pub message: String,
    /// 0-100.
    pub percent_complete: u8,
}
