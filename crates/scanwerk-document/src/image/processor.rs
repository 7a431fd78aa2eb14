// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — scale, rotate, crop, fit, and encode scanned pages.
// Operates on in-memory images using the `image` and `imageproc` crates.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use imageproc::geometric_transformations::{self, Interpolation};
use scanwerk_core::PageFormat;
use scanwerk_core::error::ScanwerkError;
use tracing::{debug, info, instrument};

/// Image processing pipeline operating on a single in-memory page.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping the
/// transformed image, enabling method chaining.
///
/// ```ignore
/// let bytes = ImageProcessor::open("scan_0001.jpg")?
///     .scale_down(2)
///     .crop_center(2480, 3508)
///     .encode(PageFormat::Jpeg, 75)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, ScanwerkError> {
        let img = image::open(path.as_ref()).map_err(|err| {
            ScanwerkError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        debug!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ScanwerkError> {
        let img = image::load_from_memory(data).map_err(|err| {
            ScanwerkError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Downscale by an integer ratio with Lanczos3 filtering.
    ///
    /// New dimensions are `floor(old / ratio)`, never less than 1 pixel.
    #[instrument(skip(self), fields(ratio))]
    pub fn scale_down(self, ratio: u32) -> Self {
        if ratio <= 1 {
            return self;
        }
        let new_w = (self.image.width() / ratio).max(1);
        let new_h = (self.image.height() / ratio).max(1);
        info!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            new_w,
            new_h,
            "Scaling page"
        );
        self.resize_exact(new_w, new_h)
    }

    /// Resize the image to fit within `max_width` x `max_height`, preserving
    /// aspect ratio. Uses Lanczos3 filtering.
    #[instrument(skip(self), fields(max_width, max_height))]
    pub fn resize(self, max_width: u32, max_height: u32) -> Self {
        info!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            max_width,
            max_height,
            "Resizing image"
        );
        let resized = self
            .image
            .resize(max_width, max_height, FilterType::Lanczos3);
        debug!(
            new_w = resized.width(),
            new_h = resized.height(),
            "Resize complete"
        );
        Self { image: resized }
    }

    /// Resize the image to exactly `width` x `height`, ignoring aspect ratio.
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        let resized = self
            .image
            .resize_exact(width, height, FilterType::Lanczos3);
        Self { image: resized }
    }

    /// Rotate the image by an arbitrary angle in degrees (clockwise).
    ///
    /// For 90/180/270 degree rotations, lossless rotation is used. For other
    /// angles, bilinear interpolation about the centre is applied and the
    /// uncovered corners are filled with white.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotate(self, degrees: f32) -> Self {
        let normalised = degrees.rem_euclid(360.0);
        if normalised < 0.01 || (normalised - 360.0).abs() < 0.01 {
            return self;
        }
        info!(degrees, "Rotating image");

        if (normalised - 90.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate90(),
            };
        }
        if (normalised - 180.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate180(),
            };
        }
        if (normalised - 270.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate270(),
            };
        }

        let rgba = self.image.to_rgba8();
        let rotated: RgbaImage = geometric_transformations::rotate_about_center(
            &rgba,
            normalised.to_radians(),
            Interpolation::Bilinear,
            image::Rgba([255u8, 255, 255, 255]),
        );
        debug!("General rotation applied");
        Self {
            image: DynamicImage::ImageRgba8(rotated),
        }
    }

    /// Crop a rectangular region from the image.
    ///
    /// `x` and `y` are the top-left corner; `width` and `height` define the
    /// size of the crop rectangle. Values are clamped to image bounds.
    #[instrument(skip(self), fields(x, y, width, height))]
    pub fn crop(self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let img_w = self.image.width();
        let img_h = self.image.height();

        let safe_x = x.min(img_w.saturating_sub(1));
        let safe_y = y.min(img_h.saturating_sub(1));
        let safe_w = width.min(img_w - safe_x);
        let safe_h = height.min(img_h - safe_y);

        debug!(safe_x, safe_y, safe_w, safe_h, "Cropping image");

        let cropped = self.image.crop_imm(safe_x, safe_y, safe_w, safe_h);
        Self { image: cropped }
    }

    /// Centre-crop to at most `width` x `height`.
    ///
    /// A dimension that is already within the target is left as is.
    pub fn crop_center(self, width: u32, height: u32) -> Self {
        let img_w = self.image.width();
        let img_h = self.image.height();
        if img_w <= width && img_h <= height {
            return self;
        }
        let new_w = img_w.min(width);
        let new_h = img_h.min(height);
        let x = (img_w - new_w) / 2;
        let y = (img_h - new_h) / 2;
        info!(from_w = img_w, from_h = img_h, new_w, new_h, "Cropping to page size");
        self.crop(x, y, new_w, new_h)
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, ScanwerkError> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, ScanwerkError> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder).map_err(|err| {
            ScanwerkError::ImageError(format!("JPEG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }

    /// Encode the current image in `format`. `jpeg_quality` is only used for
    /// JPEG output.
    pub fn encode(&self, format: PageFormat, jpeg_quality: u8) -> Result<Vec<u8>, ScanwerkError> {
        match format {
            PageFormat::Jpeg => self.to_jpeg_bytes(jpeg_quality),
            PageFormat::Png => self.to_png_bytes(),
            // TIFF and BMP encoders only take 8-bit RGB(A).
            PageFormat::Tiff | PageFormat::Bmp => {
                let image_format = if format == PageFormat::Tiff {
                    ImageFormat::Tiff
                } else {
                    ImageFormat::Bmp
                };
                let normalised = if self.image.color().has_alpha() {
                    DynamicImage::ImageRgba8(self.image.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(self.image.to_rgb8())
                };
                encode_to_format(&normalised, image_format)
            }
        }
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(
    image: &DynamicImage,
    format: ImageFormat,
) -> Result<Vec<u8>, ScanwerkError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image.write_to(&mut cursor, format).map_err(|err| {
        ScanwerkError::ImageError(format!("image encoding failed: {}", err))
    })?;
    Ok(buffer)
}
