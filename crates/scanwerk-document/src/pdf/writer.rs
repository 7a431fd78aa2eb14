// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — wrap scanned page images into a multi-page PDF using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use std::path::Path;

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use scanwerk_core::error::ScanwerkError;
use tracing::{debug, info, instrument, warn};

use crate::image::processor::ImageProcessor;

const MM_PER_INCH: f32 = 25.4;

/// Builds PDF documents with one scanned image per page.
///
/// Each page is sized to its image at the capture resolution, so a 300 dpi
/// A4 scan produces an A4 page with the image placed edge to edge.
pub struct PdfWriter {
    /// Resolution the page images were captured at.
    dpi: f32,
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl PdfWriter {
    /// Create a writer for pages captured at `dpi` (0 is treated as 300).
    pub fn new(dpi: u32) -> Self {
        let dpi = if dpi == 0 { 300 } else { dpi };
        Self {
            dpi: dpi as f32,
            title: None,
        }
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Page dimensions for an image of `width` x `height` pixels.
    fn page_dimensions(&self, width: u32, height: u32) -> (Mm, Mm) {
        (
            Mm(width as f32 / self.dpi * MM_PER_INCH),
            Mm(height as f32 / self.dpi * MM_PER_INCH),
        )
    }

    /// Create a PDF with one page per image file, in the given order.
    #[instrument(skip_all, fields(pages = paths.len(), dpi = self.dpi))]
    pub fn create_from_images<P: AsRef<Path>>(
        &self,
        paths: &[P],
    ) -> Result<Vec<u8>, ScanwerkError> {
        if paths.is_empty() {
            return Err(ScanwerkError::PdfError(
                "cannot create a PDF without pages".into(),
            ));
        }

        let title = self.title.as_deref().unwrap_or("Scanwerk Document");
        info!(title, "Creating scanned-page PDF");

        let mut doc = PdfDocument::new(title);
        let mut pages: Vec<PdfPage> = Vec::with_capacity(paths.len());

        for path in paths {
            let image = ImageProcessor::open(path.as_ref())?.into_dynamic();
            let (width, height) = (image.width(), image.height());

            // Convert to RGB8 for printpdf.
            let raw = RawImage {
                pixels: RawImageData::U8(image.to_rgb8().into_raw()),
                width: width as usize,
                height: height as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(0.0)),
                    translate_y: Some(Pt(0.0)),
                    scale_x: Some(1.0),
                    scale_y: Some(1.0),
                    dpi: Some(self.dpi),
                    rotate: None,
                },
            }];

            let (page_w, page_h) = self.page_dimensions(width, height);
            debug!(
                path = %path.as_ref().display(),
                width,
                height,
                page_w_mm = page_w.0,
                page_h_mm = page_h.0,
                "Page placed"
            );
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "PDF serialisation reported warnings");
        }

        Ok(output)
    }

    /// Create a PDF from image files and write it directly to `target`.
    pub fn write_images_to_file<P: AsRef<Path>>(
        &self,
        paths: &[P],
        target: impl AsRef<Path>,
    ) -> Result<(), ScanwerkError> {
        let bytes = self.create_from_images(paths)?;
        std::fs::write(target.as_ref(), &bytes)?;
        info!("Wrote {}-page PDF to {}", paths.len(), target.as_ref().display());
        Ok(())
    }
}
