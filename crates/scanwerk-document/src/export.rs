// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page export — write one save target.
//
// A `.pdf` target merges every page into one document. Any other target
// receives the page directly when there is one page, or one file per page
// with `_<n>` (1-based) inserted before the extension.

use std::path::{Path, PathBuf};

use scanwerk_core::error::Result;
use scanwerk_core::{CapturedPage, DEFAULT_JPEG_QUALITY, PageFormat};
use tracing::{debug, info, instrument};

use crate::image::processor::ImageProcessor;
use crate::pdf::writer::PdfWriter;

/// Writes captured pages to a resolved save target.
#[derive(Debug, Clone)]
pub struct PageExporter {
    /// Capture resolution, used to size PDF pages.
    resolution: u32,
    /// Quality used when a page has to be converted to JPEG.
    jpeg_quality: u8,
}

impl PageExporter {
    pub fn new(resolution: u32) -> Self {
        Self {
            resolution,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Save `pages` to `target`, returning every file written in order.
    ///
    /// An empty page list writes nothing.
    #[instrument(skip(self, pages), fields(target = %target.display(), pages = pages.len()))]
    pub fn save(&self, target: &Path, pages: &[CapturedPage]) -> Result<Vec<PathBuf>> {
        if pages.is_empty() {
            debug!("Nothing to save");
            return Ok(Vec::new());
        }

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let extension = target
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        if extension.as_deref() == Some("pdf") {
            let paths: Vec<&Path> = pages.iter().map(|page| page.path.as_path()).collect();
            let mut writer = PdfWriter::new(self.resolution);
            if let Some(stem) = target.file_stem().and_then(|stem| stem.to_str()) {
                writer.set_title(stem);
            }
            writer.write_images_to_file(&paths, target)?;
            return Ok(vec![target.to_path_buf()]);
        }

        let target_format = extension.as_deref().and_then(PageFormat::from_extension);

        if let [page] = pages {
            self.write_page(page, target, target_format)?;
            return Ok(vec![target.to_path_buf()]);
        }

        let mut written = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            let indexed = indexed_path(target, i + 1);
            self.write_page(page, &indexed, target_format)?;
            written.push(indexed);
        }
        info!(files = written.len(), "Saved pages as indexed files");
        Ok(written)
    }

    /// Copy the page, converting it when the target names another raster format.
    fn write_page(
        &self,
        page: &CapturedPage,
        target: &Path,
        target_format: Option<PageFormat>,
    ) -> Result<()> {
        match target_format {
            Some(format) if format != page.format => {
                let bytes = ImageProcessor::open(&page.path)?.encode(format, self.jpeg_quality)?;
                std::fs::write(target, bytes)?;
                debug!(from = ?page.format, to = ?format, target = %target.display(), "Page converted");
            }
            _ => {
                std::fs::copy(&page.path, target)?;
                debug!(target = %target.display(), "Page copied");
            }
        }
        Ok(())
    }
}

/// Insert `_<index>` before the extension: `scan.jpg` -> `scan_2.jpg`.
pub fn indexed_path(target: &Path, index: usize) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{stem}_{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{index}"),
    };
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::reader::PdfReader;
    use image::{Rgb, RgbImage};

    fn captured(dir: &Path, number: u32) -> CapturedPage {
        let path = dir.join(format!("scan_page_{number}.png"));
        RgbImage::from_pixel(20, 30, Rgb([number as u8 * 40, 0, 0]))
            .save(&path)
            .expect("save");
        let byte_size = std::fs::metadata(&path).expect("meta").len();
        CapturedPage {
            page_number: number,
            path,
            width: 20,
            height: 30,
            byte_size,
            format: PageFormat::Png,
        }
    }

    #[test]
    fn indexed_path_inserts_before_extension() {
        assert_eq!(
            indexed_path(Path::new("/out/scan.jpg"), 2),
            PathBuf::from("/out/scan_2.jpg")
        );
        assert_eq!(
            indexed_path(Path::new("/out/scan"), 10),
            PathBuf::from("/out/scan_10")
        );
    }

    #[test]
    fn pdf_target_merges_pages_in_order() {
        let work = tempfile::tempdir().expect("tempdir");
        let pages: Vec<_> = (1..=3).map(|n| captured(work.path(), n)).collect();
        let target = work.path().join("out").join("batch.pdf");

        let written = PageExporter::new(150).save(&target, &pages).expect("save");
        assert_eq!(written, vec![target.clone()]);
        assert_eq!(PdfReader::open(&target).expect("open").page_count(), 3);
    }

    #[test]
    fn single_page_is_written_directly() {
        let work = tempfile::tempdir().expect("tempdir");
        let pages = vec![captured(work.path(), 1)];
        let target = work.path().join("single.png");

        let written = PageExporter::new(300).save(&target, &pages).expect("save");
        assert_eq!(written, vec![target.clone()]);
        assert_eq!(
            std::fs::read(&target).expect("read"),
            std::fs::read(&pages[0].path).expect("read")
        );
    }

    #[test]
    fn multiple_pages_to_image_target_are_indexed() {
        let work = tempfile::tempdir().expect("tempdir");
        let pages: Vec<_> = (1..=2).map(|n| captured(work.path(), n)).collect();
        let target = work.path().join("many.png");

        let written = PageExporter::new(300).save(&target, &pages).expect("save");
        assert_eq!(
            written,
            vec![work.path().join("many_1.png"), work.path().join("many_2.png")]
        );
        assert!(!target.exists());
    }

    #[test]
    fn different_extension_converts_format() {
        let work = tempfile::tempdir().expect("tempdir");
        let pages = vec![captured(work.path(), 1)];
        let target = work.path().join("converted.jpg");

        PageExporter::new(300).save(&target, &pages).expect("save");
        let bytes = std::fs::read(&target).expect("read");
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn empty_page_list_writes_nothing() {
        let work = tempfile::tempdir().expect("tempdir");
        let target = work.path().join("nothing.pdf");
        let written = PageExporter::new(300).save(&target, &[]).expect("save");
        assert!(written.is_empty());
        assert!(!target.exists());
    }
}
