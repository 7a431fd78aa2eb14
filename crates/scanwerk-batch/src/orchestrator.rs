// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch orchestrator — input phase, then output phase.
//
// Input runs the capture invocations the scan type asks for and stops at the
// first failure. Output always runs afterwards, over whatever scans were
// collected, so a failed input never throws away pages that made it through.

use std::path::PathBuf;
use std::sync::Arc;

use scanwerk_core::error::{Partial, Result, ScanwerkError};
use scanwerk_core::{
    BatchId, BatchResult, BatchSettings, CapturedPage, OutputType, ProgressUpdate, SaveSeparator,
    ScanBatch, ScanType,
};
use scanwerk_document::PageExporter;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelSignal;
use crate::pipeline::{CapturePipeline, InvocationContext};
use crate::placeholders::substitute_now;
use crate::progress::{self, ProgressPhase, ProgressSnapshot};

type ProgressFn<'a> = &'a (dyn Fn(ProgressUpdate) + Send + Sync);

/// Runs complete batch scans against a capture pipeline.
pub struct BatchScanner {
    pipeline: Arc<CapturePipeline>,
}

impl BatchScanner {
    pub fn new(pipeline: Arc<CapturePipeline>) -> Self {
        Self { pipeline }
    }

    /// Run one batch on `device_id`.
    ///
    /// On failure the error names the phase (and invocation) that failed, and
    /// the accompanying `BatchResult` holds every scan and saved file
    /// produced before it.
    #[instrument(
        skip(self, settings, cancel, progress),
        fields(profile = settings.profile_name.as_deref().unwrap_or("-"), scan_type = ?settings.scan_type)
    )]
    pub async fn run(
        &self,
        device_id: &str,
        settings: &BatchSettings,
        cancel: &CancelSignal,
        progress: ProgressFn<'_>,
    ) -> std::result::Result<BatchResult, Partial<BatchResult>> {
        let mut result = BatchResult::new(BatchId::new());
        info!(batch_id = %result.batch_id, device = device_id, "Batch started");

        let input_error = self
            .input_phase(device_id, settings, &mut result, cancel, progress)
            .await
            .err();
        if let Some(err) = &input_error {
            warn!(error = %err, scans = result.scans.len(), "Input phase failed, saving collected scans");
        }

        let output_error = self.output_phase(settings, &mut result, progress).await.err();

        let error = match (input_error, output_error) {
            (None, None) => None,
            (Some(input), None) => Some(input),
            (None, Some(output)) => Some(ScanwerkError::Output {
                source: Box::new(output),
            }),
            (Some(input), Some(output)) => Some(ScanwerkError::InputAndOutput {
                input: Box::new(input),
                output: Box::new(output),
            }),
        };

        match error {
            None => {
                info!(
                    scans = result.scans.len(),
                    pages = result.page_count(),
                    files = result.saved_files.len(),
                    "Batch complete"
                );
                Ok(result)
            }
            Some(err) => {
                warn!(error = %err, pages = result.page_count(), "Batch ended with error");
                Err(Partial::new(result, err))
            }
        }
    }

    // -- Input phase ----------------------------------------------------------

    async fn input_phase(
        &self,
        device_id: &str,
        settings: &BatchSettings,
        result: &mut BatchResult,
        cancel: &CancelSignal,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        match settings.scan_type {
            ScanType::Single => {
                self.invoke(device_id, settings, result, 1, Some(1), cancel, progress)
                    .await
            }
            ScanType::MultipleWithDelay => {
                let count = settings.scan_count;
                let interval = settings.scan_interval();
                for i in 0..count {
                    let scan = i + 1;
                    announce(
                        progress,
                        scan,
                        Some(count),
                        format!("Waiting for scan {scan} of {count}"),
                    );
                    if i != 0 {
                        debug!(scan, delay_ms = interval.as_millis() as u64, "Inter-scan wait");
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                info!(scan, "Cancelled during inter-scan wait");
                                return Err(ScanwerkError::Input {
                                    invocation: scan,
                                    source: Box::new(ScanwerkError::Cancelled),
                                });
                            }
                            _ = tokio::time::sleep(interval) => {}
                        }
                    }
                    self.invoke(device_id, settings, result, scan, Some(count), cancel, progress)
                        .await?;
                }
                Ok(())
            }
            // No interactive continuation exists here, so the prompt mode
            // runs a single open-ended batch.
            ScanType::MultipleWithPrompt => {
                announce(progress, 1, None, "Scanning batch 1".into());
                self.invoke(device_id, settings, result, 1, None, cancel, progress)
                    .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn invoke(
        &self,
        device_id: &str,
        settings: &BatchSettings,
        result: &mut BatchResult,
        scan_number: u32,
        total_scans: Option<u32>,
        cancel: &CancelSignal,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let ctx = InvocationContext {
            batch_id: result.batch_id,
            scan_number,
            total_scans,
        };
        let outcome = match self
            .pipeline
            .capture_one(device_id, &settings.scan_params, &ctx, cancel, progress)
            .await
        {
            Ok(batch) if batch.is_empty() => Err(ScanwerkError::NoPagesScanned),
            Ok(batch) => {
                result.scans.push(batch);
                Ok(())
            }
            Err(partial) => {
                let (batch, err) = partial.into_parts();
                if !batch.is_empty() {
                    result.scans.push(batch);
                }
                Err(err)
            }
        };
        outcome.map_err(|source| ScanwerkError::Input {
            invocation: scan_number,
            source: Box::new(source),
        })
    }

    // -- Output phase ---------------------------------------------------------

    async fn output_phase(
        &self,
        settings: &BatchSettings,
        result: &mut BatchResult,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let targets = save_targets(settings, &result.scans);
        if targets.is_empty() {
            debug!(output = ?settings.output_type, "Nothing to save");
            return Ok(());
        }
        if settings.save_path.trim().is_empty() {
            return Err(ScanwerkError::Config(
                "save path is empty but the output type writes files".into(),
            ));
        }

        let total = targets.len() as u32;
        let current_scan = result.scans.len() as u32;
        let total_scans = match settings.scan_type {
            ScanType::MultipleWithPrompt => None,
            _ => Some(settings.planned_scans()),
        };
        let emit = |saved: u32, message: String| {
            progress(progress::report(&ProgressSnapshot {
                phase: ProgressPhase::Saving {
                    saved,
                    targets: total,
                },
                current_scan,
                total_scans,
                current_page: 0,
                total_pages: None,
                message,
            }));
        };
        emit(0, "Saving scan results...".into());

        let params = &settings.scan_params;
        let exporter = PageExporter::new(params.resolution)
            .with_jpeg_quality(params.quality.effective_jpeg_quality());

        for (index, pages) in targets.into_iter().enumerate() {
            let path = PathBuf::from(substitute_now(&settings.save_path, index));
            let task_exporter = exporter.clone();
            let target = path.clone();
            let written = tokio::task::spawn_blocking(move || task_exporter.save(&target, &pages))
                .await
                .unwrap_or_else(|err| Err(ScanwerkError::Io(std::io::Error::other(err))))
                .map_err(|err| ScanwerkError::OutputWrite {
                    index,
                    path: path.clone(),
                    detail: err.to_string(),
                })?;

            debug!(index, path = %path.display(), files = written.len(), "Save target written");
            result.saved_files.extend(written);
            let saved = index as u32 + 1;
            emit(saved, format!("Saved {saved} of {total}"));
        }

        info!(targets = total, files = result.saved_files.len(), "Output phase complete");
        Ok(())
    }
}

fn announce(progress: ProgressFn<'_>, scan: u32, total_scans: Option<u32>, message: String) {
    progress(progress::report(&ProgressSnapshot {
        phase: ProgressPhase::Scanning,
        current_scan: scan,
        total_scans,
        current_page: 0,
        total_pages: None,
        message,
    }));
}

/// Group the collected pages into save targets, in save order.
fn save_targets(settings: &BatchSettings, scans: &[ScanBatch]) -> Vec<Vec<CapturedPage>> {
    match settings.output_type {
        OutputType::Load => Vec::new(),
        OutputType::SingleFile => {
            let pages: Vec<CapturedPage> =
                scans.iter().flat_map(|scan| scan.pages.iter().cloned()).collect();
            if pages.is_empty() { Vec::new() } else { vec![pages] }
        }
        OutputType::MultipleFiles => match settings.save_separator {
            SaveSeparator::FilePerPage => scans
                .iter()
                .flat_map(|scan| scan.pages.iter().map(|page| vec![page.clone()]))
                .collect(),
            SaveSeparator::None | SaveSeparator::FilePerScan | SaveSeparator::PatchT => scans
                .iter()
                .filter(|scan| !scan.is_empty())
                .map(|scan| scan.pages.clone())
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanwerk_bridge::{CapturePort, ScriptStep, SimulatedScanner};
    use scanwerk_core::{PageFormat, RawCapture, ScaleRatio, ScanParameters};
    use scanwerk_document::PdfReader;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Rig {
        scanner: Arc<SimulatedScanner>,
        batch: BatchScanner,
        dir: tempfile::TempDir,
    }

    fn rig(feeder: bool, script: Vec<ScriptStep>) -> Rig {
        let dir = tempfile::tempdir().expect("tempdir");
        let scanner = Arc::new(
            SimulatedScanner::new().with_device(SimulatedScanner::device_info("dev", feeder), script),
        );
        let port: Arc<dyn CapturePort> = scanner.clone();
        let pipeline = Arc::new(CapturePipeline::new(port, dir.path().join("work"), 2));
        Rig {
            scanner,
            batch: BatchScanner::new(pipeline),
            dir,
        }
    }

    fn page() -> ScriptStep {
        ScriptStep::content_page(40, 60).expect("page")
    }

    fn settings(scan_type: ScanType, feeder: bool, output_type: OutputType, save_path: &Path) -> BatchSettings {
        BatchSettings {
            scan_type,
            output_type,
            save_path: save_path.to_string_lossy().into_owned(),
            scan_params: ScanParameters {
                use_feeder: feeder,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn file_names(result: &BatchResult) -> Vec<String> {
        result
            .saved_files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect()
    }

    #[tokio::test]
    async fn single_file_pdf_holds_every_page_in_order() {
        let rig = rig(true, vec![page(), page(), page()]);
        let target = rig.dir.path().join("out_$(n).pdf");
        let settings = settings(ScanType::Single, true, OutputType::SingleFile, &target);

        let result = rig
            .batch
            .run("dev", &settings, &CancelSignal::new(), &|_| {})
            .await
            .expect("batch");
        assert_eq!(result.scans.len(), 1);
        assert_eq!(result.page_count(), 3);
        assert_eq!(file_names(&result), vec!["out_1.pdf"]);
        let pdf = PdfReader::open(&result.saved_files[0]).expect("pdf");
        assert_eq!(pdf.page_count(), 3);
    }

    #[tokio::test]
    async fn file_per_page_numbers_targets_across_scans() {
        let rig = rig(true, vec![page(), page(), ScriptStep::Exhausted, page()]);
        let target = rig.dir.path().join("page_$(n).png");
        let mut settings = settings(
            ScanType::MultipleWithDelay,
            true,
            OutputType::MultipleFiles,
            &target,
        );
        settings.scan_count = 2;
        settings.save_separator = SaveSeparator::FilePerPage;

        let result = rig
            .batch
            .run("dev", &settings, &CancelSignal::new(), &|_| {})
            .await
            .expect("batch");
        let sizes: Vec<usize> = result.scans.iter().map(ScanBatch::len).collect();
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(file_names(&result), vec!["page_1.png", "page_2.png", "page_3.png"]);
        assert!(result.saved_files.iter().all(|p| p.exists()));
    }

    #[tokio::test]
    async fn file_per_scan_indexes_multi_page_targets() {
        let rig = rig(true, vec![page(), page()]);
        let target = rig.dir.path().join("scan_$(n).png");
        let settings = settings(ScanType::Single, true, OutputType::MultipleFiles, &target);

        let result = rig
            .batch
            .run("dev", &settings, &CancelSignal::new(), &|_| {})
            .await
            .expect("batch");
        assert_eq!(file_names(&result), vec!["scan_1_1.png", "scan_1_2.png"]);
    }

    #[tokio::test]
    async fn load_writes_nothing() {
        let rig = rig(false, vec![page()]);
        let settings = settings(ScanType::Single, false, OutputType::Load, Path::new(""));
        let result = rig
            .batch
            .run("dev", &settings, &CancelSignal::new(), &|_| {})
            .await
            .expect("batch");
        assert_eq!(result.page_count(), 1);
        assert!(result.saved_files.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_scans_wait_between_invocations_only() {
        let rig = rig(false, vec![page(), page(), page()]);
        let mut settings = settings(ScanType::MultipleWithDelay, false, OutputType::Load, Path::new(""));
        settings.scan_count = 3;
        settings.scan_interval_seconds = 10.0;

        let messages = Mutex::new(Vec::new());
        let started = tokio::time::Instant::now();
        let result = rig
            .batch
            .run("dev", &settings, &CancelSignal::new(), &|u| {
                messages.lock().expect("lock").push(u.message)
            })
            .await
            .expect("batch");
        let elapsed = started.elapsed();

        assert_eq!(result.scans.len(), 3);
        assert_eq!(rig.scanner.capture_calls("dev"), 3);
        assert!(elapsed >= Duration::from_secs(20), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(21), "{elapsed:?}");
        let waits = messages
            .into_inner()
            .expect("lock")
            .into_iter()
            .filter(|m| m.starts_with("Waiting for scan"))
            .count();
        assert_eq!(waits, 3);
    }

    #[tokio::test]
    async fn cancel_during_wait_keeps_first_scan() {
        let rig = rig(false, (0..5).map(|_| page()).collect());
        let mut settings = settings(ScanType::MultipleWithDelay, false, OutputType::Load, Path::new(""));
        settings.scan_count = 5;
        settings.scan_interval_seconds = 30.0;

        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        let partial = rig
            .batch
            .run("dev", &settings, &cancel, &move |u| {
                if u.message == "Waiting for scan 2 of 5" {
                    trigger.cancel();
                }
            })
            .await
            .expect_err("cancelled");

        assert!(partial.error.is_cancelled());
        assert!(matches!(partial.error, ScanwerkError::Input { invocation: 2, .. }));
        assert_eq!(partial.value.scans.len(), 1);
        assert_eq!(rig.scanner.capture_calls("dev"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_midway_through_interval_stops_waiting() {
        let rig = rig(false, (0..5).map(|_| page()).collect());
        let mut settings = settings(ScanType::MultipleWithDelay, false, OutputType::Load, Path::new(""));
        settings.scan_count = 5;
        settings.scan_interval_seconds = 30.0;

        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        let started = tokio::time::Instant::now();
        let partial = rig
            .batch
            .run("dev", &settings, &cancel, &move |u| {
                if u.message == "Waiting for scan 2 of 5" {
                    let trigger = trigger.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        trigger.cancel();
                    });
                }
            })
            .await
            .expect_err("cancelled");
        let elapsed = started.elapsed();

        assert!(matches!(partial.error, ScanwerkError::Input { invocation: 2, .. }));
        assert!(partial.error.is_cancelled());
        assert_eq!(partial.value.scans.len(), 1);
        assert!(elapsed >= Duration::from_secs(5), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(6), "{elapsed:?}");
        assert_eq!(rig.scanner.capture_calls("dev"), 1);
    }

    #[tokio::test]
    async fn prompt_mode_runs_one_open_ended_batch() {
        let rig = rig(true, vec![page(), page()]);
        let settings = settings(ScanType::MultipleWithPrompt, true, OutputType::Load, Path::new(""));
        let messages = Mutex::new(Vec::new());
        let result = rig
            .batch
            .run("dev", &settings, &CancelSignal::new(), &|u| {
                messages.lock().expect("lock").push((u.message, u.total_scans))
            })
            .await
            .expect("batch");
        assert_eq!(result.scans.len(), 1);
        assert_eq!(result.page_count(), 2);
        let messages = messages.into_inner().expect("lock");
        assert_eq!(messages[0], ("Scanning batch 1".to_string(), None));
        assert_eq!(messages[1].0, "Scanning page 1 of scan 1");
    }

    #[tokio::test]
    async fn empty_invocation_is_no_pages_scanned() {
        let rig = rig(true, vec![ScriptStep::Exhausted]);
        let settings = settings(ScanType::Single, true, OutputType::Load, Path::new(""));
        let partial = rig
            .batch
            .run("dev", &settings, &CancelSignal::new(), &|_| {})
            .await
            .expect_err("empty");
        assert!(matches!(partial.error.root(), ScanwerkError::NoPagesScanned));
        assert!(partial.value.scans.is_empty());
    }

    #[tokio::test]
    async fn output_failure_keeps_scans() {
        let rig = rig(false, vec![page()]);
        let blocker = rig.dir.path().join("blocker");
        std::fs::write(&blocker, b"file").expect("write");
        let settings = settings(
            ScanType::Single,
            false,
            OutputType::SingleFile,
            &blocker.join("out_$(n).png"),
        );

        let partial = rig
            .batch
            .run("dev", &settings, &CancelSignal::new(), &|_| {})
            .await
            .expect_err("output failure");
        match &partial.error {
            ScanwerkError::Output { source } => {
                assert!(matches!(**source, ScanwerkError::OutputWrite { index: 0, .. }))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(partial.value.page_count(), 1);
        assert!(partial.value.saved_files.is_empty());
    }

    #[tokio::test]
    async fn input_and_output_failures_are_both_reported() {
        let rig = rig(false, vec![page(), ScriptStep::Fail("lamp".into())]);
        let blocker = rig.dir.path().join("blocker");
        std::fs::write(&blocker, b"file").expect("write");
        let mut settings = settings(
            ScanType::MultipleWithDelay,
            false,
            OutputType::SingleFile,
            &blocker.join("out.pdf"),
        );
        settings.scan_count = 3;

        let partial = rig
            .batch
            .run("dev", &settings, &CancelSignal::new(), &|_| {})
            .await
            .expect_err("both phases fail");
        match &partial.error {
            ScanwerkError::InputAndOutput { input, output } => {
                assert!(matches!(**input, ScanwerkError::Input { invocation: 2, .. }));
                assert!(matches!(**output, ScanwerkError::OutputWrite { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(partial.error.to_string().starts_with("input failed: "));
        assert_eq!(partial.value.scans.len(), 1);
        assert_eq!(rig.scanner.capture_calls("dev"), 2);
    }

    #[tokio::test]
    async fn failed_input_still_saves_surviving_pages() {
        let corrupt = ScriptStep::Page(RawCapture {
            data: b"garbage".to_vec(),
            format: PageFormat::Png,
            width: 40,
            height: 60,
        });
        let rig = rig(true, vec![page(), corrupt, page()]);
        let target = rig.dir.path().join("out_$(n).pdf");
        let mut settings = settings(ScanType::Single, true, OutputType::SingleFile, &target);
        settings.scan_params.scale_ratio = ScaleRatio::OneToTwo;

        let partial = rig
            .batch
            .run("dev", &settings, &CancelSignal::new(), &|_| {})
            .await
            .expect_err("post-processing failure");
        assert!(matches!(
            partial.error.root(),
            ScanwerkError::PostProcessing { page: 2, .. }
        ));
        assert_eq!(partial.value.page_count(), 2);
        assert_eq!(file_names(&partial.value), vec!["out_1.pdf"]);
        let pdf = PdfReader::open(&partial.value.saved_files[0]).expect("pdf");
        assert_eq!(pdf.page_count(), 2);
    }

    #[tokio::test]
    async fn empty_save_path_is_a_config_error() {
        let rig = rig(false, vec![page()]);
        let settings = settings(ScanType::Single, false, OutputType::SingleFile, Path::new(""));
        let partial = rig
            .batch
            .run("dev", &settings, &CancelSignal::new(), &|_| {})
            .await
            .expect_err("config");
        assert!(matches!(partial.error.root(), ScanwerkError::Config(_)));
    }

    fn stored(page_number: u32) -> CapturedPage {
        CapturedPage {
            page_number,
            path: PathBuf::from(format!("p{page_number}.png")),
            width: 10,
            height: 10,
            byte_size: 0,
            format: PageFormat::Png,
        }
    }

    #[test]
    fn patch_t_separator_groups_by_scan() {
        let scans = vec![
            ScanBatch {
                scan_number: 1,
                pages: vec![stored(1), stored(2)],
            },
            ScanBatch {
                scan_number: 2,
                pages: vec![stored(1)],
            },
        ];
        let settings = BatchSettings {
            output_type: OutputType::MultipleFiles,
            save_separator: SaveSeparator::PatchT,
            ..Default::default()
        };
        let sizes: Vec<usize> = save_targets(&settings, &scans).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 1]);
    }
}
