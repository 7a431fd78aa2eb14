// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture pipeline — one scan invocation.
//
// The capture loop pulls pages from the device one at a time. Each page is
// handed to a bounded pool of post-processing workers straight away, so the
// device keeps feeding while earlier pages are written and transformed. The
// pool is a semaphore (one permit per worker) plus a `JoinSet` that serves as
// the drain barrier before the invocation returns.
//
// Feeder rules: a failure on the first call is fatal; a failure on any later
// call means the feeder ran dry, unless the device reports an explicit fault.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scanwerk_bridge::CapturePort;
use scanwerk_core::error::{Partial, Result, ScanwerkError};
use scanwerk_core::{
    BatchId, CaptureOutcome, CapturedPage, DeviceCapabilities, PageFormat, ProgressUpdate,
    RawCapture, ScanBatch, ScanParameters, ServiceConfig, mm_to_pixels,
};
use scanwerk_document::{PostProcessor, Processed};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelSignal;
use crate::progress::{self, ProgressPhase, ProgressSnapshot};
use crate::registry::{DeviceRegistry, DeviceState};
use crate::validation::validate_parameters;

/// Where an invocation sits within its batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationContext {
    pub batch_id: BatchId,
    /// 1-based invocation number.
    pub scan_number: u32,
    /// Planned invocations, `None` when open-ended.
    pub total_scans: Option<u32>,
}

type Joined = std::result::Result<(Id, Result<Processed>), JoinError>;

/// Runs capture invocations against one capture port.
pub struct CapturePipeline {
    port: Arc<dyn CapturePort>,
    registry: Arc<DeviceRegistry>,
    working_dir: PathBuf,
    workers: usize,
}

impl CapturePipeline {
    pub fn new(port: Arc<dyn CapturePort>, working_dir: impl Into<PathBuf>, workers: usize) -> Self {
        Self {
            port,
            registry: Arc::new(DeviceRegistry::new()),
            working_dir: working_dir.into(),
            workers: workers.max(1),
        }
    }

    pub fn from_config(port: Arc<dyn CapturePort>, config: &ServiceConfig) -> Self {
        Self::new(port, config.working_dir.clone(), config.worker_count())
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Current state of a device, `None` if it has never been used.
    pub fn device_status(&self, device_id: &str) -> Option<DeviceState> {
        self.registry.status(device_id)
    }

    /// Run one capture invocation.
    ///
    /// Returns the surviving pages in capture order. On failure the pages that
    /// did finish are returned alongside the error.
    #[instrument(
        skip(self, params, ctx, cancel, progress),
        fields(batch_id = %ctx.batch_id, scan = ctx.scan_number, feeder = params.use_feeder)
    )]
    pub async fn capture_one(
        &self,
        device_id: &str,
        params: &ScanParameters,
        ctx: &InvocationContext,
        cancel: &CancelSignal,
        progress: &(dyn Fn(ProgressUpdate) + Send + Sync),
    ) -> std::result::Result<ScanBatch, Partial<ScanBatch>> {
        let empty = || ScanBatch::new(ctx.scan_number);

        let lease = self
            .registry
            .acquire(device_id)
            .map_err(|err| Partial::new(empty(), err))?;

        let caps = self
            .device_capabilities(device_id)
            .await
            .map_err(|err| Partial::new(empty(), err))?;
        let report = validate_parameters(params, caps.as_ref());
        for warning in &report.warnings {
            warn!(device = device_id, "{warning}");
        }
        report
            .into_result()
            .map_err(|err| Partial::new(empty(), err))?;

        tokio::fs::create_dir_all(&self.working_dir)
            .await
            .map_err(|err| Partial::new(empty(), err.into()))?;

        let max_width_px = caps
            .as_ref()
            .filter(|c| c.max_width_mm > 0)
            .map(|c| mm_to_pixels(c.max_width_mm, params.resolution));
        let area = params.scan_area(max_width_px);
        let shared_params = Arc::new(params.clone());
        let processor = Arc::new(PostProcessor::new(params.clone()));
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut workers: JoinSet<Result<Processed>> = JoinSet::new();
        let mut task_pages: HashMap<Id, u32> = HashMap::new();

        let total_pages = match (params.use_feeder, params.page_count) {
            (false, _) => Some(1),
            (true, 0) => None,
            (true, limit) => Some(limit),
        };
        let emit = |phase: ProgressPhase, current_page: u32, message: String| {
            progress(progress::report(&ProgressSnapshot {
                phase,
                current_scan: ctx.scan_number,
                total_scans: ctx.total_scans,
                current_page,
                total_pages,
                message,
            }));
        };

        info!(
            device = device_id,
            width_px = area.width_px,
            height_px = area.height_px,
            x_offset_px = area.x_offset_px,
            "Starting capture invocation"
        );

        // -- Capture loop ---------------------------------------------------

        let mut captured: u32 = 0;
        let mut calls: u32 = 0;
        let mut capture_error: Option<ScanwerkError> = None;
        let mut abandoned_call: Option<JoinHandle<Result<CaptureOutcome>>> = None;
        let scanning_message = |page: u32| {
            if ctx.total_scans == Some(1) {
                format!("Scanning page {page}")
            } else {
                format!("Scanning page {page} of scan {}", ctx.scan_number)
            }
        };

        loop {
            if params.use_feeder && params.page_count > 0 && captured >= params.page_count {
                debug!(limit = params.page_count, "Page limit reached");
                break;
            }

            emit(ProgressPhase::Capturing, captured, scanning_message(captured + 1));

            if cancel.is_cancelled() {
                capture_error = Some(ScanwerkError::Cancelled);
                break;
            }

            calls += 1;
            let port = Arc::clone(&self.port);
            let device = device_id.to_string();
            let call_params = Arc::clone(&shared_params);
            let mut call =
                tokio::task::spawn_blocking(move || port.capture(&device, &call_params, &area));

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.cancel_device(device_id).await;
                    abandoned_call = Some(call);
                    capture_error = Some(ScanwerkError::Cancelled);
                    break;
                }
                joined = &mut call => joined.unwrap_or_else(|err| {
                    Err(ScanwerkError::Capture(format!("capture task failed: {err}")))
                }),
            };

            match outcome {
                Ok(CaptureOutcome::Page(raw)) => {
                    captured += 1;
                    lease.record_page();
                    let page_number = captured;
                    debug!(page = page_number, bytes = raw.data.len(), "Page captured");
                    emit(
                        ProgressPhase::Capturing,
                        captured,
                        format!("Captured page {page_number}"),
                    );

                    let permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            capture_error = Some(ScanwerkError::Cancelled);
                            break;
                        }
                        permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => {
                                capture_error = Some(ScanwerkError::Capture(
                                    "post-processing pool closed".into(),
                                ));
                                break;
                            }
                        },
                    };

                    let path = self
                        .working_dir
                        .join(page_file_name(ctx, page_number, raw.format));
                    let processor = Arc::clone(&processor);
                    let handle = workers.spawn_blocking(move || {
                        let _permit = permit;
                        store_page(page_number, &path, raw).and_then(|page| processor.process(page))
                    });
                    task_pages.insert(handle.id(), page_number);
                }
                Ok(CaptureOutcome::SourceExhausted) => {
                    debug!(calls, "Source exhausted");
                    break;
                }
                Err(err) if calls == 1 => {
                    capture_error = Some(match err {
                        ScanwerkError::DeviceBusy(_)
                        | ScanwerkError::DeviceNotFound(_)
                        | ScanwerkError::DeviceFault(_) => err,
                        other => ScanwerkError::FirstPageCapture {
                            device: device_id.to_string(),
                            detail: other.to_string(),
                        },
                    });
                    break;
                }
                Err(err @ ScanwerkError::DeviceFault(_)) => {
                    capture_error = Some(err);
                    break;
                }
                Err(err) => {
                    info!(call = calls, error = %err, "Feeder stopped, ending invocation");
                    break;
                }
            }

            if !params.use_feeder {
                break;
            }
        }

        // -- Drain ------------------------------------------------------------

        let submitted = workers.len() as u32;
        let mut finished: u32 = 0;
        let mut kept: Vec<CapturedPage> = Vec::with_capacity(workers.len());
        let mut processing_error: Option<ScanwerkError> = None;

        let mut stopping = false;

        loop {
            let joined = if stopping {
                workers.join_next_with_id().await
            } else {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        // Workers already running on the blocking pool cannot be
                        // aborted. They are still joined so every page file they
                        // write ends up in the returned batch.
                        workers.abort_all();
                        stopping = true;
                        capture_error.get_or_insert(ScanwerkError::Cancelled);
                        continue;
                    }
                    joined = workers.join_next_with_id() => joined,
                }
            };
            let Some(joined) = joined else {
                break;
            };
            absorb(joined, &task_pages, &mut kept, &mut processing_error);
            finished += 1;
            if !stopping {
                emit(
                    ProgressPhase::Draining {
                        finished,
                        submitted,
                    },
                    finished,
                    format!("Processed {finished} of {submitted} pages"),
                );
            }
        }

        kept.sort_by_key(|page| page.page_number);
        let batch = ScanBatch {
            scan_number: ctx.scan_number,
            pages: kept,
        };

        let outcome = match capture_error.or(processing_error) {
            None => {
                info!(captured, kept = batch.len(), "Capture invocation complete");
                Ok(batch)
            }
            Some(err) => {
                lease.record_error(&err);
                warn!(captured, kept = batch.len(), error = %err, "Capture invocation failed");
                Err(Partial::new(batch, err))
            }
        };

        // The device stays leased until a capture abandoned on cancel returns.
        if let Some(call) = abandoned_call {
            debug!(device = device_id, "Holding device until the abandoned capture returns");
            tokio::spawn(async move {
                if let Ok(Ok(CaptureOutcome::Page(_))) = call.await {
                    debug!("Discarding page from abandoned capture");
                }
                drop(lease);
            });
        }

        outcome
    }

    /// Capabilities reported for `device_id`. `None` when the port cannot
    /// list its devices; `DeviceNotFound` when the listing omits the device.
    async fn device_capabilities(&self, device_id: &str) -> Result<Option<DeviceCapabilities>> {
        let port = Arc::clone(&self.port);
        let listing = tokio::task::spawn_blocking(move || port.list_devices())
            .await
            .map_err(|err| ScanwerkError::Capture(format!("device listing task failed: {err}")))?;
        match listing {
            Ok(devices) => devices
                .into_iter()
                .find(|d| d.id == device_id)
                .map(|d| Some(d.capabilities))
                .ok_or_else(|| ScanwerkError::DeviceNotFound(device_id.to_string())),
            Err(err) => {
                warn!(error = %err, "Device listing failed, skipping capability checks");
                Ok(None)
            }
        }
    }

    /// Best-effort device cancel after an in-flight capture was abandoned.
    async fn cancel_device(&self, device_id: &str) {
        let port = Arc::clone(&self.port);
        let device = device_id.to_string();
        match tokio::task::spawn_blocking(move || port.cancel(&device)).await {
            Ok(Ok(())) => info!(device = device_id, "Device capture cancelled"),
            Ok(Err(err)) => warn!(device = device_id, error = %err, "Device cancel failed"),
            Err(err) => warn!(device = device_id, error = %err, "Device cancel task failed"),
        }
    }
}

fn page_file_name(ctx: &InvocationContext, page_number: u32, format: PageFormat) -> String {
    format!(
        "{}_s{:03}_p{:04}.{}",
        ctx.batch_id,
        ctx.scan_number,
        page_number,
        format.extension()
    )
}

/// Write the captured bytes to the working directory.
fn store_page(page_number: u32, path: &Path, raw: RawCapture) -> Result<CapturedPage> {
    std::fs::write(path, &raw.data).map_err(|err| ScanwerkError::PostProcessing {
        page: page_number,
        detail: format!("failed to store page at {}: {err}", path.display()),
    })?;
    Ok(CapturedPage {
        page_number,
        path: path.to_path_buf(),
        width: raw.width,
        height: raw.height,
        byte_size: raw.data.len() as u64,
        format: raw.format,
    })
}

/// Fold one finished worker into the results. Only the first failure is kept;
/// later ones are logged.
fn absorb(
    joined: Joined,
    task_pages: &HashMap<Id, u32>,
    kept: &mut Vec<CapturedPage>,
    first_error: &mut Option<ScanwerkError>,
) {
    let failure = match joined {
        Ok((_, Ok(Processed::Kept(page)))) => {
            kept.push(page);
            return;
        }
        Ok((id, Ok(Processed::Dropped))) => {
            debug!(page = task_pages.get(&id).copied(), "Page dropped");
            return;
        }
        Ok((_, Err(err))) => err,
        Err(err) if err.is_cancelled() => {
            debug!(page = task_pages.get(&err.id()).copied(), "Page discarded before processing");
            return;
        }
        Err(err) => ScanwerkError::PostProcessing {
            page: task_pages.get(&err.id()).copied().unwrap_or_default(),
            detail: format!("post-processing worker failed: {err}"),
        },
    };
    if first_error.is_none() {
        *first_error = Some(failure);
    } else {
        warn!(error = %failure, "Additional post-processing failure");
    }
}
