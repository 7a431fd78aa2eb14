// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — batch document capture.
//
// Entry point. Initialises logging, loads the service configuration, and
// dispatches the requested command.

mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use scanwerk_batch::{BatchScanner, CancelSignal, CapturePipeline};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::human_errors::humanize_error;
use scanwerk_core::{BatchSettings, PaperSize, ProgressUpdate, ServiceConfig};
use tracing::{error, info, warn};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();

    let config = match ServiceConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Some(Commands::Devices) => list_devices(&config),
        Some(Commands::Run {
            device,
            settings,
            paper_size,
        }) => run_batch(&config, &device, &settings, paper_size.as_deref()).await,
        Some(Commands::InitConfig) => match config.save(&args.config) {
            Ok(()) => {
                println!("Configuration written to {}", args.config.display());
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("Error writing configuration: {err}");
                ExitCode::FAILURE
            }
        },
        None => {
            let _ = Cli::command().print_long_help();
            ExitCode::SUCCESS
        }
    }
}

fn list_devices(config: &ServiceConfig) -> ExitCode {
    let port = scanwerk_bridge::capture_port(config);
    match port.list_devices() {
        Ok(devices) if devices.is_empty() => {
            println!("No devices configured. Add folder devices to the configuration file.");
            ExitCode::SUCCESS
        }
        Ok(devices) => {
            for device in devices {
                let caps = &device.capabilities;
                println!(
                    "{:<16} {:<24} feeder={} duplex={}",
                    device.id, device.name, caps.feeder, caps.duplex
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Error listing devices on {}: {err}", port.name());
            ExitCode::FAILURE
        }
    }
}

/// Read a settings document. Scan parameters fall back to the configured
/// defaults when the document leaves them out, and a named paper size from
/// the command line replaces the document's page size.
fn load_settings(
    path: &Path,
    config: &ServiceConfig,
    paper_size: Option<&str>,
) -> Result<BatchSettings> {
    let data = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&data)?;
    let has_params = value.get("scan_params").is_some();
    let mut settings: BatchSettings = serde_json::from_value(value)?;
    if !has_params {
        settings.scan_params = config.default_params.clone();
    }
    if let Some(name) = paper_size {
        settings.scan_params.page_size = PaperSize::from_name(name)
            .ok_or_else(|| ScanwerkError::Config(format!("unknown paper size: {name}")))?;
    }
    Ok(settings)
}

async fn run_batch(
    config: &ServiceConfig,
    device: &str,
    settings_path: &Path,
    paper_size: Option<&str>,
) -> ExitCode {
    let settings = match load_settings(settings_path, config, paper_size) {
        Ok(settings) => settings,
        Err(err) => {
            error!("Error reading batch settings: {err}");
            return ExitCode::FAILURE;
        }
    };

    let port = scanwerk_bridge::capture_port(config);
    let pipeline = Arc::new(CapturePipeline::from_config(port, config));
    let scanner = BatchScanner::new(pipeline);

    let cancel = CancelSignal::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling batch");
            on_ctrl_c.cancel();
        }
    });

    let report = |update: ProgressUpdate| {
        info!(
            stage = ?update.stage,
            scan = update.current_scan,
            page = update.current_page,
            percent = update.percent_complete,
            "{}",
            update.message
        );
    };

    let (result, failure) = match scanner.run(device, &settings, &cancel, &report).await {
        Ok(result) => (result, None),
        Err(partial) => {
            let (result, err) = partial.into_parts();
            (result, Some(err))
        }
    };

    println!(
        "Batch {}: {} scan(s), {} page(s)",
        result.batch_id,
        result.scans.len(),
        result.page_count()
    );
    for path in &result.saved_files {
        println!("  {}", path.display());
    }

    match failure {
        None => ExitCode::SUCCESS,
        Some(err) => {
            let human = humanize_error(&err);
            error!("{err}");
            eprintln!("{}\n{}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}
