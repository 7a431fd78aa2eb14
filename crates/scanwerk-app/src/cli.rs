// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use scanwerk_core::config::CONFIG_FILE;

#[derive(Debug, Parser)]
#[command(name = "scanwerk")]
#[command(about = "Batch document capture", long_about = None)]
pub struct Cli {
    /// Service configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the configured capture devices
    Devices,
    /// Run a batch scan from a settings file
    Run {
        /// Device to capture from
        #[arg(long)]
        device: String,
        /// Batch settings (JSON)
        #[arg(long)]
        settings: PathBuf,
        /// Named paper size overriding the settings file (A4, Letter, ...)
        #[arg(long)]
        paper_size: Option<String>,
    },
    /// Write a default configuration file
    InitConfig,
}
