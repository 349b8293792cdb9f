// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use checkscan_capture::FlaggedPolicy;
use clap::{Parser, ValueEnum};

/// What to do with a check whose MICR line failed validation on the serial
/// reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReviewPolicy {
    /// Upload it anyway.
    Accept,
    /// Drop it; the operator rescans.
    Discard,
}

impl From<ReviewPolicy> for FlaggedPolicy {
    fn from(policy: ReviewPolicy) -> Self {
        match policy {
            ReviewPolicy::Accept => FlaggedPolicy::Accept,
            ReviewPolicy::Discard => FlaggedPolicy::Discard,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "checkscan", version, about = "Capture checks from a MICR scanner and upload them to the ledger")]
pub struct Args {
    /// Scanner configuration file (default: config.json in the data directory).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the effective configuration to the config file and exit.
    #[arg(long)]
    pub write_config: bool,

    /// Replay recorded documents from this directory instead of a live scanner.
    #[arg(long, value_name = "DIR")]
    pub replay: Option<PathBuf>,

    /// Ledger batch id to upload into (default: first pending batch).
    #[arg(long)]
    pub batch: Option<i32>,

    /// Run against an in-process ledger; nothing leaves this machine.
    #[arg(long)]
    pub offline: bool,

    /// Handling of serial-reader checks with an unreadable MICR line.
    #[arg(long, value_enum, default_value_t = ReviewPolicy::Discard)]
    pub flagged: ReviewPolicy,

    /// Capture only; leave documents unsent.
    #[arg(long)]
    pub no_upload: bool,
}
