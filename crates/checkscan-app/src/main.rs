// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// checkscan: Check scanner utility
//
// Entry point. Initialises logging, loads the scanner configuration, signs in
// to the ledger, captures one feed and uploads it.

mod cli;
mod services;

use std::process::ExitCode;

use clap::Parser;
use checkscan_core::ScannerConfig;
use checkscan_core::error::Result;

use cli::Args;
use services::app_services::{AppServices, print_notice};
use services::data_dir;
use services::replay::{ReplayDriver, load_recordings};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "checkscan starting");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "checkscan failed");
            print_notice(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(data_dir::default_config_path);
    let config = ScannerConfig::load(&config_path)?;
    if args.write_config {
        config.save(&config_path)?;
        println!("configuration written to {}", config_path.display());
        return Ok(());
    }
    config.validate()?;

    let replay = match &args.replay {
        Some(dir) => Some(ReplayDriver::new(&config, load_recordings(dir)?)),
        None => None,
    };

    let services = if args.offline {
        AppServices::offline(config).await?
    } else {
        AppServices::connect(config, args.batch).await?
    };
    if let Some(batch) = services.batch() {
        println!("batch: {} ({})", batch.name, batch.id);
    }

    let summary = services.capture(replay.as_ref(), args.flagged).await?;
    println!(
        "{} captured, {} rejected, {} flagged, {} failed",
        summary.buffered + summary.flagged_accepted,
        summary.rejected,
        summary.flagged_accepted + summary.flagged_discarded,
        summary.failed
    );

    if args.no_upload {
        println!("{} documents left unsent", services.buffer().unuploaded_count());
        return Ok(());
    }
    match services.upload().await? {
        Some(report) => println!("{} of {} documents uploaded", report.uploaded, report.total),
        None => println!("nothing to upload"),
    }
    Ok(())
}
