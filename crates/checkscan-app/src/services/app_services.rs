// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer. Signs in to the ledger, loads the session lookups,
// picks the batch, and runs the capture and upload stages against one shared
// scan buffer.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use checkscan_capture::{CaptureSession, Review, ScanBuffer, SessionUpdate};
use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::human_errors::humanize_error;
use checkscan_core::{BatchStatus, DefinedValue, FinancialBatch, ScannerConfig, SessionLookups, guids};
use checkscan_device::{event_channel, native_drivers, scanner_device};
use checkscan_upload::{InMemoryLedger, LedgerClient, RestLedgerClient, UploadCoordinator, UploadReport, load_session_lookups};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::replay::ReplayDriver;
use crate::cli::ReviewPolicy;

/// Counts from one capture pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub buffered: usize,
    pub backs_attached: usize,
    pub rejected: usize,
    pub flagged_accepted: usize,
    pub flagged_discarded: usize,
    pub flagged_pending: usize,
    pub failed: usize,
}

impl CaptureSummary {
    /// Count one session update and show it to the operator.
    fn record(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::Status(status) => println!("scanner: {}", status.label),
            SessionUpdate::Buffered(doc) => {
                self.buffered += 1;
                match &doc.micr {
                    Some(micr) => println!("captured check {}", micr.summary()),
                    None => println!("captured {}", doc.currency_type.value),
                }
            }
            SessionUpdate::BackAttached(_) => self.backs_attached += 1,
            SessionUpdate::Rejected { warning, .. } => {
                self.rejected += 1;
                print_notice(&warning);
            }
            SessionUpdate::Flagged { warning, review, .. } => {
                print_notice(&warning);
                match review {
                    Review::Accepted => self.flagged_accepted += 1,
                    Review::Discarded => self.flagged_discarded += 1,
                    Review::Pending => self.flagged_pending += 1,
                }
            }
            SessionUpdate::CaptureFailed(detail) => {
                self.failed += 1;
                warn!(%detail, "capture failed");
            }
            SessionUpdate::Ignored => {}
        }
    }
}

/// Shared application services for one scanning session.
///
/// All fields are cheaply cloneable (Arc-wrapped or handle types).
#[derive(Clone)]
pub struct AppServices {
    config: Arc<ScannerConfig>,
    lookups: Arc<SessionLookups>,
    batch: Option<FinancialBatch>,
    buffer: ScanBuffer,
    uploader: UploadCoordinator,
}

impl AppServices {
    /// Sign in to the ledger named in `config` and prepare the session.
    pub async fn connect(config: ScannerConfig, batch_id: Option<i32>) -> Result<Self> {
        let client = RestLedgerClient::new(
            &config.ledger_base_url,
            Duration::from_secs(config.connect_timeout_secs),
        )?;
        client.login(&config.username, &config.password).await?;
        Self::init(config, Arc::new(client), batch_id).await
    }

    /// Prepare the session against an in-process ledger with one open batch.
    pub async fn offline(config: ScannerConfig) -> Result<Self> {
        let ledger = InMemoryLedger::new(offline_lookups(&config), vec![offline_batch()]);
        Self::init(config, Arc::new(ledger), None).await
    }

    /// Load lookups and pending batches through `ledger`.
    #[instrument(skip_all)]
    pub async fn init(config: ScannerConfig, ledger: Arc<dyn LedgerClient>, batch_id: Option<i32>) -> Result<Self> {
        let lookups = load_session_lookups(ledger.as_ref()).await?;
        let batches = ledger.pending_batches().await?;
        let batch = select_batch(batches, batch_id);
        match &batch {
            Some(b) => info!(batch = b.id, name = %b.name, "batch selected"),
            None => warn!(requested = ?batch_id, "no pending batch selected; uploads will be refused"),
        }

        let buffer = ScanBuffer::new();
        let uploader = UploadCoordinator::new(ledger, buffer.clone(), &lookups, batch.clone());
        Ok(Self {
            config: Arc::new(config),
            lookups: Arc::new(lookups),
            batch,
            buffer,
            uploader,
        })
    }

    pub fn buffer(&self) -> &ScanBuffer {
        &self.buffer
    }

    pub fn batch(&self) -> Option<&FinancialBatch> {
        self.batch.as_ref()
    }

    // -- Capture ---------------------------------------------------------------

    /// Run one capture pass until the device shuts down. With `replay` the
    /// recorded documents are played through simulated drivers; without it
    /// the native drivers are used.
    #[instrument(skip_all)]
    pub async fn capture(&self, replay: Option<&ReplayDriver>, policy: ReviewPolicy) -> Result<CaptureSummary> {
        let (events_tx, events) = event_channel();
        let drivers = replay.map_or_else(native_drivers, ReplayDriver::drivers);
        let device = scanner_device(&self.config, drivers, events_tx)?;

        let mut session = CaptureSession::new(device.adapter(), self.buffer.clone(), &self.lookups, &self.config)?
            .with_flagged_policy(policy.into());
        session.connect()?;
        if let Some(replay) = replay {
            replay.play(&device)?;
        }

        let (updates_tx, mut updates) = mpsc::unbounded_channel();
        let report = async move {
            let mut summary = CaptureSummary::default();
            while let Some(update) = updates.recv().await {
                summary.record(update);
            }
            summary
        };
        let (_session, summary) = tokio::join!(session.run(events, updates_tx), report);

        info!(?summary, "capture finished");
        Ok(summary)
    }

    // -- Upload ----------------------------------------------------------------

    /// Upload everything not yet sent, reporting progress as it goes.
    /// `Ok(None)` when there was nothing to send.
    pub async fn upload(&self) -> Result<Option<UploadReport>> {
        let (progress_tx, mut progress) = mpsc::unbounded_channel();
        let Some(run) = self.uploader.trigger(progress_tx) else {
            info!("nothing to upload");
            return Ok(None);
        };
        while let Some(update) = progress.recv().await {
            println!("uploaded {}/{} ({}%)", update.position, update.total, update.percent);
        }
        let report = run
            .await
            .map_err(|e| CheckscanError::Upload(format!("upload task failed: {e}")))??;
        Ok(Some(report))
    }
}

/// Print an error the way the operator should see it.
pub fn print_notice(err: &CheckscanError) {
    let notice = humanize_error(err);
    println!("{}\n  {}", notice.message, notice.suggestion);
}

/// The batch with `id`, or the first pending batch when no id is given.
pub fn select_batch(batches: Vec<FinancialBatch>, id: Option<i32>) -> Option<FinancialBatch> {
    match id {
        Some(id) => batches.into_iter().find(|b| b.id == id),
        None => batches.into_iter().next(),
    }
}

fn offline_value(id: i32, guid: Uuid, value: &str) -> DefinedValue {
    DefinedValue {
        id,
        guid,
        value: value.into(),
        description: None,
    }
}

/// Lookups for offline runs: check and cash currencies, the configured source
/// type, and fixed file/transaction type ids.
pub fn offline_lookups(config: &ScannerConfig) -> SessionLookups {
    SessionLookups {
        currency_types: vec![
            offline_value(1, guids::CURRENCY_TYPE_CHECK, "Check"),
            offline_value(2, guids::CURRENCY_TYPE_CASH, "Cash"),
        ],
        source_types: vec![offline_value(10, config.source_type_value_guid, "Scanned")],
        binary_file_type_id: 5,
        transaction_type_id: 53,
    }
}

fn offline_batch() -> FinancialBatch {
    FinancialBatch {
        id: 1,
        guid: Uuid::new_v4(),
        name: "Offline".into(),
        status: BatchStatus::Pending,
        batch_start_date_time: Some(Utc::now()),
        control_amount: 0.0,
        campus_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::replay::load_recordings;
    use checkscan_core::config::InterfaceType;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma};

    fn png() -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 3, Luma([255u8])))
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode fixture");
        bytes
    }

    fn batch(id: i32) -> FinancialBatch {
        FinancialBatch {
            id,
            name: format!("batch {id}"),
            ..offline_batch()
        }
    }

    fn recordings(micr: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for (i, line) in micr.iter().enumerate() {
            std::fs::write(dir.path().join(format!("{i:04}-front.png")), png()).expect("front");
            std::fs::write(dir.path().join(format!("{i:04}-back.png")), png()).expect("back");
            std::fs::write(dir.path().join(format!("{i:04}.micr")), line).expect("micr");
        }
        dir
    }

    #[test]
    fn batch_is_chosen_by_id_or_first() {
        let batches = vec![batch(3), batch(8)];
        assert_eq!(select_batch(batches.clone(), Some(8)).map(|b| b.id), Some(8));
        assert_eq!(select_batch(batches.clone(), None).map(|b| b.id), Some(3));
        assert!(select_batch(batches, Some(99)).is_none());
    }

    #[tokio::test]
    async fn without_drivers_capture_reports_the_device_missing() {
        let services = AppServices::offline(ScannerConfig::default()).await.expect("services");
        assert!(matches!(
            services.capture(None, ReviewPolicy::Discard).await,
            Err(CheckscanError::DeviceCommunication(_))
        ));
    }

    #[tokio::test]
    async fn transport_replay_captures_and_uploads() {
        let config = ScannerConfig::default();
        let dir = recordings(&["123456789c55501d101", "123456789c55501d102"]);
        let replay = ReplayDriver::new(&config, load_recordings(dir.path()).expect("load"));
        let services = AppServices::offline(config).await.expect("services");

        let summary = services.capture(Some(&replay), ReviewPolicy::Discard).await.expect("capture");
        assert_eq!(summary.buffered, 2);
        assert!(services.buffer().snapshot().iter().all(|d| d.back_image.is_some()));

        let report = services.upload().await.expect("upload").expect("ran");
        assert_eq!(report.uploaded, 2);
        assert_eq!(services.upload().await.expect("second upload"), None);
    }

    #[tokio::test]
    async fn serial_replay_applies_the_review_policy() {
        let config = ScannerConfig {
            interface_type: InterfaceType::SerialMicr,
            ..Default::default()
        };
        let dir = recordings(&["123456789c55501d101", "12345c55501d102"]);
        let replay = ReplayDriver::new(&config, load_recordings(dir.path()).expect("load"));
        let services = AppServices::offline(config).await.expect("services");

        let summary = services.capture(Some(&replay), ReviewPolicy::Accept).await.expect("capture");
        assert_eq!(summary.buffered, 1);
        assert_eq!(summary.flagged_accepted, 1);
        assert_eq!(summary.backs_attached, 2);
        assert_eq!(services.buffer().len(), 2);
    }

    #[tokio::test]
    async fn discarded_check_takes_its_back_with_it() {
        let config = ScannerConfig {
            interface_type: InterfaceType::SerialMicr,
            ..Default::default()
        };
        let dir = recordings(&["12345c55501d101", "123456789c55501d102"]);
        let replay = ReplayDriver::new(&config, load_recordings(dir.path()).expect("load"));
        let services = AppServices::offline(config).await.expect("services");

        let summary = services.capture(Some(&replay), ReviewPolicy::Discard).await.expect("capture");
        assert_eq!(summary.flagged_discarded, 1);
        assert_eq!(summary.buffered, 1);
        assert_eq!(summary.backs_attached, 1);
        assert_eq!(summary.failed, 0);

        let docs = services.buffer().snapshot();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].check_number(), "102");
        assert!(docs[0].back_image.is_some());
    }
}
