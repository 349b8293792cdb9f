// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background upload of buffered documents to the ledger.
//
// Documents are committed one at a time in capture order; each commit is a
// fixed sequence of ledger calls whose later steps need ids assigned by the
// earlier ones. Any failure ends the run. Records committed before the
// failure stay uploaded; the failing record and everything after it are
// retried from the first step on the next run, so a retried record may leave
// an orphaned binary file from the failed attempt on the ledger.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use checkscan_capture::ScanBuffer;
use checkscan_capture::payload::{PNG_MIME_TYPE, to_png};
use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::{DocId, FinancialBatch, ImageData, ScannedDocInfo, SessionLookups};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::ledger::{BinaryFile, BinaryFileData, FinancialTransaction, FinancialTransactionImage, LedgerClient};

/// Written into every transaction summary.
pub const DEFAULT_APP_INFO: &str = concat!("checkscan ", env!("CARGO_PKG_VERSION"));

/// Reported after each document commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub doc: DocId,
    pub position: usize,
    pub total: usize,
    /// `position * 100 / total`.
    pub percent: usize,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: usize,
    pub total: usize,
}

/// Clears the run-in-progress flag however the run ends.
struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains the scan buffer into the ledger. Clones share the run guard.
#[derive(Clone)]
pub struct UploadCoordinator {
    ledger: Arc<dyn LedgerClient>,
    buffer: ScanBuffer,
    batch: Option<FinancialBatch>,
    binary_file_type_id: i32,
    transaction_type_id: i32,
    app_info: String,
    running: Arc<AtomicBool>,
}

impl UploadCoordinator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        buffer: ScanBuffer,
        lookups: &SessionLookups,
        batch: Option<FinancialBatch>,
    ) -> Self {
        Self {
            ledger,
            buffer,
            batch,
            binary_file_type_id: lookups.binary_file_type_id,
            transaction_type_id: lookups.transaction_type_id,
            app_info: DEFAULT_APP_INFO.to_string(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the application name written into transaction summaries.
    pub fn with_app_info(mut self, app_info: impl Into<String>) -> Self {
        self.app_info = app_info.into();
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start a background run. `None` when nothing is waiting or a run is
    /// already active.
    pub fn trigger(&self, progress: mpsc::UnboundedSender<UploadProgress>) -> Option<JoinHandle<Result<UploadReport>>> {
        if !self.buffer.has_unuploaded() {
            return None;
        }
        let Some(guard) = RunGuard::acquire(&self.running) else {
            debug!("upload already running; trigger ignored");
            return None;
        };
        let this = self.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            this.drain(&progress).await
        }))
    }

    /// Run in the current task. `Ok(None)` when nothing is waiting or a run is
    /// already active.
    pub async fn run_once(&self, progress: &mpsc::UnboundedSender<UploadProgress>) -> Result<Option<UploadReport>> {
        if !self.buffer.has_unuploaded() {
            return Ok(None);
        }
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            return Ok(None);
        };
        self.drain(progress).await.map(Some)
    }

    #[instrument(skip_all)]
    async fn drain(&self, progress: &mpsc::UnboundedSender<UploadProgress>) -> Result<UploadReport> {
        let batch = self.batch.as_ref().ok_or(CheckscanError::NoBatchSelected)?;
        let docs = self.buffer.snapshot_unuploaded();
        let total = docs.len();
        info!(total, batch = batch.id, "upload run started");

        for (index, doc) in docs.iter().enumerate() {
            if let Err(e) = self.commit(doc, batch).await {
                error!(doc = %doc.id, position = index + 1, total, error = %e, "upload run aborted");
                return Err(e);
            }
            self.buffer.mark_uploaded(doc.id)?;

            let position = index + 1;
            let update = UploadProgress {
                doc: doc.id,
                position,
                total,
                percent: position * 100 / total,
            };
            if progress.send(update).is_err() {
                debug!("upload progress dropped: nobody listening");
            }
        }

        info!(uploaded = total, "upload run finished");
        Ok(UploadReport { uploaded: total, total })
    }

    /// The full remote commit for one document.
    #[instrument(skip_all, fields(doc = %doc.id, check = doc.is_check()))]
    async fn commit(&self, doc: &ScannedDocInfo, batch: &FinancialBatch) -> Result<()> {
        let front = self.upload_image(&doc.front_image, 1).await?;
        let back = match &doc.back_image {
            Some(image) => Some(self.upload_image(image, 2).await?),
            None => None,
        };

        let transaction = FinancialTransaction {
            guid: Uuid::new_v4(),
            batch_id: batch.id,
            transaction_code: String::new(),
            summary: format!("Scanned from {}", self.app_info),
            transaction_date_time: batch.batch_start_date_time,
            currency_type_value_id: doc.currency_type.id,
            source_type_value_id: doc.source_type.id,
            transaction_type_value_id: self.transaction_type_id,
            authorized_person_id: None,
            scanned_check_micr: doc.micr.as_ref().map(|m| m.summary()),
            check_micr_encrypted: None,
            ..Default::default()
        };
        self.ledger.create_transaction(&transaction).await?;
        let transaction_id = self.ledger.transaction_by_guid(transaction.guid).await?.id;

        let sides = std::iter::once(front).chain(back);
        for (order, file_guid) in (0..).zip(sides) {
            let binary_file_id = self.ledger.binary_file_by_guid(file_guid).await?.id;
            self.ledger
                .create_transaction_image(&FinancialTransactionImage {
                    binary_file_id,
                    transaction_id,
                    order,
                    ..Default::default()
                })
                .await?;
        }

        debug!(transaction_id, "document committed");
        Ok(())
    }

    /// Create the binary file record and upload its PNG content. Returns the
    /// file's GUID.
    async fn upload_image(&self, image: &ImageData, index: u8) -> Result<Uuid> {
        let data = image.clone();
        let content = tokio::task::spawn_blocking(move || to_png(&data))
            .await
            .map_err(|e| CheckscanError::ImageError(format!("image conversion task failed: {e}")))??;

        let file = BinaryFile {
            guid: Uuid::new_v4(),
            file_name: format!("image{index}_{}.png", Utc::now().format("%Y%m%dT%H%M%S%f")),
            binary_file_type_id: self.binary_file_type_id,
            is_system: false,
            mime_type: PNG_MIME_TYPE.to_string(),
            ..Default::default()
        };
        self.ledger.create_binary_file(&file).await?;

        let id = self.ledger.binary_file_by_guid(file.guid).await?.id;
        self.ledger
            .upload_binary_file_data(&BinaryFileData { id, content })
            .await?;
        Ok(file.guid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLedger;
    use checkscan_core::{BatchStatus, DefinedValue, MicrFields, guids};
    use image::{DynamicImage, GrayImage, ImageFormat, Luma};

    fn png() -> ImageData {
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 4, Luma([255u8])))
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode fixture");
        Arc::from(bytes)
    }

    fn value(id: i32, guid: Uuid) -> DefinedValue {
        DefinedValue {
            id,
            guid,
            value: String::new(),
            description: None,
        }
    }

    fn lookups() -> SessionLookups {
        SessionLookups {
            currency_types: vec![value(11, guids::CURRENCY_TYPE_CHECK)],
            source_types: vec![value(21, Uuid::new_v4())],
            binary_file_type_id: 5,
            transaction_type_id: 53,
        }
    }

    fn batch() -> FinancialBatch {
        FinancialBatch {
            id: 7,
            guid: Uuid::new_v4(),
            name: "Sunday".into(),
            status: BatchStatus::Pending,
            batch_start_date_time: Some(Utc::now()),
            control_amount: 0.0,
            campus_id: None,
        }
    }

    fn check(number: &str, with_back: bool) -> ScannedDocInfo {
        let mut doc = ScannedDocInfo::new(png(), value(11, guids::CURRENCY_TYPE_CHECK), value(21, Uuid::nil()))
            .expect("doc");
        doc.micr = Some(MicrFields {
            routing_number: "123456789".into(),
            account_number: "55501".into(),
            check_number: number.into(),
            recovered: 3,
        });
        doc.back_image = with_back.then(png);
        doc
    }

    fn setup(docs: Vec<ScannedDocInfo>) -> (Arc<InMemoryLedger>, ScanBuffer, UploadCoordinator) {
        let ledger = Arc::new(InMemoryLedger::new(lookups(), Vec::new()));
        let buffer = ScanBuffer::new();
        for doc in docs {
            buffer.append(doc).expect("append");
        }
        let coordinator = UploadCoordinator::new(ledger.clone(), buffer.clone(), &lookups(), Some(batch()));
        (ledger, buffer, coordinator)
    }

    fn micr_order(ledger: &InMemoryLedger) -> Vec<String> {
        ledger
            .transactions()
            .into_iter()
            .filter_map(|t| t.scanned_check_micr)
            .collect()
    }

    #[tokio::test]
    async fn commits_in_capture_order_with_progress() {
        let (ledger, buffer, coordinator) = setup(vec![check("101", true), check("102", false), check("103", false)]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let report = coordinator.run_once(&tx).await.expect("run").expect("ran");
        assert_eq!(report, UploadReport { uploaded: 3, total: 3 });
        assert_eq!(
            micr_order(&ledger),
            vec!["123456789_55501_101", "123456789_55501_102", "123456789_55501_103"]
        );

        let percents: Vec<usize> = std::iter::from_fn(|| rx.try_recv().ok()).map(|p| p.percent).collect();
        assert_eq!(percents, vec![33, 66, 100]);
        assert!(!buffer.has_unuploaded());
    }

    #[tokio::test]
    async fn commit_creates_files_transaction_and_ordered_links() {
        let (ledger, _buffer, coordinator) = setup(vec![check("101", true)]);
        let (tx, _rx) = mpsc::unbounded_channel();
        coordinator.run_once(&tx).await.expect("run");

        let files = ledger.binary_files();
        assert_eq!(files.len(), 2);
        assert!(files[0].file_name.starts_with("image1_"));
        assert!(files[1].file_name.starts_with("image2_"));
        assert!(files.iter().all(|f| f.mime_type == "image/png" && f.binary_file_type_id == 5));
        assert_eq!(ledger.file_data().len(), 2);

        let transaction = &ledger.transactions()[0];
        assert_eq!(transaction.batch_id, 7);
        assert_eq!(transaction.transaction_type_value_id, 53);
        assert_eq!(transaction.currency_type_value_id, 11);
        assert!(transaction.summary.starts_with("Scanned from checkscan"));

        let images = ledger.images();
        assert_eq!(images.len(), 2);
        assert_eq!((images[0].order, images[0].binary_file_id), (0, files[0].id));
        assert_eq!((images[1].order, images[1].binary_file_id), (1, files[1].id));
        assert!(images.iter().all(|i| i.transaction_id == transaction.id));
    }

    #[tokio::test]
    async fn second_run_without_captures_writes_nothing() {
        let (ledger, _buffer, coordinator) = setup(vec![check("101", false), check("102", false)]);
        let (tx, _rx) = mpsc::unbounded_channel();
        coordinator.run_once(&tx).await.expect("first run");
        let writes = ledger.write_count();

        assert_eq!(coordinator.run_once(&tx).await.expect("second run"), None);
        assert!(coordinator.trigger(tx).is_none());
        assert_eq!(ledger.write_count(), writes);
    }

    #[tokio::test]
    async fn failure_keeps_earlier_commits_and_retries_the_rest() {
        let docs = vec![check("101", false), check("102", false), check("103", false)];
        let ids: Vec<DocId> = docs.iter().map(|d| d.id).collect();
        let (ledger, buffer, coordinator) = setup(docs);
        ledger.fail_transaction_call(2);
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(matches!(coordinator.run_once(&tx).await, Err(CheckscanError::Upload(_))));
        let uploaded: Vec<bool> = buffer.snapshot().iter().map(|d| d.uploaded).collect();
        assert_eq!(uploaded, vec![true, false, false]);
        assert!(!coordinator.is_running());

        let report = coordinator.run_once(&tx).await.expect("retry").expect("ran");
        assert_eq!(report.uploaded, 2);
        assert_eq!(
            micr_order(&ledger),
            vec!["123456789_55501_101", "123456789_55501_102", "123456789_55501_103"]
        );
        assert!(buffer.snapshot().iter().all(|d| d.uploaded));
        assert_eq!(buffer.snapshot()[1].id, ids[1]);

        // B's front file was created in the failed attempt and again on retry.
        assert_eq!(ledger.binary_files().len(), 4);
    }

    #[tokio::test]
    async fn concurrent_trigger_is_a_no_op() {
        let (ledger, _buffer, coordinator) = setup(vec![check("101", false)]);
        let (tx, _rx) = mpsc::unbounded_channel();

        let first = coordinator.trigger(tx.clone()).expect("first trigger starts a run");
        assert!(coordinator.is_running());
        assert!(coordinator.trigger(tx).is_none());

        let report = first.await.expect("join").expect("run");
        assert_eq!(report.uploaded, 1);
        assert_eq!(ledger.transactions().len(), 1);
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn missing_batch_is_reported() {
        let ledger = Arc::new(InMemoryLedger::new(lookups(), Vec::new()));
        let buffer = ScanBuffer::new();
        buffer.append(check("101", false)).expect("append");
        let coordinator = UploadCoordinator::new(ledger, buffer, &lookups(), None);
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(matches!(coordinator.run_once(&tx).await, Err(CheckscanError::NoBatchSelected)));
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn cash_documents_post_as_generic_transactions() {
        let mut doc = check("101", false);
        doc.micr = None;
        let (ledger, _buffer, coordinator) = setup(vec![doc]);
        let (tx, _rx) = mpsc::unbounded_channel();
        coordinator.run_once(&tx).await.expect("run");

        assert!(!ledger.transactions()[0].is_scanned_check());
    }
}
