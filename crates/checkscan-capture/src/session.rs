// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture session: consumes the adapter's event channel and turns events
// into status changes and buffered documents.
//
// The serial reader sees one side per pass. After a front pass the session
// waits for a back scan of that same document; a pass without a routing
// number is then taken as its back, while a pass that does carry a routing
// number is always a new front.

use std::sync::Arc;

use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::{DocId, ImageData, ScannedDocInfo, ScannerConfig, SessionLookups};
use checkscan_device::{DeviceAdapter, EventReceiver, MicrElements, ScanEvent, TransportState};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::assembler::{Assembled, DocumentAssembler};
use crate::buffer::ScanBuffer;
use crate::state::{ScanStateMachine, StatusDescriptor};

/// What happens to a document that fails MICR validation on the serial
/// reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlaggedPolicy {
    /// Park it until `accept_flagged` or `discard_flagged` is called.
    #[default]
    Hold,
    /// Buffer it straight away.
    Accept,
    /// Drop it straight away.
    Discard,
}

/// Where a flagged document ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    Pending,
    Accepted,
    Discarded,
}

/// Outcome of one event, for the operator's display.
#[derive(Debug)]
pub enum SessionUpdate {
    /// Scanner status changed.
    Status(StatusDescriptor),
    /// A document was added to the buffer.
    Buffered(ScannedDocInfo),
    /// A back image was attached to an existing document.
    BackAttached(DocId),
    /// Transport document failed MICR validation; feeding was stopped.
    Rejected {
        doc: ScannedDocInfo,
        warning: CheckscanError,
    },
    /// Serial document failed MICR validation. With `Review::Pending` it
    /// awaits `accept_flagged` or `discard_flagged`.
    Flagged {
        doc: ScannedDocInfo,
        warning: CheckscanError,
        review: Review,
    },
    /// A pass or pocket read could not be turned into a document.
    CaptureFailed(String),
    /// The event produced nothing to show.
    Ignored,
}

/// The document a back pass belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackTarget {
    /// The flagged document in the review slot.
    Parked,
    /// The most recently buffered document.
    Buffered,
    /// A discarded flagged document; its back is dropped too.
    Dropped,
}

/// One scanning session against one device and one buffer.
pub struct CaptureSession {
    device: Arc<dyn DeviceAdapter>,
    assembler: DocumentAssembler,
    machine: ScanStateMachine,
    buffer: ScanBuffer,
    enable_rear_image: bool,
    accepting: bool,
    flagged_policy: FlaggedPolicy,
    awaiting_back: Option<BackTarget>,
    pending_review: Option<ScannedDocInfo>,
}

impl CaptureSession {
    /// Fails if the configured currency or source type is missing from the
    /// session lookups.
    pub fn new(
        device: Arc<dyn DeviceAdapter>,
        buffer: ScanBuffer,
        lookups: &SessionLookups,
        config: &ScannerConfig,
    ) -> Result<Self> {
        let assembler = DocumentAssembler::new(lookups, config)?;
        let machine = ScanStateMachine::new(device.feeder_type());
        Ok(Self {
            device,
            assembler,
            machine,
            buffer,
            enable_rear_image: config.enable_rear_image,
            accepting: true,
            flagged_policy: FlaggedPolicy::Hold,
            awaiting_back: None,
            pending_review: None,
        })
    }

    pub fn with_flagged_policy(mut self, policy: FlaggedPolicy) -> Self {
        self.flagged_policy = policy;
        self
    }

    pub fn buffer(&self) -> &ScanBuffer {
        &self.buffer
    }

    pub fn status(&self) -> &StatusDescriptor {
        self.machine.status()
    }

    pub fn awaiting_back_scan(&self) -> bool {
        self.awaiting_back.is_some()
    }

    pub fn pending_review(&self) -> Option<&ScannedDocInfo> {
        self.pending_review.as_ref()
    }

    /// Connect the device and pick up its feeder type.
    pub fn connect(&mut self) -> Result<()> {
        self.device.connect()?;
        self.machine.set_feeder(self.device.feeder_type());
        Ok(())
    }

    pub fn start_feeding(&self) -> Result<()> {
        self.device.start_feeding()
    }

    pub fn stop_feeding(&self) -> Result<()> {
        self.device.stop_feeding()
    }

    /// Gate serial passes. Passes arriving while not accepting are dropped.
    pub fn set_accepting(&mut self, accepting: bool) {
        self.accepting = accepting;
        self.device.set_accepting(accepting);
    }

    /// Queue the document awaiting review despite its MICR warning.
    pub fn accept_flagged(&mut self) -> Result<Option<DocId>> {
        let Some(doc) = self.pending_review.take() else {
            return Ok(None);
        };
        info!(doc = %doc.id, "flagged document accepted by operator");
        let id = self.buffer.append(doc)?;
        // It is now the last buffered document; a pending back follows it.
        if self.awaiting_back == Some(BackTarget::Parked) {
            self.awaiting_back = Some(BackTarget::Buffered);
        }
        Ok(Some(id))
    }

    /// Drop the document awaiting review. A back pass still expected for it
    /// is dropped when it arrives.
    pub fn discard_flagged(&mut self) -> Option<ScannedDocInfo> {
        let doc = self.pending_review.take()?;
        info!(doc = %doc.id, "flagged document discarded by operator");
        if self.awaiting_back == Some(BackTarget::Parked) {
            self.awaiting_back = Some(BackTarget::Dropped);
        }
        Some(doc)
    }

    /// Process one device event.
    pub fn handle_event(&mut self, event: ScanEvent) -> SessionUpdate {
        if matches!(event, ScanEvent::TransportState { .. }) {
            self.machine.set_feeder(self.device.feeder_type());
        }
        if let Some(status) = self.machine.apply(&event) {
            return SessionUpdate::Status(status);
        }

        match event {
            ScanEvent::DocumentCaptured { front, back, micr_text } => {
                self.on_document_captured(front, back, micr_text.as_deref())
            }
            ScanEvent::MicrDataReceived { elements, image } => self.on_serial_pass(&elements, image),
            ScanEvent::CaptureFailed(detail) => SessionUpdate::CaptureFailed(detail),
            ScanEvent::TransportState { .. } | ScanEvent::DeviceFault(_) => SessionUpdate::Ignored,
        }
    }

    /// Consume events until the device shuts down or every sender is gone.
    /// Flagged documents are settled by the session's flagged policy.
    pub async fn run(mut self, mut events: EventReceiver, updates: mpsc::UnboundedSender<SessionUpdate>) -> Self {
        info!(device = self.device.name(), policy = ?self.flagged_policy, "capture session started");
        while let Some(event) = events.recv().await {
            let shut_down = matches!(
                event,
                ScanEvent::TransportState {
                    state: TransportState::ShutDown,
                    ..
                }
            );
            let update = self.handle_event(event);
            if !matches!(update, SessionUpdate::Ignored) && updates.send(update).is_err() {
                debug!("session update dropped: nobody listening");
            }
            if shut_down {
                break;
            }
        }
        info!(buffered = self.buffer.len(), "capture session ended");
        self
    }

    // -- Internals ------------------------------------------------------------

    #[instrument(skip_all)]
    fn on_document_captured(
        &mut self,
        front: ImageData,
        back: Option<ImageData>,
        micr_text: Option<&str>,
    ) -> SessionUpdate {
        match self.assembler.assemble_transport(front, back, micr_text) {
            Ok(Assembled::Accepted(doc)) => self.enqueue(doc),
            Ok(Assembled::Rejected { doc, warning }) => {
                if let Err(e) = self.device.stop_feeding() {
                    warn!(error = %e, "failed to stop feeding after rejected check");
                }
                SessionUpdate::Rejected { doc, warning }
            }
            Ok(Assembled::Flagged { doc, warning }) => self.flag(doc, warning, false),
            Err(e) => SessionUpdate::CaptureFailed(e.to_string()),
        }
    }

    #[instrument(skip_all, fields(awaiting_back = ?self.awaiting_back))]
    fn on_serial_pass(&mut self, elements: &MicrElements, image: ImageData) -> SessionUpdate {
        if !self.accepting {
            debug!("serial pass ignored: not accepting scans");
            return SessionUpdate::Ignored;
        }

        if self.awaiting_back.is_some() && !elements.routing_number.trim().is_empty() {
            debug!("routing number present; treating pass as a new front");
            self.awaiting_back = None;
        }

        match self.awaiting_back.take() {
            Some(BackTarget::Dropped) => {
                debug!("back of a discarded document dropped");
                return SessionUpdate::Ignored;
            }
            Some(target) => {
                return match self.attach_back(target, image) {
                    Ok(id) => SessionUpdate::BackAttached(id),
                    Err(e) => SessionUpdate::CaptureFailed(e.to_string()),
                };
            }
            None => {}
        }

        match self.assembler.assemble_serial(image, elements) {
            Ok(Assembled::Accepted(doc)) => {
                let update = self.enqueue(doc);
                if self.enable_rear_image && matches!(update, SessionUpdate::Buffered(_)) {
                    self.awaiting_back = Some(BackTarget::Buffered);
                }
                update
            }
            Ok(Assembled::Flagged { doc, warning }) | Ok(Assembled::Rejected { doc, warning }) => {
                self.flag(doc, warning, self.enable_rear_image)
            }
            Err(e) => SessionUpdate::CaptureFailed(e.to_string()),
        }
    }

    /// Park a flagged document, then settle it by policy. With `await_back`
    /// the next back pass goes to this document wherever it ends up.
    fn flag(&mut self, doc: ScannedDocInfo, warning: CheckscanError, await_back: bool) -> SessionUpdate {
        if let Some(previous) = self.pending_review.replace(doc.clone()) {
            warn!(doc = %previous.id, "unreviewed flagged document replaced by a new pass");
        }
        if await_back {
            self.awaiting_back = Some(BackTarget::Parked);
        }

        let review = match self.flagged_policy {
            FlaggedPolicy::Hold => Review::Pending,
            FlaggedPolicy::Accept => match self.accept_flagged() {
                Ok(_) => Review::Accepted,
                Err(e) => return SessionUpdate::CaptureFailed(e.to_string()),
            },
            FlaggedPolicy::Discard => {
                self.discard_flagged();
                Review::Discarded
            }
        };
        SessionUpdate::Flagged { doc, warning, review }
    }

    /// Put a back image on the document the wait was started for.
    fn attach_back(&mut self, target: BackTarget, image: ImageData) -> Result<DocId> {
        match (target, self.pending_review.as_mut()) {
            (BackTarget::Parked, Some(doc)) => {
                if image.is_empty() {
                    return Err(CheckscanError::Buffer("back image is empty".into()));
                }
                doc.back_image = Some(image);
                debug!(doc = %doc.id, "back image attached to flagged document");
                Ok(doc.id)
            }
            (BackTarget::Parked, None) => Err(CheckscanError::Buffer(
                "flagged document was settled before its back arrived".into(),
            )),
            (BackTarget::Buffered, _) => self.buffer.attach_back_to_last(image),
            (BackTarget::Dropped, _) => Err(CheckscanError::Buffer("document was discarded".into())),
        }
    }

    fn enqueue(&mut self, doc: ScannedDocInfo) -> SessionUpdate {
        match self.buffer.append(doc.clone()) {
            Ok(_) => SessionUpdate::Buffered(doc),
            Err(e) => SessionUpdate::CaptureFailed(e.to_string()),
        }
    }
}
