// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adapter for multi-item auto-feed transports.
//
// The vendor driver calls back on its own thread; the `on_*` methods are the
// callback entry points. Each turns a callback into a `ScanEvent` and never
// touches session state directly.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::{DocumentSide, FeederType, ImageColorType, ImageData, ScannerConfig};
use tracing::{debug, info, instrument, warn};

use crate::event::{EventSender, ScanEvent, TransportState, state_label};
use crate::traits::{DeviceAdapter, TransportDriver};

/// Option section holding the imaging switches.
const OPTIONAL_DEVICES: &str = "OptionalDevices";

/// Auto-feed transport adapter.
pub struct TransportAdapter {
    driver: Mutex<Box<dyn TransportDriver>>,
    events: EventSender,
    color: ImageColorType,
    enable_rear_image: bool,
    enable_double_doc_detection: bool,
    multiple_items: AtomicBool,
}

impl TransportAdapter {
    pub fn new(driver: Box<dyn TransportDriver>, config: &ScannerConfig, events: EventSender) -> Self {
        Self {
            driver: Mutex::new(driver),
            events,
            color: config.image_color_type,
            enable_rear_image: config.enable_rear_image,
            enable_double_doc_detection: config.enable_double_doc_detection,
            multiple_items: AtomicBool::new(false),
        }
    }

    fn driver(&self) -> std::sync::MutexGuard<'_, Box<dyn TransportDriver>> {
        self.driver.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: ScanEvent) {
        if self.events.send(event).is_err() {
            debug!("scan event dropped: no capture session listening");
        }
    }

    // -- Vendor callbacks -----------------------------------------------------

    /// The transport entered a new state.
    pub fn on_transport_new_state(&self, state: TransportState) {
        let label = state_label(&self.driver().transport_state_name());
        debug!(?state, %label, "transport state changed");
        self.emit(ScanEvent::TransportState { state, label });
    }

    /// The transport is ready to accept option changes. Imaging is configured
    /// once, right after start-up.
    pub fn on_change_options_state(&self, previous: TransportState) {
        if previous != TransportState::StartingUp {
            return;
        }
        if let Err(e) = self.configure_imaging() {
            warn!(error = %e, "failed to configure transport imaging");
            self.emit(ScanEvent::DeviceFault(e.to_string()));
        }
    }

    /// A document reached the pocket; both sides are in device memory.
    #[instrument(skip(self))]
    pub fn on_item_in_pocket(&self) {
        match self.read_pocket() {
            Ok(event) => self.emit(event),
            Err(e) => {
                warn!(error = %e, "could not read document in pocket");
                self.emit(ScanEvent::CaptureFailed(e.to_string()));
            }
        }
    }

    /// The driver reported a hardware failure.
    pub fn on_fault(&self, detail: &str) {
        warn!(detail, "transport fault");
        self.emit(ScanEvent::DeviceFault(detail.to_string()));
    }

    // -- Internals ------------------------------------------------------------

    fn configure_imaging(&self) -> Result<()> {
        let mut driver = self.driver();
        driver.set_generic_option(OPTIONAL_DEVICES, "NeedImaging", "True")?;
        driver.set_generic_option("Ranger GUI", "DisplaySplashOncePerDay", "true")?;

        for index in 1..=4 {
            driver.set_generic_option(OPTIONAL_DEVICES, &format!("NeedFrontImage{index}"), "False")?;
            driver.set_generic_option(OPTIONAL_DEVICES, &format!("NeedRearImage{index}"), "False")?;
        }

        let index = self.color.option_index();
        driver.set_generic_option(OPTIONAL_DEVICES, &format!("NeedFrontImage{index}"), "True")?;
        driver.set_generic_option(
            OPTIONAL_DEVICES,
            &format!("NeedRearImage{index}"),
            true_false(self.enable_rear_image),
        )?;
        driver.set_generic_option(
            OPTIONAL_DEVICES,
            "NeedDoubleDocDetection",
            true_false(self.enable_double_doc_detection),
        )?;

        driver.enable_options()?;
        info!(color = ?self.color, rear = self.enable_rear_image, "transport imaging configured");
        Ok(())
    }

    fn read_pocket(&self) -> Result<ScanEvent> {
        let driver = self.driver();
        let front = driver.image_bytes(DocumentSide::Front, self.color)?;
        let back = if self.enable_rear_image {
            let bytes = driver.image_bytes(DocumentSide::Rear, self.color)?;
            (!bytes.is_empty()).then(|| ImageData::from(bytes))
        } else {
            None
        };
        let micr = driver.micr_text(1)?;
        let micr_text = (!micr.trim().is_empty()).then_some(micr);

        debug!(
            front_len = front.len(),
            has_back = back.is_some(),
            has_micr = micr_text.is_some(),
            "document in pocket"
        );
        Ok(ScanEvent::DocumentCaptured {
            front: ImageData::from(front),
            back,
            micr_text,
        })
    }
}

fn true_false(flag: bool) -> &'static str {
    if flag { "True" } else { "False" }
}

impl DeviceAdapter for TransportAdapter {
    fn name(&self) -> &str {
        "Auto-feed transport"
    }

    fn feeder_type(&self) -> FeederType {
        if self.multiple_items.load(Ordering::Acquire) {
            FeederType::MultipleItems
        } else {
            FeederType::SingleItem
        }
    }

    #[instrument(skip(self))]
    fn connect(&self) -> Result<()> {
        let mut driver = self.driver();
        driver
            .start_up()
            .map_err(|e| CheckscanError::DeviceCommunication(format!("transport start-up: {e}")))?;

        let feeder = driver.transport_info("MainHopper", "FeederType")?;
        let multiple = feeder == "MultipleItems";
        self.multiple_items.store(multiple, Ordering::Release);
        info!(feeder = %feeder, "transport started");
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        self.driver().shut_down()
    }

    fn start_feeding(&self) -> Result<()> {
        self.driver().start_feeding()
    }

    fn stop_feeding(&self) -> Result<()> {
        info!("stopping transport feed");
        self.driver().stop_feeding()
    }

    fn get_image(&self, side: DocumentSide, color: ImageColorType) -> Result<Vec<u8>> {
        self.driver().image_bytes(side, color)
    }

    fn get_micr_text(&self) -> Result<String> {
        self.driver().micr_text(1)
    }

    fn set_generic_option(&self, section: &str, key: &str, value: &str) -> Result<()> {
        self.driver().set_generic_option(section, key, value)
    }
}
