// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adapter for single-item serial MICR/image readers.
//
// Each physical pass raises one callback. The MICR elements are read from the
// driver; the image is only available as a file the driver writes, so it is
// written to a temporary file, read back, and the file removed. The driver
// buffer is cleared after every pass whatever happened.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::{DocumentSide, FeederType, ImageColorType, ImageData, ScannerConfig};
use tracing::{debug, info, instrument, warn};

use crate::event::{EventSender, MicrElements, ScanEvent, TransportState};
use crate::traits::{DeviceAdapter, MicrElement, SerialMicrDriver};

/// Switch settings sent on every connect.
const SWITCH_COMMANDS: [&str; 6] = [
    "SWA 00100010",
    "SWB 00100010",
    "SWC 00100000",
    "HW 00111100",
    "SWE 00000010",
    "SWI 00000000",
];

/// MICR format the element lookup is configured for.
const MICR_FORMAT: &str = "6200";

/// Serial MICR/image reader adapter.
pub struct SerialAdapter {
    driver: Mutex<Box<dyn SerialMicrDriver>>,
    events: EventSender,
    port: u8,
    accepting: AtomicBool,
}

impl SerialAdapter {
    pub fn new(driver: Box<dyn SerialMicrDriver>, config: &ScannerConfig, events: EventSender) -> Self {
        Self {
            driver: Mutex::new(driver),
            events,
            port: config.serial_com_port,
            accepting: AtomicBool::new(true),
        }
    }

    fn driver(&self) -> std::sync::MutexGuard<'_, Box<dyn SerialMicrDriver>> {
        self.driver.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: ScanEvent) {
        if self.events.send(event).is_err() {
            debug!("scan event dropped: no capture session listening");
        }
    }

    fn emit_state(&self, state: TransportState, label: &str) {
        self.emit(ScanEvent::TransportState {
            state,
            label: label.to_string(),
        });
    }

    /// A document passed through the reader.
    #[instrument(skip(self))]
    pub fn on_micr_data_received(&self) {
        let mut driver = self.driver();

        if !self.accepting.load(Ordering::Acquire) {
            debug!("pass ignored: not accepting scans");
            driver.clear_buffer();
            return;
        }

        let elements = MicrElements {
            routing_number: driver.find_element(MicrElement::RoutingNumber),
            account_number: driver.find_element(MicrElement::AccountNumber),
            check_number: driver.find_element(MicrElement::CheckNumber),
        };

        let image = retrieve_image(&mut **driver);
        driver.clear_buffer();
        drop(driver);

        match image {
            Ok(image) => {
                debug!(
                    routing = %elements.routing_number,
                    image_len = image.len(),
                    "serial pass read"
                );
                self.emit(ScanEvent::MicrDataReceived {
                    elements,
                    image: ImageData::from(image),
                });
            }
            Err(e) => {
                warn!(error = %e, "serial pass lost");
                self.emit(ScanEvent::CaptureFailed(e.to_string()));
            }
        }
    }
}

/// Have the driver write the current image to a temporary file and read it back.
/// The file is removed when the handle drops.
fn retrieve_image(driver: &mut dyn SerialMicrDriver) -> Result<Vec<u8>> {
    let file = tempfile::Builder::new()
        .prefix("checkscan_pass_")
        .suffix(".tif")
        .tempfile()?;
    driver.transmit_current_image(file.path())?;

    let bytes = std::fs::read(file.path())?;
    if bytes.is_empty() {
        return Err(CheckscanError::DeviceCommunication("unable to retrieve image".into()));
    }
    file.close()?;
    Ok(bytes)
}

impl DeviceAdapter for SerialAdapter {
    fn name(&self) -> &str {
        "Serial MICR reader"
    }

    fn feeder_type(&self) -> FeederType {
        FeederType::SingleItem
    }

    #[instrument(skip(self), fields(port = self.port))]
    fn connect(&self) -> Result<()> {
        self.emit_state(TransportState::StartingUp, "Connecting");

        let result = (|| {
            let mut driver = self.driver();
            if driver.is_port_open() {
                driver.close_port()?;
            }
            driver.open_port(self.port)?;

            if !driver.dsr_holding() {
                return Err(CheckscanError::DeviceCommunication(format!(
                    "reader is not attached to COM{}",
                    self.port
                )));
            }

            driver.set_micr_timeout(1);
            for command in SWITCH_COMMANDS {
                driver.micr_command(command)?;
            }
            driver.format_change(MICR_FORMAT)?;
            driver.set_micr_timeout(5);

            let version = driver.version()?;
            if version == "-1" {
                return Err(CheckscanError::DeviceCommunication(format!(
                    "reader is not responding on COM{}",
                    self.port
                )));
            }
            Ok(version)
        })();

        match result {
            Ok(version) => {
                info!(%version, "serial reader connected");
                self.emit_state(TransportState::ReadyToFeed, "Connected");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "serial reader connect failed");
                self.emit(ScanEvent::DeviceFault(e.to_string()));
                Err(e)
            }
        }
    }

    fn disconnect(&self) -> Result<()> {
        self.driver().close_port()?;
        self.emit_state(TransportState::ShutDown, "Disconnected");
        Ok(())
    }

    fn start_feeding(&self) -> Result<()> {
        Ok(())
    }

    fn stop_feeding(&self) -> Result<()> {
        Ok(())
    }

    fn get_image(&self, _side: DocumentSide, _color: ImageColorType) -> Result<Vec<u8>> {
        retrieve_image(&mut **self.driver())
    }

    fn get_micr_text(&self) -> Result<String> {
        Ok(self.driver().micr_text())
    }

    fn set_generic_option(&self, _section: &str, key: &str, value: &str) -> Result<()> {
        self.driver().micr_command(&format!("{key} {value}"))
    }

    fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventReceiver, event_channel};
    use crate::sim::{SimPass, SimulatedSerialReader};

    fn adapter_with(passes: Vec<SimPass>) -> (SerialAdapter, SimulatedSerialReader, EventReceiver) {
        let sim = SimulatedSerialReader::new(passes);
        let (tx, rx) = event_channel();
        let config = ScannerConfig {
            serial_com_port: 4,
            ..Default::default()
        };
        let adapter = SerialAdapter::new(Box::new(sim.clone()), &config, tx);
        (adapter, sim, rx)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn connect_sends_switch_settings_and_reports_ready() {
        let (adapter, sim, mut rx) = adapter_with(Vec::new());
        adapter.connect().expect("connect");

        assert_eq!(sim.commands().len(), SWITCH_COMMANDS.len());
        assert_eq!(sim.format().as_deref(), Some(MICR_FORMAT));
        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(ScanEvent::TransportState { state: TransportState::ReadyToFeed, .. })
        ));
    }

    #[test]
    fn missing_reader_is_a_communication_error() {
        let (adapter, sim, mut rx) = adapter_with(Vec::new());
        sim.set_dsr(false);

        let err = adapter.connect().expect_err("no DSR");
        assert!(matches!(err, CheckscanError::DeviceCommunication(ref m) if m.contains("COM4")));
        assert!(matches!(drain(&mut rx).last(), Some(ScanEvent::DeviceFault(_))));
    }

    #[test]
    fn silent_reader_is_a_communication_error() {
        let (adapter, sim, _rx) = adapter_with(Vec::new());
        sim.set_version("-1");
        assert!(matches!(
            adapter.connect(),
            Err(CheckscanError::DeviceCommunication(m)) if m.contains("not responding")
        ));
    }

    #[test]
    fn pass_emits_elements_and_image_then_clears_buffer() {
        let (adapter, sim, mut rx) = adapter_with(vec![SimPass::check("123456789", "55501", "101", vec![9, 9])]);
        sim.advance();
        adapter.on_micr_data_received();

        match rx.try_recv().expect("event") {
            ScanEvent::MicrDataReceived { elements, image } => {
                assert_eq!(elements.routing_number, "123456789");
                assert_eq!(elements.check_number, "101");
                assert_eq!(&*image, &[9, 9]);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(sim.buffer_clears(), 1);
    }

    #[test]
    fn missing_image_fails_the_pass_but_still_clears() {
        let (adapter, sim, mut rx) = adapter_with(vec![SimPass::check("123456789", "1", "2", Vec::new())]);
        sim.advance();
        adapter.on_micr_data_received();

        assert!(matches!(rx.try_recv(), Ok(ScanEvent::CaptureFailed(_))));
        assert_eq!(sim.buffer_clears(), 1);
    }

    #[test]
    fn passes_are_dropped_while_not_accepting() {
        let (adapter, sim, mut rx) = adapter_with(vec![SimPass::check("123456789", "1", "2", vec![1])]);
        adapter.set_accepting(false);
        sim.advance();
        adapter.on_micr_data_received();

        assert!(rx.try_recv().is_err());
        assert_eq!(sim.buffer_clears(), 1);
    }
}
