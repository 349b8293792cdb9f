// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner device adapters.
//
// Two hardware families are supported: multi-item auto-feed transports and
// single-item serial MICR/image readers. Both sit behind `DeviceAdapter` and
// report through the same `ScanEvent` channel, so the capture session never
// sees which one is attached.

pub mod event;
pub mod serial;
pub mod sim;
pub mod traits;
pub mod transport;

use std::sync::Arc;

use checkscan_core::config::InterfaceType;
use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::ScannerConfig;
use tracing::info;

pub use event::{EventReceiver, EventSender, MicrElements, ScanEvent, TransportState, event_channel};
pub use serial::SerialAdapter;
pub use traits::{DeviceAdapter, MicrElement, SerialMicrDriver, TransportDriver};
pub use transport::TransportAdapter;

/// Vendor driver bindings available to this build.
#[derive(Default)]
pub struct DriverSet {
    pub transport: Option<Box<dyn TransportDriver>>,
    pub serial: Option<Box<dyn SerialMicrDriver>>,
}

/// Driver bindings linked into this build. Vendor SDKs are not linked, so
/// this is empty and `scanner_device` reports the device as unavailable.
pub fn native_drivers() -> DriverSet {
    DriverSet::default()
}

/// The adapter selected by configuration, kept concrete so the caller can
/// wire the vendor callbacks.
#[derive(Clone)]
pub enum ScannerDevice {
    Transport(Arc<TransportAdapter>),
    Serial(Arc<SerialAdapter>),
}

impl ScannerDevice {
    /// The adapter as the capability set the pipeline uses.
    pub fn adapter(&self) -> Arc<dyn DeviceAdapter> {
        match self {
            Self::Transport(a) => a.clone(),
            Self::Serial(a) => a.clone(),
        }
    }
}

/// Build the adapter for the configured interface type from the given drivers.
pub fn scanner_device(config: &ScannerConfig, mut drivers: DriverSet, events: EventSender) -> Result<ScannerDevice> {
    let device = match config.interface_type {
        InterfaceType::Transport => {
            let driver = drivers
                .transport
                .take()
                .ok_or_else(|| CheckscanError::DeviceCommunication("no transport driver available".into()))?;
            ScannerDevice::Transport(Arc::new(TransportAdapter::new(driver, config, events)))
        }
        InterfaceType::SerialMicr => {
            let driver = drivers
                .serial
                .take()
                .ok_or_else(|| CheckscanError::DeviceCommunication("no serial MICR driver available".into()))?;
            ScannerDevice::Serial(Arc::new(SerialAdapter::new(driver, config, events)))
        }
    };
    info!(interface = ?config.interface_type, adapter = device.adapter().name(), "scanner adapter selected");
    Ok(device)
}
