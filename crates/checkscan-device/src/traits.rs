// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trait definitions for scanner hardware.
//
// `DeviceAdapter` is the capability set the rest of the pipeline depends on.
// The two driver traits mirror the vendor APIs the adapters are written
// against; a driver is a thin binding, all policy lives in the adapters.

use std::path::Path;

use checkscan_core::error::Result;
use checkscan_core::{DocumentSide, FeederType, ImageColorType};

/// Uniform scanner capability set, regardless of backend.
///
/// Methods take `&self` so one adapter can be shared between the vendor
/// callback thread and the capture session.
pub trait DeviceAdapter: Send + Sync {
    /// Human-readable backend name (e.g. "Auto-feed transport").
    fn name(&self) -> &str;

    /// Feeder type reported by the device. Meaningful after `connect`.
    fn feeder_type(&self) -> FeederType;

    /// Open the device and configure it for capture.
    fn connect(&self) -> Result<()>;

    /// Release the device.
    fn disconnect(&self) -> Result<()>;

    /// Begin feeding documents. Single-item readers are fed by hand and treat
    /// this as a no-op.
    fn start_feeding(&self) -> Result<()>;

    /// Stop feeding after the current item.
    fn stop_feeding(&self) -> Result<()>;

    /// Image of the current document.
    fn get_image(&self, side: DocumentSide, color: ImageColorType) -> Result<Vec<u8>>;

    /// Raw MICR line of the current document.
    fn get_micr_text(&self) -> Result<String>;

    /// Set a vendor option. Used once at start-up to choose image sides and depth.
    fn set_generic_option(&self, section: &str, key: &str, value: &str) -> Result<()>;

    /// Whether passes should currently produce documents. Passes arriving while
    /// not accepting are discarded.
    fn set_accepting(&self, _accepting: bool) {}
}

/// Binding to a multi-item auto-feed transport.
pub trait TransportDriver: Send {
    fn start_up(&mut self) -> Result<()>;

    fn shut_down(&mut self) -> Result<()>;

    /// Query a transport info value, e.g. `("MainHopper", "FeederType")`.
    fn transport_info(&self, section: &str, key: &str) -> Result<String>;

    /// Vendor name of the current state, e.g. `TransportReadyToFeed`.
    fn transport_state_name(&self) -> String;

    fn set_generic_option(&mut self, section: &str, key: &str, value: &str) -> Result<()>;

    /// Apply the options set since start-up.
    fn enable_options(&mut self) -> Result<()>;

    fn start_feeding(&mut self) -> Result<()>;

    fn stop_feeding(&mut self) -> Result<()>;

    /// Copy the image of the document in the pocket out of device memory.
    fn image_bytes(&self, side: DocumentSide, color: ImageColorType) -> Result<Vec<u8>>;

    /// MICR text of the document in the pocket. Line 1 is the check line.
    fn micr_text(&self, line: u32) -> Result<String>;
}

/// MICR line elements the serial reader can locate.
///
/// Routing is found between the transit symbols, account runs up to the
/// on-us symbol, and the check number follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicrElement {
    RoutingNumber,
    AccountNumber,
    CheckNumber,
}

/// Binding to a single-item MICR/image reader on a serial port.
pub trait SerialMicrDriver: Send {
    fn open_port(&mut self, port: u8) -> Result<()>;

    fn close_port(&mut self) -> Result<()>;

    fn is_port_open(&self) -> bool;

    /// DSR line state; low means nothing is attached to the port.
    fn dsr_holding(&self) -> bool;

    fn set_micr_timeout(&mut self, seconds: u32);

    /// Send a raw switch-setting command.
    fn micr_command(&mut self, command: &str) -> Result<()>;

    /// Select the MICR format used by `find_element`.
    fn format_change(&mut self, format: &str) -> Result<()>;

    /// Firmware version; `"-1"` when the reader does not answer.
    fn version(&mut self) -> Result<String>;

    /// Locate one element of the current MICR line. Empty when absent.
    fn find_element(&self, element: MicrElement) -> String;

    /// Raw MICR line of the current pass.
    fn micr_text(&self) -> String;

    /// Write the current pass's image to `path`.
    fn transmit_current_image(&mut self, path: &Path) -> Result<()>;

    /// Drop the current pass and get ready for the next one.
    fn clear_buffer(&mut self);
}
