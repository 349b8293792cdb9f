// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Generic scan events. Both adapters translate their vendor callbacks into
// these and push them into a channel; nothing downstream sees a vendor type.

use checkscan_core::ImageData;
use tokio::sync::mpsc;

/// Sending half handed to an adapter at construction.
pub type EventSender = mpsc::UnboundedSender<ScanEvent>;
/// Receiving half consumed by the capture session.
pub type EventReceiver = mpsc::UnboundedReceiver<ScanEvent>;

/// Create the channel that connects an adapter to a capture session.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Transport states reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    StartingUp,
    ReadyToFeed,
    Feeding,
    ShutDown,
}

/// MICR fields located on the serial reader's line, before normalisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MicrElements {
    pub routing_number: String,
    pub account_number: String,
    pub check_number: String,
}

/// One hardware event, in delivery order.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// The transport changed state. `label` is the device's state name in words.
    TransportState {
        state: TransportState,
        label: String,
    },
    /// A document reached the pocket with its images in device memory.
    DocumentCaptured {
        front: ImageData,
        back: Option<ImageData>,
        micr_text: Option<String>,
    },
    /// A document passed through the serial reader.
    MicrDataReceived {
        elements: MicrElements,
        image: ImageData,
    },
    /// A pass was read but its data could not be retrieved.
    CaptureFailed(String),
    /// The hardware reported a failure.
    DeviceFault(String),
}

/// Turn a vendor state name such as `TransportReadyToFeed` into `Ready To Feed`.
pub fn state_label(vendor_name: &str) -> String {
    let trimmed = vendor_name.replace("Transport", "");
    let mut label = String::with_capacity(trimmed.len() + 4);
    for (i, ch) in trimmed.chars().enumerate() {
        if i > 0 && ch.is_uppercase() {
            label.push(' ');
        }
        label.push(ch);
    }
    label
}
