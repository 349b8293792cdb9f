// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner connection state and the status shown to the operator.
//
// `transition` is a pure function of (state, event, feeder). Only transport
// state events and device faults move the state; document events leave it
// alone. `Error` is left only when the device starts up again.

use checkscan_core::FeederType;
use checkscan_device::{ScanEvent, TransportState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Connection and feed state of the attached scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScannerState {
    Disconnected,
    Connecting,
    Ready,
    Feeding,
    Error,
}

impl ScannerState {
    /// Status indicator color.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Ready => "limegreen",
            Self::Disconnected => "red",
            Self::Feeding => "blue",
            Self::Connecting => "yellow",
            Self::Error => "white",
        }
    }

    fn default_label(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Ready => "Ready",
            Self::Feeding => "Feeding",
            Self::Error => "Error",
        }
    }
}

/// What the operator sees for the current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDescriptor {
    pub state: ScannerState,
    pub color: String,
    /// Tooltip text, e.g. "Ready To Feed".
    pub label: String,
    pub can_connect: bool,
    pub can_scan: bool,
    pub can_finish: bool,
    /// Start/stop button caption.
    pub scan_button: String,
}

impl StatusDescriptor {
    /// Describe `state`, using `label` as the tooltip when the device gave one.
    pub fn describe(state: ScannerState, feeder: FeederType, label: Option<&str>) -> Self {
        let scan_button = match (state, feeder) {
            (ScannerState::Feeding, _) => "Stop",
            (_, FeederType::MultipleItems) => "Scan",
            (_, FeederType::SingleItem) => "Scan Check",
        };
        Self {
            state,
            color: state.color().to_string(),
            label: label.unwrap_or(state.default_label()).to_string(),
            can_connect: matches!(state, ScannerState::Disconnected | ScannerState::Error),
            can_scan: matches!(state, ScannerState::Ready | ScannerState::Feeding),
            can_finish: state != ScannerState::Feeding,
            scan_button: scan_button.to_string(),
        }
    }
}

/// Next state and status for `event` arriving in `state`.
pub fn transition(state: ScannerState, event: &ScanEvent, feeder: FeederType) -> (ScannerState, StatusDescriptor) {
    let (next, label) = match event {
        ScanEvent::TransportState { state: device, label } => {
            let next = match (state, device) {
                (_, TransportState::StartingUp) => ScannerState::Connecting,
                (ScannerState::Error, _) => ScannerState::Error,
                (_, TransportState::ReadyToFeed) => ScannerState::Ready,
                (_, TransportState::Feeding) => ScannerState::Feeding,
                (_, TransportState::ShutDown) => ScannerState::Disconnected,
            };
            let label = (next != ScannerState::Error).then_some(label.as_str());
            (next, label)
        }
        ScanEvent::DeviceFault(detail) => (ScannerState::Error, Some(detail.as_str())),
        ScanEvent::DocumentCaptured { .. } | ScanEvent::MicrDataReceived { .. } | ScanEvent::CaptureFailed(_) => {
            (state, None)
        }
    };
    (next, StatusDescriptor::describe(next, feeder, label))
}

/// Holds the current state and reports status changes.
#[derive(Debug, Clone)]
pub struct ScanStateMachine {
    feeder: FeederType,
    status: StatusDescriptor,
}

impl ScanStateMachine {
    pub fn new(feeder: FeederType) -> Self {
        Self {
            feeder,
            status: StatusDescriptor::describe(ScannerState::Disconnected, feeder, None),
        }
    }

    pub fn state(&self) -> ScannerState {
        self.status.state
    }

    pub fn status(&self) -> &StatusDescriptor {
        &self.status
    }

    /// The feeder type is only known once the device has connected.
    pub fn set_feeder(&mut self, feeder: FeederType) {
        self.feeder = feeder;
        self.status = StatusDescriptor::describe(self.status.state, feeder, Some(self.status.label.as_str()));
    }

    /// Apply one event. Returns the new status when the state changed or the
    /// device reported a new label.
    pub fn apply(&mut self, event: &ScanEvent) -> Option<StatusDescriptor> {
        let (next, status) = transition(self.status.state, event, self.feeder);
        if next == self.status.state && !matches!(event, ScanEvent::TransportState { .. } | ScanEvent::DeviceFault(_)) {
            return None;
        }
        if next != self.status.state {
            info!(from = ?self.status.state, to = ?next, "scanner state changed");
        } else {
            debug!(state = ?next, label = %status.label, "scanner status refreshed");
        }
        self.status = status.clone();
        Some(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(state: TransportState, label: &str) -> ScanEvent {
        ScanEvent::TransportState {
            state,
            label: label.into(),
        }
    }

    #[test]
    fn normal_session_walks_through_the_states() {
        let mut machine = ScanStateMachine::new(FeederType::MultipleItems);
        assert_eq!(machine.state(), ScannerState::Disconnected);

        let steps = [
            (TransportState::StartingUp, ScannerState::Connecting),
            (TransportState::ReadyToFeed, ScannerState::Ready),
            (TransportState::Feeding, ScannerState::Feeding),
            (TransportState::ReadyToFeed, ScannerState::Ready),
            (TransportState::ShutDown, ScannerState::Disconnected),
        ];
        for (event, expected) in steps {
            let status = machine.apply(&device(event, "x")).expect("status");
            assert_eq!(status.state, expected);
        }
    }

    #[test]
    fn fault_is_absorbing_until_restart() {
        let (state, status) = transition(
            ScannerState::Feeding,
            &ScanEvent::DeviceFault("jam".into()),
            FeederType::MultipleItems,
        );
        assert_eq!(state, ScannerState::Error);
        assert_eq!(status.color, "white");
        assert!(status.can_connect);
        assert!(!status.can_scan);

        let (state, _) = transition(state, &device(TransportState::ReadyToFeed, "Ready To Feed"), FeederType::MultipleItems);
        assert_eq!(state, ScannerState::Error);

        let (state, _) = transition(state, &device(TransportState::StartingUp, "Starting Up"), FeederType::MultipleItems);
        assert_eq!(state, ScannerState::Connecting);
    }

    #[test]
    fn documents_do_not_move_the_state() {
        let mut machine = ScanStateMachine::new(FeederType::SingleItem);
        machine.apply(&device(TransportState::ReadyToFeed, "Connected"));
        assert!(machine.apply(&ScanEvent::CaptureFailed("lost".into())).is_none());
        assert_eq!(machine.state(), ScannerState::Ready);
    }

    #[test]
    fn status_reflects_feeder_and_feeding() {
        let ready = StatusDescriptor::describe(ScannerState::Ready, FeederType::SingleItem, Some("Ready To Feed"));
        assert_eq!(ready.color, "limegreen");
        assert_eq!(ready.label, "Ready To Feed");
        assert_eq!(ready.scan_button, "Scan Check");
        assert!(ready.can_finish);
        assert!(!ready.can_connect);

        let feeding = StatusDescriptor::describe(ScannerState::Feeding, FeederType::MultipleItems, None);
        assert_eq!(feeding.color, "blue");
        assert_eq!(feeding.scan_button, "Stop");
        assert!(!feeding.can_finish);

        let off = StatusDescriptor::describe(ScannerState::Disconnected, FeederType::MultipleItems, None);
        assert_eq!((off.color.as_str(), off.scan_button.as_str()), ("red", "Scan"));
        assert!(off.can_connect && !off.can_scan);
    }

    #[test]
    fn feeder_type_updates_the_button() {
        let mut machine = ScanStateMachine::new(FeederType::MultipleItems);
        machine.set_feeder(FeederType::SingleItem);
        assert_eq!(machine.status().scan_button, "Scan Check");
    }
}
