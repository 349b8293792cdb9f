// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted drivers for builds without vendor hardware.
//
// The simulated drivers hold a queue of documents and play the part of the
// vendor driver; the `power_on` / `feed` / `insert` helpers play the part of
// the vendor callback thread by invoking the adapter's `on_*` entry points in
// the order real hardware would. Clones share state, so a test can keep a
// handle while the adapter owns another.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::{DocumentSide, FeederType, ImageColorType};
use tracing::debug;

use crate::event::TransportState;
use crate::serial::SerialAdapter;
use crate::traits::{MicrElement, SerialMicrDriver, TransportDriver};
use crate::transport::TransportAdapter;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Auto-feed transport
// ---------------------------------------------------------------------------

/// A document waiting in the simulated hopper.
#[derive(Debug, Clone, Default)]
pub struct SimDocument {
    pub front: Vec<u8>,
    pub rear: Vec<u8>,
    /// Raw MICR line as the transport reports it, e.g. `123456789c55501d101`.
    pub micr_line: String,
}

#[derive(Debug)]
struct TransportSim {
    hopper: VecDeque<SimDocument>,
    pocket: Option<SimDocument>,
    feeder: FeederType,
    state_name: String,
    started: bool,
    feeding: bool,
    options: HashMap<(String, String), String>,
    options_enabled: bool,
}

/// In-memory transport driver.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    shared: Arc<Mutex<TransportSim>>,
}

impl SimulatedTransport {
    pub fn new(documents: Vec<SimDocument>, feeder: FeederType) -> Self {
        Self {
            shared: Arc::new(Mutex::new(TransportSim {
                hopper: documents.into(),
                pocket: None,
                feeder,
                state_name: "TransportShutDown".into(),
                started: false,
                feeding: false,
                options: HashMap::new(),
                options_enabled: false,
            })),
        }
    }

    /// Move the next hopper document into the pocket. False when the hopper is empty.
    pub fn advance(&self) -> bool {
        let mut sim = lock(&self.shared);
        sim.pocket = sim.hopper.pop_front();
        sim.pocket.is_some()
    }

    pub fn set_state_name(&self, name: &str) {
        lock(&self.shared).state_name = name.to_string();
    }

    pub fn option(&self, section: &str, key: &str) -> Option<String> {
        lock(&self.shared)
            .options
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }

    pub fn options_enabled(&self) -> bool {
        lock(&self.shared).options_enabled
    }

    pub fn is_feeding(&self) -> bool {
        lock(&self.shared).feeding
    }

    pub fn remaining(&self) -> usize {
        lock(&self.shared).hopper.len()
    }

    fn enter(&self, adapter: &TransportAdapter, state: TransportState, name: &str) {
        self.set_state_name(name);
        adapter.on_transport_new_state(state);
    }

    /// Play the start-up callbacks: starting up, options window, ready.
    pub fn power_on(&self, adapter: &TransportAdapter) {
        self.enter(adapter, TransportState::StartingUp, "TransportStartingUp");
        adapter.on_change_options_state(TransportState::StartingUp);
        self.enter(adapter, TransportState::ReadyToFeed, "TransportReadyToFeed");
    }

    /// Play a feed run: every hopper document reaches the pocket until the
    /// hopper empties or feeding is stopped. Returns the number of items fed.
    pub fn feed(&self, adapter: &TransportAdapter) -> usize {
        if !self.is_feeding() {
            return 0;
        }
        self.enter(adapter, TransportState::Feeding, "TransportFeeding");

        let mut fed = 0;
        while self.is_feeding() && self.advance() {
            adapter.on_item_in_pocket();
            fed += 1;
        }

        lock(&self.shared).feeding = false;
        self.enter(adapter, TransportState::ReadyToFeed, "TransportReadyToFeed");
        debug!(fed, "simulated feed run finished");
        fed
    }

    /// Play the shut-down callback.
    pub fn power_off(&self, adapter: &TransportAdapter) {
        lock(&self.shared).started = false;
        self.enter(adapter, TransportState::ShutDown, "TransportShutDown");
    }
}

impl TransportDriver for SimulatedTransport {
    fn start_up(&mut self) -> Result<()> {
        lock(&self.shared).started = true;
        Ok(())
    }

    fn shut_down(&mut self) -> Result<()> {
        let mut sim = lock(&self.shared);
        sim.started = false;
        sim.feeding = false;
        Ok(())
    }

    fn transport_info(&self, section: &str, key: &str) -> Result<String> {
        match (section, key) {
            ("MainHopper", "FeederType") => Ok(match lock(&self.shared).feeder {
                FeederType::MultipleItems => "MultipleItems".into(),
                FeederType::SingleItem => "SingleItem".into(),
            }),
            _ => Ok(String::new()),
        }
    }

    fn transport_state_name(&self) -> String {
        lock(&self.shared).state_name.clone()
    }

    fn set_generic_option(&mut self, section: &str, key: &str, value: &str) -> Result<()> {
        lock(&self.shared)
            .options
            .insert((section.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn enable_options(&mut self) -> Result<()> {
        lock(&self.shared).options_enabled = true;
        Ok(())
    }

    fn start_feeding(&mut self) -> Result<()> {
        let mut sim = lock(&self.shared);
        if !sim.started {
            return Err(CheckscanError::DeviceCommunication("transport is not started".into()));
        }
        sim.feeding = true;
        Ok(())
    }

    fn stop_feeding(&mut self) -> Result<()> {
        lock(&self.shared).feeding = false;
        Ok(())
    }

    fn image_bytes(&self, side: DocumentSide, _color: ImageColorType) -> Result<Vec<u8>> {
        let sim = lock(&self.shared);
        let doc = sim
            .pocket
            .as_ref()
            .ok_or_else(|| CheckscanError::DeviceCommunication("pocket is empty".into()))?;
        Ok(match side {
            DocumentSide::Front => doc.front.clone(),
            DocumentSide::Rear => doc.rear.clone(),
        })
    }

    fn micr_text(&self, _line: u32) -> Result<String> {
        Ok(lock(&self.shared)
            .pocket
            .as_ref()
            .map(|doc| doc.micr_line.clone())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Serial MICR reader
// ---------------------------------------------------------------------------

/// One manual pass through the simulated serial reader.
#[derive(Debug, Clone, Default)]
pub struct SimPass {
    pub routing_number: String,
    pub account_number: String,
    pub check_number: String,
    pub image: Vec<u8>,
}

impl SimPass {
    pub fn check(routing: &str, account: &str, check: &str, image: Vec<u8>) -> Self {
        Self {
            routing_number: routing.into(),
            account_number: account.into(),
            check_number: check.into(),
            image,
        }
    }

    /// A pass with no MICR line, e.g. the back of a check.
    pub fn blank(image: Vec<u8>) -> Self {
        Self {
            image,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct SerialSim {
    passes: VecDeque<SimPass>,
    current: Option<SimPass>,
    port_open: bool,
    dsr: bool,
    version: String,
    commands: Vec<String>,
    format: Option<String>,
    buffer_clears: usize,
}

/// In-memory serial reader driver.
#[derive(Debug, Clone)]
pub struct SimulatedSerialReader {
    shared: Arc<Mutex<SerialSim>>,
}

impl SimulatedSerialReader {
    pub fn new(passes: Vec<SimPass>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SerialSim {
                passes: passes.into(),
                current: None,
                port_open: false,
                dsr: true,
                version: "MICRImage 1.0".into(),
                commands: Vec::new(),
                format: None,
                buffer_clears: 0,
            })),
        }
    }

    /// Load the next pass. False when none are left.
    pub fn advance(&self) -> bool {
        let mut sim = lock(&self.shared);
        sim.current = sim.passes.pop_front();
        sim.current.is_some()
    }

    /// Play one pass: load it and raise the data-received callback.
    pub fn insert(&self, adapter: &SerialAdapter) -> bool {
        if !self.advance() {
            return false;
        }
        adapter.on_micr_data_received();
        true
    }

    pub fn set_dsr(&self, dsr: bool) {
        lock(&self.shared).dsr = dsr;
    }

    pub fn set_version(&self, version: &str) {
        lock(&self.shared).version = version.to_string();
    }

    pub fn commands(&self) -> Vec<String> {
        lock(&self.shared).commands.clone()
    }

    pub fn format(&self) -> Option<String> {
        lock(&self.shared).format.clone()
    }

    pub fn buffer_clears(&self) -> usize {
        lock(&self.shared).buffer_clears
    }

    pub fn remaining(&self) -> usize {
        lock(&self.shared).passes.len()
    }
}

impl SerialMicrDriver for SimulatedSerialReader {
    fn open_port(&mut self, _port: u8) -> Result<()> {
        lock(&self.shared).port_open = true;
        Ok(())
    }

    fn close_port(&mut self) -> Result<()> {
        lock(&self.shared).port_open = false;
        Ok(())
    }

    fn is_port_open(&self) -> bool {
        lock(&self.shared).port_open
    }

    fn dsr_holding(&self) -> bool {
        lock(&self.shared).dsr
    }

    fn set_micr_timeout(&mut self, _seconds: u32) {}

    fn micr_command(&mut self, command: &str) -> Result<()> {
        lock(&self.shared).commands.push(command.to_string());
        Ok(())
    }

    fn format_change(&mut self, format: &str) -> Result<()> {
        lock(&self.shared).format = Some(format.to_string());
        Ok(())
    }

    fn version(&mut self) -> Result<String> {
        Ok(lock(&self.shared).version.clone())
    }

    fn find_element(&self, element: MicrElement) -> String {
        let sim = lock(&self.shared);
        let Some(pass) = sim.current.as_ref() else {
            return String::new();
        };
        match element {
            MicrElement::RoutingNumber => pass.routing_number.clone(),
            MicrElement::AccountNumber => pass.account_number.clone(),
            MicrElement::CheckNumber => pass.check_number.clone(),
        }
    }

    fn micr_text(&self) -> String {
        lock(&self.shared)
            .current
            .as_ref()
            .map(|p| format!("t{}t{}o{}", p.routing_number, p.account_number, p.check_number))
            .unwrap_or_default()
    }

    fn transmit_current_image(&mut self, path: &Path) -> Result<()> {
        let image = lock(&self.shared)
            .current
            .as_ref()
            .map(|p| p.image.clone())
            .unwrap_or_default();
        std::fs::write(path, image)?;
        Ok(())
    }

    fn clear_buffer(&mut self) {
        let mut sim = lock(&self.shared);
        sim.current = None;
        sim.buffer_clears += 1;
    }
}
