// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Replay a directory of recorded documents through the simulated drivers.
//
// Each document is a group of files sharing a stem, replayed in stem order:
//
//   0001-front.tif   front image (required)
//   0001-back.tif    back image (optional)
//   0001.micr        MICR line as the transport reports it (optional)
//
// A document without a `.micr` file replays as a non-check (cash slip).

use std::collections::BTreeMap;
use std::path::Path;

use checkscan_capture::micr::parse_micr_line;
use checkscan_core::config::InterfaceType;
use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::{FeederType, MicrFields, ScannerConfig};
use checkscan_device::sim::{SimDocument, SimPass, SimulatedSerialReader, SimulatedTransport};
use checkscan_device::{DeviceAdapter, DriverSet, ScannerDevice};
use tracing::{debug, info, warn};

/// One recorded document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedDocument {
    pub stem: String,
    pub front: Vec<u8>,
    pub back: Option<Vec<u8>>,
    pub micr_line: Option<String>,
}

/// Read every recorded document in `dir`, ordered by stem.
pub fn load_recordings(dir: &Path) -> Result<Vec<RecordedDocument>> {
    let mut by_stem: BTreeMap<String, RecordedDocument> = BTreeMap::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let (Some(name), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|s| s.to_str()),
        ) else {
            continue;
        };

        if ext.eq_ignore_ascii_case("micr") {
            let line = std::fs::read_to_string(&path)?;
            slot(&mut by_stem, name).micr_line = Some(line.trim().to_string());
        } else if let Some(stem) = name.strip_suffix("-front") {
            slot(&mut by_stem, stem).front = std::fs::read(&path)?;
        } else if let Some(stem) = name.strip_suffix("-back") {
            slot(&mut by_stem, stem).back = Some(std::fs::read(&path)?);
        } else {
            debug!(path = %path.display(), "not a recording file, skipped");
        }
    }

    let documents: Vec<RecordedDocument> = by_stem
        .into_values()
        .filter(|doc| {
            if doc.front.is_empty() {
                warn!(stem = %doc.stem, "recording has no front image, skipped");
            }
            !doc.front.is_empty()
        })
        .collect();
    info!(dir = %dir.display(), documents = documents.len(), "recordings loaded");
    Ok(documents)
}

fn slot<'a>(map: &'a mut BTreeMap<String, RecordedDocument>, stem: &str) -> &'a mut RecordedDocument {
    map.entry(stem.to_string()).or_insert_with(|| RecordedDocument {
        stem: stem.to_string(),
        ..Default::default()
    })
}

/// Simulated driver loaded with recordings, matching the configured
/// interface type.
#[derive(Debug, Clone)]
pub enum ReplayDriver {
    Transport(SimulatedTransport),
    Serial(SimulatedSerialReader),
}

impl ReplayDriver {
    pub fn new(config: &ScannerConfig, documents: Vec<RecordedDocument>) -> Self {
        match config.interface_type {
            InterfaceType::Transport => {
                let docs = documents
                    .into_iter()
                    .map(|doc| SimDocument {
                        front: doc.front,
                        rear: doc.back.unwrap_or_default(),
                        micr_line: doc.micr_line.unwrap_or_default(),
                    })
                    .collect();
                Self::Transport(SimulatedTransport::new(docs, FeederType::MultipleItems))
            }
            InterfaceType::SerialMicr => {
                let passes = documents
                    .into_iter()
                    .flat_map(|doc| serial_passes(doc, config.enable_rear_image))
                    .collect();
                Self::Serial(SimulatedSerialReader::new(passes))
            }
        }
    }

    /// Driver set to hand to `scanner_device`.
    pub fn drivers(&self) -> DriverSet {
        match self {
            Self::Transport(sim) => DriverSet {
                transport: Some(Box::new(sim.clone())),
                serial: None,
            },
            Self::Serial(sim) => DriverSet {
                transport: None,
                serial: Some(Box::new(sim.clone())),
            },
        }
    }

    /// Play every recording through the device, then shut it down. Returns
    /// the number of items fed or passes made.
    pub fn play(&self, device: &ScannerDevice) -> Result<usize> {
        let played = match (self, device) {
            (Self::Transport(sim), ScannerDevice::Transport(adapter)) => {
                sim.power_on(adapter);
                adapter.start_feeding()?;
                let fed = sim.feed(adapter);
                sim.power_off(adapter);
                fed
            }
            (Self::Serial(sim), ScannerDevice::Serial(adapter)) => {
                let mut passes = 0;
                while sim.insert(adapter) {
                    passes += 1;
                }
                adapter.disconnect()?;
                passes
            }
            _ => {
                return Err(CheckscanError::Config(
                    "replay recordings do not match the configured interface type".into(),
                ));
            }
        };
        info!(played, "replay finished");
        Ok(played)
    }
}

/// A recorded check becomes a MICR pass plus, when rear imaging is on, a
/// blank pass for its back.
fn serial_passes(doc: RecordedDocument, rear: bool) -> Vec<SimPass> {
    let front = match doc.micr_line.as_deref() {
        Some(line) => {
            let fields = parse_micr_line(line);
            SimPass::check(
                element(&fields.routing_number),
                element(&fields.account_number),
                element(&fields.check_number),
                doc.front,
            )
        }
        None => SimPass::blank(doc.front),
    };

    let mut passes = vec![front];
    if let (true, Some(back)) = (rear, doc.back) {
        passes.push(SimPass::blank(back));
    }
    passes
}

/// The serial reader reports an unread element as empty.
fn element(value: &str) -> &str {
    if value == MicrFields::MISSING { "" } else { value }
}
