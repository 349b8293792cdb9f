// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// checkscan-capture: From device events to buffered documents.
//
// Parses and validates MICR lines, assembles `ScannedDocInfo` records, tracks
// the scanner state shown to the operator, and holds the session's scan
// buffer until the uploader drains it.

pub mod assembler;
pub mod buffer;
pub mod micr;
pub mod payload;
pub mod session;
pub mod state;

pub use assembler::{Assembled, CapturePath, DocumentAssembler};
pub use buffer::ScanBuffer;
pub use session::{CaptureSession, FlaggedPolicy, Review, SessionUpdate};
pub use state::{ScanStateMachine, ScannerState, StatusDescriptor, transition};
