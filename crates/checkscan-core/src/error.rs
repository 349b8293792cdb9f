// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for checkscan.

use thiserror::Error;

/// Top-level error type for all checkscan operations.
#[derive(Debug, Error)]
pub enum CheckscanError {
    // -- Device errors --
    #[error("scanner communication failed: {0}")]
    DeviceCommunication(String),

    #[error("MICR line failed validation: routing number '{routing}', {tokens} field(s) read")]
    MicrValidation { routing: String, tokens: usize },

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Ledger errors --
    #[error("upload failed: {0}")]
    Upload(String),

    #[error("ledger rejected the record: {0}")]
    RemoteValidation(String),

    #[error("lookup value not found: {0}")]
    LookupMissing(String),

    #[error("no batch selected")]
    NoBatchSelected,

    // -- Session --
    #[error("scan buffer error: {0}")]
    Buffer(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CheckscanError>;
