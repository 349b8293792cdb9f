// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner configuration. Loaded once at startup and passed by value into
// each component; nothing reads it from a global.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CheckscanError, Result};
use crate::types::{ImageColorType, guids};

/// File name of the persisted configuration inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Which hardware protocol the attached scanner speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterfaceType {
    /// Multi-item auto-feed transport.
    Transport,
    /// Single-item MICR/image reader on an RS-232 port.
    SerialMicr,
}

/// Persistent scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Base URL of the ledger, e.g. `https://ledger.example.org/`.
    pub ledger_base_url: String,
    pub username: String,
    pub password: String,
    pub interface_type: InterfaceType,
    /// COM port number of the serial reader.
    pub serial_com_port: u8,
    pub image_color_type: ImageColorType,
    /// Capture the rear of each document as well as the front.
    pub enable_rear_image: bool,
    pub enable_double_doc_detection: bool,
    /// Currency type stamped on every captured document.
    pub tender_type_value_guid: Uuid,
    /// Source type stamped on every captured document.
    pub source_type_value_guid: Uuid,
    /// Connect timeout for ledger requests, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            ledger_base_url: "http://localhost/".into(),
            username: String::new(),
            password: String::new(),
            interface_type: InterfaceType::Transport,
            serial_com_port: 1,
            image_color_type: ImageColorType::Bitonal,
            enable_rear_image: true,
            enable_double_doc_detection: true,
            tender_type_value_guid: guids::CURRENCY_TYPE_CHECK,
            source_type_value_guid: Uuid::nil(),
            connect_timeout_secs: 30,
        }
    }
}

impl ScannerConfig {
    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ledger_base_url.trim().is_empty() {
            return Err(CheckscanError::Config("ledger base URL is empty".into()));
        }
        if self.interface_type == InterfaceType::SerialMicr && self.serial_com_port == 0 {
            return Err(CheckscanError::Config("serial COM port must be 1 or higher".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ScannerConfig::load(dir.path().join(CONFIG_FILE)).expect("load");
        assert_eq!(config.interface_type, InterfaceType::Transport);
        assert_eq!(config.tender_type_value_guid, guids::CURRENCY_TYPE_CHECK);
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let config = ScannerConfig {
            interface_type: InterfaceType::SerialMicr,
            serial_com_port: 3,
            image_color_type: ImageColorType::Grayscale,
            ..Default::default()
        };
        config.save(&path).expect("save");

        let loaded = ScannerConfig::load(&path).expect("load");
        assert_eq!(loaded.interface_type, InterfaceType::SerialMicr);
        assert_eq!(loaded.serial_com_port, 3);
        assert_eq!(loaded.image_color_type, ImageColorType::Grayscale);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "username": "admin" }"#).expect("write");

        let loaded = ScannerConfig::load(&path).expect("load");
        assert_eq!(loaded.username, "admin");
        assert_eq!(loaded.connect_timeout_secs, 30);
    }

    #[test]
    fn serial_port_zero_is_rejected() {
        let config = ScannerConfig {
            interface_type: InterfaceType::SerialMicr,
            serial_com_port: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CheckscanError::Config(_))));
    }
}
