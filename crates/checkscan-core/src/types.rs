// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the capture-to-upload pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CheckscanError, Result};

/// Well-known ledger identifiers.
pub mod guids {
    use uuid::Uuid;

    /// Binary file type for contribution images.
    pub const BINARY_FILE_TYPE_CONTRIBUTION_IMAGE: Uuid =
        Uuid::from_u128(0x6D18A9C4_34AB_444A_B95B_C644019465AC);
    /// Transaction type "Contribution".
    pub const TRANSACTION_TYPE_CONTRIBUTION: Uuid =
        Uuid::from_u128(0x2D607262_52D6_4724_910D_5C6E8FB89ACC);
    /// Defined type holding the currency types.
    pub const DEFINED_TYPE_CURRENCY_TYPE: Uuid =
        Uuid::from_u128(0x1D1304DE_E83A_44AF_B11D_0C66DD600B81);
    /// Defined type holding the source types.
    pub const DEFINED_TYPE_SOURCE_TYPE: Uuid =
        Uuid::from_u128(0x4F02B41E_AB7D_4345_8A97_3904DDD89B01);
    /// Currency type "Check".
    pub const CURRENCY_TYPE_CHECK: Uuid =
        Uuid::from_u128(0x8B086A19_405A_451F_8D44_174E92D6B402);
    /// Currency type "Cash".
    pub const CURRENCY_TYPE_CASH: Uuid =
        Uuid::from_u128(0xF3ADC889_1EE8_4EB6_B3FD_8C10F3C8AF93);
}

/// Session-local identifier for a captured document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocId(pub Uuid);

impl DocId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw image bytes as delivered by the device. Shared, never copied on clone.
pub type ImageData = Arc<[u8]>;

/// Which side of a document an image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentSide {
    Front,
    Rear,
}

/// How many documents the attached feeder accepts at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeederType {
    /// A stack of items is fed automatically.
    MultipleItems,
    /// One item per manual pass.
    SingleItem,
}

/// Color depth the device should capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageColorType {
    Bitonal,
    Grayscale,
    Color,
}

impl ImageColorType {
    /// Index used by the transport's `NeedFrontImageN` / `NeedRearImageN` options.
    pub fn option_index(&self) -> u8 {
        match self {
            Self::Bitonal => 1,
            Self::Grayscale => 2,
            Self::Color => 3,
        }
    }
}

/// Routing, account and check number read from a MICR line.
///
/// Fields that could not be read hold [`MicrFields::MISSING`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrFields {
    pub routing_number: String,
    pub account_number: String,
    pub check_number: String,
    /// Number of fields actually recovered from the line.
    pub recovered: usize,
}

impl MicrFields {
    /// Placeholder for a field the reader could not recover.
    pub const MISSING: &'static str = "??";

    /// Required routing number length.
    pub const ROUTING_NUMBER_LEN: usize = 9;

    /// A check is valid only with all three fields and a 9-character routing number.
    pub fn is_valid(&self) -> bool {
        self.recovered >= 3 && self.routing_number.len() == Self::ROUTING_NUMBER_LEN
    }

    /// Validate, returning the error a caller should surface.
    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(CheckscanError::MicrValidation {
                routing: self.routing_number.clone(),
                tokens: self.recovered,
            })
        }
    }

    /// `routing_account_check`, the form the ledger accepts for scanned checks.
    pub fn summary(&self) -> String {
        format!(
            "{}_{}_{}",
            self.routing_number, self.account_number, self.check_number
        )
    }
}

/// A ledger lookup value (currency type, source type, transaction type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefinedValue {
    pub id: i32,
    pub guid: Uuid,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl DefinedValue {
    /// Whether this currency type means the document carries a MICR line.
    pub fn is_check_currency(&self) -> bool {
        self.guid == guids::CURRENCY_TYPE_CHECK
    }
}

/// Lifecycle status of a ledger batch. The ledger sends it as its integer
/// value (`"Status": 0`); the variant name is accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i32")]
pub enum BatchStatus {
    Pending = 0,
    Open = 1,
    Closed = 2,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Code(i32),
    Name(String),
}

impl From<BatchStatus> for i32 {
    fn from(status: BatchStatus) -> Self {
        status as i32
    }
}

impl<'de> Deserialize<'de> for BatchStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error;

        match StatusRepr::deserialize(deserializer)? {
            StatusRepr::Code(0) => Ok(Self::Pending),
            StatusRepr::Code(1) => Ok(Self::Open),
            StatusRepr::Code(2) => Ok(Self::Closed),
            StatusRepr::Name(name) if name.eq_ignore_ascii_case("pending") => Ok(Self::Pending),
            StatusRepr::Name(name) if name.eq_ignore_ascii_case("open") => Ok(Self::Open),
            StatusRepr::Name(name) if name.eq_ignore_ascii_case("closed") => Ok(Self::Closed),
            StatusRepr::Code(code) => Err(D::Error::custom(format!("unknown batch status {code}"))),
            StatusRepr::Name(name) => Err(D::Error::custom(format!("unknown batch status {name:?}"))),
        }
    }
}

/// Serde adapter for ledger timestamps.
///
/// The ledger writes local date-times without an offset
/// (`2026-10-11T00:00:00`). Those are read as UTC; an RFC 3339 value with an
/// offset is converted. Values are written back without an offset.
pub mod ledger_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| NaiveDateTime::parse_from_str(value, FORMAT).map(|dt| dt.and_utc()))
            .ok()
    }

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.collect_str(&dt.naive_utc().format(FORMAT)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse(raw.trim())
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid ledger date-time {raw:?}"))),
        }
    }
}

/// The ledger batch uploaded transactions are stamped with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FinancialBatch {
    pub id: i32,
    pub guid: Uuid,
    pub name: String,
    pub status: BatchStatus,
    #[serde(default, with = "ledger_time")]
    pub batch_start_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub control_amount: f64,
    pub campus_id: Option<i32>,
}

/// Lookups loaded once per session and used to stamp records.
#[derive(Debug, Clone, Default)]
pub struct SessionLookups {
    pub currency_types: Vec<DefinedValue>,
    pub source_types: Vec<DefinedValue>,
    /// Ledger id of the contribution-image binary file type.
    pub binary_file_type_id: i32,
    /// Ledger id of the contribution transaction type.
    pub transaction_type_id: i32,
}

impl SessionLookups {
    pub fn currency_type(&self, guid: Uuid) -> Result<&DefinedValue> {
        self.currency_types
            .iter()
            .find(|v| v.guid == guid)
            .ok_or_else(|| CheckscanError::LookupMissing(format!("currency type {guid}")))
    }

    pub fn source_type(&self, guid: Uuid) -> Result<&DefinedValue> {
        self.source_types
            .iter()
            .find(|v| v.guid == guid)
            .ok_or_else(|| CheckscanError::LookupMissing(format!("source type {guid}")))
    }
}

/// One physical document captured in this session.
#[derive(Debug, Clone)]
pub struct ScannedDocInfo {
    pub id: DocId,
    /// Present only for checks.
    pub micr: Option<MicrFields>,
    pub front_image: ImageData,
    pub back_image: Option<ImageData>,
    pub currency_type: DefinedValue,
    pub source_type: DefinedValue,
    pub captured_at: DateTime<Utc>,
    pub uploaded: bool,
}

impl ScannedDocInfo {
    /// Build a record. The front image must not be empty.
    pub fn new(
        front_image: ImageData,
        currency_type: DefinedValue,
        source_type: DefinedValue,
    ) -> Result<Self> {
        if front_image.is_empty() {
            return Err(CheckscanError::ImageError("front image is empty".into()));
        }
        Ok(Self {
            id: DocId::new(),
            micr: None,
            front_image,
            back_image: None,
            currency_type,
            source_type,
            captured_at: Utc::now(),
            uploaded: false,
        })
    }

    pub fn is_check(&self) -> bool {
        self.micr.is_some()
    }

    pub fn routing_number(&self) -> &str {
        self.micr.as_ref().map_or("", |m| m.routing_number.as_str())
    }

    pub fn account_number(&self) -> &str {
        self.micr.as_ref().map_or("", |m| m.account_number.as_str())
    }

    pub fn check_number(&self) -> &str {
        self.micr.as_ref().map_or("", |m| m.check_number.as_str())
    }
}
