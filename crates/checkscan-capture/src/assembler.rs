// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document assembly: raw device output in, `ScannedDocInfo` out.
//
// Both capture paths share one validation rule. What differs is the outcome
// of a failure: the transport can stop feeding and let the operator fix the
// stack, so the document is rejected; a serial pass has already gone through
// the reader, so the document is flagged for the operator to accept or drop.

use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::{DefinedValue, ImageData, MicrFields, ScannedDocInfo, ScannerConfig, SessionLookups};
use checkscan_device::MicrElements;
use tracing::{debug, warn};

use crate::micr;

/// Which hardware path produced the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePath {
    Transport,
    Serial,
}

/// Result of assembling one document.
#[derive(Debug)]
pub enum Assembled {
    /// Ready for the buffer.
    Accepted(ScannedDocInfo),
    /// Invalid MICR on the transport path; feeding should stop.
    Rejected {
        doc: ScannedDocInfo,
        warning: CheckscanError,
    },
    /// Invalid MICR on the serial path; queued only if the operator accepts.
    Flagged {
        doc: ScannedDocInfo,
        warning: CheckscanError,
    },
}

impl Assembled {
    pub fn doc(&self) -> &ScannedDocInfo {
        match self {
            Self::Accepted(doc) | Self::Rejected { doc, .. } | Self::Flagged { doc, .. } => doc,
        }
    }

    pub fn warning(&self) -> Option<&CheckscanError> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected { warning, .. } | Self::Flagged { warning, .. } => Some(warning),
        }
    }
}

/// Builds documents stamped with the session's configured currency and
/// source types.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    currency_type: DefinedValue,
    source_type: DefinedValue,
}

impl DocumentAssembler {
    /// Resolve the configured currency and source types against the session
    /// lookups. Fails if either is not in the ledger's lists.
    pub fn new(lookups: &SessionLookups, config: &ScannerConfig) -> Result<Self> {
        Ok(Self {
            currency_type: lookups.currency_type(config.tender_type_value_guid)?.clone(),
            source_type: lookups.source_type(config.source_type_value_guid)?.clone(),
        })
    }

    /// Whether documents in this session are checks, i.e. carry a MICR line.
    pub fn captures_checks(&self) -> bool {
        self.currency_type.is_check_currency()
    }

    /// Assemble a document from the transport's pocket.
    pub fn assemble_transport(
        &self,
        front: ImageData,
        back: Option<ImageData>,
        micr_text: Option<&str>,
    ) -> Result<Assembled> {
        let micr = self
            .captures_checks()
            .then(|| micr::parse_micr_line(micr_text.unwrap_or_default()));
        self.assemble(front, back, micr, CapturePath::Transport)
    }

    /// Assemble a document from a serial front pass.
    pub fn assemble_serial(&self, image: ImageData, elements: &MicrElements) -> Result<Assembled> {
        let micr = self.captures_checks().then(|| micr::from_elements(elements));
        self.assemble(image, None, micr, CapturePath::Serial)
    }

    /// Build the record and apply the MICR rule for the given path. Errors
    /// only when the front image is empty.
    pub fn assemble(
        &self,
        front: ImageData,
        back: Option<ImageData>,
        micr: Option<MicrFields>,
        path: CapturePath,
    ) -> Result<Assembled> {
        let mut doc = ScannedDocInfo::new(front, self.currency_type.clone(), self.source_type.clone())?;
        doc.back_image = back.filter(|b| !b.is_empty());
        doc.micr = micr;

        let Some(fields) = doc.micr.as_ref() else {
            debug!(doc = %doc.id, "non-check document assembled");
            return Ok(Assembled::Accepted(doc));
        };

        match fields.validate() {
            Ok(()) => {
                debug!(doc = %doc.id, routing = %fields.routing_number, "check assembled");
                Ok(Assembled::Accepted(doc))
            }
            Err(warning) => {
                warn!(doc = %doc.id, ?path, error = %warning, "check failed MICR validation");
                Ok(match path {
                    CapturePath::Transport => Assembled::Rejected { doc, warning },
                    CapturePath::Serial => Assembled::Flagged { doc, warning },
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use checkscan_core::guids;
    use std::sync::Arc;
    use uuid::Uuid;

    pub(crate) const SOURCE_GUID: Uuid = Uuid::from_u128(0x0AB1_2C3D);

    pub(crate) fn lookups() -> SessionLookups {
        let value = |id, guid, name: &str| DefinedValue {
            id,
            guid,
            value: name.into(),
            description: None,
        };
        SessionLookups {
            currency_types: vec![
                value(1, guids::CURRENCY_TYPE_CHECK, "Check"),
                value(2, guids::CURRENCY_TYPE_CASH, "Cash"),
            ],
            source_types: vec![value(10, SOURCE_GUID, "Onsite")],
            binary_file_type_id: 5,
            transaction_type_id: 53,
        }
    }

    pub(crate) fn config() -> ScannerConfig {
        ScannerConfig {
            source_type_value_guid: SOURCE_GUID,
            ..Default::default()
        }
    }

    fn image(bytes: &[u8]) -> ImageData {
        Arc::from(bytes)
    }

    #[test]
    fn valid_transport_check_is_accepted() {
        let assembler = DocumentAssembler::new(&lookups(), &config()).expect("assembler");
        let result = assembler
            .assemble_transport(image(&[1]), Some(image(&[2])), Some("123456789c55501d101"))
            .expect("assemble");

        let Assembled::Accepted(doc) = result else {
            panic!("expected acceptance");
        };
        assert!(doc.is_check());
        assert_eq!(doc.routing_number(), "123456789");
        assert_eq!(doc.back_image.as_deref(), Some(&[2u8][..]));
        assert_eq!(doc.source_type.id, 10);
    }

    #[test]
    fn same_rule_rejects_on_transport_and_flags_on_serial() {
        let assembler = DocumentAssembler::new(&lookups(), &config()).expect("assembler");

        let transport = assembler
            .assemble_transport(image(&[1]), None, Some("1234567890 c 987654321 d 42 !"))
            .expect("assemble");
        assert!(matches!(transport, Assembled::Rejected { .. }));

        let elements = MicrElements {
            routing_number: "1234567890".into(),
            account_number: "987654321".into(),
            check_number: "42".into(),
        };
        let serial = assembler.assemble_serial(image(&[1]), &elements).expect("assemble");
        assert!(matches!(serial, Assembled::Flagged { .. }));
        assert!(matches!(
            serial.warning(),
            Some(CheckscanError::MicrValidation { tokens: 3, .. })
        ));
    }

    #[test]
    fn missing_micr_line_fails_a_check() {
        let assembler = DocumentAssembler::new(&lookups(), &config()).expect("assembler");
        let result = assembler.assemble_transport(image(&[1]), None, None).expect("assemble");
        assert_eq!(result.doc().routing_number(), MicrFields::MISSING);
        assert!(result.warning().is_some());
    }

    #[test]
    fn cash_documents_skip_micr() {
        let config = ScannerConfig {
            tender_type_value_guid: guids::CURRENCY_TYPE_CASH,
            ..config()
        };
        let assembler = DocumentAssembler::new(&lookups(), &config).expect("assembler");
        let result = assembler
            .assemble_transport(image(&[1]), None, Some("garbage"))
            .expect("assemble");
        assert!(matches!(result, Assembled::Accepted(ref doc) if !doc.is_check()));
    }

    #[test]
    fn empty_front_is_an_error() {
        let assembler = DocumentAssembler::new(&lookups(), &config()).expect("assembler");
        assert!(assembler.assemble_transport(image(&[]), None, None).is_err());
    }

    #[test]
    fn unknown_source_type_fails_fast() {
        let config = ScannerConfig {
            source_type_value_guid: Uuid::nil(),
            ..Default::default()
        };
        assert!(matches!(
            DocumentAssembler::new(&lookups(), &config),
            Err(CheckscanError::LookupMissing(_))
        ));
    }
}
