// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing error messages.
//
// Every technical error is mapped to a plain message with a clear suggestion.
// The presentation level decides whether the UI blocks, shows an inline
// warning next to the scanned document, or shows a passing notice.

use crate::error::CheckscanError;

/// How the UI should present an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Modal notice; scanning cannot continue until the operator acts.
    Blocking,
    /// Warning shown beside the current document; the session continues.
    Inline,
    /// Transient message; the next attempt may succeed without any action.
    Toast,
}

/// A human-readable error with a message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct Notice {
    /// Short summary (shown as a heading).
    pub message: String,
    /// What the operator should try (shown as body text).
    pub suggestion: String,
    /// Whether re-triggering the same operation can succeed.
    pub retriable: bool,
    pub presentation: Presentation,
}

/// Convert a `CheckscanError` into a `Notice` for the operator.
pub fn humanize_error(err: &CheckscanError) -> Notice {
    match err {
        CheckscanError::DeviceCommunication(detail) => Notice {
            message: "The scanner isn't responding.".into(),
            suggestion: format!(
                "Check that the scanner is plugged in and switched on, then choose Connect. ({detail})"
            ),
            retriable: true,
            presentation: Presentation::Blocking,
        },

        CheckscanError::MicrValidation { tokens, .. } if *tokens < 3 => Notice {
            message: "The check's MICR line couldn't be read completely.".into(),
            suggestion: "Make sure the check faces the right way and run it through again.".into(),
            retriable: true,
            presentation: Presentation::Inline,
        },

        CheckscanError::MicrValidation { routing, .. } => Notice {
            message: "The routing number on this check looks wrong.".into(),
            suggestion: format!(
                "A routing number has 9 digits; the scanner read '{routing}'. Rescan the check or review it by hand."
            ),
            retriable: true,
            presentation: Presentation::Inline,
        },

        CheckscanError::ImageError(_) => Notice {
            message: "The scanned image couldn't be used.".into(),
            suggestion: "Rescan the document. If this keeps happening, check the scanner's image settings.".into(),
            retriable: true,
            presentation: Presentation::Inline,
        },

        CheckscanError::Upload(detail) => Notice {
            message: format!("Upload Error: {detail}"),
            suggestion: "Scanned documents that were not uploaded are kept and will be sent next time.".into(),
            retriable: true,
            presentation: Presentation::Blocking,
        },

        CheckscanError::RemoteValidation(detail) => Notice {
            message: format!("Upload Error: {detail}"),
            suggestion: "The ledger refused this document. Check the batch in the ledger before retrying.".into(),
            retriable: true,
            presentation: Presentation::Blocking,
        },

        CheckscanError::LookupMissing(what) => Notice {
            message: "A required ledger setting is missing.".into(),
            suggestion: format!("Pick a valid {what} in the options and try again."),
            retriable: false,
            presentation: Presentation::Blocking,
        },

        CheckscanError::NoBatchSelected => Notice {
            message: "No batch selected.".into(),
            suggestion: "Choose or create a batch before scanning.".into(),
            retriable: false,
            presentation: Presentation::Blocking,
        },

        CheckscanError::Buffer(_) => Notice {
            message: "That scan couldn't be added to the batch.".into(),
            suggestion: "Scan the document again as a new item.".into(),
            retriable: true,
            presentation: Presentation::Inline,
        },

        CheckscanError::Config(detail) => Notice {
            message: "The scanner settings are incomplete.".into(),
            suggestion: format!("Open the options and fix the settings. ({detail})"),
            retriable: false,
            presentation: Presentation::Blocking,
        },

        CheckscanError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                Notice {
                    message: "The app couldn't write a temporary file.".into(),
                    suggestion: "Check the permissions of the temporary folder.".into(),
                    retriable: false,
                    presentation: Presentation::Blocking,
                }
            } else {
                Notice {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                    retriable: true,
                    presentation: Presentation::Toast,
                }
            }
        }

        CheckscanError::Serialization(_) => Notice {
            message: "The app had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            presentation: Presentation::Toast,
        },
    }
}
