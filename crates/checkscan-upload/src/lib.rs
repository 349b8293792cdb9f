// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// checkscan-upload: Ledger REST client and the background coordinator that
// drains the scan buffer into it. `InMemoryLedger` stands in for the remote
// ledger in offline runs and tests.

pub mod coordinator;
pub mod ledger;
pub mod memory;

pub use coordinator::{UploadCoordinator, UploadProgress, UploadReport};
pub use ledger::{LedgerClient, RestLedgerClient, load_session_lookups};
pub use memory::InMemoryLedger;
