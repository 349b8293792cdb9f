// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Remote ledger client.
//
// The ledger speaks JSON with PascalCase field names over a cookie-based
// session. Created records are keyed by a client-generated GUID and read back
// by that GUID to learn the server-assigned id.
//
// Endpoints used:
//   POST api/Auth/Login
//   GET  api/{Entity}?$filter=Guid eq guid'{guid}'
//   POST api/BinaryFiles/            POST api/BinaryFileDatas/
//   POST api/FinancialTransactions   POST api/FinancialTransactions/PostScanned
//   POST api/FinancialTransactionImages
//   GET  api/DefinedValues?$filter=DefinedTypeId eq {id}
//   GET  api/FinancialBatches?$filter=Status eq 'Pending'

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use checkscan_core::error::{CheckscanError, Result};
use checkscan_core::{DefinedValue, FinancialBatch, SessionLookups, guids};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Binary file metadata. Content is uploaded separately as `BinaryFileData`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BinaryFile {
    pub id: i32,
    pub guid: Uuid,
    pub file_name: String,
    pub binary_file_type_id: i32,
    pub is_system: bool,
    pub mime_type: String,
}

/// Content of a binary file; `id` is the owning file's id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BinaryFileData {
    pub id: i32,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

/// A financial transaction. When `scanned_check_micr` is set the record is
/// posted as a scanned check and the ledger encrypts the MICR itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FinancialTransaction {
    pub id: i32,
    pub guid: Uuid,
    pub batch_id: i32,
    pub transaction_code: String,
    pub summary: String,
    #[serde(with = "checkscan_core::types::ledger_time")]
    pub transaction_date_time: Option<DateTime<Utc>>,
    pub currency_type_value_id: i32,
    pub source_type_value_id: i32,
    pub transaction_type_value_id: i32,
    pub authorized_person_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_check_micr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_micr_encrypted: Option<String>,
}

impl FinancialTransaction {
    pub fn is_scanned_check(&self) -> bool {
        self.scanned_check_micr.is_some()
    }
}

/// Links an uploaded image to a transaction. Front is order 0, back order 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FinancialTransactionImage {
    pub id: i32,
    pub binary_file_id: i32,
    pub transaction_id: i32,
    pub order: i32,
}

/// Any ledger entity that only matters for its id (defined types, binary
/// file types).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EntityRef {
    pub id: i32,
    pub guid: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    persisted: bool,
}

/// Byte arrays travel as base64 strings.
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// Operations the pipeline needs from the ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<()>;

    async fn create_binary_file(&self, file: &BinaryFile) -> Result<()>;

    async fn binary_file_by_guid(&self, guid: Uuid) -> Result<BinaryFile>;

    async fn upload_binary_file_data(&self, data: &BinaryFileData) -> Result<()>;

    /// Post a generic transaction, or a scanned check when it carries MICR.
    async fn create_transaction(&self, transaction: &FinancialTransaction) -> Result<()>;

    async fn transaction_by_guid(&self, guid: Uuid) -> Result<FinancialTransaction>;

    async fn create_transaction_image(&self, image: &FinancialTransactionImage) -> Result<()>;

    async fn defined_type_by_guid(&self, guid: Uuid) -> Result<EntityRef>;

    async fn defined_value_by_guid(&self, guid: Uuid) -> Result<DefinedValue>;

    async fn defined_values(&self, defined_type_id: i32) -> Result<Vec<DefinedValue>>;

    async fn binary_file_type_by_guid(&self, guid: Uuid) -> Result<EntityRef>;

    async fn pending_batches(&self) -> Result<Vec<FinancialBatch>>;
}

/// Read the lookup lists a scanning session needs. Called once per session.
#[instrument(skip(client))]
pub async fn load_session_lookups(client: &dyn LedgerClient) -> Result<SessionLookups> {
    let currency_type = client.defined_type_by_guid(guids::DEFINED_TYPE_CURRENCY_TYPE).await?;
    let source_type = client.defined_type_by_guid(guids::DEFINED_TYPE_SOURCE_TYPE).await?;

    let lookups = SessionLookups {
        currency_types: client.defined_values(currency_type.id).await?,
        source_types: client.defined_values(source_type.id).await?,
        binary_file_type_id: client
            .binary_file_type_by_guid(guids::BINARY_FILE_TYPE_CONTRIBUTION_IMAGE)
            .await?
            .id,
        transaction_type_id: client
            .defined_value_by_guid(guids::TRANSACTION_TYPE_CONTRIBUTION)
            .await?
            .id,
    };
    info!(
        currency_types = lookups.currency_types.len(),
        source_types = lookups.source_types.len(),
        "session lookups loaded"
    );
    Ok(lookups)
}

// ---------------------------------------------------------------------------
// REST implementation
// ---------------------------------------------------------------------------

/// `LedgerClient` over the ledger's REST API.
pub struct RestLedgerClient {
    http: Client,
    base: Url,
}

impl RestLedgerClient {
    /// `base_url` is the ledger root, e.g. `https://ledger.example.org/`.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self> {
        let mut base =
            Url::parse(base_url).map_err(|e| CheckscanError::Config(format!("invalid ledger URL '{base_url}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .cookie_store(true)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| CheckscanError::Upload(format!("HTTP client: {e}")))?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str, filter: Option<&str>) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| CheckscanError::Config(format!("bad endpoint '{path}': {e}")))?;
        if let Some(filter) = filter {
            url.query_pairs_mut().append_pair("$filter", filter);
        }
        Ok(url)
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str, filter: Option<&str>) -> Result<Vec<T>> {
        let url = self.endpoint(path, filter)?;
        debug!(%url, "GET");
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        let response = check_status(response).await?;
        response.json().await.map_err(transport_error)
    }

    async fn get_by_guid<T: DeserializeOwned>(&self, path: &str, guid: Uuid) -> Result<T> {
        self.get_list(path, Some(&guid_filter(guid)))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CheckscanError::LookupMissing(format!("{path} {guid}")))
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
        let url = self.endpoint(path, None)?;
        debug!(%url, "POST");
        let response = self.http.post(url).json(body).send().await.map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }
}

/// OData filter selecting one record by GUID.
pub fn guid_filter(guid: Uuid) -> String {
    format!("Guid eq guid'{guid}'")
}

fn transport_error(e: reqwest::Error) -> CheckscanError {
    CheckscanError::Upload(e.to_string())
}

/// Map a non-success response to an error, keeping the ledger's message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    warn!(%status, %url, "ledger request failed");
    Err(status_error(status, &body))
}

/// Bad request and conflict mean the ledger refused the record itself.
pub fn status_error(status: StatusCode, body: &str) -> CheckscanError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    };
    match status {
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT => CheckscanError::RemoteValidation(detail),
        _ => CheckscanError::Upload(detail),
    }
}

#[async_trait]
impl LedgerClient for RestLedgerClient {
    #[instrument(skip(self, password), fields(base = %self.base))]
    async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.post(
            "api/Auth/Login",
            &LoginRequest {
                username,
                password,
                persisted: true,
            },
        )
        .await?;
        info!(username, "logged in to ledger");
        Ok(())
    }

    async fn create_binary_file(&self, file: &BinaryFile) -> Result<()> {
        self.post("api/BinaryFiles/", file).await
    }

    async fn binary_file_by_guid(&self, guid: Uuid) -> Result<BinaryFile> {
        self.get_by_guid("api/BinaryFiles", guid).await
    }

    async fn upload_binary_file_data(&self, data: &BinaryFileData) -> Result<()> {
        self.post("api/BinaryFileDatas/", data).await
    }

    async fn create_transaction(&self, transaction: &FinancialTransaction) -> Result<()> {
        let path = if transaction.is_scanned_check() {
            "api/FinancialTransactions/PostScanned"
        } else {
            "api/FinancialTransactions"
        };
        self.post(path, transaction).await
    }

    async fn transaction_by_guid(&self, guid: Uuid) -> Result<FinancialTransaction> {
        self.get_by_guid("api/FinancialTransactions", guid).await
    }

    async fn create_transaction_image(&self, image: &FinancialTransactionImage) -> Result<()> {
        self.post("api/FinancialTransactionImages", image).await
    }

    async fn defined_type_by_guid(&self, guid: Uuid) -> Result<EntityRef> {
        self.get_by_guid("api/DefinedTypes", guid).await
    }

    async fn defined_value_by_guid(&self, guid: Uuid) -> Result<DefinedValue> {
        self.get_by_guid("api/DefinedValues", guid).await
    }

    async fn defined_values(&self, defined_type_id: i32) -> Result<Vec<DefinedValue>> {
        self.get_list("api/DefinedValues", Some(&format!("DefinedTypeId eq {defined_type_id}")))
            .await
    }

    async fn binary_file_type_by_guid(&self, guid: Uuid) -> Result<EntityRef> {
        self.get_by_guid("api/BinaryFileTypes", guid).await
    }

    async fn pending_batches(&self) -> Result<Vec<FinancialBatch>> {
        self.get_list("api/FinancialBatches", Some("Status eq 'Pending'")).await
    }
}
