//! JSON bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::credentials::IssuedCredential;
use crate::engine::{ReasonCode, VerificationOutcome};
use crate::registry::{RegistrySchema, ResolvedRecord};

pub const DEFAULT_PAGE: u32 = 50;
pub const MAX_PAGE: u32 = 500;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
    pub payload: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub registry_hint: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub attempt_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    pub id: String,
    pub registry_id: String,
    pub registry_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub schema: RegistrySchema,
    pub attributes: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
}

impl From<ResolvedRecord> for RecordView {
    fn from(record: ResolvedRecord) -> Self {
        Self {
            display_name: record.display_name(),
            id: record.record_id,
            registry_id: record.registry_id,
            registry_name: record.registry_name,
            schema: record.schema,
            attributes: record.attributes,
            photo_ref: record.photo_ref,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub attempt_id: String,
    /// `GRANTED` or `DENIED`.
    pub decision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    pub retryable: bool,
    /// Only present on grants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    pub logged: bool,
}

impl From<VerificationOutcome> for VerifyResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        let retryable = outcome.retryable();
        let granted = outcome.decision.is_granted();
        Self {
            attempt_id: outcome.attempt_id,
            decision: outcome.decision.label().to_string(),
            reason_code: outcome.decision.reason(),
            retryable,
            record: outcome.record.filter(|_| granted).map(RecordView::from),
            credential_id: outcome.credential_id.filter(|_| granted),
            logged: outcome.logged,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueBody {
    pub record_id: String,
    pub registry_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub credential_id: String,
    pub payload: String,
    /// SVG document rendering `payload` as a QR symbol.
    pub image_encoding: String,
}

impl From<IssuedCredential> for IssueResponse {
    fn from(issued: IssuedCredential) -> Self {
        Self {
            credential_id: issued.credential.id,
            payload: issued.payload,
            image_encoding: issued.image,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeResponse {
    pub credential_id: String,
    pub revoked: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}
