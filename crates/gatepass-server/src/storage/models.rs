//! Data models for GatePass storage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Registry {
    pub id: String,
    pub name: String,
    pub schema_json: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Record {
    pub id: String,
    pub registry_id: String,
    pub attributes_json: String,
    pub photo_ref: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A record joined with its owning registry, read in one statement.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecordWithRegistry {
    pub id: String,
    pub registry_id: String,
    pub attributes_json: String,
    pub photo_ref: Option<String>,
    pub registry_name: String,
    pub schema_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Credential {
    pub id: String,
    pub record_id: String,
    pub registry_id: String,
    pub active: bool,
    pub scan_count: i64,
    pub issued_at: i64,
    pub deactivated_at: Option<i64>,
    pub last_scanned_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub id: String,
    pub record_id: Option<String>,
    pub registry_id: Option<String>,
    pub credential_id: Option<String>,
    pub granted: bool,
    pub reason_code: Option<String>,
    pub actor: String,
    pub location: Option<String>,
    pub occurred_at: i64,
    pub client_meta: Option<String>,
}
