//! Registry resolver.
//!
//! Maps a verified record id to the registry that owns it. Hinted registries
//! are tried first; a miss there falls through to a scan of every registry in
//! creation order, stopping at the first match.

use serde_json::{Map, Value};
use tracing::debug;

use crate::registry::schema::RegistrySchema;
use crate::storage::{DatabaseError, GateDatabase, RecordWithRegistry};

/// A live record together with the registry it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    pub record_id: String,
    pub registry_id: String,
    pub registry_name: String,
    /// Registry schema, or one synthesized from the record's keys when the
    /// registry declares no fields.
    pub schema: RegistrySchema,
    pub attributes: Map<String, Value>,
    pub photo_ref: Option<String>,
}

impl ResolvedRecord {
    /// Value of the first schema field, rendered as text.
    pub fn display_name(&self) -> Option<String> {
        let field = self.schema.display_field()?;
        match self.attributes.get(&field.name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    /// Stored registry or record data has an unexpected shape.
    #[error("Corrupt registry data: {0}")]
    Corrupt(String),
}

/// Looks up records across registries.
#[derive(Clone)]
pub struct RegistryResolver {
    db: GateDatabase,
}

impl RegistryResolver {
    pub const fn new(db: GateDatabase) -> Self {
        Self { db }
    }

    /// Find the registry holding `record_id`.
    ///
    /// `hints` are tried in order before the full scan; duplicates and blank
    /// hints are skipped. Returns `Ok(None)` when no registry holds the record.
    pub async fn resolve(
        &self,
        record_id: &str,
        hints: &[&str],
    ) -> Result<Option<ResolvedRecord>, ResolveError> {
        let mut tried: Vec<&str> = Vec::with_capacity(hints.len());

        for &hint in hints {
            if hint.is_empty() || tried.contains(&hint) {
                continue;
            }
            tried.push(hint);
            if let Some(row) = self.db.find_record_in_registry(hint, record_id).await? {
                return resolved(row).map(Some);
            }
            debug!(record_id, registry_id = hint, "Registry hint missed");
        }

        for registry_id in self.db.list_registry_ids().await? {
            if tried.contains(&registry_id.as_str()) {
                continue;
            }
            if let Some(row) = self
                .db
                .find_record_in_registry(&registry_id, record_id)
                .await?
            {
                return resolved(row).map(Some);
            }
        }

        Ok(None)
    }
}

fn resolved(row: RecordWithRegistry) -> Result<ResolvedRecord, ResolveError> {
    let attributes = match serde_json::from_str::<Value>(&row.attributes_json) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            return Err(ResolveError::Corrupt(format!(
                "record {} attributes are not an object: {other}",
                row.id
            )));
        }
        Err(e) => {
            return Err(ResolveError::Corrupt(format!(
                "record {} attributes: {e}",
                row.id
            )));
        }
    };

    let schema = RegistrySchema::from_json(&row.schema_json)
        .map_err(|e| ResolveError::Corrupt(format!("registry {} schema: {e}", row.registry_id)))?;
    let schema = if schema.is_empty() {
        RegistrySchema::synthesize_from(&attributes)
    } else {
        schema
    };

    Ok(ResolvedRecord {
        record_id: row.id,
        registry_id: row.registry_id,
        registry_name: row.registry_name,
        schema,
        attributes,
        photo_ref: row.photo_ref,
    })
}
