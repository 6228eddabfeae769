//! Registry and record queries.
//!
//! Registry CRUD and record writes belong to the administrative side; they
//! live here so the resolver, the issuer and the tests share one schema.

use gatepass_core::db::unix_timestamp;
use serde_json::{Map, Value};

use super::db::{DatabaseError, GateDatabase};
use super::models::{Record, RecordWithRegistry, Registry};
use crate::registry::schema::RegistrySchema;

/// Parameters for inserting a record.
pub struct NewRecord<'a> {
    pub id: &'a str,
    pub registry_id: &'a str,
    pub attributes: &'a Map<String, Value>,
    pub photo_ref: Option<&'a str>,
}

impl GateDatabase {
    // =========================================================================
    // Registry queries
    // =========================================================================

    /// Create a registry with the given schema.
    pub async fn create_registry(
        &self,
        id: &str,
        name: &str,
        schema: &RegistrySchema,
    ) -> Result<Registry, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query("INSERT INTO registries (id, name, schema_json, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(schema.to_json())
            .bind(now)
            .execute(self.pool())
            .await?;

        self.get_registry(id).await
    }

    /// Get a registry by ID.
    pub async fn get_registry(&self, id: &str) -> Result<Registry, DatabaseError> {
        sqlx::query_as::<_, Registry>("SELECT * FROM registries WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Registry {id}")))
    }

    /// List registry IDs in creation order (ties broken by insertion order).
    pub async fn list_registry_ids(&self) -> Result<Vec<String>, DatabaseError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM registries ORDER BY created_at ASC, rowid ASC")
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Delete a registry. Its records and their credentials go with it.
    pub async fn delete_registry(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM registries WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Record queries
    // =========================================================================

    /// Insert a record after validating it against its registry's schema.
    pub async fn create_record(&self, params: &NewRecord<'_>) -> Result<Record, DatabaseError> {
        let registry = self.get_registry(params.registry_id).await?;
        validate_against(&registry, params.attributes)?;

        let now = unix_timestamp();
        let attributes_json = serde_json::to_string(params.attributes)
            .map_err(|e| DatabaseError::Invalid(e.to_string()))?;

        sqlx::query(
            "INSERT INTO records (id, registry_id, attributes_json, photo_ref, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(params.id)
        .bind(params.registry_id)
        .bind(attributes_json)
        .bind(params.photo_ref)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_record(params.id).await
    }

    /// Get a record by ID.
    pub async fn get_record(&self, id: &str) -> Result<Record, DatabaseError> {
        sqlx::query_as::<_, Record>("SELECT * FROM records WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Record {id}")))
    }

    /// Replace a record's attributes, validated against the current schema.
    pub async fn update_record_attributes(
        &self,
        id: &str,
        attributes: &Map<String, Value>,
    ) -> Result<Record, DatabaseError> {
        let record = self.get_record(id).await?;
        let registry = self.get_registry(&record.registry_id).await?;
        validate_against(&registry, attributes)?;

        let attributes_json = serde_json::to_string(attributes)
            .map_err(|e| DatabaseError::Invalid(e.to_string()))?;
        sqlx::query("UPDATE records SET attributes_json = ?, updated_at = ? WHERE id = ?")
            .bind(attributes_json)
            .bind(unix_timestamp())
            .bind(id)
            .execute(self.pool())
            .await?;

        self.get_record(id).await
    }

    /// Move a record to another registry without touching its credentials.
    pub async fn move_record(&self, id: &str, registry_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE records SET registry_id = ?, updated_at = ? WHERE id = ?")
            .bind(registry_id)
            .bind(unix_timestamp())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a record.
    pub async fn delete_record(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Look up a record inside one registry, joined with that registry.
    ///
    /// A single statement, so a concurrent registry delete either happens
    /// before (no row) or after (full row) the read.
    pub async fn find_record_in_registry(
        &self,
        registry_id: &str,
        record_id: &str,
    ) -> Result<Option<RecordWithRegistry>, DatabaseError> {
        let row = sqlx::query_as::<_, RecordWithRegistry>(
            "SELECT r.id, r.registry_id, r.attributes_json, r.photo_ref, g.name AS registry_name, g.schema_json \
             FROM records r JOIN registries g ON g.id = r.registry_id \
             WHERE r.registry_id = ? AND r.id = ?",
        )
        .bind(registry_id)
        .bind(record_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }
}

fn validate_against(registry: &Registry, attributes: &Map<String, Value>) -> Result<(), DatabaseError> {
    let schema = RegistrySchema::from_json(&registry.schema_json)
        .map_err(|e| DatabaseError::Corrupt(format!("Registry {} schema: {e}", registry.id)))?;
    schema
        .validate(attributes)
        .map_err(|e| DatabaseError::Invalid(format!("Registry {}: {e}", registry.id)))
}
