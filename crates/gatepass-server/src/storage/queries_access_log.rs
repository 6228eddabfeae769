//! Access log queries. Rows are inserted once; the only rewrite allowed is a
//! retry replacing a `STORAGE_UNAVAILABLE` denial under the same attempt id.

use super::db::{DatabaseError, GateDatabase};
use super::models::AccessLogEntry;

/// Reason code of the only denial a retry may overwrite.
const RETRYABLE_REASON: &str = "STORAGE_UNAVAILABLE";

/// Parameters for appending an access log row.
#[derive(Debug, Clone)]
pub struct NewAccessLogEntry {
    /// Attempt id; doubles as the idempotency key.
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

impl GateDatabase {
    /// Append an access log row.
    ///
    /// Returns `false` when a row with the same attempt id already holds a
    /// final outcome, so a retried write never produces a second row. A row
    /// that recorded a retryable denial is overwritten by the retry's outcome.
    pub async fn append_access_log(&self, entry: &NewAccessLogEntry) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO access_log (id, record_id, registry_id, credential_id, granted, reason_code, actor, location, occurred_at, client_meta) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
               record_id = excluded.record_id, registry_id = excluded.registry_id, \
               credential_id = excluded.credential_id, granted = excluded.granted, \
               reason_code = excluded.reason_code, actor = excluded.actor, \
               location = excluded.location, occurred_at = excluded.occurred_at, \
               client_meta = excluded.client_meta \
             WHERE access_log.reason_code = ?",
        )
        .bind(&entry.id)
        .bind(&entry.record_id)
        .bind(&entry.registry_id)
        .bind(&entry.credential_id)
        .bind(entry.granted)
        .bind(&entry.reason_code)
        .bind(&entry.actor)
        .bind(&entry.location)
        .bind(entry.occurred_at)
        .bind(&entry.client_meta)
        .bind(RETRYABLE_REASON)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get one access log row.
    pub async fn get_access_log_entry(&self, id: &str) -> Result<AccessLogEntry, DatabaseError> {
        sqlx::query_as::<_, AccessLogEntry>("SELECT * FROM access_log WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Access log entry {id}")))
    }

    /// Page through the access log, newest first.
    pub async fn list_access_log(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<AccessLogEntry>, DatabaseError> {
        let rows = sqlx::query_as::<_, AccessLogEntry>(
            "SELECT * FROM access_log ORDER BY occurred_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Access log rows mentioning a record, newest first.
    pub async fn list_access_log_for_record(
        &self,
        record_id: &str,
    ) -> Result<Vec<AccessLogEntry>, DatabaseError> {
        let rows = sqlx::query_as::<_, AccessLogEntry>(
            "SELECT * FROM access_log WHERE record_id = ? ORDER BY occurred_at DESC, rowid DESC",
        )
        .bind(record_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Total number of access log rows.
    pub async fn count_access_log(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM access_log")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }
}
