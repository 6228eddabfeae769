//! Credential queries.
//!
//! The partial unique index `idx_credentials_one_active` guarantees at most
//! one active row per record; `issue_credential` deactivates the previous row
//! and inserts the new one inside a single transaction.

use gatepass_core::db::unix_timestamp;

use super::db::{DatabaseError, GateDatabase};
use super::models::Credential;

impl GateDatabase {
    /// Issue a new active credential for a record, deactivating any prior one.
    ///
    /// A concurrent issue for the same record surfaces as
    /// [`DatabaseError::Conflict`] from the unique index; callers may retry.
    pub async fn issue_credential(
        &self,
        id: &str,
        record_id: &str,
        registry_id: &str,
    ) -> Result<Credential, DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let superseded = sqlx::query(
            "UPDATE credentials SET active = 0, deactivated_at = ? WHERE record_id = ? AND active = 1",
        )
        .bind(now)
        .bind(record_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            "INSERT INTO credentials (id, record_id, registry_id, active, scan_count, issued_at) VALUES (?, ?, ?, 1, 0, ?)",
        )
        .bind(id)
        .bind(record_id)
        .bind(registry_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if superseded > 0 {
            tracing::debug!(record_id, superseded, "Prior credential deactivated");
        }

        self.get_credential(id).await
    }

    /// Get a credential by ID.
    pub async fn get_credential(&self, id: &str) -> Result<Credential, DatabaseError> {
        sqlx::query_as::<_, Credential>("SELECT * FROM credentials WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Credential {id}")))
    }

    /// The active credential of a record, if any.
    pub async fn find_active_credential(
        &self,
        record_id: &str,
    ) -> Result<Option<Credential>, DatabaseError> {
        let cred = sqlx::query_as::<_, Credential>(
            "SELECT * FROM credentials WHERE record_id = ? AND active = 1",
        )
        .bind(record_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(cred)
    }

    /// Deactivate a credential. Returns `false` if it was unknown or already inactive.
    pub async fn deactivate_credential(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE credentials SET active = 0, deactivated_at = ? WHERE id = ? AND active = 1",
        )
        .bind(unix_timestamp())
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Bump the scan counter of a credential.
    pub async fn record_scan(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE credentials SET scan_count = scan_count + 1, last_scanned_at = ? WHERE id = ?",
        )
        .bind(unix_timestamp())
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All credentials ever issued for a record, newest first.
    pub async fn list_credentials_for_record(
        &self,
        record_id: &str,
    ) -> Result<Vec<Credential>, DatabaseError> {
        let creds = sqlx::query_as::<_, Credential>(
            "SELECT * FROM credentials WHERE record_id = ? ORDER BY issued_at DESC, rowid DESC",
        )
        .bind(record_id)
        .fetch_all(self.pool())
        .await?;

        Ok(creds)
    }
}
