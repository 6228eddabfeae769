//! Credential issuance, payload refresh and revocation.

use std::sync::Arc;

use gatepass_core::db::unix_timestamp;
use gatepass_crypto::{Claims, CryptoError, PayloadSigner};
use tracing::{info, instrument, warn};

use super::qr::{RenderError, render_svg};
use crate::storage::{Credential, DatabaseError, GateDatabase};

/// Attempts made when a concurrent reissue wins the active slot first.
const ISSUE_ATTEMPTS: u32 = 3;

/// A freshly minted payload for a credential.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub credential: Credential,
    pub payload: String,
    /// SVG rendering of `payload`.
    pub image: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Credential {0} is not active")]
    Inactive(String),

    #[error("Storage error: {0}")]
    Storage(DatabaseError),

    #[error("Signing failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<DatabaseError> for IssueError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => Self::NotFound(what),
            other => Self::Storage(other),
        }
    }
}

/// Issues credentials and mints their payloads.
#[derive(Clone)]
pub struct CredentialIssuer {
    db: GateDatabase,
    signer: Arc<PayloadSigner>,
}

impl CredentialIssuer {
    pub const fn new(db: GateDatabase, signer: Arc<PayloadSigner>) -> Self {
        Self { db, signer }
    }

    /// Issue a new active credential for a record, superseding any prior one.
    #[instrument(skip(self))]
    pub async fn issue(
        &self,
        record_id: &str,
        registry_id: &str,
    ) -> Result<IssuedCredential, IssueError> {
        if self
            .db
            .find_record_in_registry(registry_id, record_id)
            .await?
            .is_none()
        {
            return Err(IssueError::NotFound(format!(
                "Record {record_id} in registry {registry_id}"
            )));
        }

        // Reject claims the codec cannot carry before rotating anything.
        Claims::new(record_id, 0)
            .with_registry_hint(registry_id)
            .with_credential(uuid::Uuid::nil().to_string())
            .validate()?;

        let mut attempt = 1;
        let credential = loop {
            let id = uuid::Uuid::new_v4().to_string();
            match self.db.issue_credential(&id, record_id, registry_id).await {
                Ok(credential) => break credential,
                Err(DatabaseError::Conflict(msg)) if attempt < ISSUE_ATTEMPTS => {
                    warn!(record_id, attempt, error = %msg, "Concurrent reissue, retrying");
                    attempt += 1;
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        info!(
            record_id,
            registry_id,
            credential_id = %credential.id,
            "Credential issued"
        );
        self.mint(credential)
    }

    /// Sign a fresh payload for an active credential without rotating it.
    #[instrument(skip(self))]
    pub async fn refresh_payload(&self, credential_id: &str) -> Result<IssuedCredential, IssueError> {
        let credential = self.db.get_credential(credential_id).await?;
        if !credential.active {
            return Err(IssueError::Inactive(credential.id));
        }
        self.mint(credential)
    }

    /// Deactivate a credential. Returns `false` if it was already inactive.
    #[instrument(skip(self))]
    pub async fn revoke(&self, credential_id: &str) -> Result<bool, IssueError> {
        if self.db.deactivate_credential(credential_id).await? {
            info!(credential_id, "Credential revoked");
            return Ok(true);
        }
        // Distinguish "unknown" from "already inactive".
        self.db.get_credential(credential_id).await?;
        Ok(false)
    }

    fn mint(&self, credential: Credential) -> Result<IssuedCredential, IssueError> {
        let claims = Claims::new(credential.record_id.clone(), unix_timestamp())
            .with_registry_hint(credential.registry_id.clone())
            .with_credential(credential.id.clone());
        let payload = self.signer.sign(&claims)?.into_string();
        let image = render_svg(&payload)?;

        Ok(IssuedCredential {
            credential,
            payload,
            image,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use gatepass_crypto::FreshnessPolicy;
    use serde_json::json;

    use super::*;
    use crate::registry::RegistrySchema;
    use crate::storage::NewRecord;

    const SECRET: &[u8] = b"issuer-test-secret-issuer-test-secret";

    async fn issuer() -> (CredentialIssuer, Arc<PayloadSigner>, GateDatabase) {
        let db = GateDatabase::open_in_memory().await.unwrap();
        db.create_registry("r1", "Staff", &RegistrySchema::default())
            .await
            .unwrap();
        db.create_record(&NewRecord {
            id: "u1",
            registry_id: "r1",
            attributes: json!({"name": "Ada"}).as_object().unwrap(),
            photo_ref: None,
        })
        .await
        .unwrap();
        let signer = Arc::new(PayloadSigner::new(SECRET, FreshnessPolicy::default()).unwrap());
        (
            CredentialIssuer::new(db.clone(), Arc::clone(&signer)),
            signer,
            db,
        )
    }

    #[tokio::test]
    async fn issued_payload_carries_binding() {
        let (issuer, signer, _db) = issuer().await;
        let issued = issuer.issue("u1", "r1").await.unwrap();

        let claims = signer.verify(&issued.payload).unwrap();
        assert_eq!(claims.record_id, "u1");
        assert_eq!(claims.registry_hint.as_deref(), Some("r1"));
        assert_eq!(claims.credential_id.as_deref(), Some(issued.credential.id.as_str()));
        assert!(issued.image.contains("<svg"));
    }

    #[tokio::test]
    async fn issue_for_missing_record() {
        let (issuer, _, _db) = issuer().await;
        assert!(matches!(
            issuer.issue("ghost", "r1").await,
            Err(IssueError::NotFound(_))
        ));
        assert!(matches!(
            issuer.issue("u1", "r9").await,
            Err(IssueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn oversize_record_id_leaves_credentials_untouched() {
        let (issuer, _, db) = issuer().await;
        let long_id = "u".repeat(300);
        db.create_record(&NewRecord {
            id: &long_id,
            registry_id: "r1",
            attributes: json!({"name": "Long"}).as_object().unwrap(),
            photo_ref: None,
        })
        .await
        .unwrap();

        assert!(matches!(
            issuer.issue(&long_id, "r1").await,
            Err(IssueError::Crypto(CryptoError::FieldTooLong {
                field: "record_id",
                ..
            }))
        ));
        assert!(db.find_active_credential(&long_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reissue_supersedes() {
        let (issuer, _, db) = issuer().await;
        let first = issuer.issue("u1", "r1").await.unwrap();
        let second = issuer.issue("u1", "r1").await.unwrap();

        let active = db.find_active_credential("u1").await.unwrap().unwrap();
        assert_eq!(active.id, second.credential.id);
        assert!(!db.get_credential(&first.credential.id).await.unwrap().active);
    }

    #[tokio::test]
    async fn refresh_keeps_credential() {
        let (issuer, _, _db) = issuer().await;
        let issued = issuer.issue("u1", "r1").await.unwrap();
        let refreshed = issuer.refresh_payload(&issued.credential.id).await.unwrap();
        assert_eq!(refreshed.credential.id, issued.credential.id);

        issuer.revoke(&issued.credential.id).await.unwrap();
        assert!(matches!(
            issuer.refresh_payload(&issued.credential.id).await,
            Err(IssueError::Inactive(_))
        ));
    }

    #[tokio::test]
    async fn revoke_twice_and_unknown() {
        let (issuer, _, _db) = issuer().await;
        let issued = issuer.issue("u1", "r1").await.unwrap();

        assert!(issuer.revoke(&issued.credential.id).await.unwrap());
        assert!(!issuer.revoke(&issued.credential.id).await.unwrap());
        assert!(matches!(
            issuer.revoke("nope").await,
            Err(IssueError::NotFound(_))
        ));
    }
}
