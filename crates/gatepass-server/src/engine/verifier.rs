//! Verification engine.
//!
//! One attempt walks `RECEIVED → SIGNATURE_CHECKED → RESOLVED →
//! CREDENTIAL_CHECKED → DECIDED`, stopping at the first failing stage. The
//! decision stage runs on its own task so that a panic inside it still ends
//! in a logged `DENIED(INTERNAL_ERROR)`. Every attempt is handed to the
//! access log writer before the outcome is returned, and a grant bumps the
//! credential's scan counter once per attempt id.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gatepass_core::db::unix_timestamp;
use gatepass_crypto::{Claims, PayloadSigner};
use tokio::task::JoinError;
use tracing::{Instrument, error, info, instrument, warn};

use super::decision::{
    AttemptState, Decision, ReasonCode, VerificationOutcome, VerifyRequest,
};
use crate::audit::{AccessLogWriter, LogOutcome};
use crate::registry::{RegistryResolver, ResolveError, ResolvedRecord};
use crate::storage::{DatabaseError, GateDatabase, NewAccessLogEntry};

/// Failure of a storage-backed stage.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    const fn reason(&self) -> ReasonCode {
        match self {
            Self::Storage(_) => ReasonCode::StorageUnavailable,
            Self::Internal(_) => ReasonCode::InternalError,
        }
    }
}

impl From<DatabaseError> for EngineError {
    fn from(e: DatabaseError) -> Self {
        if e.is_transient() {
            Self::Storage(e.to_string())
        } else {
            Self::Internal(e.to_string())
        }
    }
}

impl From<ResolveError> for EngineError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Storage(db) => db.into(),
            ResolveError::Corrupt(msg) => Self::Internal(msg),
        }
    }
}

/// What the decision stage produced, before logging.
#[derive(Debug)]
struct Verdict {
    decision: Decision,
    reached: AttemptState,
    record: Option<ResolvedRecord>,
    credential_id: Option<String>,
}

impl Verdict {
    const fn denied(reason: ReasonCode, reached: AttemptState) -> Self {
        Self {
            decision: Decision::Denied(reason),
            reached,
            record: None,
            credential_id: None,
        }
    }
}

/// Orchestrates signature check, registry resolution and credential check.
#[derive(Clone)]
pub struct VerificationEngine {
    db: GateDatabase,
    signer: Arc<PayloadSigner>,
    resolver: RegistryResolver,
    log: AccessLogWriter,
    storage_timeout: Duration,
}

impl VerificationEngine {
    pub fn new(
        db: GateDatabase,
        signer: Arc<PayloadSigner>,
        log: AccessLogWriter,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            resolver: RegistryResolver::new(db.clone()),
            db,
            signer,
            log,
            storage_timeout,
        }
    }

    /// Verify a scanned payload and decide. Never fails: every problem
    /// becomes a denial, and every attempt is logged.
    ///
    /// The attempt runs on its own task, so dropping this future does not
    /// skip the access log write.
    #[instrument(skip(self, request), fields(payload_len = request.payload.len(), attempt_id = tracing::field::Empty))]
    pub async fn verify(&self, request: VerifyRequest) -> VerificationOutcome {
        let attempt_id = request
            .attempt_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        tracing::Span::current().record("attempt_id", attempt_id.as_str());

        let engine = self.clone();
        let id = attempt_id.clone();
        let attempt = tokio::spawn(async move { engine.attempt(id, request).await }.in_current_span());

        attempt.await.unwrap_or_else(|e| {
            error!(error = %e, "Verification task failed");
            VerificationOutcome {
                attempt_id,
                decision: Decision::Denied(ReasonCode::InternalError),
                reached: AttemptState::Received,
                record: None,
                credential_id: None,
                logged: false,
            }
        })
    }

    /// Decide, log, then count the scan.
    async fn attempt(&self, attempt_id: String, request: VerifyRequest) -> VerificationOutcome {
        let engine = self.clone();
        let staged = request.clone();
        let verdict = contain(
            tokio::spawn(async move { engine.decide(&staged).await }.in_current_span()).await,
        );

        match verdict.decision {
            Decision::Granted => info!(
                record_id = verdict.record.as_ref().map_or("", |r| r.record_id.as_str()),
                "Access granted"
            ),
            Decision::Denied(reason) => info!(reason = %reason, reached = ?verdict.reached, "Access denied"),
        }

        let entry = NewAccessLogEntry {
            id: attempt_id.clone(),
            record_id: verdict.record.as_ref().map(|r| r.record_id.clone()),
            registry_id: verdict.record.as_ref().map(|r| r.registry_id.clone()),
            credential_id: verdict.credential_id.clone(),
            granted: verdict.decision.is_granted(),
            reason_code: verdict.decision.reason().map(|r| r.as_str().to_string()),
            actor: request.actor,
            location: request.location,
            occurred_at: unix_timestamp(),
            client_meta: request.client_meta,
        };
        let logged = self.log.append(entry).await;

        // A duplicate row means this attempt was already counted.
        if verdict.decision.is_granted()
            && logged != LogOutcome::Duplicate
            && let Some(credential_id) = verdict.credential_id.as_deref()
        {
            self.count_scan(credential_id).await;
        }

        VerificationOutcome {
            attempt_id,
            decision: verdict.decision,
            reached: verdict.reached,
            record: verdict.record,
            credential_id: verdict.credential_id,
            logged: logged.is_logged(),
        }
    }

    /// The counter is metadata; a failed bump never blocks entry.
    async fn count_scan(&self, credential_id: &str) {
        if let Err(e) = self.bounded(self.db.record_scan(credential_id)).await {
            warn!(credential_id, error = %e, "Scan counter update failed");
        }
    }

    async fn decide(&self, request: &VerifyRequest) -> Verdict {
        let claims = match self.signer.verify(&request.payload) {
            Ok(claims) => claims,
            Err(e) => {
                info!(check = e.reason(), "Payload rejected");
                return Verdict::denied(ReasonCode::from(&e), AttemptState::Received);
            }
        };

        let record = match self.resolve(request, &claims).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Verdict::denied(ReasonCode::RecordNotFound, AttemptState::SignatureChecked);
            }
            Err(e) => {
                warn!(record_id = %claims.record_id, error = %e, "Record resolution failed");
                return Verdict::denied(e.reason(), AttemptState::SignatureChecked);
            }
        };

        let active = match self
            .bounded(self.db.find_active_credential(&record.record_id))
            .await
        {
            Ok(active) => active,
            Err(e) => {
                warn!(record_id = %record.record_id, error = %e, "Credential lookup failed");
                return Verdict::denied(e.reason(), AttemptState::Resolved);
            }
        };

        let credential_id = match (active, claims.credential_id) {
            (None, bound) => {
                return Verdict {
                    decision: Decision::Denied(ReasonCode::CredentialInactive),
                    reached: AttemptState::Resolved,
                    record: Some(record),
                    credential_id: bound,
                };
            }
            (Some(active), Some(bound)) if active.id != bound => {
                info!(record_id = %record.record_id, "Superseded credential presented");
                return Verdict {
                    decision: Decision::Denied(ReasonCode::CredentialInactive),
                    reached: AttemptState::Resolved,
                    record: Some(record),
                    credential_id: Some(bound),
                };
            }
            (Some(active), _) => active.id,
        };

        Verdict {
            decision: Decision::Granted,
            reached: AttemptState::CredentialChecked,
            record: Some(record),
            credential_id: Some(credential_id),
        }
    }

    /// Request hint first, then the hint minted into the payload.
    async fn resolve(
        &self,
        request: &VerifyRequest,
        claims: &Claims,
    ) -> Result<Option<ResolvedRecord>, EngineError> {
        let hints: Vec<&str> = [
            request.registry_hint.as_deref(),
            claims.registry_hint.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();

        match tokio::time::timeout(
            self.storage_timeout,
            self.resolver.resolve(&claims.record_id, &hints),
        )
        .await
        {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(self.timed_out()),
        }
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, DatabaseError>>,
    ) -> Result<T, EngineError> {
        match tokio::time::timeout(self.storage_timeout, op).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(self.timed_out()),
        }
    }

    fn timed_out(&self) -> EngineError {
        EngineError::Storage(format!(
            "storage did not answer within {}ms",
            self.storage_timeout.as_millis()
        ))
    }
}

/// Turn a crashed decision task into an internal-error denial.
fn contain(joined: Result<Verdict, JoinError>) -> Verdict {
    joined.unwrap_or_else(|e| {
        error!(error = %e, "Decision stage panicked");
        Verdict::denied(ReasonCode::InternalError, AttemptState::Received)
    })
}
