//! Access log writer.
//!
//! Every verification attempt produces one row. The insert runs on its own
//! task and the caller waits at most `timeout` for it; a write that misses the
//! deadline keeps running in the background and is reconciled with
//! [`AuditHealth`] when it finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::health::{AuditAlert, AuditHealth};
use crate::storage::{DatabaseError, GateDatabase, NewAccessLogEntry};

/// What happened to one access log write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    Written,
    /// A row with the same attempt id already held a final outcome.
    Duplicate,
    TimedOut,
    Failed(String),
}

impl LogOutcome {
    /// Whether a row for the attempt is known to exist.
    pub const fn is_logged(&self) -> bool {
        matches!(self, Self::Written | Self::Duplicate)
    }
}

#[derive(Clone)]
pub struct AccessLogWriter {
    db: GateDatabase,
    timeout: Duration,
    health: Arc<AuditHealth>,
}

impl AccessLogWriter {
    pub const fn new(db: GateDatabase, timeout: Duration, health: Arc<AuditHealth>) -> Self {
        Self {
            db,
            timeout,
            health,
        }
    }

    pub fn health(&self) -> &Arc<AuditHealth> {
        &self.health
    }

    /// Append one row, waiting no longer than the configured timeout.
    pub async fn append(&self, entry: NewAccessLogEntry) -> LogOutcome {
        let attempt_id = entry.id.clone();
        let granted = entry.granted;

        let db = self.db.clone();
        let mut handle: JoinHandle<Result<bool, DatabaseError>> =
            tokio::spawn(async move { db.append_access_log(&entry).await });

        let outcome = match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(true))) => LogOutcome::Written,
            Ok(Ok(Ok(false))) => LogOutcome::Duplicate,
            Ok(Ok(Err(e))) => LogOutcome::Failed(e.to_string()),
            Ok(Err(join)) => LogOutcome::Failed(format!("log task failed: {join}")),
            Err(_) => {
                self.reconcile_late(handle, attempt_id.clone());
                LogOutcome::TimedOut
            }
        };

        match &outcome {
            LogOutcome::Written => self.health.record_logged(),
            LogOutcome::Duplicate => {
                debug!(attempt_id = %attempt_id, "Access log row already present");
            }
            LogOutcome::TimedOut => {
                warn!(attempt_id = %attempt_id, granted, timeout = ?self.timeout, "Access log write timed out");
                self.health.record_unlogged(AuditAlert {
                    attempt_id,
                    granted,
                    error: format!("log write exceeded {}ms", self.timeout.as_millis()),
                });
            }
            LogOutcome::Failed(e) => {
                error!(attempt_id = %attempt_id, granted, error = %e, "Access log write failed");
                self.health.record_unlogged(AuditAlert {
                    attempt_id,
                    granted,
                    error: e.clone(),
                });
            }
        }

        outcome
    }

    fn reconcile_late(&self, handle: JoinHandle<Result<bool, DatabaseError>>, attempt_id: String) {
        let health = Arc::clone(&self.health);
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(_)) => {
                    debug!(attempt_id = %attempt_id, "Late access log write landed");
                    health.record_late_write();
                }
                Ok(Err(e)) => {
                    error!(attempt_id = %attempt_id, error = %e, "Late access log write failed");
                }
                Err(e) => {
                    error!(attempt_id = %attempt_id, error = %e, "Late access log task failed");
                }
            }
        });
    }
}
