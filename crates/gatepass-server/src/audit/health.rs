//! Audit health signal.
//!
//! Counts access-log writes that did not land and fans out an alert for each
//! one on a broadcast channel, so operators learn about audit gaps without
//! the scan itself being denied.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;

const ALERT_CAPACITY: usize = 64;

/// One access-log write that did not complete in time or failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditAlert {
    pub attempt_id: String,
    pub granted: bool,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

/// Point-in-time view served on `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub logged_attempts: u64,
    pub unlogged_attempts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

pub struct AuditHealth {
    logged: AtomicU64,
    unlogged: AtomicU64,
    last_error: Mutex<Option<String>>,
    alerts: broadcast::Sender<AuditAlert>,
}

impl Default for AuditHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditHealth {
    pub fn new() -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CAPACITY);
        Self {
            logged: AtomicU64::new(0),
            unlogged: AtomicU64::new(0),
            last_error: Mutex::new(None),
            alerts,
        }
    }

    /// Receive alerts raised after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditAlert> {
        self.alerts.subscribe()
    }

    pub(crate) fn record_logged(&self) {
        self.logged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unlogged(&self, alert: AuditAlert) {
        self.unlogged.fetch_add(1, Ordering::Relaxed);
        *self
            .last_error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(alert.error.clone());
        // No subscribers is fine; the counters still record the gap.
        let _ = self.alerts.send(alert);
    }

    /// A write previously counted as unlogged finished after its deadline.
    pub(crate) fn record_late_write(&self) {
        let _ = self
            .unlogged
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        self.logged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let unlogged = self.unlogged.load(Ordering::Relaxed);
        HealthSnapshot {
            status: if unlogged == 0 {
                HealthStatus::Ok
            } else {
                HealthStatus::Degraded
            },
            logged_attempts: self.logged.load(Ordering::Relaxed),
            unlogged_attempts: unlogged,
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone(),
        }
    }
}
