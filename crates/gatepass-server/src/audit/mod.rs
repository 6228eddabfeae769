//! Access log writing and the audit health signal.

pub mod health;
pub mod writer;

pub use health::{AuditAlert, AuditHealth, HealthSnapshot, HealthStatus};
pub use writer::{AccessLogWriter, LogOutcome};
