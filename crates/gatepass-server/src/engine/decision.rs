//! Decision types produced by the verification engine.

use std::fmt;

use gatepass_crypto::VerifyError;
use serde::{Deserialize, Serialize};

use crate::registry::ResolvedRecord;

/// Why an attempt was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    MalformedPayload,
    InvalidSignature,
    Expired,
    RecordNotFound,
    CredentialInactive,
    StorageUnavailable,
    InternalError,
}

impl ReasonCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedPayload => "MALFORMED_PAYLOAD",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::Expired => "EXPIRED",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::CredentialInactive => "CREDENTIAL_INACTIVE",
            Self::StorageUnavailable => "STORAGE_UNAVAILABLE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Only a storage outage can clear up on its own.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::StorageUnavailable)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&VerifyError> for ReasonCode {
    fn from(e: &VerifyError) -> Self {
        match e {
            VerifyError::Malformed(_) => Self::MalformedPayload,
            VerifyError::TagMismatch => Self::InvalidSignature,
            VerifyError::Expired { .. } | VerifyError::NotYetValid { .. } => Self::Expired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    Denied(ReasonCode),
}

impl Decision {
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }

    pub const fn reason(self) -> Option<ReasonCode> {
        match self {
            Self::Granted => None,
            Self::Denied(reason) => Some(reason),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Granted => "GRANTED",
            Self::Denied(_) => "DENIED",
        }
    }
}

/// Progress of one attempt. Each stage is only entered after the previous
/// one passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptState {
    Received,
    SignatureChecked,
    Resolved,
    CredentialChecked,
    Decided,
}

/// Input to one verification attempt.
#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    pub payload: String,
    pub location: Option<String>,
    pub registry_hint: Option<String>,
    /// Scanning operator.
    pub actor: String,
    /// Caller-chosen id; retries with the same id are logged once.
    pub attempt_id: Option<String>,
    /// Network/client metadata, stored verbatim.
    pub client_meta: Option<String>,
}

/// Result of one verification attempt.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub attempt_id: String,
    pub decision: Decision,
    /// Last stage the attempt passed before the decision.
    pub reached: AttemptState,
    pub record: Option<ResolvedRecord>,
    pub credential_id: Option<String>,
    /// Whether the access log row is known to exist.
    pub logged: bool,
}

impl VerificationOutcome {
    pub const fn retryable(&self) -> bool {
        match self.decision.reason() {
            Some(reason) => reason.is_retryable(),
            None => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gatepass_crypto::DecodeError;

    use super::*;

    #[test]
    fn verify_errors_map_to_reasons() {
        assert_eq!(
            ReasonCode::from(&VerifyError::Malformed(DecodeError::NotOurFormat("prefix"))),
            ReasonCode::MalformedPayload
        );
        assert_eq!(
            ReasonCode::from(&VerifyError::TagMismatch),
            ReasonCode::InvalidSignature
        );
        assert_eq!(
            ReasonCode::from(&VerifyError::NotYetValid {
                issued_at: 10,
                now: 0
            }),
            ReasonCode::Expired
        );
    }

    #[test]
    fn only_storage_is_retryable() {
        let all = [
            ReasonCode::MalformedPayload,
            ReasonCode::InvalidSignature,
            ReasonCode::Expired,
            ReasonCode::RecordNotFound,
            ReasonCode::CredentialInactive,
            ReasonCode::StorageUnavailable,
            ReasonCode::InternalError,
        ];
        let retryable: Vec<_> = all.into_iter().filter(|r| r.is_retryable()).collect();
        assert_eq!(retryable, vec![ReasonCode::StorageUnavailable]);
    }

    #[test]
    fn reason_serializes_as_wire_code() {
        for reason in [ReasonCode::CredentialInactive, ReasonCode::InternalError] {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json, reason.as_str());
        }
    }
}
