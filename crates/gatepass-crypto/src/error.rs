//! Crypto error types.

/// Errors raised while minting a payload.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Signing secret too short: expected at least {expected} bytes, got {actual}")]
    SecretTooShort { expected: usize, actual: usize },

    #[error("Claim field {field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Record id must not be empty")]
    EmptyRecordId,

    #[error("MAC initialisation failed: {0}")]
    Mac(String),
}

/// Why a string could not be turned back into a claim set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The input was never produced by this codec (wrong prefix or alphabet).
    #[error("Not a GatePass payload: {0}")]
    NotOurFormat(&'static str),

    /// The input has our shape but its content is damaged.
    #[error("Corrupt payload: {0}")]
    Corrupt(String),
}

/// Outcome of a failed verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("Malformed payload: {0}")]
    Malformed(#[from] DecodeError),

    #[error("Integrity tag mismatch")]
    TagMismatch,

    #[error("Payload expired: issued at {issued_at}, {age_secs}s old")]
    Expired { issued_at: i64, age_secs: i64 },

    #[error("Payload issued in the future: issued at {issued_at}, now {now}")]
    NotYetValid { issued_at: i64, now: i64 },
}

impl VerifyError {
    /// Stable machine-readable reason.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "MALFORMED",
            Self::TagMismatch => "TAG_MISMATCH",
            Self::Expired { .. } | Self::NotYetValid { .. } => "EXPIRED",
        }
    }
}
