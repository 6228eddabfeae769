//! The verify-and-decide pipeline.

pub mod decision;
pub mod verifier;

pub use decision::{
    AttemptState, Decision, ReasonCode, VerificationOutcome, VerifyRequest,
};
pub use verifier::{EngineError, VerificationEngine};
