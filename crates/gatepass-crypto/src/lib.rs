//! `GatePass` Credential Payload Library
//!
//! Mints and checks the tamper-evident strings embedded in QR credentials.
//!
//! ## Layout
//!
//! - **Codec**: claim set ↔ canonical bytes ↔ uppercase-hex transport string
//!   (`GP1:` prefix, QR alphanumeric friendly)
//! - **Signer**: HMAC-SHA256 over the canonical bytes, truncated to 128 bits,
//!   appended to the transport string
//! - **Freshness**: validity window with a forward clock-skew tolerance
//!
//! Verification is pure: no I/O, no global state, the key is injected at
//! construction.

pub mod codec;
pub mod error;
pub mod signer;

pub use codec::{Claims, TAG_LEN, TRANSPORT_PREFIX, looks_like_payload};
pub use error::{CryptoError, DecodeError, VerifyError};
pub use signer::{FreshnessPolicy, MIN_SECRET_LEN, Payload, PayloadSigner};
