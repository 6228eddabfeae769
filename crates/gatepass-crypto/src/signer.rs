//! Payload signing and verification.
//!
//! The tag is HMAC-SHA256 over a domain separator followed by the canonical
//! claim bytes, truncated to [`TAG_LEN`] bytes. The secret never leaves this
//! type and is zeroized on drop.

use std::fmt;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::codec::{self, Claims, TAG_LEN};
use crate::error::{CryptoError, VerifyError};

/// Domain separation for payload tags.
const MAC_DOMAIN: &[u8] = b"gatepass-credential-payload-v1";

/// Minimum accepted signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// How long payloads stay valid and how much clock drift is forgiven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub validity: Duration,
    pub clock_skew: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            validity: Duration::from_secs(24 * 60 * 60),
            clock_skew: Duration::from_secs(5),
        }
    }
}

/// A signed transport string, ready to be embedded in a QR symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(String);

impl Payload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Payload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Signs claim sets and verifies scanned payloads with a server-held key.
pub struct PayloadSigner {
    key: Zeroizing<Vec<u8>>,
    policy: FreshnessPolicy,
}

impl fmt::Debug for PayloadSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadSigner")
            .field("key", &"<redacted>")
            .field("policy", &self.policy)
            .finish()
    }
}

impl PayloadSigner {
    /// Create a signer from a secret of at least [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: &[u8], policy: FreshnessPolicy) -> Result<Self, CryptoError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(CryptoError::SecretTooShort {
                expected: MIN_SECRET_LEN,
                actual: secret.len(),
            });
        }
        Ok(Self {
            key: Zeroizing::new(secret.to_vec()),
            policy,
        })
    }

    /// Sign a claim set. `claims.issued_at` is taken as-is.
    pub fn sign(&self, claims: &Claims) -> Result<Payload, CryptoError> {
        let region = codec::canonical_bytes(claims)?;
        let tag = self.tag(&region)?;
        Ok(Payload(codec::to_transport(&region, &tag)))
    }

    /// Verify a scanned payload against the current wall clock.
    pub fn verify(&self, payload: &str) -> Result<Claims, VerifyError> {
        self.verify_at(payload, now_secs())
    }

    /// Verify a scanned payload as of `now` (unix seconds).
    ///
    /// Checks run cheapest-first: shape, tag, then freshness. The claim bytes
    /// are only parsed after the tag matched.
    pub fn verify_at(&self, payload: &str, now: i64) -> Result<Claims, VerifyError> {
        let (region, tag) = codec::from_transport(payload)?;

        let expected = self.tag(&region).map_err(|_| VerifyError::TagMismatch)?;
        if !bool::from(expected[..].ct_eq(&tag[..])) {
            return Err(VerifyError::TagMismatch);
        }

        let claims = codec::from_canonical_bytes(&region)?;
        self.check_freshness(claims.issued_at, now)?;
        Ok(claims)
    }

    fn check_freshness(&self, issued_at: i64, now: i64) -> Result<(), VerifyError> {
        let validity = duration_secs(self.policy.validity);
        let skew = duration_secs(self.policy.clock_skew);

        let age = now.saturating_sub(issued_at);
        if age < 0 && -age > skew {
            return Err(VerifyError::NotYetValid { issued_at, now });
        }
        if age > validity {
            return Err(VerifyError::Expired {
                issued_at,
                age_secs: age,
            });
        }
        Ok(())
    }

    fn tag(&self, region: &[u8]) -> Result<[u8; TAG_LEN], CryptoError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .map_err(|e| CryptoError::Mac(e.to_string()))?;
        mac.update(MAC_DOMAIN);
        mac.update(region);
        let full = mac.finalize().into_bytes();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&full[..TAG_LEN]);
        Ok(tag)
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn duration_secs(d: Duration) -> i64 {
    d.as_secs() as i64
}

#[allow(clippy::cast_possible_wrap)]
fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
