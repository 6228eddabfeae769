#![allow(clippy::unwrap_used)] // Property tests use unwrap for brevity

//! Property-based tests for the payload codec and signer.

use std::time::Duration;

use gatepass_crypto::codec::{decode, encode};
use gatepass_crypto::{Claims, FreshnessPolicy, PayloadSigner, TAG_LEN, VerifyError};
use proptest::prelude::*;

const SECRET: &[u8] = b"property-test-secret-property-test-secret";
const HEX: &[u8] = b"0123456789ABCDEF";

/// Identifiers as an importer would produce them: printable, 1..=64 bytes.
fn ident() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.:-]{1,64}"
}

fn claims() -> impl Strategy<Value = Claims> {
    (
        ident(),
        0i64..=4_102_444_800,
        prop::option::of(ident()),
        prop::option::of(ident()),
    )
        .prop_map(|(record_id, issued_at, registry_hint, credential_id)| Claims {
            record_id,
            issued_at,
            registry_hint,
            credential_id,
        })
}

fn signer(validity_secs: u64) -> PayloadSigner {
    PayloadSigner::new(
        SECRET,
        FreshnessPolicy {
            validity: Duration::from_secs(validity_secs),
            clock_skew: Duration::from_secs(5),
        },
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// decode(encode(c)) == c for every valid claim set.
    #[test]
    fn codec_roundtrip(c in claims()) {
        prop_assert_eq!(decode(&encode(&c).unwrap()).unwrap(), c);
    }

    /// Signed payloads verify back to the same claims inside the window.
    #[test]
    fn sign_verify_roundtrip(c in claims()) {
        let s = signer(86_400);
        let payload = s.sign(&c).unwrap();
        prop_assert_eq!(s.verify_at(payload.as_str(), c.issued_at).unwrap(), c);
    }

    /// Replacing any single character of the tag region with another
    /// transport character is detected.
    #[test]
    fn tag_tamper_detected(
        c in claims(),
        pos in any::<prop::sample::Index>(),
        replacement in any::<prop::sample::Index>(),
    ) {
        let s = signer(86_400);
        let payload = s.sign(&c).unwrap().into_string();
        let tag_chars = TAG_LEN * 2;
        let idx = payload.len() - tag_chars + pos.index(tag_chars);

        let original = payload.as_bytes()[idx];
        let mut candidate = HEX[replacement.index(HEX.len())];
        if candidate == original {
            candidate = HEX[(replacement.index(HEX.len()) + 1) % HEX.len()];
        }
        let mut bytes = payload.into_bytes();
        bytes[idx] = candidate;
        let tampered = String::from_utf8(bytes).unwrap();

        prop_assert_eq!(s.verify_at(&tampered, c.issued_at), Err(VerifyError::TagMismatch));
    }

    /// Valid one second before the window closes, expired one second after.
    #[test]
    fn expiry_is_monotonic(c in claims(), window in 10u64..=200_000) {
        let s = signer(window);
        let payload = s.sign(&c).unwrap();
        let window = i64::try_from(window).unwrap();

        prop_assert!(s.verify_at(payload.as_str(), c.issued_at + window - 1).is_ok());
        let late = s.verify_at(payload.as_str(), c.issued_at + window + 1);
        prop_assert!(matches!(late, Err(VerifyError::Expired { .. })), "{:?}", late);
    }
}
