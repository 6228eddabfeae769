//! Compact claim codec.
//!
//! Canonical byte layout (all integers big-endian):
//!
//! ```text
//! [version:1][flags:1][issued_at:8][record_len:1][record_id]
//!   [hint_len:1][registry_hint]        if flags & HAS_HINT
//!   [cred_len:1][credential_id]        if flags & HAS_CREDENTIAL
//! ```
//!
//! The transport form is `GP1:` followed by the uppercase hex of the signed
//! region and the tag. Uppercase hex keeps the whole string inside the QR
//! alphanumeric set, so encoders pick the dense mode.

use crate::error::{CryptoError, DecodeError};

/// Prefix that marks a string as ours before any decoding happens.
pub const TRANSPORT_PREFIX: &str = "GP1:";

/// Length in bytes of the truncated integrity tag.
pub const TAG_LEN: usize = 16;

const FORMAT_VERSION: u8 = 1;
const HAS_HINT: u8 = 0b01;
const HAS_CREDENTIAL: u8 = 0b10;
const KNOWN_FLAGS: u8 = HAS_HINT | HAS_CREDENTIAL;
const MAX_FIELD_LEN: usize = u8::MAX as usize;
const HEADER_LEN: usize = 1 + 1 + 8;

/// The minimal claim set bound into a credential payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Claims {
    /// Registrant record identifier.
    pub record_id: String,
    /// Unix seconds at which the payload was minted.
    pub issued_at: i64,
    /// Registry the record belonged to at issuance.
    pub registry_hint: Option<String>,
    /// Credential row the payload was minted from.
    pub credential_id: Option<String>,
}

impl Claims {
    pub fn new(record_id: impl Into<String>, issued_at: i64) -> Self {
        Self {
            record_id: record_id.into(),
            issued_at,
            registry_hint: None,
            credential_id: None,
        }
    }

    #[must_use]
    pub fn with_registry_hint(mut self, registry_id: impl Into<String>) -> Self {
        self.registry_hint = Some(registry_id.into());
        self
    }

    #[must_use]
    pub fn with_credential(mut self, credential_id: impl Into<String>) -> Self {
        self.credential_id = Some(credential_id.into());
        self
    }

    /// Check that the claims fit the encoding, without encoding them.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.record_id.is_empty() {
            return Err(CryptoError::EmptyRecordId);
        }
        check_len("record_id", &self.record_id)?;
        if let Some(hint) = &self.registry_hint {
            check_len("registry_hint", hint)?;
        }
        if let Some(cred) = &self.credential_id {
            check_len("credential_id", cred)?;
        }
        Ok(())
    }
}

/// Serialize claims into their canonical signed-region bytes.
pub fn canonical_bytes(claims: &Claims) -> Result<Vec<u8>, CryptoError> {
    claims.validate()?;

    let mut flags = 0u8;
    if claims.registry_hint.is_some() {
        flags |= HAS_HINT;
    }
    if claims.credential_id.is_some() {
        flags |= HAS_CREDENTIAL;
    }

    let mut out = Vec::with_capacity(HEADER_LEN + 3 + claims.record_id.len() + 72);
    out.push(FORMAT_VERSION);
    out.push(flags);
    out.extend_from_slice(&claims.issued_at.to_be_bytes());
    push_field(&mut out, &claims.record_id);
    if let Some(hint) = &claims.registry_hint {
        push_field(&mut out, hint);
    }
    if let Some(cred) = &claims.credential_id {
        push_field(&mut out, cred);
    }
    Ok(out)
}

/// Parse canonical bytes back into claims.
pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Claims, DecodeError> {
    let mut reader = Reader { bytes, pos: 0 };

    let version = reader.byte()?;
    if version != FORMAT_VERSION {
        return Err(DecodeError::Corrupt(format!(
            "unsupported format version {version}"
        )));
    }
    let flags = reader.byte()?;
    if flags & !KNOWN_FLAGS != 0 {
        return Err(DecodeError::Corrupt(format!("unknown flags {flags:#04x}")));
    }
    let issued_at = i64::from_be_bytes(reader.array::<8>()?);
    let record_id = reader.field("record_id")?;
    if record_id.is_empty() {
        return Err(DecodeError::Corrupt("empty record_id".into()));
    }
    let registry_hint = if flags & HAS_HINT != 0 {
        Some(reader.field("registry_hint")?)
    } else {
        None
    };
    let credential_id = if flags & HAS_CREDENTIAL != 0 {
        Some(reader.field("credential_id")?)
    } else {
        None
    };

    if reader.pos != bytes.len() {
        return Err(DecodeError::Corrupt(format!(
            "{} trailing bytes",
            bytes.len() - reader.pos
        )));
    }

    Ok(Claims {
        record_id,
        issued_at,
        registry_hint,
        credential_id,
    })
}

/// Encode claims as an uppercase-hex string (unsigned form).
///
/// Identical claims always produce the identical string.
pub fn encode(claims: &Claims) -> Result<String, CryptoError> {
    Ok(hex::encode_upper(canonical_bytes(claims)?))
}

/// Decode an unsigned claim string produced by [`encode`].
pub fn decode(encoded: &str) -> Result<Claims, DecodeError> {
    from_canonical_bytes(&hex_to_bytes(encoded)?)
}

/// Build the transport string from the signed region and its tag.
pub(crate) fn to_transport(signed_region: &[u8], tag: &[u8; TAG_LEN]) -> String {
    let mut s = String::with_capacity(TRANSPORT_PREFIX.len() + (signed_region.len() + TAG_LEN) * 2);
    s.push_str(TRANSPORT_PREFIX);
    s.push_str(&hex::encode_upper(signed_region));
    s.push_str(&hex::encode_upper(tag));
    s
}

/// Split a transport string into the signed region and its tag.
pub(crate) fn from_transport(transport: &str) -> Result<(Vec<u8>, [u8; TAG_LEN]), DecodeError> {
    let body = transport
        .strip_prefix(TRANSPORT_PREFIX)
        .ok_or(DecodeError::NotOurFormat("missing GP1 prefix"))?;
    let mut bytes = hex_to_bytes(body)?;
    if bytes.len() <= TAG_LEN + HEADER_LEN {
        return Err(DecodeError::Corrupt(format!(
            "payload too short ({} bytes)",
            bytes.len()
        )));
    }
    let tag_bytes = bytes.split_off(bytes.len() - TAG_LEN);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&tag_bytes);
    Ok((bytes, tag))
}

/// Cheap shape check for scanner-side filtering. Not a security boundary.
pub fn looks_like_payload(candidate: &str, min_len: usize) -> bool {
    candidate.len() >= min_len
        && candidate
            .strip_prefix(TRANSPORT_PREFIX)
            .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(is_upper_hex))
}

const fn is_upper_hex(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'A'..=b'F')
}

fn hex_to_bytes(s: &str) -> Result<Vec<u8>, DecodeError> {
    if !s.bytes().all(is_upper_hex) {
        return Err(DecodeError::NotOurFormat("characters outside transport alphabet"));
    }
    if s.len() % 2 != 0 {
        return Err(DecodeError::Corrupt("odd hex length".into()));
    }
    hex::decode(s).map_err(|e| DecodeError::Corrupt(e.to_string()))
}

fn check_len(field: &'static str, value: &str) -> Result<(), CryptoError> {
    if value.len() > MAX_FIELD_LEN {
        return Err(CryptoError::FieldTooLong {
            field,
            len: value.len(),
            max: MAX_FIELD_LEN,
        });
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn push_field(out: &mut Vec<u8>, value: &str) {
    // Length already checked against MAX_FIELD_LEN.
    out.push(value.len() as u8);
    out.extend_from_slice(value.as_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| DecodeError::Corrupt(format!("truncated at byte {}", self.pos)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N)?);
        Ok(arr)
    }

    fn field(&mut self, name: &str) -> Result<String, DecodeError> {
        let len = usize::from(self.byte()?);
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| DecodeError::Corrupt(format!("{name} is not UTF-8")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Claims {
        Claims::new("rec-42", 1_760_000_000)
            .with_registry_hint("reg-1")
            .with_credential("cred-9")
    }

    #[test]
    fn encode_is_deterministic() {
        assert_eq!(encode(&sample()).unwrap(), encode(&sample()).unwrap());
    }

    #[test]
    fn roundtrip_without_optional_fields() {
        let claims = Claims::new("only-record", -5);
        assert_eq!(decode(&encode(&claims).unwrap()).unwrap(), claims);
    }

    #[test]
    fn encoded_form_has_no_separators() {
        let encoded = encode(&sample()).unwrap();
        assert!(encoded.bytes().all(is_upper_hex), "{encoded}");
        assert!(!encoded.contains("rec-42"));
    }

    #[test]
    fn empty_record_id_is_rejected() {
        assert!(matches!(
            encode(&Claims::new("", 0)),
            Err(CryptoError::EmptyRecordId)
        ));
    }

    #[test]
    fn oversize_field_is_rejected() {
        let claims = Claims::new("r", 0).with_registry_hint("x".repeat(256));
        assert!(matches!(
            encode(&claims),
            Err(CryptoError::FieldTooLong {
                field: "registry_hint",
                ..
            })
        ));
    }

    #[test]
    fn validate_matches_encode_limits() {
        assert!(sample().validate().is_ok());
        assert!(Claims::new("x".repeat(255), 0).validate().is_ok());
        assert!(matches!(
            Claims::new("x".repeat(256), 0).validate(),
            Err(CryptoError::FieldTooLong {
                field: "record_id",
                ..
            })
        ));
        assert!(matches!(
            Claims::new("r", 0).with_credential("c".repeat(300)).validate(),
            Err(CryptoError::FieldTooLong {
                field: "credential_id",
                ..
            })
        ));
    }

    #[test]
    fn lowercase_is_not_our_format() {
        let encoded = encode(&sample()).unwrap().to_lowercase();
        assert!(matches!(decode(&encoded), Err(DecodeError::NotOurFormat(_))));
    }

    #[test]
    fn truncated_input_is_corrupt() {
        let encoded = encode(&sample()).unwrap();
        let cut = &encoded[..encoded.len() - 4];
        assert!(matches!(decode(cut), Err(DecodeError::Corrupt(_))));
    }

    #[test]
    fn trailing_bytes_are_corrupt() {
        let encoded = format!("{}00", encode(&sample()).unwrap());
        assert!(matches!(decode(&encoded), Err(DecodeError::Corrupt(_))));
    }

    #[test]
    fn unknown_version_is_corrupt() {
        let mut bytes = canonical_bytes(&sample()).unwrap();
        bytes[0] = 9;
        assert!(matches!(
            from_canonical_bytes(&bytes),
            Err(DecodeError::Corrupt(msg)) if msg.contains("version")
        ));
    }

    #[test]
    fn unknown_flags_are_corrupt() {
        let mut bytes = canonical_bytes(&sample()).unwrap();
        bytes[1] |= 0b100;
        assert!(from_canonical_bytes(&bytes).is_err());
    }

    #[test]
    fn transport_split_recovers_region_and_tag() {
        let region = canonical_bytes(&sample()).unwrap();
        let tag = [0xAB; TAG_LEN];
        let transport = to_transport(&region, &tag);
        assert!(transport.starts_with(TRANSPORT_PREFIX));

        let (got_region, got_tag) = from_transport(&transport).unwrap();
        assert_eq!(got_region, region);
        assert_eq!(got_tag, tag);
    }

    #[test]
    fn foreign_strings_are_not_our_format() {
        for input in ["https://example.com/badge", "", "GP2:ABCD", "WIFI:S:guest;;"] {
            assert!(
                matches!(from_transport(input), Err(DecodeError::NotOurFormat(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn shape_filter() {
        let region = canonical_bytes(&sample()).unwrap();
        let transport = to_transport(&region, &[1; TAG_LEN]);
        assert!(looks_like_payload(&transport, 24));
        assert!(!looks_like_payload(&transport, transport.len() + 1));
        assert!(!looks_like_payload("GP1:", 0));
        assert!(!looks_like_payload("GP1:abcd", 0));
        assert!(!looks_like_payload("hello world, this is long enough", 8));
    }
}
