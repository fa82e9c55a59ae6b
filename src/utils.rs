//! Identifier generation and payload hashing

use std::borrow::Cow;

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Hex sha256 of a submission payload, compared on replay.
pub fn payload_digest(payload: &[u8]) -> String {
    sha256::digest(payload)
}

/// Escape one component of a store key so it never contains the `/` separator.
/// The mapping is injective, so distinct components always give distinct keys.
pub fn key_segment(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['/', '%']) {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(raw.replace('%', "%25").replace('/', "%2F"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_sensitive() {
        assert_eq!(payload_digest(b"abc"), payload_digest(b"abc"));
        assert_ne!(payload_digest(b"abc"), payload_digest(b"abd"));
    }

    #[test]
    fn key_segments_never_carry_separators() {
        assert_eq!(key_segment("client-a"), "client-a");
        assert_eq!(key_segment("tpp/x"), "tpp%2Fx");
        assert_eq!(key_segment("50%/off"), "50%25%2Foff");
        // an escaped-looking raw value stays distinct from the escaped form
        assert_ne!(key_segment("tpp%2Fx"), key_segment("tpp/x"));
    }
}
