//! Secret codec — Base32/Base64 text to raw key bytes and back.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;

use crate::otp::types::{KeyEncoding, TotpError, TotpErrorKind};

/// Decode a textual secret to raw key bytes.
///
/// Base32 input is uppercased first; RFC 4648 decoders commonly reject
/// lowercase letters, and secrets arrive in either case. Padded and
/// unpadded Base32 are both accepted.
pub fn decode(text: &str, encoding: KeyEncoding) -> Result<Vec<u8>, TotpError> {
    match encoding {
        KeyEncoding::Base32 => {
            let upper = text.to_uppercase();
            base32::decode(base32::Alphabet::Rfc4648 { padding: true }, &upper)
                .or_else(|| {
                    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, &upper)
                })
                .ok_or_else(|| {
                    TotpError::new(TotpErrorKind::InvalidSecret, "Invalid base-32 secret")
                })
        }
        KeyEncoding::Base64 => BASE64_STANDARD.decode(text).map_err(|e| {
            TotpError::new(TotpErrorKind::InvalidSecret, "Invalid base-64 secret")
                .with_detail(e.to_string())
        }),
    }
}

/// Encode raw key bytes into the textual representation.
pub fn encode(bytes: &[u8], encoding: KeyEncoding) -> String {
    match encoding {
        KeyEncoding::Base32 => {
            base32::encode(base32::Alphabet::Rfc4648 { padding: false }, bytes)
        }
        KeyEncoding::Base64 => BASE64_STANDARD.encode(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Base32 ───────────────────────────────────────────────────

    #[test]
    fn base32_roundtrip() {
        let original = b"hello world secret";
        let text = encode(original, KeyEncoding::Base32);
        let decoded = decode(&text, KeyEncoding::Base32).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn base32_case_insensitive() {
        let upper = decode("JBSWY3DPEHPK3PXP", KeyEncoding::Base32).unwrap();
        let lower = decode("jbswy3dpehpk3pxp", KeyEncoding::Base32).unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn base32_accepts_padding() {
        let padded = decode("MZXW6===", KeyEncoding::Base32).unwrap();
        let unpadded = decode("MZXW6", KeyEncoding::Base32).unwrap();
        assert_eq!(padded, b"foo");
        assert_eq!(unpadded, b"foo");
    }

    #[test]
    fn base32_rejects_invalid_alphabet() {
        let err = decode("!!!not-base32!!!", KeyEncoding::Base32).unwrap_err();
        assert_eq!(err.kind, TotpErrorKind::InvalidSecret);
    }

    // ── Base64 ───────────────────────────────────────────────────

    #[test]
    fn base64_roundtrip() {
        let original = b"12345678901234567890";
        let text = encode(original, KeyEncoding::Base64);
        let decoded = decode(&text, KeyEncoding::Base64).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn base64_rejects_bad_padding() {
        let err = decode("AAA=AAA", KeyEncoding::Base64).unwrap_err();
        assert_eq!(err.kind, TotpErrorKind::InvalidSecret);
        assert!(err.detail.is_some());
    }
}
