//! Core types for the TOTP engine and time-correction subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Algorithm
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hash algorithm used for HMAC-based OTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Sha1
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA1"),
            Self::Sha256 => write!(f, "SHA256"),
            Self::Sha512 => write!(f, "SHA512"),
        }
    }
}

impl Algorithm {
    /// Parse from a case-insensitive string.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SHA1" | "SHA-1" | "HMACSHA1" | "HMAC-SHA1" => Some(Self::Sha1),
            "SHA256" | "SHA-256" | "HMACSHA256" | "HMAC-SHA256" => Some(Self::Sha256),
            "SHA512" | "SHA-512" | "HMACSHA512" | "HMAC-SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Key encoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Textual representation of the shared secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEncoding {
    Base32,
    Base64,
}

impl Default for KeyEncoding {
    fn default() -> Self {
        Self::Base32
    }
}

impl fmt::Display for KeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base32 => write!(f, "base32"),
            Self::Base64 => write!(f, "base64"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Largest code modulus that still fits the 31-bit truncated hash.
pub const MAX_CODE_MODULUS: u32 = 1_000_000_000;

/// Immutable engine configuration.
///
/// `code_modulus` must be a power of ten no larger than 10^9 so the
/// truncated 31-bit hash covers the full code space and the rendered
/// width equals `log10(code_modulus)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpConfig {
    /// HMAC hash algorithm.
    pub algorithm: Algorithm,
    /// Time-step size in milliseconds (TOTP period).
    pub time_step_millis: i64,
    /// Modulus applied to the truncated hash (10^digits).
    pub code_modulus: u32,
    /// How the secret text is encoded.
    pub key_encoding: KeyEncoding,
    /// Number of adjacent time steps checked during validation.
    pub window_size: u32,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Sha1,
            time_step_millis: 30_000,
            code_modulus: 1_000_000,
            key_encoding: KeyEncoding::Base32,
            window_size: 3,
        }
    }
}

impl TotpConfig {
    /// Builder: set algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Builder: set time-step size in milliseconds.
    pub fn with_time_step_millis(mut self, millis: i64) -> Self {
        self.time_step_millis = millis;
        self
    }

    /// Builder: set code length in digits (modulus becomes 10^digits).
    pub fn with_digits(mut self, digits: u32) -> Self {
        self.code_modulus = 10u32.saturating_pow(digits);
        self
    }

    /// Builder: set key encoding.
    pub fn with_key_encoding(mut self, encoding: KeyEncoding) -> Self {
        self.key_encoding = encoding;
        self
    }

    /// Builder: set validation window size.
    pub fn with_window_size(mut self, window: u32) -> Self {
        self.window_size = window;
        self
    }

    /// Rendered code width in digits.
    pub fn digits(&self) -> u32 {
        self.code_modulus.ilog10()
    }

    /// Check the configuration invariants.
    pub fn validate(&self) -> Result<(), TotpError> {
        if self.time_step_millis <= 0 {
            return Err(TotpError::new(
                TotpErrorKind::InvalidConfig,
                "Time-step size must be positive",
            ));
        }
        if self.code_modulus < 10
            || self.code_modulus > MAX_CODE_MODULUS
            || !is_power_of_ten(self.code_modulus)
        {
            return Err(TotpError::new(
                TotpErrorKind::InvalidConfig,
                "Code modulus must be a power of ten between 10 and 10^9",
            ));
        }
        Ok(())
    }
}

fn is_power_of_ten(value: u32) -> bool {
    let mut n = value;
    while n >= 10 && n % 10 == 0 {
        n /= 10;
    }
    n == 1
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generated code result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A generated TOTP code with associated timing info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCode {
    /// Zero-padded decimal code string (e.g. "123456").
    pub code: String,
    /// Milliseconds until the code expires.
    pub remaining_millis: i64,
    /// The time window the code was computed for.
    pub window: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error kind for this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TotpErrorKind {
    /// Secret is empty or absent.
    EmptySecret,
    /// Secret text is not valid in the configured encoding.
    InvalidSecret,
    /// Required hash primitive unavailable; detail is logged, not surfaced.
    CryptoUnavailable,
    /// Configuration invariant violated.
    InvalidConfig,
    /// Date string was empty or absent.
    EmptyDate,
    /// Date string matched none of the supported grammars.
    UnrecognizedDateFormat,
    /// Transport failure while fetching trusted time.
    Network,
    /// Response carried no Date header.
    MissingDateHeader,
    /// Offset persistence failed.
    Storage,
}

/// Crate-level error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpError {
    pub kind: TotpErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl fmt::Display for TotpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)?;
        if let Some(d) = &self.detail {
            write!(f, " ({})", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for TotpError {}

impl TotpError {
    pub fn new(kind: TotpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<TotpError> for String {
    fn from(e: TotpError) -> String {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Algorithm ────────────────────────────────────────────────

    #[test]
    fn algorithm_default_is_sha1() {
        assert_eq!(Algorithm::default(), Algorithm::Sha1);
    }

    #[test]
    fn algorithm_display() {
        assert_eq!(Algorithm::Sha1.to_string(), "SHA1");
        assert_eq!(Algorithm::Sha256.to_string(), "SHA256");
        assert_eq!(Algorithm::Sha512.to_string(), "SHA512");
    }

    #[test]
    fn algorithm_from_str_loose() {
        assert_eq!(Algorithm::from_str_loose("sha1"), Some(Algorithm::Sha1));
        assert_eq!(Algorithm::from_str_loose("HMAC-SHA256"), Some(Algorithm::Sha256));
        assert_eq!(Algorithm::from_str_loose("HmacSHA512"), Some(Algorithm::Sha512));
        assert_eq!(Algorithm::from_str_loose("MD5"), None);
    }

    #[test]
    fn algorithm_serde_roundtrip() {
        let algo = Algorithm::Sha256;
        let json = serde_json::to_string(&algo).unwrap();
        assert_eq!(json, "\"SHA256\"");
        let back: Algorithm = serde_json::from_str(&json).unwrap();
        assert_eq!(back, algo);
    }

    // ── KeyEncoding ──────────────────────────────────────────────

    #[test]
    fn key_encoding_default() {
        assert_eq!(KeyEncoding::default(), KeyEncoding::Base32);
    }

    #[test]
    fn key_encoding_display() {
        assert_eq!(KeyEncoding::Base32.to_string(), "base32");
        assert_eq!(KeyEncoding::Base64.to_string(), "base64");
    }

    // ── TotpConfig ───────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let cfg = TotpConfig::default();
        assert_eq!(cfg.algorithm, Algorithm::Sha1);
        assert_eq!(cfg.time_step_millis, 30_000);
        assert_eq!(cfg.code_modulus, 1_000_000);
        assert_eq!(cfg.key_encoding, KeyEncoding::Base32);
        assert_eq!(cfg.window_size, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_builder() {
        let cfg = TotpConfig::default()
            .with_algorithm(Algorithm::Sha512)
            .with_time_step_millis(60_000)
            .with_digits(8)
            .with_key_encoding(KeyEncoding::Base64)
            .with_window_size(5);
        assert_eq!(cfg.algorithm, Algorithm::Sha512);
        assert_eq!(cfg.time_step_millis, 60_000);
        assert_eq!(cfg.code_modulus, 100_000_000);
        assert_eq!(cfg.key_encoding, KeyEncoding::Base64);
        assert_eq!(cfg.window_size, 5);
    }

    #[test]
    fn config_digits() {
        assert_eq!(TotpConfig::default().digits(), 6);
        assert_eq!(TotpConfig::default().with_digits(8).digits(), 8);
    }

    #[test]
    fn config_rejects_zero_step() {
        let cfg = TotpConfig::default().with_time_step_millis(0);
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind, TotpErrorKind::InvalidConfig);
    }

    #[test]
    fn config_rejects_oversized_modulus() {
        let mut cfg = TotpConfig::default();
        cfg.code_modulus = 4_000_000_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_rejects_non_power_of_ten_modulus() {
        let mut cfg = TotpConfig::default();
        cfg.code_modulus = 500_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = TotpConfig::default().with_digits(8);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TotpConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    // ── Error ────────────────────────────────────────────────────

    #[test]
    fn error_display() {
        let err = TotpError::new(TotpErrorKind::InvalidSecret, "bad base32")
            .with_detail("extra info");
        let s = err.to_string();
        assert!(s.contains("InvalidSecret"));
        assert!(s.contains("bad base32"));
        assert!(s.contains("extra info"));
    }

    #[test]
    fn error_into_string() {
        let err = TotpError::new(TotpErrorKind::EmptyDate, "no date");
        let s: String = err.into();
        assert!(s.contains("EmptyDate"));
    }
}
