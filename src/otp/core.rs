//! TOTP engine — RFC 4226 (HOTP) and RFC 6238 (TOTP) over a
//! millisecond time base.
//!
//! Implements HMAC-based one-time passwords with SHA-1, SHA-256 and
//! SHA-512, time-window calculation, remaining-validity computation and
//! code validation with the configured drift window.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::otp::codec;
use crate::otp::types::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Time-window helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Time window for a given instant: `floor(instant / step)`.
pub fn time_window(instant_millis: i64, step_millis: i64) -> i64 {
    instant_millis.div_euclid(step_millis)
}

/// Milliseconds of validity left for the code of `instant`'s window.
pub fn remaining_millis(instant_millis: i64, step_millis: i64) -> i64 {
    let window = time_window(instant_millis, step_millis);
    step_millis - (instant_millis - window * step_millis)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Raw HMAC-OTP (RFC 4226 §5.3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the numeric code for raw key bytes at a specific window.
///
/// The window is serialised as an 8-byte big-endian integer, HMAC'd
/// with the configured algorithm, dynamically truncated to 31 bits and
/// reduced modulo `code_modulus`.
pub fn compute_code_raw(key: &[u8], window: i64, config: &TotpConfig) -> Result<u32, TotpError> {
    let hash = compute_hmac(key, &(window as u64).to_be_bytes(), config.algorithm)?;

    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let truncated = ((hash[offset] as u32 & 0x7f) << 24)
        | ((hash[offset + 1] as u32) << 16)
        | ((hash[offset + 2] as u32) << 8)
        | (hash[offset + 3] as u32);

    Ok(truncated % config.code_modulus)
}

/// Compute HMAC(key, message) using the specified algorithm.
///
/// Key-setup failures never disclose primitive detail to the caller;
/// the detail goes to the log and a generic operational failure is
/// returned.
fn compute_hmac(key: &[u8], data: &[u8], algo: Algorithm) -> Result<Vec<u8>, TotpError> {
    let unavailable = |e: hmac::digest::InvalidLength| {
        log::error!("HMAC-{} initialisation failed: {}", algo, e);
        TotpError::new(
            TotpErrorKind::CryptoUnavailable,
            "The operation cannot be performed now",
        )
    };
    match algo {
        Algorithm::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(unavailable)?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        Algorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(unavailable)?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        Algorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).map_err(unavailable)?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TOTP (RFC 6238)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the code valid at `instant_millis` together with its
/// remaining validity.
pub fn compute_code(
    secret: &str,
    instant_millis: i64,
    config: &TotpConfig,
) -> Result<GeneratedCode, TotpError> {
    config.validate()?;
    if secret.is_empty() {
        return Err(TotpError::new(TotpErrorKind::EmptySecret, "Secret is empty"));
    }
    let key = codec::decode(secret, config.key_encoding)?;

    let window = time_window(instant_millis, config.time_step_millis);
    let value = compute_code_raw(&key, window, config)?;

    Ok(GeneratedCode {
        code: format_code(value, config),
        remaining_millis: remaining_millis(instant_millis, config.time_step_millis),
        window,
    })
}

/// Render a numeric code zero-padded to the configured width.
pub fn format_code(value: u32, config: &TotpConfig) -> String {
    format!("{:0>width$}", value, width = config.digits() as usize)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Validate a presented code against the windows adjacent to
/// `instant_millis`.
///
/// Windows `center + i` are checked for `i` in `[-((w-1)/2), w/2]` with
/// truncating division. For even `w` the range reaches one step further
/// into the future than the past; server-side verifiers share that
/// asymmetry and it must not be "fixed" here. Returns `true` on the
/// first match without revealing which offset matched.
pub fn validate_code(
    secret: &str,
    presented: &str,
    instant_millis: i64,
    window: u32,
    config: &TotpConfig,
) -> Result<bool, TotpError> {
    config.validate()?;
    if secret.is_empty() {
        return Err(TotpError::new(TotpErrorKind::EmptySecret, "Secret is empty"));
    }
    // A malformed candidate is simply invalid, not an error.
    if presented.len() != config.digits() as usize
        || !presented.chars().all(|c| c.is_ascii_digit())
    {
        return Ok(false);
    }
    let key = codec::decode(secret, config.key_encoding)?;
    let center = time_window(instant_millis, config.time_step_millis);

    let lower = -((window as i64 - 1) / 2);
    let upper = window as i64 / 2;
    for i in lower..=upper {
        let value = compute_code_raw(&key, center + i, config)?;
        let candidate = format_code(value, config);
        if constant_time_eq(candidate.as_bytes(), presented.as_bytes()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Constant-time comparison (to prevent timing attacks on validation).
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
