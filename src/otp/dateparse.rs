//! HTTP date parsing for the trusted-time header.
//!
//! Servers answer with a `Date` header in one of the three formats of
//! RFC 7231 §7.1.1.1. Each grammar is tried in a fixed priority order
//! until one fully matches; the parsed value is always interpreted in
//! GMT/UTC per HTTP date semantics (asctime carries no zone and is
//! assumed UTC).

use chrono::NaiveDateTime;

use crate::otp::types::{TotpError, TotpErrorKind};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Grammars
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// RFC 1036 obsolete format: `Tuesday, 15-Nov-94 08:12:31 GMT`.
pub const PATTERN_RFC1036: &str = "%A, %d-%b-%y %H:%M:%S";
/// RFC 1123 preferred format: `Tue, 15 Nov 1994 08:12:31 GMT`.
pub const PATTERN_RFC1123: &str = "%a, %d %b %Y %H:%M:%S";
/// ANSI C `asctime()` format: `Tue Nov 15 08:12:31 1994`.
pub const PATTERN_ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

/// One date-format grammar: a chrono pattern plus whether the text
/// carries a trailing zone token.
#[derive(Debug, Clone, Copy)]
pub struct DateGrammar {
    pub pattern: &'static str,
    pub zoned: bool,
}

/// Grammars in priority order. Order only affects how fast the common
/// case parses, not the result.
pub const DEFAULT_GRAMMARS: &[DateGrammar] = &[
    DateGrammar { pattern: PATTERN_RFC1036, zoned: true },
    DateGrammar { pattern: PATTERN_RFC1123, zoned: true },
    DateGrammar { pattern: PATTERN_ASCTIME, zoned: false },
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a server date string to epoch milliseconds using the default
/// grammars.
pub fn parse_http_date(text: &str) -> Result<i64, TotpError> {
    parse_with(DEFAULT_GRAMMARS, text)
}

/// Parse a server date string against an ordered grammar list.
///
/// Some servers wrap the header value in single quotes; one surrounding
/// pair is stripped before matching.
pub fn parse_with(grammars: &[DateGrammar], text: &str) -> Result<i64, TotpError> {
    let trimmed = strip_quotes(text.trim());
    if trimmed.is_empty() {
        return Err(TotpError::new(TotpErrorKind::EmptyDate, "Date string is empty"));
    }
    for grammar in grammars {
        if let Some(millis) = try_grammar(grammar, trimmed) {
            return Ok(millis);
        }
    }
    Err(
        TotpError::new(TotpErrorKind::UnrecognizedDateFormat, "Incompatible date pattern")
            .with_detail(trimmed.to_string()),
    )
}

fn try_grammar(grammar: &DateGrammar, text: &str) -> Option<i64> {
    if grammar.zoned {
        let (body, zone) = text.rsplit_once(' ')?;
        let offset_millis = zone_offset_millis(zone)?;
        let naive = NaiveDateTime::parse_from_str(body.trim_end(), grammar.pattern).ok()?;
        Some(naive.and_utc().timestamp_millis() - offset_millis)
    } else {
        let naive = NaiveDateTime::parse_from_str(text, grammar.pattern).ok()?;
        Some(naive.and_utc().timestamp_millis())
    }
}

/// Offset of a trailing zone token, in milliseconds east of UTC.
fn zone_offset_millis(token: &str) -> Option<i64> {
    match token {
        "GMT" | "UTC" | "UT" | "Z" => Some(0),
        _ => {
            // Numeric ±HHMM offsets.
            let (sign, digits) = if let Some(rest) = token.strip_prefix('+') {
                (1i64, rest)
            } else if let Some(rest) = token.strip_prefix('-') {
                (-1i64, rest)
            } else {
                return None;
            };
            if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let hours: i64 = digits[..2].parse().ok()?;
            let minutes: i64 = digits[2..].parse().ok()?;
            Some(sign * (hours * 60 + minutes) * 60_000)
        }
    }
}

fn strip_quotes(text: &str) -> &str {
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        &text[1..text.len() - 1]
    } else {
        text
    }
}
