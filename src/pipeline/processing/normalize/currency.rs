use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;

/// Anything that is not part of a plain number: symbols, ISO codes, spaces.
static NON_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9.,\-]").expect("currency noise pattern is valid"));

/// Optional leading sign, at most one decimal point, at least one digit.
static DECIMAL_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(\d+\.?\d*|\.\d+)$").expect("decimal literal pattern is valid"));

/// A price that is still not a number after the noise has been stripped.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("malformed currency value '{input}' (normalized to '{normalized}')")]
pub struct MalformedCurrencyError {
    pub input: String,
    pub normalized: String,
}

/// Parse loosely formatted monetary text into a decimal.
///
/// Every character other than digits, `.`, `,` and `-` is dropped, then every `,` is
/// dropped as a thousands separator. Commas are never read as decimal separators, so
/// `"12,50"` parses as `1250`. That ambiguity is a known limitation of the extract
/// format; callers route genuinely unparseable values through the error path.
pub fn normalize_currency(text: &str) -> Result<Decimal, MalformedCurrencyError> {
    let stripped = NON_NUMERIC.replace_all(text, "");
    let normalized = stripped.replace(',', "");

    let malformed = || MalformedCurrencyError {
        input: text.to_string(),
        normalized: normalized.clone(),
    };

    if !DECIMAL_LITERAL.is_match(&normalized) {
        return Err(malformed());
    }

    Decimal::from_str(&canonical_literal(&normalized)).map_err(|_| malformed())
}

/// Spell out the implied zero in forms like `.5` and `5.` before handing off to the parser.
fn canonical_literal(literal: &str) -> String {
    let (sign, digits) = match literal.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", literal),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (digits, ""),
    };
    let int_part = if int_part.is_empty() { "0" } else { int_part };

    if frac_part.is_empty() {
        format!("{}{}", sign, int_part)
    } else {
        format!("{}{}.{}", sign, int_part, frac_part)
    }
}
