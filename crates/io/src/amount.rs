//! Locale-tolerant amount parsing.
//!
//! Receipts print amounts as `40.000`, `1,234,567`, `12,5`, `Rp 1.234,56`.
//! Extraction backends copy whatever they saw, so parsing never fails loudly:
//! [`parse_amount`] falls back to `0.0`, [`try_parse_amount`] reports `None`
//! and lets the caller pick the default.
//!
//! Resolution order (must not be reordered):
//! 1. currency markers and surrounding whitespace removed
//! 2. `d{1,3}` followed by groups of `[.,]ddd` → every separator is grouping
//! 3. exactly one comma, no dot → comma is the decimal point
//! 4. otherwise the last separator kind is decimal, the other kind is grouping

use once_cell::sync::Lazy;
use regex::Regex;

static GROUPED_THOUSANDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}([.,]\d{3})+$").expect("static regex"));

/// Parse formatted amount text, `0.0` when nothing usable is found.
pub fn parse_amount(text: &str) -> f64 {
    try_parse_amount(text).unwrap_or(0.0)
}

/// Parse formatted amount text. `None` for empty, non-numeric or non-finite
/// input.
pub fn try_parse_amount(text: &str) -> Option<f64> {
    let (negative, body) = strip_currency(text)?;
    let body: String = body.chars().filter(|c| !c.is_whitespace()).collect();

    if !body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let normalized = normalize_separators(&body)?;
    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Split off leading/trailing currency markers. Returns the sign and the
/// span from the first to the last digit.
fn strip_currency(text: &str) -> Option<(bool, &str)> {
    let text = text.trim();
    let first = text.find(|c: char| c.is_ascii_digit())?;
    let last = text.rfind(|c: char| c.is_ascii_digit())?;

    let prefix = &text[..first];
    let negative = prefix.contains('-') || (prefix.ends_with('(') && text.ends_with(')'));

    Some((negative, &text[first..=last]))
}

fn normalize_separators(body: &str) -> Option<String> {
    if GROUPED_THOUSANDS.is_match(body) {
        return Some(body.replace(['.', ','], ""));
    }

    let commas = body.matches(',').count();
    let dots = body.matches('.').count();

    if commas == 1 && dots == 0 {
        return Some(body.replace(',', "."));
    }

    match (commas, dots) {
        (0, 0) => Some(body.to_string()),
        // A lone dot that is not a thousands group is a decimal point.
        (0, 1) => Some(body.to_string()),
        // Repeated separators of a single kind can only be grouping.
        (0, _) => Some(body.replace('.', "")),
        (_, 0) => Some(body.replace(',', "")),
        _ => {
            // Mixed: the last separator is the decimal point.
            let last = body.rfind(['.', ','])?;
            let decimal = body[last..].chars().next()?;
            let grouping = if decimal == ',' { '.' } else { ',' };
            if body.matches(decimal).count() > 1 {
                return None;
            }
            Some(body.replace(grouping, "").replace(decimal, "."))
        }
    }
}

/// Render an amount for the tabular exchange format.
///
/// Output always re-parses to the same value through [`parse_amount`]: a
/// rendering that looks like a thousands group (`0.125`) gets a trailing zero
/// (`0.1250`).
pub fn format_amount(value: f64) -> String {
    let mut out = format!("{value}");
    if GROUPED_THOUSANDS.is_match(out.trim_start_matches('-')) {
        out.push('0');
    }
    out
}
