//! Boundary helpers for numbers coming out of document parsers.
//!
//! Register exports are inconsistent about amounts: some carry plain
//! numbers, some carry `"1,23,456.00 Dr"`, `"(500)"` or `"₹ 2,000"`, and
//! some leave the cell empty. Everything is coerced to an `f64` here and
//! anything unreadable becomes zero so that aggregation never faults.

use log::warn;
use serde::{Deserialize, Deserializer};

const CURRENCY_PREFIXES: &[&str] = &["inr", "rs.", "rs", "₹", "$"];

/// Parses a free-form amount. Trailing `Cr` or surrounding parentheses mean
/// negative (credit); trailing `Dr` means positive (debit). Returns 0 for
/// empty or unparseable input.
pub fn parse_amount(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let lower = trimmed.to_lowercase();
    let mut body = lower.as_str();
    let mut negative = false;

    if let Some(stripped) = body.strip_suffix("cr") {
        negative = true;
        body = stripped.trim_end();
    } else if let Some(stripped) = body.strip_suffix("dr") {
        body = stripped.trim_end();
    }

    if body.starts_with('(') && body.ends_with(')') && body.len() >= 2 {
        negative = true;
        body = &body[1..body.len() - 1];
    }

    let mut body = body.trim();
    for prefix in CURRENCY_PREFIXES {
        if let Some(stripped) = body.strip_prefix(prefix) {
            body = stripped.trim_start();
            break;
        }
    }

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '\u{a0}'))
        .collect();

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => {
            if negative {
                -value.abs()
            } else {
                value
            }
        }
        _ => {
            warn!("Unparseable amount '{}' coerced to zero", raw);
            0.0
        }
    }
}

/// Replaces NaN and infinities with zero.
pub fn sanitize_amount(value: f64, context: &str) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!("Non-finite amount in {} coerced to zero", context);
        0.0
    }
}

/// Serde helper for amount fields: accepts a number, a string (see
/// [`parse_amount`]) or null.
pub fn lenient_amount<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let amount = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => parse_amount(&s),
        Some(serde_json::Value::Null) | None => 0.0,
        Some(other) => {
            warn!("Non-numeric amount {} coerced to zero", other);
            0.0
        }
    };
    Ok(sanitize_amount(amount, "parsed field"))
}
