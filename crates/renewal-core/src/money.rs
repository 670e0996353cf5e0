//! Currency amount helpers.
//!
//! All amounts are integer minor units (cents). Formatting never goes through
//! floating point.

/// Render an amount in cents as a decimal string with two fraction digits.
///
/// `-1234` renders as `-12.34`, `5` as `0.05`.
#[must_use]
pub fn format_cents(amount_cents: i64) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
