use std::{collections::HashSet, str::FromStr};

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;

const NUMBER_ESCAPE_CHAR: &[char] = &['元', ',', ' ', '"', '\n'];

/// Parses a `Decimal` value from a given string.
///
/// Thousands separators and whitespace are always removed; `escape_chars`
/// adds more characters to strip, e.g. `Some(vec!['%'])`.
///
/// # Example
///
/// ```
/// use tw_data_sdk::util::text::parse_decimal;
///
/// let fee = parse_decimal("1.25%", Some(vec!['%'])).unwrap();
/// assert_eq!(fee.to_string(), "1.25");
/// ```
pub fn parse_decimal(s: &str, escape_chars: Option<Vec<char>>) -> Result<Decimal> {
    let cleaned = clean_escape_chars(s, escape_chars);
    // 部分來源以科學記號表示
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|why| anyhow!("Failed to parse '{}' as Decimal because {:?}", cleaned, why))
}

/// Parses an `i64` value from a given string that may include commas as
/// thousands separators.
///
/// # Example
///
/// ```
/// use tw_data_sdk::util::text::parse_i64;
///
/// assert_eq!(parse_i64("1,234,000", None).unwrap(), 1_234_000);
/// ```
pub fn parse_i64(s: &str, escape_chars: Option<Vec<char>>) -> Result<i64> {
    let cleaned = clean_escape_chars(s, escape_chars);
    i64::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse '{}' as i64 because: {:?}", cleaned, why))
}

/// Removes the default number escape characters plus `escape_chars` from `s`.
pub(crate) fn clean_escape_chars(s: &str, escape_chars: Option<Vec<char>>) -> String {
    let mut combined: Vec<char> = NUMBER_ESCAPE_CHAR.to_vec();
    if let Some(ec) = escape_chars {
        combined.extend(ec);
    }

    let filters = combined.iter().collect::<HashSet<_>>();
    s.chars().filter(|c| !filters.contains(c)).collect()
}
