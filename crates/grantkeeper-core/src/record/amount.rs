use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// One side of an amount: optional symbol or ISO code before or after the number
    static ref AMOUNT_PART: Regex = Regex::new(
        r"^(?:(?P<sym>[$€£¥₹])\s?|(?P<code>[A-Z]{3})\s?)?(?P<num>\d{1,3}(?:,\d{3})+|\d+)(?:\.(?P<frac>\d{1,2}))?(?:\s?(?P<suffix>[A-Z]{3}|[$€£¥₹]))?$"
    )
    .unwrap();
    static ref RANGE_SEPARATOR: Regex = Regex::new(r"\s*(?:-|–|—|\bto\b)\s*").unwrap();
}

/// Numeric interpretation of an amount string like `$1,000 - $5,000`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedAmount {
    pub min: f64,
    pub max: f64,
    pub currency: Option<String>,
}

/// Parse a currency amount or amount range
///
/// Supports:
/// - Symbol prefix: "$1,500", "€ 200.50"
/// - ISO code prefix or suffix: "USD 500", "1000 EUR"
/// - Ranges: "$1,000 - $5,000", "USD 500 to 1,000", "1,000-2,000 GBP"
///
/// Returns `None` when the text carries no currency marker or does not
/// match the pattern.
pub fn parse_amount(text: &str) -> Option<ParsedAmount> {
    let parts: Vec<&str> = RANGE_SEPARATOR.split(text.trim()).collect();
    if parts.is_empty() || parts.len() > 2 {
        return None;
    }

    let mut values = Vec::with_capacity(parts.len());
    let mut currency: Option<String> = None;

    for part in parts {
        let caps = AMOUNT_PART.captures(part)?;
        if caps.name("sym").is_some() && caps.name("suffix").is_some() {
            return None;
        }

        let marker = caps
            .name("sym")
            .or_else(|| caps.name("code"))
            .or_else(|| caps.name("suffix"))
            .map(|m| currency_code(m.as_str()));

        match (&currency, marker) {
            (Some(existing), Some(found)) if *existing != found => return None,
            (None, Some(found)) => currency = Some(found),
            _ => {}
        }

        let digits = caps["num"].replace(',', "");
        let value = match caps.name("frac") {
            Some(frac) => format!("{}.{}", digits, frac.as_str()),
            None => digits,
        };
        values.push(value.parse::<f64>().ok()?);
    }

    // A bare number is not an amount
    let currency = currency?;
    let min = values[0];
    let max = *values.last()?;
    if min > max {
        return None;
    }

    Some(ParsedAmount {
        min,
        max,
        currency: Some(currency),
    })
}

/// Whether `text` matches a recognized currency-amount pattern
pub fn is_currency_amount(text: &str) -> bool {
    parse_amount(text).is_some()
}

fn currency_code(marker: &str) -> String {
    match marker {
        "$" => "USD".to_string(),
        "€" => "EUR".to_string(),
        "£" => "GBP".to_string(),
        "¥" => "JPY".to_string(),
        "₹" => "INR".to_string(),
        code => code.to_string(),
    }
}
