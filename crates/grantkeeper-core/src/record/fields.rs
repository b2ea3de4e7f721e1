use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use super::amount::parse_amount;
use super::types::Record;
use crate::{Error, Result};

/// Raw extracted values keyed by field name, as produced by a scraping driver
pub type RawFields = BTreeMap<String, String>;

/// Date formats seen on opportunity listings, tried in order
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%m/%d/%Y",
];

impl Record {
    /// Build a typed record from raw extracted fields
    ///
    /// Fails fast on missing required fields (`id`, `collectionDate`) and on
    /// values that are present but unparseable. Blank values count as absent.
    pub fn from_fields(fields: &RawFields) -> Result<Self> {
        let id = lookup(fields, &["id"]).ok_or_else(|| missing("id"))?;
        let collected = lookup(fields, &["collectionDate", "collection_date"])
            .ok_or_else(|| missing("collectionDate"))?;
        let collection_date = parse_timestamp(collected)
            .ok_or_else(|| unparseable("collectionDate", collected))?;

        let mut record = Record::new(id, collection_date)?;

        record.title = owned(fields, &["title"]);
        record.url = owned(fields, &["url"]);
        record.category = owned(fields, &["category"]);
        record.provider = owned(fields, &["provider", "organization"]);
        record.description = owned(fields, &["description"]);
        record.currency = owned(fields, &["currency"]).map(|c| c.to_uppercase());
        record.amount = owned(fields, &["amount"]);

        record.deadline = optional_date(fields, &["deadline"])?;
        record.application_opens = optional_date(fields, &["applicationOpens", "application_opens"])?;
        record.amount_min = optional_number(fields, &["amountMin", "amount_min"])?;
        record.amount_max = optional_number(fields, &["amountMax", "amount_max"])?;

        // Fill numeric bounds from the display amount when not given explicitly
        if let Some(parsed) = record.amount.as_deref().and_then(parse_amount) {
            if record.amount_min.is_none() && record.amount_max.is_none() {
                record.amount_min = Some(parsed.min);
                record.amount_max = Some(parsed.max);
            }
            if record.currency.is_none() {
                record.currency = parsed.currency;
            }
        }

        if let (Some(min), Some(max)) = (record.amount_min, record.amount_max)
            && min > max
        {
            return Err(Error::Validation(format!(
                "amountMin ({}) is greater than amountMax ({})",
                min, max
            )));
        }

        if let Some(tags) = lookup(fields, &["tags"]) {
            record.tags = tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(verified) = lookup(fields, &["lastVerified", "last_verified"]) {
            let at = parse_timestamp(verified).ok_or_else(|| unparseable("lastVerified", verified))?;
            record.mark_verified(at)?;
        }

        tracing::debug!("Mapped raw fields into record {}", record.id());
        Ok(record)
    }
}

/// Flatten a JSON object into raw fields
///
/// Strings are taken as-is, numbers and booleans are stringified, arrays of
/// scalars are joined with commas and nulls are dropped.
pub fn fields_from_json(value: &Value) -> Result<RawFields> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::Validation("Raw record must be a JSON object".to_string()))?;

    let mut fields = RawFields::new();
    for (key, value) in object {
        let text = match value {
            Value::Null => continue,
            Value::Array(items) => items
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(","),
            other => scalar_to_string(other).ok_or_else(|| {
                Error::Validation(format!("Field '{}' must be a scalar or array", key))
            })?,
        };
        fields.insert(key.clone(), text);
    }

    Ok(fields)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a calendar date in any of the accepted listing formats
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Parse a timestamp; bare dates are taken as midnight UTC
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    parse_date(text)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn lookup<'a>(fields: &'a RawFields, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

fn owned(fields: &RawFields, keys: &[&str]) -> Option<String> {
    lookup(fields, keys).map(str::to_string)
}

fn optional_date(fields: &RawFields, keys: &[&str]) -> Result<Option<NaiveDate>> {
    match lookup(fields, keys) {
        Some(text) => parse_date(text)
            .map(Some)
            .ok_or_else(|| unparseable(keys[0], text)),
        None => Ok(None),
    }
}

fn optional_number(fields: &RawFields, keys: &[&str]) -> Result<Option<f64>> {
    match lookup(fields, keys) {
        Some(text) => text
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Some)
            .ok_or_else(|| unparseable(keys[0], text)),
        None => Ok(None),
    }
}

fn missing(field: &str) -> Error {
    Error::Validation(format!("Missing required field '{}'", field))
}

fn unparseable(field: &str, value: &str) -> Error {
    Error::Validation(format!("Field '{}' has unparseable value '{}'", field, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordStatus;

    fn raw(pairs: &[(&str, &str)]) -> RawFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_fields_full_record() {
        let fields = raw(&[
            ("id", "s1"),
            ("title", "Community Grant"),
            ("amount", "$1,500"),
            ("deadline", "2099-01-01"),
            ("url", "https://example.org/s1"),
            ("collectionDate", "2024-01-01"),
            ("tags", "stem, undergraduate,"),
        ]);

        let record = Record::from_fields(&fields).unwrap();
        assert_eq!(record.id(), "s1");
        assert_eq!(record.title.as_deref(), Some("Community Grant"));
        assert_eq!(record.amount_min, Some(1500.0));
        assert_eq!(record.amount_max, Some(1500.0));
        assert_eq!(record.currency.as_deref(), Some("USD"));
        assert_eq!(record.deadline, NaiveDate::from_ymd_opt(2099, 1, 1));
        assert_eq!(record.tags.len(), 2);
        assert!(record.tags.contains("stem"));
        assert_eq!(record.status(), RecordStatus::Upcoming);
        assert_eq!(record.quality_score(), None);
    }

    #[test]
    fn test_missing_required_fields_fail_fast() {
        let no_id = raw(&[("title", "Community Grant"), ("collectionDate", "2024-01-01")]);
        assert!(matches!(Record::from_fields(&no_id), Err(Error::Validation(_))));

        let blank_id = raw(&[("id", "   "), ("collectionDate", "2024-01-01")]);
        assert!(Record::from_fields(&blank_id).is_err());

        let no_collection = raw(&[("id", "s1")]);
        let err = Record::from_fields(&no_collection).unwrap_err();
        assert!(err.to_string().contains("collectionDate"));
    }

    #[test]
    fn test_blank_values_are_absent() {
        let fields = raw(&[("id", "s1"), ("collectionDate", "2024-01-01"), ("title", "  ")]);
        let record = Record::from_fields(&fields).unwrap();
        assert_eq!(record.title, None);
    }

    #[test]
    fn test_unparseable_values_fail() {
        let bad_deadline = raw(&[("id", "s1"), ("collectionDate", "2024-01-01"), ("deadline", "soon")]);
        assert!(Record::from_fields(&bad_deadline).is_err());

        let bad_min = raw(&[("id", "s1"), ("collectionDate", "2024-01-01"), ("amountMin", "lots")]);
        assert!(Record::from_fields(&bad_min).is_err());
    }

    #[test]
    fn test_non_finite_bounds_rejected() {
        for value in ["NaN", "inf", "-infinity"] {
            let fields = raw(&[("id", "s1"), ("collectionDate", "2024-01-01"), ("amountMin", value)]);
            assert!(
                matches!(Record::from_fields(&fields), Err(Error::Validation(_))),
                "{} should not parse as a bound",
                value
            );
        }
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let fields = raw(&[
            ("id", "s1"),
            ("collectionDate", "2024-01-01"),
            ("amountMin", "5000"),
            ("amount_max", "1000"),
        ]);
        assert!(Record::from_fields(&fields).is_err());
    }

    #[test]
    fn test_last_verified_before_collection_rejected() {
        let fields = raw(&[
            ("id", "s1"),
            ("collectionDate", "2024-02-01"),
            ("lastVerified", "2024-01-01"),
        ]);
        assert!(Record::from_fields(&fields).is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 15);
        assert_eq!(parse_date("2025-03-15"), expected);
        assert_eq!(parse_date("March 15, 2025"), expected);
        assert_eq!(parse_date("15 March 2025"), expected);
        assert_eq!(parse_date("03/15/2025"), expected);
        assert_eq!(parse_date("2025-03-15T10:00:00Z"), expected);
        assert_eq!(parse_date("next week"), None);
    }

    #[test]
    fn test_fields_from_json() {
        let value = serde_json::json!({
            "id": "s2",
            "amountMin": 1000,
            "tags": ["a", "b"],
            "provider": null,
            "collectionDate": "2024-01-01"
        });
        let fields = fields_from_json(&value).unwrap();
        assert_eq!(fields["amountMin"], "1000");
        assert_eq!(fields["tags"], "a,b");
        assert!(!fields.contains_key("provider"));

        assert!(fields_from_json(&serde_json::json!(["not", "an", "object"])).is_err());
        assert!(fields_from_json(&serde_json::json!({"id": {"nested": true}})).is_err());
    }
}
