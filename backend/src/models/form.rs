//! Lenient deserializers for payloads that arrive as multipart text fields,
//! where every value is a string.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::Value;

fn optional_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.filter(|value| !value.is_null()))
}

pub fn bool_opt<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match optional_value(deserializer)? {
        None => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(value)),
        Some(Value::String(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "1" | "on" | "yes" => Ok(Some(true)),
            "false" | "0" | "off" | "no" => Ok(Some(false)),
            other => Err(D::Error::custom(format!("invalid boolean: {}", other))),
        },
        Some(Value::Number(n)) => Ok(Some(n.as_i64().unwrap_or(0) != 0)),
        Some(other) => Err(D::Error::custom(format!("invalid boolean: {}", other))),
    }
}

pub fn i32_opt<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match optional_value(deserializer)? {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|value| i32::try_from(value).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom("integer out of range")),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(Value::String(raw)) => raw
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid integer: {}", raw))),
        Some(other) => Err(D::Error::custom(format!("invalid integer: {}", other))),
    }
}

/// Accepts a JSON array, a string holding a JSON array, or a comma-separated
/// string. Entries are trimmed and empty ones dropped.
pub fn list_opt<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match optional_value(deserializer)? {
        None => return Ok(None),
        Some(Value::Array(values)) => values
            .into_iter()
            .map(|value| match value {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect::<Vec<_>>(),
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            if trimmed.starts_with('[') {
                serde_json::from_str::<Vec<String>>(trimmed).map_err(D::Error::custom)?
            } else {
                trimmed.split(',').map(str::to_string).collect()
            }
        }
        Some(other) => return Err(D::Error::custom(format!("invalid list: {}", other))),
    };
    Ok(Some(
        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    ))
}

pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn datetime_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match optional_value(deserializer)? {
        None => Ok(None),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(Value::String(raw)) => parse_datetime(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {}", raw))),
        Some(other) => Err(D::Error::custom(format!("invalid datetime: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "bool_opt")]
        featured: Option<bool>,
        #[serde(default, deserialize_with = "i32_opt")]
        seats: Option<i32>,
        #[serde(default, deserialize_with = "list_opt")]
        tags: Option<Vec<String>>,
        #[serde(default, deserialize_with = "datetime_opt")]
        starts_at: Option<DateTime<Utc>>,
    }

    #[test]
    fn string_fields_are_coerced() {
        let sample: Sample = serde_json::from_value(json!({
            "featured": "true",
            "seats": "40",
            "tags": "rust, web ,",
            "starts_at": "2026-04-01T18:30",
        }))
        .expect("parse");
        assert_eq!(sample.featured, Some(true));
        assert_eq!(sample.seats, Some(40));
        assert_eq!(sample.tags, Some(vec!["rust".to_string(), "web".to_string()]));
        assert_eq!(
            sample.starts_at.map(|dt| dt.to_rfc3339()),
            Some("2026-04-01T18:30:00+00:00".to_string())
        );
    }

    #[test]
    fn json_array_strings_and_missing_fields() {
        let sample: Sample =
            serde_json::from_value(json!({ "tags": "[\"a\",\"b\"]", "seats": "" })).expect("parse");
        assert_eq!(sample.tags, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(sample.seats, None);
        assert_eq!(sample.featured, None);
        assert_eq!(sample.starts_at, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(serde_json::from_value::<Sample>(json!({ "featured": "maybe" })).is_err());
        assert!(serde_json::from_value::<Sample>(json!({ "seats": "many" })).is_err());
    }
}
