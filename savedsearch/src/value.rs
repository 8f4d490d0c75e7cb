//! Field values returned by Solr, coerced into typed Rust values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A stored field value from a search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Generic coercion used when no converter is registered for a field.
    ///
    /// Single-element lists collapse to their element, `"true"`/`"false"` become
    /// booleans, canonical numeric strings become numbers and RFC 3339 strings
    /// become datetimes.
    ///
    /// ```
    /// use savedsearch::value::FieldValue;
    /// use serde_json::json;
    ///
    /// assert_eq!(FieldValue::from_solr(&json!(["Boise"])), FieldValue::Text("Boise".into()));
    /// assert_eq!(FieldValue::from_solr(&json!("true")), FieldValue::Bool(true));
    /// assert_eq!(FieldValue::from_solr(&json!("2852")), FieldValue::Int(2852));
    /// assert_eq!(FieldValue::from_solr(&json!("02852")), FieldValue::Text("02852".into()));
    /// ```
    pub fn from_solr(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => FieldValue::Null,
            JsonValue::Bool(flag) => FieldValue::Bool(*flag),
            JsonValue::Number(number) => match number.as_i64() {
                Some(int) => FieldValue::Int(int),
                None => FieldValue::Float(number.as_f64().unwrap_or_default()),
            },
            JsonValue::String(text) => coerce_text(text),
            JsonValue::Array(items) => match items.as_slice() {
                [single] => FieldValue::from_solr(single),
                _ => FieldValue::List(items.iter().map(FieldValue::from_solr).collect()),
            },
            JsonValue::Object(map) => FieldValue::Map(
                map.iter()
                    .map(|(key, value)| (key.clone(), FieldValue::from_solr(value)))
                    .collect(),
            ),
        }
    }

    /// Text without any coercion; for converters of string-typed fields.
    pub fn raw_text(value: &JsonValue) -> Self {
        match value {
            JsonValue::String(text) => FieldValue::Text(text.clone()),
            JsonValue::Array(items) if items.len() == 1 => FieldValue::raw_text(&items[0]),
            JsonValue::Array(items) => FieldValue::List(items.iter().map(FieldValue::raw_text).collect()),
            JsonValue::Null => FieldValue::Null,
            other => FieldValue::Text(other.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(int) => Some(*int),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(flag) => write!(f, "{flag}"),
            FieldValue::Int(int) => write!(f, "{int}"),
            FieldValue::Float(float) => write!(f, "{float}"),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            FieldValue::Map(map) => {
                let rendered: Vec<String> = map.iter().map(|(key, value)| format!("{key}: {value}")).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

fn coerce_text(text: &str) -> FieldValue {
    match text {
        "true" => return FieldValue::Bool(true),
        "false" => return FieldValue::Bool(false),
        _ => {}
    }

    if let Ok(int) = text.parse::<i64>()
        && int.to_string() == text
    {
        return FieldValue::Int(int);
    }

    if text.contains('.')
        && !text.starts_with('.')
        && !text.ends_with('.')
        && text.chars().all(|ch| ch.is_ascii_digit() || ch == '.' || ch == '-')
        && let Ok(float) = text.parse::<f64>()
        && float.is_finite()
    {
        return FieldValue::Float(float);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return FieldValue::DateTime(dt.with_timezone(&Utc));
    }

    FieldValue::Text(text.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn scalars_coerce() {
        assert_eq!(FieldValue::from_solr(&json!(null)), FieldValue::Null);
        assert_eq!(FieldValue::from_solr(&json!(false)), FieldValue::Bool(false));
        assert_eq!(FieldValue::from_solr(&json!(42)), FieldValue::Int(42));
        assert_eq!(FieldValue::from_solr(&json!(1.5)), FieldValue::Float(1.5));
        assert_eq!(FieldValue::from_solr(&json!("1.25")), FieldValue::Float(1.25));
        assert_eq!(FieldValue::from_solr(&json!("-7")), FieldValue::Int(-7));
    }

    #[test]
    fn versions_and_padded_numbers_stay_text() {
        assert_eq!(FieldValue::from_solr(&json!("1.2.3")), FieldValue::Text("1.2.3".into()));
        assert_eq!(FieldValue::from_solr(&json!("007")), FieldValue::Text("007".into()));
        assert_eq!(FieldValue::from_solr(&json!("Chef")), FieldValue::Text("Chef".into()));
    }

    #[test]
    fn solr_dates_become_datetimes() {
        let expected = Utc.with_ymd_and_hms(2011, 6, 1, 12, 30, 0).unwrap();
        assert_eq!(
            FieldValue::from_solr(&json!("2011-06-01T12:30:00Z")),
            FieldValue::DateTime(expected)
        );
    }

    #[test]
    fn lists_unwrap_single_values_only() {
        assert_eq!(FieldValue::from_solr(&json!(["7"])), FieldValue::Int(7));
        assert_eq!(
            FieldValue::from_solr(&json!(["a", "b"])),
            FieldValue::List(vec![FieldValue::Text("a".into()), FieldValue::Text("b".into())])
        );
    }

    #[test]
    fn raw_text_skips_coercion() {
        assert_eq!(FieldValue::raw_text(&json!("2852")), FieldValue::Text("2852".into()));
        assert_eq!(FieldValue::raw_text(&json!(["true"])), FieldValue::Text("true".into()));
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(FieldValue::Text("Boise".into()).to_string(), "Boise");
        assert_eq!(
            FieldValue::List(vec![FieldValue::Int(1), FieldValue::Bool(true)]).to_string(),
            "[1, true]"
        );
    }
}
