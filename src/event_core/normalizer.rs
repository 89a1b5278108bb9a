//! Event record normalization from NDJSON lines to [`NestedEventRecord`]

use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt;

/// One analytics event as exported, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NestedEventRecord {
    #[serde(default, deserialize_with = "string_or_number")]
    pub event_date: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub event_timestamp: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub event_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub event_params: Vec<EventParam>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventParam {
    pub key: String,
    pub value: TaggedValue,
}

/// Wire shape of a parameter value: at most one tag is normally populated.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TaggedValue {
    #[serde(default)]
    pub string_value: Option<String>,
    #[serde(default, deserialize_with = "int_or_numeric_string")]
    pub int_value: Option<i64>,
}

/// Resolved parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
}

impl TaggedValue {
    /// String tag wins over integer tag; neither yields `None`.
    pub fn resolve(&self) -> Option<ParamValue> {
        match (&self.string_value, self.int_value) {
            (Some(s), _) => Some(ParamValue::Str(s.clone())),
            (None, Some(i)) => Some(ParamValue::Int(i)),
            (None, None) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => write!(f, "{}", s),
            ParamValue::Int(i) => write!(f, "{}", i),
        }
    }
}

/// A record that could not be parsed. `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecordError {
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for MalformedRecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed record at line {}: {}", self.line, self.reason)
    }
}

impl std::error::Error for MalformedRecordError {}

impl NestedEventRecord {
    /// Parse one NDJSON line
    pub fn from_jsonl(line: &str, line_number: usize) -> Result<Self, MalformedRecordError> {
        serde_json::from_str(line).map_err(|e| MalformedRecordError {
            line: line_number,
            reason: e.to_string(),
        })
    }
}

/// Parse every non-blank line of an NDJSON document, stopping at the first
/// malformed record. Lines that are not valid UTF-8 are malformed too.
pub fn parse_ndjson(content: impl AsRef<[u8]>) -> Result<Vec<NestedEventRecord>, MalformedRecordError> {
    let mut records = Vec::new();

    for (idx, raw) in content.as_ref().split(|b| *b == b'\n').enumerate() {
        let line_number = idx + 1;
        let line = std::str::from_utf8(raw).map_err(|e| MalformedRecordError {
            line: line_number,
            reason: format!("invalid UTF-8: {}", e),
        })?;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        records.push(NestedEventRecord::from_jsonl(line, line_number)?);
    }

    Ok(records)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Int(i64),
    Float(f64),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
        StringOrNumber::Str(s) => s,
        StringOrNumber::Int(i) => i.to_string(),
        StringOrNumber::Float(f) => f.to_string(),
    }))
}

fn int_or_numeric_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Int(i)) => Ok(Some(i)),
        Some(StringOrNumber::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("int_value is not an integer: {:?}", s))),
        Some(StringOrNumber::Float(f)) => Err(de::Error::custom(format!(
            "int_value is not an integer: {}",
            f
        ))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<EventParam>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<EventParam>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCROLL_EVENT: &str = r#"{"event_date":"20231005","event_timestamp":"1696470452486466","event_name":"scroll","event_params":[{"key":"ga_session_id","value":{"int_value":"123526748"}},{"key":"page_title","value":{"string_value":"J's Angels"}}]}"#;

    #[test]
    fn test_parse_export_line() {
        let record = NestedEventRecord::from_jsonl(SCROLL_EVENT, 1).unwrap();
        assert_eq!(record.event_date.as_deref(), Some("20231005"));
        assert_eq!(record.event_timestamp.as_deref(), Some("1696470452486466"));
        assert_eq!(record.event_name.as_deref(), Some("scroll"));
        assert_eq!(record.event_params.len(), 2);
        assert_eq!(record.event_params[0].value.resolve(), Some(ParamValue::Int(123526748)));
        assert_eq!(
            record.event_params[1].value.resolve(),
            Some(ParamValue::Str("J's Angels".to_string()))
        );
    }

    #[test]
    fn test_numeric_scalars_and_missing_params() {
        let record =
            NestedEventRecord::from_jsonl(r#"{"event_timestamp":1696470418877027,"event_name":"page_view"}"#, 1)
                .unwrap();
        assert_eq!(record.event_date, None);
        assert_eq!(record.event_timestamp.as_deref(), Some("1696470418877027"));
        assert!(record.event_params.is_empty());
    }

    #[test]
    fn test_both_tags_prefers_string() {
        let value = TaggedValue {
            string_value: Some("abc".to_string()),
            int_value: Some(7),
        };
        assert_eq!(value.resolve(), Some(ParamValue::Str("abc".to_string())));
        assert_eq!(TaggedValue::default().resolve(), None);
    }

    #[test]
    fn test_non_numeric_int_value_is_malformed() {
        let line = r#"{"event_name":"x","event_params":[{"key":"ga_session_id","value":{"int_value":"abc"}}]}"#;
        let err = NestedEventRecord::from_jsonl(line, 4).unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.reason.contains("int_value"));
    }

    #[test]
    fn test_malformed_jsonl() {
        let err = NestedEventRecord::from_jsonl(r#"{"invalid": "json"#, 2).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.to_string().starts_with("Malformed record at line 2"));
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let content = format!("\n    {}\n\n{}\n", SCROLL_EVENT, SCROLL_EVENT);
        let records = parse_ndjson(&content).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_invalid_utf8_line_is_malformed() {
        let mut content = format!("{}\n", SCROLL_EVENT).into_bytes();
        content.extend_from_slice(b"{\"event_name\":\"\xff\"}\n");

        let err = parse_ndjson(&content).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.reason.starts_with("invalid UTF-8"));
    }

    #[test]
    fn test_parse_ndjson_reports_line_number() {
        let content = format!("{}\nnot json\n{}", SCROLL_EVENT, SCROLL_EVENT);
        let err = parse_ndjson(&content).unwrap_err();
        assert_eq!(err.line, 2);
    }
}
