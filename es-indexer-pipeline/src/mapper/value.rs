//! Encoding of column values as JSON document values.
//!
//! Without a declared kind the JSON shape follows the runtime type of the
//! value. Text is sniffed: if it already is a JSON object, array, boolean or
//! null it is inlined, so pre-serialized nested structures survive; numeric
//! text stays a string.

use serde_json::{Number, Value};

use crate::errors::PipelineError;
use es_indexer_shared::{FieldKind, FieldValue};

/// Timestamp layout used in documents.
pub const DOCUMENT_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Date layout used in documents.
pub const DOCUMENT_DATE_FORMAT: &str = "%Y/%m/%d";

/// Encode `value` for field `field`, honouring a declared kind if any.
pub fn encode_value(
    field: &str,
    value: &FieldValue,
    kind: Option<FieldKind>,
) -> Result<Value, PipelineError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match kind {
        None => Ok(encode_sniffed(value)),
        Some(FieldKind::Null) => Ok(Value::Null),
        Some(FieldKind::String) => Ok(Value::String(match value {
            FieldValue::Text(s) | FieldValue::Json(s) => clean_text(s),
            other => other.to_string(),
        })),
        Some(FieldKind::Number) => encode_number(field, value),
        Some(FieldKind::Boolean) => encode_boolean(field, value),
        Some(FieldKind::RawJson) => match value {
            FieldValue::Text(s) | FieldValue::Json(s) => serde_json::from_str(&clean_text(s))
                .map_err(|e| {
                    PipelineError::mapping(format!(
                        "field {} is declared raw-json but is not valid JSON: {}",
                        field, e
                    ))
                }),
            other => Ok(encode_sniffed(other)),
        },
        Some(FieldKind::Datetime) => Ok(Value::String(match value {
            FieldValue::Text(s) | FieldValue::Json(s) => slash_date(&clean_text(s)),
            other => format_temporal(other).unwrap_or_else(|| other.to_string()),
        })),
    }
}

/// Encode by runtime type.
fn encode_sniffed(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Int(n) => Value::from(*n),
        FieldValue::UInt(n) => Value::from(*n),
        FieldValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        FieldValue::Timestamp(_) | FieldValue::Date(_) => {
            Value::String(format_temporal(value).unwrap_or_default())
        }
        FieldValue::Json(s) => {
            let cleaned = clean_text(s);
            serde_json::from_str(&cleaned).unwrap_or_else(|_| sniff_text(cleaned))
        }
        FieldValue::Text(s) => sniff_text(clean_text(s)),
    }
}

/// Inline text that already is JSON, except bare numbers and the
/// non-standard `Infinity` / `NaN` tokens.
fn sniff_text(cleaned: String) -> Value {
    if cleaned != "Infinity" && cleaned != "NaN" {
        if let Ok(parsed) = serde_json::from_str::<Value>(&cleaned) {
            if !parsed.is_number() {
                return parsed;
            }
        }
    }
    Value::String(cleaned)
}

/// Strip control characters (U+0000–U+001F, U+007F–U+009F) and trim.
pub fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Slash-separate the leading date of `text`, leaving the time and any zone
/// offset untouched.
fn slash_date(text: &str) -> String {
    let end = text.find([' ', 'T']).unwrap_or(text.len());
    let (date, rest) = text.split_at(end);
    format!("{}{}", date.replace('-', "/"), rest)
}

fn format_temporal(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Timestamp(ts) => Some(ts.format(DOCUMENT_TIMESTAMP_FORMAT).to_string()),
        FieldValue::Date(d) => Some(d.format(DOCUMENT_DATE_FORMAT).to_string()),
        _ => None,
    }
}

fn encode_number(field: &str, value: &FieldValue) -> Result<Value, PipelineError> {
    let invalid = || {
        PipelineError::mapping(format!(
            "field {} is declared number but holds {}",
            field, value
        ))
    };

    match value {
        FieldValue::Int(_) | FieldValue::UInt(_) | FieldValue::Float(_) => {
            Ok(encode_sniffed(value))
        }
        FieldValue::Bool(b) => Ok(Value::from(u8::from(*b))),
        FieldValue::Text(s) | FieldValue::Json(s) => {
            let cleaned = clean_text(s);
            if let Ok(n) = cleaned.parse::<i64>() {
                return Ok(Value::from(n));
            }
            cleaned
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn encode_boolean(field: &str, value: &FieldValue) -> Result<Value, PipelineError> {
    let parsed = match value {
        FieldValue::Bool(b) => Some(*b),
        FieldValue::Int(n) => Some(*n != 0),
        FieldValue::UInt(n) => Some(*n != 0),
        FieldValue::Text(s) | FieldValue::Json(s) => {
            match clean_text(s).to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            }
        }
        _ => None,
    };

    parsed.map(Value::Bool).ok_or_else(|| {
        PipelineError::mapping(format!(
            "field {} is declared boolean but holds {}",
            field, value
        ))
    })
}
