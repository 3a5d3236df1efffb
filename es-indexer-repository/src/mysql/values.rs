//! Conversions between driver values and [`FieldValue`].

use chrono::{NaiveDate, NaiveTime};
use mysql_async::consts::ColumnType;
use mysql_async::{Column, Value};

use es_indexer_shared::{FieldValue, SourceRow};

/// Convert a binary-protocol row into a [`SourceRow`], keeping column order.
pub(crate) fn row_to_source_row(row: mysql_async::Row) -> SourceRow {
    let columns = row.columns();
    let values = row.unwrap();

    let mut source = SourceRow::with_capacity(columns.len());
    for (column, value) in columns.iter().zip(values) {
        source.push(column.name_str().to_string(), to_field_value(column, value));
    }
    source
}

/// Convert one driver value using its column metadata.
pub(crate) fn to_field_value(column: &Column, value: Value) -> FieldValue {
    match value {
        Value::NULL => FieldValue::Null,
        Value::Int(n @ (0 | 1)) if is_boolean(column) => FieldValue::Bool(n == 1),
        Value::Int(n) => FieldValue::Int(n),
        Value::UInt(n) => match i64::try_from(n) {
            Ok(n) => FieldValue::Int(n),
            Err(_) => FieldValue::UInt(n),
        },
        Value::Float(f) => FieldValue::Float(f64::from(f)),
        Value::Double(d) => FieldValue::Float(d),
        Value::Bytes(bytes) => bytes_to_field_value(column, bytes),
        Value::Date(year, month, day, hour, min, sec, micro) => {
            date_to_field_value(column, year, month, day, hour, min, sec, micro)
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = days * 24 + u32::from(hours);
            let mut text = format!("{:02}:{:02}:{:02}", total_hours, minutes, seconds);
            if micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            if negative {
                text.insert(0, '-');
            }
            FieldValue::Text(text)
        }
    }
}

/// `TINYINT(1)` columns carry booleans. The display width does not bound the
/// stored range, so only 0 and 1 are read as booleans.
fn is_boolean(column: &Column) -> bool {
    column.column_type() == ColumnType::MYSQL_TYPE_TINY && column.column_length() == 1
}

fn bytes_to_field_value(column: &Column, bytes: Vec<u8>) -> FieldValue {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };

    match column.column_type() {
        ColumnType::MYSQL_TYPE_JSON => FieldValue::Json(text),
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => text
            .parse::<f64>()
            .map(FieldValue::Float)
            .unwrap_or(FieldValue::Text(text)),
        _ => FieldValue::Text(text),
    }
}

#[allow(clippy::too_many_arguments)]
fn date_to_field_value(
    column: &Column,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    min: u8,
    sec: u8,
    micro: u32,
) -> FieldValue {
    let Some(date) = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
    else {
        // Zero dates ('0000-00-00') have no calendar representation.
        return FieldValue::Null;
    };

    if column.column_type() == ColumnType::MYSQL_TYPE_DATE {
        return FieldValue::Date(date);
    }

    NaiveTime::from_hms_micro_opt(u32::from(hour), u32::from(min), u32::from(sec), micro)
        .map(|time| FieldValue::Timestamp(date.and_time(time)))
        .unwrap_or(FieldValue::Null)
}

/// Convert a [`FieldValue`] into a statement parameter.
pub(crate) fn to_param(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::NULL,
        FieldValue::Bool(b) => Value::from(*b),
        FieldValue::Int(n) => Value::from(*n),
        FieldValue::UInt(n) => Value::from(*n),
        FieldValue::Float(f) => Value::from(*f),
        FieldValue::Timestamp(_) | FieldValue::Date(_) => Value::from(value.to_string()),
        FieldValue::Text(s) | FieldValue::Json(s) => Value::from(s.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, column_type: ColumnType) -> Column {
        Column::new(column_type).with_name(name.as_bytes())
    }

    #[test]
    fn test_integer_and_float_values() {
        let col = column("n", ColumnType::MYSQL_TYPE_LONGLONG);
        assert_eq!(to_field_value(&col, Value::Int(-5)), FieldValue::Int(-5));
        assert_eq!(to_field_value(&col, Value::UInt(7)), FieldValue::Int(7));
        assert_eq!(
            to_field_value(&col, Value::UInt(u64::MAX)),
            FieldValue::UInt(u64::MAX)
        );
        assert_eq!(to_field_value(&col, Value::Double(1.5)), FieldValue::Float(1.5));
    }

    #[test]
    fn test_json_and_decimal_columns() {
        let json_col = column("attrs", ColumnType::MYSQL_TYPE_JSON);
        assert_eq!(
            to_field_value(&json_col, Value::Bytes(br#"{"a":1}"#.to_vec())),
            FieldValue::Json(r#"{"a":1}"#.to_string())
        );

        let decimal_col = column("price", ColumnType::MYSQL_TYPE_NEWDECIMAL);
        assert_eq!(
            to_field_value(&decimal_col, Value::Bytes(b"12.50".to_vec())),
            FieldValue::Float(12.5)
        );
    }

    #[test]
    fn test_datetime_and_date_columns() {
        let ts_col = column("changed", ColumnType::MYSQL_TYPE_DATETIME);
        let value = to_field_value(&ts_col, Value::Date(2020, 1, 31, 12, 0, 5, 0));
        assert_eq!(value.to_string(), "2020-01-31 12:00:05");

        let date_col = column("born", ColumnType::MYSQL_TYPE_DATE);
        let value = to_field_value(&date_col, Value::Date(1999, 12, 1, 0, 0, 0, 0));
        assert_eq!(value, FieldValue::Date(NaiveDate::from_ymd_opt(1999, 12, 1).unwrap()));

        assert_eq!(
            to_field_value(&ts_col, Value::Date(0, 0, 0, 0, 0, 0, 0)),
            FieldValue::Null
        );
    }

    #[test]
    fn test_tinyint_one_only_maps_zero_and_one_to_bool() {
        let col = column("active", ColumnType::MYSQL_TYPE_TINY).with_column_length(1);
        assert_eq!(to_field_value(&col, Value::Int(1)), FieldValue::Bool(true));
        assert_eq!(to_field_value(&col, Value::Int(0)), FieldValue::Bool(false));
        assert_eq!(to_field_value(&col, Value::Int(5)), FieldValue::Int(5));

        let wide = column("rank", ColumnType::MYSQL_TYPE_TINY).with_column_length(4);
        assert_eq!(to_field_value(&wide, Value::Int(1)), FieldValue::Int(1));
    }

    #[test]
    fn test_time_values_render_as_text() {
        let col = column("duration", ColumnType::MYSQL_TYPE_TIME);
        assert_eq!(
            to_field_value(&col, Value::Time(false, 1, 2, 3, 4, 0)),
            FieldValue::Text("26:03:04".to_string())
        );
    }

    #[test]
    fn test_timestamp_param_keeps_fractional_seconds() {
        let col = column("changed", ColumnType::MYSQL_TYPE_DATETIME);
        let value = to_field_value(&col, Value::Date(2020, 1, 31, 12, 0, 5, 250_000));

        assert_eq!(
            to_param(&value),
            Value::Bytes(b"2020-01-31 12:00:05.250".to_vec())
        );
    }

    #[test]
    fn test_params() {
        assert_eq!(to_param(&FieldValue::Int(3)), Value::Int(3));
        assert_eq!(to_param(&FieldValue::Null), Value::NULL);
        assert_eq!(
            to_param(&FieldValue::Text("abc".to_string())),
            Value::Bytes(b"abc".to_vec())
        );
    }
}
