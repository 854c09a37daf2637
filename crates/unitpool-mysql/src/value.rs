//! Conversion between [`unitpool::Value`] and `mysql_async` values.
//!
//! The text protocol delivers every non-NULL column as bytes, so decoding
//! is driven by the column type rather than the wire value.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::{Column, Value as MySqlValue};
use rust_decimal::Decimal;
use unitpool::Value;

/// Character set number MySQL reports for binary strings.
const BINARY_CHARSET: u16 = 63;

/// Convert a parameter for binding.
pub(crate) fn to_mysql(value: Value) -> MySqlValue {
    match value {
        Value::Null => MySqlValue::NULL,
        Value::Bool(b) => MySqlValue::Int(i64::from(b)),
        Value::Int(i) => MySqlValue::Int(i),
        Value::UInt(u) => MySqlValue::UInt(u),
        Value::Float(f) => MySqlValue::Double(f),
        Value::Decimal(d) => MySqlValue::Bytes(d.to_string().into_bytes()),
        Value::Text(s) => MySqlValue::Bytes(s.into_bytes()),
        Value::Bytes(b) => MySqlValue::Bytes(b),
        Value::Date(d) => date_value(d, NaiveTime::MIN),
        Value::Time(t) => {
            let (hour, minute, second, micros) = time_parts(t);
            MySqlValue::Time(false, 0, hour, minute, second, micros)
        }
        Value::DateTime(dt) => date_value(dt.date(), dt.time()),
    }
}

fn date_value(date: NaiveDate, time: NaiveTime) -> MySqlValue {
    let (hour, minute, second, micros) = time_parts(time);
    MySqlValue::Date(
        u16::try_from(date.year()).unwrap_or(0),
        date.month() as u8,
        date.day() as u8,
        hour,
        minute,
        second,
        micros,
    )
}

fn time_parts(time: NaiveTime) -> (u8, u8, u8, u32) {
    (
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
        (time.nanosecond() / 1_000).min(999_999),
    )
}

/// Decode a column value into a [`Value`].
pub(crate) fn from_mysql(value: MySqlValue, column: &Column) -> Value {
    let column_type = column.column_type();
    match value {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Int(i) => Value::Int(i),
        MySqlValue::UInt(u) => Value::UInt(u),
        MySqlValue::Float(f) => Value::Float(f64::from(f)),
        MySqlValue::Double(d) => Value::Float(d),
        MySqlValue::Date(year, month, day, hour, minute, second, micros) => {
            decode_date(column_type, year, month, day, hour, minute, second, micros)
        }
        MySqlValue::Time(negative, days, hour, minute, second, micros) => {
            decode_time(negative, days, hour, minute, second, micros)
        }
        MySqlValue::Bytes(bytes) => decode_bytes(bytes, column),
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_date(
    column_type: ColumnType,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    micros: u32,
) -> Value {
    let Some(date) = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
    else {
        // Zero dates such as 0000-00-00 have no calendar representation.
        return Value::Text(format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
        ));
    };
    if matches!(
        column_type,
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE
    ) {
        return Value::Date(date);
    }
    match NaiveTime::from_hms_micro_opt(
        u32::from(hour),
        u32::from(minute),
        u32::from(second),
        micros,
    ) {
        Some(time) => Value::DateTime(NaiveDateTime::new(date, time)),
        None => Value::Date(date),
    }
}

fn decode_time(negative: bool, days: u32, hour: u8, minute: u8, second: u8, micros: u32) -> Value {
    if !negative && days == 0 {
        if let Some(time) = NaiveTime::from_hms_micro_opt(
            u32::from(hour),
            u32::from(minute),
            u32::from(second),
            micros,
        ) {
            return Value::Time(time);
        }
    }
    // TIME spans -838:59:59 to 838:59:59, outside a time of day.
    let hours = days * 24 + u32::from(hour);
    let sign = if negative { "-" } else { "" };
    Value::Text(format!("{sign}{hours:02}:{minute:02}:{second:02}"))
}

fn decode_bytes(bytes: Vec<u8>, column: &Column) -> Value {
    let column_type = column.column_type();
    if column_type == ColumnType::MYSQL_TYPE_BIT {
        return Value::Bytes(bytes);
    }
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => return Value::Bytes(err.into_bytes()),
    };
    let parsed = match column_type {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR => {
            if column.flags().contains(ColumnFlags::UNSIGNED_FLAG) {
                text.parse().ok().map(Value::UInt)
            } else {
                text.parse().ok().map(Value::Int)
            }
        }
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
            text.parse().ok().map(Value::Float)
        }
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
            Decimal::from_str(&text).ok().map(Value::Decimal)
        }
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => {
            NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .ok()
                .map(Value::Date)
        }
        ColumnType::MYSQL_TYPE_DATETIME
        | ColumnType::MYSQL_TYPE_DATETIME2
        | ColumnType::MYSQL_TYPE_TIMESTAMP
        | ColumnType::MYSQL_TYPE_TIMESTAMP2 => {
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(Value::DateTime)
        }
        ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => {
            NaiveTime::parse_from_str(&text, "%H:%M:%S%.f")
                .ok()
                .map(Value::Time)
        }
        _ if column.character_set() == BINARY_CHARSET => {
            return Value::Bytes(text.into_bytes());
        }
        _ => None,
    };
    parsed.unwrap_or(Value::Text(text))
}
