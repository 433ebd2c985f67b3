//! Cell conversion from Snowflake's JSON result format.
//!
//! Snowflake sends every cell as text. Numbers, booleans and semi-structured
//! values are turned into their JSON equivalents. Dates and times arrive as
//! epoch offsets and are rendered as ISO 8601 strings. Anything that fails to
//! parse is passed through as the raw string.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat};
use serde_json::{Number, Value};

use common::models::Row;

use super::protocol::RowType;

/// Builds row mappings from column metadata and raw rowset cells.
pub fn build_rows(columns: &[RowType], rowset: Vec<Vec<Value>>) -> Vec<Row> {
    rowset
        .into_iter()
        .map(|cells| {
            let mut row = Row::with_capacity(columns.len());
            for (column, cell) in columns.iter().zip(cells) {
                row.insert(column.name.clone(), convert_cell(column, cell));
            }
            row
        })
        .collect()
}

/// Converts one cell according to its column type.
pub fn convert_cell(column: &RowType, cell: Value) -> Value {
    let text = match cell {
        Value::String(s) => s,
        other => return other,
    };

    let converted = match column.type_.to_ascii_lowercase().as_str() {
        "fixed" => convert_fixed(&text, column.scale.unwrap_or(0)),
        "real" => text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number),
        "boolean" => convert_boolean(&text),
        "date" => convert_date(&text),
        "time" => convert_time(&text),
        "timestamp_ntz" => convert_timestamp_ntz(&text),
        "timestamp_ltz" => convert_timestamp_ltz(&text),
        "timestamp_tz" => convert_timestamp_tz(&text),
        "variant" | "object" | "array" => serde_json::from_str(&text).ok(),
        _ => None,
    };

    converted.unwrap_or(Value::String(text))
}

fn convert_fixed(text: &str, scale: i64) -> Option<Value> {
    if scale == 0 {
        if let Ok(i) = text.parse::<i64>() {
            return Some(Value::from(i));
        }
        if let Ok(u) = text.parse::<u64>() {
            return Some(Value::from(u));
        }
        // NUMBER(38,0) beyond 64 bits stays text to avoid silent rounding.
        return None;
    }
    // Scaled decimals become numbers only when f64 holds them exactly.
    let float = text.parse::<f64>().ok()?;
    if float.to_string() != trim_fraction(text) {
        return None;
    }
    Number::from_f64(float).map(Value::Number)
}

/// Drops trailing fractional zeros, and the dot when nothing is left after it.
fn trim_fraction(text: &str) -> &str {
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.')
}

fn convert_boolean(text: &str) -> Option<Value> {
    match text.to_ascii_lowercase().as_str() {
        "1" | "true" => Some(Value::Bool(true)),
        "0" | "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

fn convert_date(text: &str) -> Option<Value> {
    let days = text.parse::<i64>().ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    let date = epoch.checked_add_signed(chrono::Duration::try_days(days)?)?;
    Some(Value::String(date.format("%Y-%m-%d").to_string()))
}

fn convert_time(text: &str) -> Option<Value> {
    let (secs, nanos) = split_epoch(text)?;
    let secs = u32::try_from(secs).ok()?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)?;
    Some(Value::String(time.format("%H:%M:%S%.f").to_string()))
}

fn convert_timestamp_ntz(text: &str) -> Option<Value> {
    let (secs, nanos) = split_epoch(text)?;
    let ts = DateTime::from_timestamp(secs, nanos)?.naive_utc();
    Some(Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
}

fn convert_timestamp_ltz(text: &str) -> Option<Value> {
    let (secs, nanos) = split_epoch(text)?;
    let ts = DateTime::from_timestamp(secs, nanos)?;
    Some(Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
}

/// `TIMESTAMP_TZ` cells carry `"<epoch> <offset>"`, where the offset is in
/// minutes biased by 1440.
fn convert_timestamp_tz(text: &str) -> Option<Value> {
    let (epoch, offset) = text.split_once(' ')?;
    let (secs, nanos) = split_epoch(epoch)?;
    let offset_minutes = offset.trim().parse::<i32>().ok()?.checked_sub(1440)?;
    let offset = FixedOffset::east_opt(offset_minutes.checked_mul(60)?)?;
    let ts = DateTime::from_timestamp(secs, nanos)?.with_timezone(&offset);
    Some(Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)))
}

/// Splits `"<seconds>.<fraction>"` into whole seconds and nanoseconds, with
/// the nanoseconds always non-negative.
fn split_epoch(text: &str) -> Option<(i64, u32)> {
    let text = text.trim();
    let negative = text.starts_with('-');
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));

    let mut secs = whole.parse::<i64>().ok()?;
    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut nanos = if fraction.is_empty() {
        0
    } else {
        format!("{:0<9}", fraction).parse::<u32>().ok()?
    };

    if negative && nanos > 0 {
        secs -= 1;
        nanos = 1_000_000_000 - nanos;
    }
    Some((secs, nanos))
}
