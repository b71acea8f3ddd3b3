//! Conversion of driver rows into [`Row`] values.
//!
//! Each dialect tries the Rust types its driver can decode, in order, and
//! keeps the first one compatible with the column. Temporal values are
//! rendered as text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use oxide_query::{Row, SqlValue};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row as _, TypeInfo};
use tracing::warn;

/// Tries `Option<T>` for each listed type; `None` when none is compatible.
macro_rules! try_decode {
    ($row:expr, $index:expr, $($ty:ty => $map:expr),+ $(,)?) => {{
        let mut decoded: Option<SqlValue> = None;
        $(
            if decoded.is_none() {
                if let Ok(value) = $row.try_get::<Option<$ty>, _>($index) {
                    decoded = Some(value.map_or(SqlValue::Null, $map));
                }
            }
        )+
        decoded
    }};
}

pub(crate) fn sqlite_row(row: &SqliteRow) -> Row {
    collect(row, sqlite_value)
}

pub(crate) fn postgres_row(row: &PgRow) -> Row {
    collect(row, postgres_value)
}

pub(crate) fn mysql_row(row: &MySqlRow) -> Row {
    collect(row, mysql_value)
}

fn collect<R: sqlx::Row>(row: &R, decode: fn(&R, usize, &str) -> Option<SqlValue>) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let type_name = column.type_info().name();
            let value = decode(row, index, type_name).unwrap_or_else(|| {
                warn!(column = %column.name(), type_name = %type_name, "Unsupported column type, reading NULL");
                SqlValue::Null
            });
            (column.name().to_string(), value)
        })
        .collect()
}

// SQLite reports the storage class of each value, so four types cover
// every column; declared booleans are read as such.
fn sqlite_value(row: &SqliteRow, index: usize, type_name: &str) -> Option<SqlValue> {
    if type_name.eq_ignore_ascii_case("BOOLEAN") {
        if let Some(value) = try_decode!(row, index, bool => SqlValue::Bool) {
            return Some(value);
        }
    }
    try_decode!(
        row,
        index,
        i64 => SqlValue::Int,
        f64 => SqlValue::Float,
        String => SqlValue::Text,
        Vec<u8> => SqlValue::Blob,
    )
}

fn postgres_value(row: &PgRow, index: usize, _type_name: &str) -> Option<SqlValue> {
    try_decode!(
        row,
        index,
        bool => SqlValue::Bool,
        i16 => |n: i16| SqlValue::Int(i64::from(n)),
        i32 => |n: i32| SqlValue::Int(i64::from(n)),
        i64 => SqlValue::Int,
        f32 => |f: f32| SqlValue::Float(f64::from(f)),
        f64 => SqlValue::Float,
        String => SqlValue::Text,
        Vec<u8> => SqlValue::Blob,
        NaiveDateTime => datetime,
        DateTime<Utc> => datetime_tz,
        NaiveDate => date,
        NaiveTime => time,
    )
}

fn mysql_value(row: &MySqlRow, index: usize, type_name: &str) -> Option<SqlValue> {
    match type_name {
        "BOOLEAN" => {
            if let Some(value) = try_decode!(row, index, bool => SqlValue::Bool) {
                return Some(value);
            }
        }
        // DECIMAL travels as text on the wire.
        "DECIMAL" => {
            return row
                .try_get_unchecked::<Option<String>, _>(index)
                .ok()
                .map(|value| value.map_or(SqlValue::Null, SqlValue::Text));
        }
        _ => {}
    }
    try_decode!(
        row,
        index,
        i64 => SqlValue::Int,
        u64 => |n: u64| i64::try_from(n).map_or_else(|_| SqlValue::Text(n.to_string()), SqlValue::Int),
        f64 => SqlValue::Float,
        f32 => |f: f32| SqlValue::Float(f64::from(f)),
        String => SqlValue::Text,
        Vec<u8> => SqlValue::Blob,
        NaiveDateTime => datetime,
        DateTime<Utc> => datetime_tz,
        NaiveDate => date,
        NaiveTime => time,
    )
}

fn datetime(value: NaiveDateTime) -> SqlValue {
    SqlValue::Text(value.format("%Y-%m-%d %H:%M:%S%.f").to_string())
}

fn datetime_tz(value: DateTime<Utc>) -> SqlValue {
    SqlValue::Text(value.to_rfc3339())
}

fn date(value: NaiveDate) -> SqlValue {
    SqlValue::Text(value.format("%Y-%m-%d").to_string())
}

fn time(value: NaiveTime) -> SqlValue {
    SqlValue::Text(value.format("%H:%M:%S%.f").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporal_rendering() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let at = day.and_hms_opt(10, 4, 0).unwrap();
        assert_eq!(datetime(at), SqlValue::Text(String::from("2024-03-05 10:04:00")));
        assert_eq!(date(day), SqlValue::Text(String::from("2024-03-05")));
        assert_eq!(
            time(NaiveTime::from_hms_milli_opt(8, 0, 1, 250).unwrap()),
            SqlValue::Text(String::from("08:00:01.250"))
        );
        assert_eq!(
            datetime_tz(at.and_utc()),
            SqlValue::Text(String::from("2024-03-05T10:04:00+00:00"))
        );
    }
}
