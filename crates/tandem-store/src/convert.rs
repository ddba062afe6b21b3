//! Column conversion helpers shared by the row mappers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use uuid::Uuid;

use tandem_shared::ParseEnumError;

/// Parse a TEXT column into a [`Uuid`].
pub(crate) fn uuid_col(idx: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse an optional TEXT column into an `Option<Uuid>`.
pub(crate) fn opt_uuid_col(idx: usize, value: Option<String>) -> rusqlite::Result<Option<Uuid>> {
    value.map(|s| uuid_col(idx, &s)).transpose()
}

/// Parse an RFC-3339 TEXT column into a UTC timestamp.
pub(crate) fn ts_col(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse an optional RFC-3339 TEXT column.
pub(crate) fn opt_ts_col(
    idx: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|s| ts_col(idx, &s)).transpose()
}

/// Parse a TEXT column into one of the shared domain enums.
pub(crate) fn enum_col<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    value
        .parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
