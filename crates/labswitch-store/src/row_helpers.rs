use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table: table.to_string(),
        column,
        detail: e.to_string(),
    })
}

/// Get an optional column value.
pub fn get_opt<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &str,
    column: &'static str,
) -> Result<Option<T>, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table: table.to_string(),
        column,
        detail: e.to_string(),
    })
}

/// Timestamps are stored as fixed-width RFC 3339 UTC text so that string
/// comparison in SQL orders them chronologically.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp column, returning CorruptRow on parse failure.
pub fn parse_timestamp(
    raw: &str,
    table: &str,
    column: &'static str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table: table.to_string(),
            column,
            detail: format!("invalid timestamp {raw:?}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamp_format_is_fixed_width() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(&at), "2026-01-02T03:04:05.000000Z");
    }

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        assert!(format_timestamp(&a) < format_timestamp(&b));
    }

    #[test]
    fn parse_timestamp_success() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let parsed = parse_timestamp(&format_timestamp(&at), "registries", "check_in").unwrap();
        assert_eq!(parsed, at);
    }

    #[test]
    fn parse_timestamp_failure() {
        let result = parse_timestamp("yesterday", "registries", "check_in");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { column: "check_in", .. })
        ));
    }
}
